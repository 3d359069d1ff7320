//! Per-request pipeline.
//!
//! Every inbound delivery runs [`process_sighting`] in its own task on the
//! blocking pool, since notifiers may do synchronous I/O:
//!
//! ```text
//! body ──► decode ──► try_admit ──► species lookup ──► notify
//!            │            │                │              │
//!            ▼            ▼                ▼              ▼
//!      DecodeFailed   Duplicate       LookupFailed   NotifyFailed
//! ```
//!
//! Failures end the task quietly. A decode failure never touches the
//! registry; lookup and notify failures happen after admission, so the
//! encounter stays admitted and a resend will not be notified either.

use tracing::{debug, info, warn};

use crate::dedupe::DedupRegistry;
use crate::notify::{Notice, Notifier};
use crate::sightings::decode_sighting;
use crate::types::Species;

/// How one delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SightingOutcome {
    /// First delivery of this encounter; the notifier fired.
    Notified { species: Species },
    /// The encounter was already admitted.
    Duplicate,
    /// The payload could not be decoded.
    DecodeFailed,
    /// Admitted, but the species number is not in the table.
    LookupFailed,
    /// Admitted, but the notifier reported an error.
    NotifyFailed,
}

/// Decodes `body`, admits it, and notifies on first admission.
pub fn process_sighting(
    body: &[u8],
    registry: &DedupRegistry,
    notifier: &dyn Notifier,
) -> SightingOutcome {
    let sighting = match decode_sighting(body) {
        Ok(sighting) => sighting,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "Dropping undecodable sighting");
            return SightingOutcome::DecodeFailed;
        }
    };

    if !registry.try_admit(&sighting.encounter_id, sighting.expires_at) {
        debug!(encounter_id = %sighting.encounter_id, "Duplicate sighting");
        return SightingOutcome::Duplicate;
    }

    let species = match sighting.species() {
        Ok(species) => species,
        Err(e) => {
            warn!(
                encounter_id = %sighting.encounter_id,
                error = %e,
                "Admitted sighting has unknown species; not notifying"
            );
            return SightingOutcome::LookupFailed;
        }
    };

    let notice = Notice::new(&sighting, species);
    match notifier.notify(&notice) {
        Ok(()) => {
            info!(
                encounter_id = %sighting.encounter_id,
                species = species.name,
                expires_at = %sighting.expires_at,
                "New sighting"
            );
            SightingOutcome::Notified { species }
        }
        Err(e) => {
            warn!(encounter_id = %sighting.encounter_id, error = %e, "Notifier failed");
            SightingOutcome::NotifyFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use crate::test_utils::{RecordingNotifier, sighting_body};
    use crate::types::{EncounterId, ExpiresAt};
    use serde_json::json;

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn notify(&self, _notice: &Notice) -> Result<(), NotifyError> {
            Err(NotifyError::Io(std::io::Error::other("push service down")))
        }
    }

    #[test]
    fn first_delivery_notifies() {
        let registry = DedupRegistry::new();
        let notifier = RecordingNotifier::new();

        let outcome = process_sighting(&sighting_body("E1", 25, 1.7e9), &registry, &notifier);

        assert!(matches!(outcome, SightingOutcome::Notified { species } if species.name == "Pikachu"));
        assert_eq!(notifier.encounter_ids(), vec!["E1".to_string()]);
    }

    #[test]
    fn resend_is_duplicate_and_silent() {
        let registry = DedupRegistry::new();
        let notifier = RecordingNotifier::new();
        let body = sighting_body("E1", 25, 1.7e9);

        process_sighting(&body, &registry, &notifier);
        let outcome = process_sighting(&body, &registry, &notifier);

        assert_eq!(outcome, SightingOutcome::Duplicate);
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn undecodable_body_leaves_registry_untouched() {
        let registry = DedupRegistry::new();
        let notifier = RecordingNotifier::new();
        let body = serde_json::to_vec(&json!({
            "type": "gym",
            "message": { "encounter_id": "E1", "pokemon_id": 25, "disappear_time": 1.7e9 }
        }))
        .unwrap();

        let outcome = process_sighting(&body, &registry, &notifier);

        assert_eq!(outcome, SightingOutcome::DecodeFailed);
        assert!(registry.is_empty());
        assert!(notifier.is_empty());
    }

    #[test]
    fn unknown_species_is_admitted_but_not_notified() {
        let registry = DedupRegistry::new();
        let notifier = RecordingNotifier::new();
        let body = sighting_body("E1", 999, 1.7e9);

        assert_eq!(
            process_sighting(&body, &registry, &notifier),
            SightingOutcome::LookupFailed
        );
        assert!(notifier.is_empty());
        assert!(!registry.try_admit(&EncounterId::new("E1"), ExpiresAt(1.7e9)));

        assert_eq!(
            process_sighting(&body, &registry, &notifier),
            SightingOutcome::Duplicate
        );
    }

    #[test]
    fn notifier_failure_is_contained() {
        let registry = DedupRegistry::new();

        let outcome = process_sighting(&sighting_body("E1", 1, 1.7e9), &registry, &FailingNotifier);

        assert_eq!(outcome, SightingOutcome::NotifyFailed);
        assert_eq!(registry.len(), 1);
    }
}
