//! Shared test utilities and arbitrary generators for property-based testing.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use serde_json::json;

use crate::dedupe::DedupRegistry;
use crate::notify::{Notice, Notifier, NotifyError};
use crate::server::AppState;
use crate::shutdown::ShutdownCoordinator;
use crate::types::EncounterId;

pub fn arb_encounter_id() -> impl Strategy<Value = EncounterId> {
    "[A-Za-z0-9]{1,24}".prop_map(EncounterId)
}

/// Serializes a well-formed sighting envelope.
pub fn sighting_body(encounter_id: &str, pokemon_id: i64, disappear_time: f64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "pokemon",
        "message": {
            "encounter_id": encounter_id,
            "spawnpoint_id": "4a2b3c",
            "pokemon_id": pokemon_id,
            "latitude": 51.5007,
            "longitude": -0.1246,
            "disappear_time": disappear_time
        }
    }))
    .unwrap()
}

/// Notifier that records every notice it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn encounter_ids(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .map(|n| n.encounter_id.0)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notices.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// App state over a fresh registry and coordinator, with a recording notifier.
pub fn test_app_state() -> (AppState, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let state = AppState::new(
        Arc::new(DedupRegistry::new()),
        notifier.clone(),
        Arc::new(ShutdownCoordinator::new()),
    );
    (state, notifier)
}
