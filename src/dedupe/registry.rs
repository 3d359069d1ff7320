//! Shared registry of already-admitted encounters.
//!
//! The registry maps each admitted [`EncounterId`] to its expiry. It has
//! exactly two mutations:
//!
//! - [`DedupRegistry::try_admit`] inserts an id only if it is absent. The
//!   check and the insert happen under a single shard lock, so among any
//!   number of racing calls for one id exactly one returns `true`.
//! - [`DedupRegistry::sweep`] removes expired ids. It copies the live entries
//!   first and scans the copy without holding any lock, then removes each
//!   expired id only if the live entry still carries the snapshotted expiry.
//!   An id that was evicted and re-admitted while the scan ran is left alone.
//!
//! Entries are never updated in place. Once an id has been reaped, a later
//! resend of the same id is admitted again.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::types::{EncounterId, ExpiresAt};

/// Default pre-size for the registry.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 500;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries present in the snapshot.
    pub scanned: usize,
    /// Snapshot entries whose expiry was at or before the sweep time.
    pub expired: usize,
    /// Expired entries actually removed from the live registry.
    pub removed: usize,
    /// Entries skipped because their expiry is not a representable instant.
    pub malformed: usize,
}

/// Concurrent admit-once registry.
#[derive(Debug)]
pub struct DedupRegistry {
    entries: DashMap<EncounterId, ExpiresAt>,
}

impl Default for DedupRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REGISTRY_CAPACITY)
    }
}

impl DedupRegistry {
    /// Creates an empty registry with the default pre-size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry pre-sized for `capacity` live entries.
    ///
    /// The capacity is a performance hint only; the registry grows as needed.
    pub fn with_capacity(capacity: usize) -> Self {
        DedupRegistry {
            entries: DashMap::with_capacity(capacity),
        }
    }

    /// Admits `id` if it is not already present.
    ///
    /// Returns `true` for the single call that inserted the id, `false` for
    /// every other call until the id is reaped.
    pub fn try_admit(&self, id: &EncounterId, expires_at: ExpiresAt) -> bool {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                true
            }
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry whose expiry is at or before `now`.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let snapshot = self.snapshot();
        self.evict_expired(&snapshot, now)
    }

    /// Copies the live entries. Each shard is locked only while it is copied.
    pub(crate) fn snapshot(&self) -> Vec<(EncounterId, ExpiresAt)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Removes the expired entries of `snapshot` from the live registry.
    ///
    /// An entry is removed only if its live expiry is still the one in the
    /// snapshot.
    pub(crate) fn evict_expired(
        &self,
        snapshot: &[(EncounterId, ExpiresAt)],
        now: DateTime<Utc>,
    ) -> SweepReport {
        let mut report = SweepReport {
            scanned: snapshot.len(),
            ..SweepReport::default()
        };

        for (id, expires_at) in snapshot {
            match expires_at.is_expired_at(now) {
                Ok(true) => {
                    report.expired += 1;
                    if self.evict_if_unchanged(id, *expires_at) {
                        report.removed += 1;
                    } else {
                        debug!(encounter_id = %id, "Entry changed since snapshot; not evicting");
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    report.malformed += 1;
                    warn!(encounter_id = %id, error = %e, "Skipping entry with malformed expiry");
                }
            }
        }

        report
    }

    /// Removes `id` only if its live expiry is bitwise equal to `expected`.
    fn evict_if_unchanged(&self, id: &EncounterId, expected: ExpiresAt) -> bool {
        self.entries
            .remove_if(id, |_, live| live.same_instant(&expected))
            .is_some()
    }
}
