//! Recency filter for sightings.
//!
//! Upstream scanners resend the same sighting many times while it is still on
//! the map. The [`DedupRegistry`] lets exactly one delivery of each encounter
//! through; the [`Reaper`] forgets encounters once they have expired so the
//! registry stays bounded by the number of live sightings.
//!
//! The registry is a recency filter, not a permanent ledger: an encounter
//! that is resent after being reaped is treated as new.

pub mod reaper;
pub mod registry;

pub use reaper::{Reaper, ReaperConfig};
pub use registry::{DEFAULT_REGISTRY_CAPACITY, DedupRegistry, SweepReport};
