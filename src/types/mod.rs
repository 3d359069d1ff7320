//! Core domain types for the sighting relay.

pub mod ids;
pub mod species;

pub use ids::{EncounterId, ExpiresAt, InvalidTimestamp, SpawnpointId, SpeciesId};
pub use species::{LookupError, Species, lookup_by_id, lookup_by_name};
