//! Typed sighting records.

use crate::types::{EncounterId, ExpiresAt, LookupError, SpawnpointId, Species, lookup_by_id};

/// Message types the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Pokemon,
}

impl MessageType {
    /// Parses the envelope `type` field. Matching ignores case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pokemon" => Some(MessageType::Pokemon),
            _ => None,
        }
    }
}

/// One decoded sighting. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    /// Dedup key.
    pub encounter_id: EncounterId,
    /// When the sighting stops being relevant.
    pub expires_at: ExpiresAt,
    /// Raw species number as sent; resolved lazily by [`Sighting::species`].
    pub pokemon_id: i64,
    pub spawnpoint_id: Option<SpawnpointId>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Sighting {
    /// Resolves the species number against the static table.
    pub fn species(&self) -> Result<Species, LookupError> {
        lookup_by_id(self.pokemon_id)
    }
}
