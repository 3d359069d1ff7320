//! Sighting payload parser.
//!
//! # Parsing Strategy
//!
//! 1. The envelope is parsed loosely: `type` and `message` are both optional
//!    at the serde level so that each absence gets its own error.
//! 2. The `type` is checked before the message body is interpreted, so an
//!    unsupported notice (e.g. a gym update) is reported as such rather than
//!    as a shape mismatch.
//! 3. The message is then parsed into the typed record. Unknown fields are
//!    ignored; scanners add fields freely.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{EncounterId, ExpiresAt, SpawnpointId};

use super::events::{MessageType, Sighting};

/// Error type for payload decoding failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope has no `type`, or it is null.
    #[error("missing message type")]
    MissingType,

    /// The envelope `type` is not one the relay handles.
    #[error("unsupported message type: {0}")]
    UnsupportedType(String),

    /// The envelope has no `message`, or it is null.
    #[error("missing message body")]
    MissingMessage,

    /// Field has an invalid value.
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawPokemonMessage {
    encounter_id: String,
    spawnpoint_id: Option<String>,
    pokemon_id: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
    disappear_time: f64,
}

/// Decodes a raw request body into a [`Sighting`].
///
/// # Examples
///
/// ```
/// use sighting_relay::sightings::decode_sighting;
///
/// let body = br#"{
///     "type": "pokemon",
///     "message": {
///         "encounter_id": "E1",
///         "pokemon_id": 25,
///         "disappear_time": 1700000000.0
///     }
/// }"#;
///
/// let sighting = decode_sighting(body).unwrap();
/// assert_eq!(sighting.encounter_id.as_str(), "E1");
/// assert_eq!(sighting.species().unwrap().name, "Pikachu");
/// ```
pub fn decode_sighting(payload: &[u8]) -> Result<Sighting, DecodeError> {
    let envelope: RawEnvelope = serde_json::from_slice(payload)?;

    let kind = envelope.kind.ok_or(DecodeError::MissingType)?;
    match MessageType::parse(&kind) {
        Some(MessageType::Pokemon) => {}
        None => return Err(DecodeError::UnsupportedType(kind)),
    }

    let message = match envelope.message {
        None | Some(serde_json::Value::Null) => return Err(DecodeError::MissingMessage),
        Some(value) => value,
    };
    let raw: RawPokemonMessage = serde_json::from_value(message)?;

    if raw.encounter_id.trim().is_empty() {
        return Err(DecodeError::InvalidField {
            field: "encounter_id",
            value: raw.encounter_id,
        });
    }

    Ok(Sighting {
        encounter_id: EncounterId(raw.encounter_id),
        expires_at: ExpiresAt(raw.disappear_time),
        pokemon_id: raw.pokemon_id,
        spawnpoint_id: raw.spawnpoint_id.map(SpawnpointId),
        latitude: raw.latitude,
        longitude: raw.longitude,
    })
}
