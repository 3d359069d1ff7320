//! Decoding of inbound sighting notices.
//!
//! Upstream scanners post a small JSON envelope for every sighting they
//! observe, and retransmit it freely. This module turns the raw body into a
//! typed [`Sighting`]; deciding whether it has been seen before is the job of
//! [`crate::dedupe`].
//!
//! # Wire format
//!
//! ```text
//! {
//!   "type": "pokemon",
//!   "message": {
//!     "encounter_id": "E1",
//!     "spawnpoint_id": "4a2b",
//!     "pokemon_id": 25,
//!     "latitude": 51.5,
//!     "longitude": -0.12,
//!     "disappear_time": 1700000000.0
//!   }
//! }
//! ```

pub mod events;
pub mod parser;

pub use events::{MessageType, Sighting};
pub use parser::{DecodeError, decode_sighting};
