//! Sighting Relay - a local notification relay for creature sightings.
//!
//! A scanner posts sighting notices over HTTP. Each encounter is announced to
//! the player exactly once, however many times it is delivered, and is
//! forgotten again once it has expired.
//!
//! This library provides the wire decoding, the dedup registry and its
//! reaper, the notifier seam, and the shutdown coordinator. The binary wires
//! them together behind an axum server.

pub mod config;
pub mod dedupe;
pub mod dispatch;
pub mod notify;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod sightings;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
