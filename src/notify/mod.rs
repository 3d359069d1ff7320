//! Downstream notifiers.
//!
//! A notifier is told about each sighting that the registry admitted. It is
//! invoked at most once per admission; a failed notification is logged and
//! dropped, never retried.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::info;

use crate::sightings::Sighting;
use crate::types::{EncounterId, ExpiresAt, SpawnpointId, Species};

/// Errors a notifier can report.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Writing the notice failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What a notifier is told about an admitted sighting.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub encounter_id: EncounterId,
    pub species: Species,
    pub spawnpoint_id: Option<SpawnpointId>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub expires_at: ExpiresAt,
}

impl Notice {
    /// Builds a notice from a decoded sighting and its resolved species.
    pub fn new(sighting: &Sighting, species: Species) -> Self {
        Notice {
            encounter_id: sighting.encounter_id.clone(),
            species,
            spawnpoint_id: sighting.spawnpoint_id.clone(),
            latitude: sighting.latitude,
            longitude: sighting.longitude,
            expires_at: sighting.expires_at,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Notified Player of {} - {}",
            self.species.name, self.encounter_id
        )
    }
}

/// Delivers notices downstream.
///
/// Implementations must be safe to call from many handler tasks at once.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Writes one line per notice to a shared writer (stdout by default).
///
/// The writer is locked for the whole line, so concurrent notices never
/// interleave.
pub struct ConsoleNotifier<W = io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleNotifier<io::Stdout> {
    pub fn stdout() -> Self {
        ConsoleNotifier::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleNotifier<W> {
    pub fn new(out: W) -> Self {
        ConsoleNotifier {
            out: Mutex::new(out),
        }
    }

    /// Consumes the notifier and returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> Notifier for ConsoleNotifier<W> {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{notice}")?;
        out.flush()?;
        Ok(())
    }
}

/// Emits each notice as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        info!(
            encounter_id = %notice.encounter_id,
            species = notice.species.name,
            species_id = notice.species.id.0,
            spawnpoint_id = notice.spawnpoint_id.as_ref().map(SpawnpointId::as_str),
            latitude = notice.latitude,
            longitude = notice.longitude,
            expires_at = %notice.expires_at,
            "Notified player"
        );
        Ok(())
    }
}

/// Which notifier the binary installs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifierKind {
    #[default]
    Console,
    Log,
}

/// Unrecognised notifier name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown notifier {0:?} (expected \"console\" or \"log\")")]
pub struct UnknownNotifier(pub String);

impl FromStr for NotifierKind {
    type Err = UnknownNotifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "console" | "stdout" => Ok(NotifierKind::Console),
            "log" | "tracing" => Ok(NotifierKind::Log),
            _ => Err(UnknownNotifier(s.to_string())),
        }
    }
}

impl NotifierKind {
    /// Constructs the selected notifier.
    pub fn build(self) -> Box<dyn Notifier> {
        match self {
            NotifierKind::Console => Box::new(ConsoleNotifier::stdout()),
            NotifierKind::Log => Box::new(LogNotifier),
        }
    }
}
