//! Periodic eviction of expired registry entries.
//!
//! The reaper wakes on a short fixed interval but only sweeps once a longer
//! cooldown has passed since its previous sweep. The first wake-up always
//! sweeps. It stops when its cancellation token fires; a bad entry never
//! stops it.
//!
//! # Defaults
//!
//! - **Poll interval**: 500ms (`SIGHTING_RELAY_REAPER_POLL_MS`)
//! - **Cooldown**: 60s (`SIGHTING_RELAY_REAPER_COOLDOWN_SECS`)

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::{DedupRegistry, SweepReport};

/// Default wake-up interval (500ms).
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default minimum time between sweeps (1 minute).
const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// Reaper tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    /// How often the reaper wakes up to check the cooldown.
    pub poll_interval: Duration,

    /// Minimum time between two sweeps.
    pub cooldown: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaperConfig {
    /// Creates a `ReaperConfig` with default values.
    pub fn new() -> Self {
        ReaperConfig {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
        }
    }
}

/// Background task that sweeps a [`DedupRegistry`].
pub struct Reaper {
    registry: Arc<DedupRegistry>,
    config: ReaperConfig,
    last_sweep: Option<Instant>,
}

impl Reaper {
    pub fn new(registry: Arc<DedupRegistry>, config: ReaperConfig) -> Self {
        Reaper {
            registry,
            config,
            last_sweep: None,
        }
    }

    /// Spawns [`Reaper::run`] onto the runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            cooldown_secs = self.config.cooldown.as_secs(),
            "Reaper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.tick(Instant::now(), Utc::now());
                }
            }
        }

        info!("Reaper stopped");
    }

    /// Sweeps if the cooldown has elapsed since the last sweep.
    ///
    /// `now` drives the cooldown; `wall_clock` is compared against entry expiries.
    pub fn tick(&mut self, now: Instant, wall_clock: DateTime<Utc>) -> Option<SweepReport> {
        if let Some(last) = self.last_sweep
            && now.saturating_duration_since(last) < self.config.cooldown
        {
            return None;
        }
        self.last_sweep = Some(now);

        let report = self.registry.sweep(wall_clock);
        if report.removed > 0 || report.malformed > 0 {
            info!(
                scanned = report.scanned,
                removed = report.removed,
                malformed = report.malformed,
                remaining = self.registry.len(),
                "Reaped expired encounters"
            );
        } else {
            debug!(scanned = report.scanned, "Reaper sweep found nothing to remove");
        }
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EncounterId, ExpiresAt};
    use chrono::TimeZone;

    const NOW: i64 = 1_700_000_000;

    fn wall(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = ReaperConfig::new();

        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn first_tick_sweeps() {
        let registry = Arc::new(DedupRegistry::new());
        registry.try_admit(&EncounterId::new("E1"), ExpiresAt((NOW - 1) as f64));
        let mut reaper = Reaper::new(Arc::clone(&registry), ReaperConfig::new());

        let report = reaper.tick(Instant::now(), wall(NOW));

        assert_eq!(report.map(|r| r.removed), Some(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn tick_within_cooldown_does_not_sweep() {
        let registry = Arc::new(DedupRegistry::new());
        let mut reaper = Reaper::new(Arc::clone(&registry), ReaperConfig::new());
        let start = Instant::now();

        assert!(reaper.tick(start, wall(NOW)).is_some());

        registry.try_admit(&EncounterId::new("E1"), ExpiresAt((NOW - 1) as f64));
        assert!(reaper.tick(start + Duration::from_secs(30), wall(NOW)).is_none());
        assert!(reaper.tick(start + Duration::from_millis(59_999), wall(NOW)).is_none());
        assert_eq!(registry.len(), 1);

        let report = reaper.tick(start + Duration::from_secs(60), wall(NOW));
        assert_eq!(report.map(|r| r.removed), Some(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn cooldown_restarts_from_last_sweep() {
        let registry = Arc::new(DedupRegistry::new());
        let mut reaper = Reaper::new(Arc::clone(&registry), ReaperConfig::new());
        let start = Instant::now();

        reaper.tick(start, wall(NOW));
        assert!(reaper.tick(start + Duration::from_secs(61), wall(NOW)).is_some());
        assert!(reaper.tick(start + Duration::from_secs(90), wall(NOW)).is_none());
        assert!(reaper.tick(start + Duration::from_secs(121), wall(NOW)).is_some());
    }

    #[test]
    fn unexpired_entries_survive_a_sweep() {
        let registry = Arc::new(DedupRegistry::new());
        registry.try_admit(&EncounterId::new("E1"), ExpiresAt((NOW + 600) as f64));
        let mut reaper = Reaper::new(Arc::clone(&registry), ReaperConfig::new());

        let report = reaper.tick(Instant::now(), wall(NOW)).unwrap();

        assert_eq!(report.removed, 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn run_evicts_and_stops_on_cancel() {
        let registry = Arc::new(DedupRegistry::new());
        registry.try_admit(&EncounterId::new("old"), ExpiresAt((NOW - 1) as f64));
        let config = ReaperConfig {
            poll_interval: Duration::from_millis(10),
            cooldown: Duration::ZERO,
        };
        let shutdown = CancellationToken::new();
        let handle = Reaper::new(Arc::clone(&registry), config).spawn(shutdown.clone());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !registry.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(registry.is_empty(), "reaper should have evicted the expired entry");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reaper should stop after cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn run_returns_immediately_if_already_cancelled() {
        let registry = Arc::new(DedupRegistry::new());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            Reaper::new(registry, ReaperConfig::new()).run(shutdown),
        )
        .await;

        assert!(result.is_ok());
    }
}
