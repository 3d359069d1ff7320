use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sighting_relay::config::RelayConfig;
use sighting_relay::relay::Relay;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sighting_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env().context("invalid configuration")?;
    let notifier = Arc::from(config.notifier.build());

    let relay = Relay::bind(config, notifier)
        .await
        .context("failed to start relay")?;
    tracing::info!(
        addr = %relay.local_addr().context("bound socket has no address")?,
        "Relay started"
    );

    match relay.run().await.context("relay failed")? {
        Some(report) if report.remaining > 0 => tracing::warn!(
            remaining = report.remaining,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Stopped with tasks still running"
        ),
        Some(report) => tracing::info!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Stopped"
        ),
        None => tracing::info!("Stopped"),
    }

    Ok(())
}
