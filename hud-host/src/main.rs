use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use hud_host::gps::GpsCandidate;
use hud_host::sdk::now_ms;
use hud_host::{HudHostSdk, HudTransport};

/// Demo transport that just logs what it would have written. A real
/// embedding application supplies a serial port, BLE characteristic, or
/// socket instead.
struct StdoutTransport;

#[async_trait]
impl HudTransport for StdoutTransport {
    async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        info!(bytes = bytes.len(), "would write frame to device");
        Ok(())
    }

    async fn close(&self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hud_host=info".into()),
        )
        .init();

    let sdk = Arc::new(HudHostSdk::builder().build(Arc::new(StdoutTransport))?);
    sdk.start();

    sdk.set_field("speed_kmh", 42);
    sdk.set_field("rpm", 2200);
    sdk.ingest_gps(
        GpsCandidate { lat: 37.7749, lon: -122.4194, accuracy_m: 5.0, timestamp_ms: now_ms() },
        now_ms(),
    );

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    sdk.stop().await;
    info!(
        sent_msg = sdk.writer_counters().sent_msg.load(std::sync::atomic::Ordering::Relaxed),
        "demo finished"
    );
    Ok(())
}
