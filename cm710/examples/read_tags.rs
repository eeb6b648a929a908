//! Continuous inventory example
//!
//! Prints one line per tag until Ctrl-C. Reads `CM710_*` variables for the
//! port and device id; set `RUST_LOG=cm710=debug` for protocol details.

use anyhow::Context;
use cm710::{ModuleSettings, ReaderConfig, ReaderSession, TxPower};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ReaderConfig::from_env().context("invalid CM710_* setting")?;
    println!("Reading from {} as {}", config.port, config.device_id);

    let settings = ModuleSettings::new()
        .with_power(TxPower::new(26)?)
        .with_fastid(false);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut reader = ReaderSession::new(config);
    let stats = reader
        .run(&settings, |tag| println!("{}", tag), &cancel)
        .await
        .context("reader failed")?;

    println!(
        "Done: {} readings, {} invalid frames, {} malformed tags",
        stats.readings, stats.invalid_frames, stats.malformed_tags
    );

    Ok(())
}
