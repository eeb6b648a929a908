//! Module configuration report
//!
//! Reads every setting once and prints it, marking the ones that failed.

use anyhow::Context;
use cm710::{ReaderConfig, ReaderSession};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = ReaderConfig::from_env()?;
    let mut reader = ReaderSession::new(config);
    reader.open().await.context("failed to open reader")?;

    let snapshot = reader.configure()?.read_config().await;
    let module = &snapshot.config;

    println!("Firmware:    {}", display(&module.firmware));
    println!("Temperature: {} C", display(&module.temperature_c));
    println!("Power:       {} dBm", display(&module.power_dbm));
    println!("Region:      {}", display(&module.region));
    println!("Antennas:    {}", module.antennas_description().unwrap_or_else(|| "-".into()));
    println!("FastID:      {}", display(&module.fastid));

    for failure in &snapshot.failures {
        println!("! {}", failure);
    }

    reader.close().await?;
    Ok(())
}

fn display<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}
