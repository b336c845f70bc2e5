//! Voucher sweep service binary

use std::error::Error;
use std::sync::Arc;
use voucher_sweep::{Config, Sweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting FieldVault voucher sweep service");

    // Load configuration
    let config = Config::from_env()?;

    // Open the custody store and start its writer
    let custody = Arc::new(custody_core::Custody::open(config.custody_config()).await?);
    tracing::info!("Custody store opened");

    let sweep_task = tokio::spawn(Sweeper::new(custody.clone(), config.sweep.clone()).run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down voucher sweep service");

    sweep_task.abort();
    let _ = sweep_task.await;
    if let Some(custody) = Arc::into_inner(custody) {
        custody.shutdown().await?;
    }

    Ok(())
}
