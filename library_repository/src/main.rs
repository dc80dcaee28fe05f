use std::sync::Arc;

use anyhow::Context;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use library_repository::library_store::{InMemoryLibraryStore, LibraryStore, PostgresLibraryStore};
use library_repository::orders_repository::OrdersRepository;
use library_repository::records::ToRecord;
use library_repository::settings::Settings;

fn init_telemetry() -> anyhow::Result<()> {
    let app_name = "library_report";

    // Filter based on level - trace, debug, info, warn, error
    // Tunable via `RUST_LOG` env variable
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    // Emit spans as structured logs to stderr, stdout carries the report
    let formatting_layer = BunyanFormattingLayer::new(app_name.into(), std::io::stderr);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install `tracing` subscriber.")
}

/// Prints every book that is currently checked out, one JSON record per line
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry()?;
    let settings = Settings::load().context("Failed to load settings")?;

    let store: Arc<dyn LibraryStore> = if settings.use_in_memory_db {
        Arc::new(InMemoryLibraryStore::default())
    } else {
        Arc::new(
            PostgresLibraryStore::init(settings.postgres_config())
                .await
                .context("Failed to init postgres")?,
        )
    };

    let outstanding = store
        .list_outstanding_orders()
        .await
        .context("Failed to list outstanding orders")?;
    tracing::info!("{} books currently checked out", outstanding.len());

    for order in outstanding {
        println!("{}", order.to_record());
    }
    Ok(())
}
