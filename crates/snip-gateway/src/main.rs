use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use snip_core::Storage;
use snip_gateway::{App, AppState, Cli, CookieSigner, LogFormatArg, StorageBackend};
use snip_storage::{FileStorage, InMemoryStorage, PostgresOptions, PostgresStorage};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse();
    init_tracing(config.log_format);

    let backend = config.backend();
    info!(
        server_address = %config.server_address,
        base_url = %config.base_url,
        storage_backend = %backend,
        "starting gateway server"
    );

    let storage = open_storage(&config, backend).await?;
    let signer = CookieSigner::new(&config.auth_secret).context("invalid auth secret")?;
    let state = AppState::new(storage, signer);

    let listener = tokio::net::TcpListener::bind(config.server_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server_address))?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

async fn open_storage(config: &Cli, backend: StorageBackend) -> anyhow::Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match backend {
        StorageBackend::Postgres { dsn } => {
            let options = PostgresOptions::builder()
                .database_url(dsn)
                .base_url(config.base_url.clone())
                .max_connections(config.database_max_connections)
                .timeout(config.database_timeout())
                .build();
            let storage = PostgresStorage::connect(options)
                .await
                .context("failed to connect to postgres")?;
            storage
                .migrate()
                .await
                .context("failed to apply database schema")?;
            Arc::new(storage)
        }
        StorageBackend::File { path } => {
            let storage = FileStorage::open(path.clone(), config.base_url.clone())
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Arc::new(storage)
        }
        StorageBackend::InMemory => Arc::new(InMemoryStorage::new(config.base_url.clone())),
    };

    Ok(storage)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
