use std::sync::Arc;

use pki_tidy::{
    config::Config,
    pki::{crl::CrlRebuildMarker, issuer::StorageIssuerResolver, revocation::RevocationLock},
    server::{AppState, Server},
    storage::{MemoryStorage, RedisStorage, Storage},
    telemetry,
    tidy::TidyManager,
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    telemetry::init_tracing();

    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let storage: Arc<dyn Storage> = match &config.redis {
        Some(redis) => Arc::new(RedisStorage::new(redis.start().await?)),
        None => {
            tracing::warn!("No redis configured; using in-memory storage");
            Arc::new(MemoryStorage::default())
        }
    };

    let tidy = TidyManager::new(
        Arc::clone(&storage),
        Arc::new(StorageIssuerResolver::new(Arc::clone(&storage))),
        Arc::new(CrlRebuildMarker::new(Arc::clone(&storage))),
        RevocationLock::default(),
    );

    let state = AppState {
        tidy,
        replication: config.replication,
    };

    Server::new(state).run(&config.server).await
}
