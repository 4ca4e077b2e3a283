use axum::Router;
use jobhub::config::{AppConfig, StorageConfig};
use jobhub::error::AppError;
use jobhub::marketplace::{seed, MarketStore, MarketplaceService, MemoryStore, SqliteStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

use crate::routes::with_marketplace_routes;

/// Reference data bundled with the binary; `APP_SEED_PATH` overrides it.
pub(crate) const BUNDLED_SEED: &str = include_str!("../seed/marketplace.json");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Build the marketplace router on the configured backend, seeding
/// reference data first.
pub(crate) fn marketplace_app(config: &AppConfig) -> Result<Router, AppError> {
    match &config.storage.database_path {
        Some(path) => {
            let store = SqliteStore::open(path)?;
            info!(path = %path.display(), "using sqlite marketplace store");
            build(store, config)
        }
        None => {
            info!("using in-memory marketplace store");
            build(MemoryStore::new(), config)
        }
    }
}

fn build<S: MarketStore + 'static>(store: S, config: &AppConfig) -> Result<Router, AppError> {
    seed_store(&store, &config.storage)?;
    let service = Arc::new(MarketplaceService::new(
        Arc::new(store),
        config.marketplace,
    ));
    Ok(with_marketplace_routes(service))
}

pub(crate) fn seed_store<S: MarketStore>(
    store: &S,
    storage: &StorageConfig,
) -> Result<seed::SeedSummary, AppError> {
    let document = match &storage.seed_path {
        Some(path) => seed::load(path)?,
        None => seed::parse(BUNDLED_SEED)?,
    };
    Ok(seed::apply(store, &document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobhub::config::MarketplaceConfig;

    #[test]
    fn bundled_seed_is_valid_and_idempotent() {
        let store = MemoryStore::new();
        let storage = StorageConfig {
            database_path: None,
            seed_path: None,
        };

        let first = seed_store(&store, &storage).expect("seeds");
        assert_eq!(first.job_types, 3);
        assert_eq!(first.users, 3);
        assert_eq!(first.provider_profiles, 2);

        let second = seed_store(&store, &storage).expect("seeds again");
        assert_eq!(second, seed::SeedSummary::default());

        let service = MarketplaceService::new(Arc::new(store), MarketplaceConfig::default());
        assert_eq!(service.job_types().expect("job types").len(), 3);
    }

    #[test]
    fn missing_seed_file_is_reported() {
        let storage = StorageConfig {
            database_path: None,
            seed_path: Some("/nonexistent/seed.json".into()),
        };
        let err = seed_store(&MemoryStore::new(), &storage).expect_err("missing file");
        assert!(matches!(err, AppError::Seed(seed::SeedError::Io { .. })));
    }
}
