//! Standalone Plantation server.
//!
//! Wires the farm catalog, plot allocator, durable backend, sandbox
//! collaborators and the reconciler together, then runs until interrupted.
//! On Ctrl-C every resident owner is flushed before the backend closes.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `plantation-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Validate the catalog and plot grid
//! 4. Connect the configured backend (migrating `PostgreSQL`)
//! 5. Compose the store and service, start the reconciler
//! 6. Wait for Ctrl-C, then run the final flush

mod error;

use std::path::Path;
use std::sync::Arc;

use plantation_core::config::LoggingConfig;
use plantation_core::{
    BackendKind, CollaboratorSet, Plantation, PlantationConfig, PlantationStore, Reconciler,
    ReconcilerConfig,
};
use plantation_db::{
    AnyRepository, DragonflyFarmRepository, DragonflyPool, MemoryFarmRepository,
    PgFarmRepository, PostgresConfig, PostgresPool,
};
use plantation_ledger::{InMemoryCurrency, InMemoryInventory, NoMaterialPool};
use plantation_world::{Catalog, PlotAllocator};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

const CONFIG_PATH: &str = "plantation-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, validation, or backend setup fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(Path::new(CONFIG_PATH))?;
    init_logging(&config.logging);
    info!(
        backend = ?config.persistence.backend,
        farm_types = config.catalog.len(),
        save_interval_secs = config.persistence.save_interval_secs,
        "plantation-server starting"
    );

    let catalog = Arc::new(Catalog::new(config.catalog.clone())?);
    let plots = PlotAllocator::new(config.plots.clone())?;
    plots.check_catalog(&catalog)?;
    info!(
        grid_size = plots.config().grid_size,
        plot_size = plots.config().plot_size,
        "Catalog and plot grid validated"
    );

    let repo = Arc::new(connect_backend(&config).await?);
    info!(backend = repo.name(), "Backend ready");

    let store = Arc::new(PlantationStore::new(Arc::clone(&repo), catalog));
    let collaborators = CollaboratorSet {
        currency: Arc::new(InMemoryCurrency::new(config.sandbox.currency_unit.clone())),
        inventory: Arc::new(InMemoryInventory::new(config.sandbox.inventory_capacity)),
        pool: Arc::new(NoMaterialPool),
    };
    let plantation = Plantation::new(
        Arc::clone(&store),
        plots,
        config.economy.clone(),
        collaborators,
    )?;
    info!(
        max_level = plantation.economy().max_level,
        "Plantation service ready"
    );

    let reconciler = Reconciler::spawn(
        Arc::clone(&store),
        ReconcilerConfig {
            save_interval: config.persistence.save_interval(),
            shutdown_timeout: config.persistence.shutdown_timeout(),
        },
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown requested");

    let report = reconciler.shutdown().await;
    repo.close().await;
    info!(
        saved = report.saved,
        failed = report.failed,
        timed_out = report.timed_out,
        "plantation-server shutdown complete"
    );
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load configuration from `path`, or the defaults when it does not exist.
fn load_config(path: &Path) -> Result<PlantationConfig, ServerError> {
    if path.exists() {
        Ok(PlantationConfig::from_file(path)?)
    } else {
        // Logging is not up yet; the defaults are reported after init.
        let mut config = PlantationConfig::default();
        config.persistence.apply_env_overrides();
        Ok(config)
    }
}

/// Connect the configured backend.
async fn connect_backend(config: &PlantationConfig) -> Result<AnyRepository, ServerError> {
    let persistence = &config.persistence;
    match persistence.backend {
        BackendKind::Postgres => {
            let pg = PostgresConfig::new(&persistence.postgres_url)
                .with_max_connections(persistence.max_connections);
            let pool = PostgresPool::connect(&pg).await?;
            pool.run_migrations().await?;
            Ok(AnyRepository::Postgres(PgFarmRepository::new(pool)))
        }
        BackendKind::Dragonfly => {
            let pool = DragonflyPool::connect(&persistence.dragonfly_url).await?;
            Ok(AnyRepository::Dragonfly(DragonflyFarmRepository::new(pool)))
        }
        BackendKind::Memory => {
            tracing::warn!("Memory backend selected, farms will not survive a restart");
            Ok(AnyRepository::Memory(MemoryFarmRepository::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let config = load_config(Path::new("does-not-exist.yaml"));
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();
        assert_eq!(config.catalog.len(), Catalog::default_catalog().len());
    }

    #[tokio::test]
    async fn memory_backend_connects_without_io() {
        let mut config = PlantationConfig::default();
        config.persistence.backend = BackendKind::Memory;
        let repo = connect_backend(&config).await;
        assert_eq!(repo.ok().map(|r| r.name()), Some("memory"));
    }
}
