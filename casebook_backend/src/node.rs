use crate::api::{self, AppState};
use crate::bootstrap::{self, BootstrapResources};
use crate::config::CasebookConfig;
use crate::database::Database;
use crate::trending::TrendingCache;
use anyhow::Result;
use std::sync::Arc;

/// Bootstraps the backend once and hands out cloned handles for whichever
/// entrypoint (CLI command, REST server) needs them.
pub struct CasebookNode {
    config: CasebookConfig,
    bootstrap: BootstrapResources,
    trending: Arc<TrendingCache>,
}

impl CasebookNode {
    /// Creates the data layout, opens the database and applies migrations.
    pub fn start(config: CasebookConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config)?;
        let trending = Arc::new(TrendingCache::for_database(
            bootstrap.database.clone(),
            config.trending.clone(),
        ));

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            db_path = %config.paths.db_path.display(),
            "casebook node initialized"
        );

        Ok(Self {
            config,
            bootstrap,
            trending,
        })
    }

    /// Returns the shared state handed to the HTTP layer.
    pub fn app_state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            database: self.bootstrap.database.clone(),
            trending: self.trending.clone(),
        }
    }

    /// Runs the REST API server until shutdown.
    pub async fn run_http_server(&self) -> Result<()> {
        tracing::info!(port = self.config.api_port, "starting casebook HTTP server");
        api::serve_http(self.app_state()).await
    }

    pub fn database(&self) -> Database {
        self.bootstrap.database.clone()
    }

    pub fn config(&self) -> &CasebookConfig {
        &self.config
    }
}
