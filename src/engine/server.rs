//! Service wiring and the HTTP server loop

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::engine::api::{create_router, ApiState};
use crate::engine::auth::{self, Authenticator};
use crate::engine::config::Config;
use crate::engine::database::Database;
use crate::engine::firmware::{ArtifactService, BlobStore, SqliteArtifactRepository};
use crate::engine::migrations::MigrationRunner;
use crate::engine::webhook::{DispatchSettings, Dispatcher, SqliteSubscriptionRepository, SubscriptionRepository};

/// Whether the artifact service announces changes on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announce {
    /// Every ingest and remove dispatches webhooks in the background
    Background,
    /// The caller dispatches through [`Registry::dispatcher`] itself
    Manual,
}

/// Fully wired registry services over one database
pub struct Registry {
    pub config: Config,
    pub db: Database,
    pub artifacts: Arc<ArtifactService>,
    pub webhooks: Arc<dyn SubscriptionRepository>,
    pub dispatcher: Dispatcher,
}

impl Registry {
    /// Open the database, apply pending migrations and build the services.
    ///
    /// Must run inside a tokio runtime; the dispatcher spawns onto it.
    pub fn open(config: Config, announce: Announce) -> anyhow::Result<Self> {
        let db = Database::new(&config.db_path)
            .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
        let applied = MigrationRunner::embedded().push(&db)?;
        if !applied.is_empty() {
            info!(count = applied.len(), "applied migrations");
        }
        Self::with_database(config, db, announce)
    }

    /// Build the services over an already migrated database.
    pub fn with_database(config: Config, db: Database, announce: Announce) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.storage_dir)
            .with_context(|| format!("failed to create storage dir {}", config.storage_dir.display()))?;

        let webhooks: Arc<dyn SubscriptionRepository> = Arc::new(SqliteSubscriptionRepository::new(db.clone()));
        let dispatcher = Dispatcher::new(webhooks.clone(), DispatchSettings::from_config(&config.webhooks))?;

        let mut artifacts = ArtifactService::new(
            Arc::new(SqliteArtifactRepository::new(db.clone())),
            BlobStore::new(&config.storage_dir),
        )
        .with_public_base(config.public_base());
        if announce == Announce::Background {
            artifacts = artifacts.with_events(Arc::new(dispatcher.clone()));
        }

        Ok(Self {
            config,
            db,
            artifacts: Arc::new(artifacts),
            webhooks,
            dispatcher,
        })
    }

    pub fn api_state(&self, auth: Arc<dyn Authenticator>) -> ApiState {
        ApiState {
            artifacts: self.artifacts.clone(),
            webhooks: self.webhooks.clone(),
            auth,
            max_upload_bytes: self.config.max_upload_bytes(),
        }
    }
}

/// Run the HTTP API until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let registry = Registry::open(config, Announce::Background)?;
    let authenticator = auth::from_config(&registry.config).await;
    let app = create_router(registry.api_state(authenticator));

    let addr = registry.config.listen_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(
        addr = %addr,
        storage = %registry.config.storage_dir.display(),
        db = %registry.config.db_path.display(),
        "firmware registry listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
