use std::sync::Arc;

use anyhow::{Context, Result};
use nooverfit_config::AppConfig;
use nooverfit_database::{DatabaseConnection, SqliteSessionStore};
use nooverfit_inference::{BackendGateway, GeminiGateway, InferenceError, InferenceGateway};
use nooverfit_pipeline::ConversationOrchestrator;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the HTTP service needs.
#[derive(Clone)]
pub struct BackendServices {
    pub config: Arc<AppConfig>,
    pub gateway: Option<Arc<dyn InferenceGateway>>,
}

impl BackendServices {
    /// A missing upstream credential is not fatal: the server starts and
    /// answers chat requests with a configuration error.
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let gateway: Option<Arc<dyn InferenceGateway>> =
            match GeminiGateway::from_config(&config.inference) {
                Ok(gateway) => Some(Arc::new(gateway)),
                Err(InferenceError::MissingCredential) => {
                    warn!("no Gemini API key configured; chat requests will fail");
                    None
                }
                Err(error) => {
                    return Err(error).context("failed to initialise inference gateway");
                }
            };

        info!(
            default_model = %config.inference.default_model,
            models = config.inference.models.len(),
            upstream = gateway.is_some(),
            "backend services ready"
        );

        Ok(Self {
            config: Arc::new(config.clone()),
            gateway,
        })
    }
}

/// Everything an interactive front-end needs: an orchestrator talking to the
/// HTTP service, with its session persisted to SQLite.
pub struct ClientServices {
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub database: DatabaseConnection,
}

impl ClientServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let gateway = BackendGateway::from_config(&config.client)
            .context("failed to build backend client")?;
        let backend_url = gateway.base_url().to_string();

        let database = DatabaseConnection::from_config(&config.database)
            .await
            .context("failed to open session database")?;
        let session = Arc::new(SqliteSessionStore::new(database.pool().clone()));

        let orchestrator =
            ConversationOrchestrator::new(config, Arc::new(gateway)).with_session_store(session);
        orchestrator.restore().await;

        info!(backend = %backend_url, "client services ready");
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            database,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
