use std::sync::Arc;

use anyhow::{Context, Result};
use batchquery_chats::{ChatSession, PreviewStore};
use batchquery_config::AppConfig;
use batchquery_orchestrator::Orchestrator;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Installs the global subscriber. Output goes to stderr so the console
    /// transcript on stdout stays readable.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::DEBUG)
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct ClientServices {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub previews: PreviewStore,
}

impl ClientServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let orchestrator = Arc::new(
            Orchestrator::new(config)
                .bootstrap()
                .context("failed to bootstrap orchestrator")?,
        );

        match orchestrator.active_model() {
            Some(model) => info!(%model, "orchestrator ready"),
            None => info!("orchestrator ready in simulated mode"),
        }

        Ok(Self {
            config: config.clone(),
            orchestrator,
            previews: PreviewStore::new(),
        })
    }

    /// A fresh session sharing this process's preview store.
    pub fn new_session(&self) -> ChatSession {
        ChatSession::new(&self.config.session, self.previews.clone())
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
