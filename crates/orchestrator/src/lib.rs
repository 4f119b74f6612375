use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use batchquery_config::{AppConfig, ResponderConfig};

pub mod coverage;
pub mod openai;
pub mod simulated;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod types;

pub use coverage::{verify_coverage, CoverageReport};
pub use openai::{OpenAiResponder, VisionClient, VisionError};
pub use simulated::{SimulatedResponder, SimulationEnvironment, TokioSimulation};
pub use types::{BatchImage, BatchResult, ResponderMode};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("responder index not initialised")]
    ResponderIndexMissing,
    #[error("prompt cannot be empty")]
    EmptyPrompt,
    #[error("image {0} was submitted twice in one batch")]
    DuplicateImageId(String),
    #[error("failed to initialise vision client: {0}")]
    ClientInit(#[from] reqwest::Error),
}

/// Produces one result per submitted image. Per-image failures are data
/// (`BatchResult::Failure`); `Err` is reserved for contract violations.
#[async_trait]
pub trait BatchResponder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn respond(
        &self,
        images: &[BatchImage],
        prompt: &str,
    ) -> Result<Vec<BatchResult>, OrchestratorError>;
}

struct ResponderIndex {
    simulated: Arc<SimulatedResponder>,
    openai: Arc<OpenAiResponder>,
}

pub struct Orchestrator {
    config: ResponderConfig,
    simulation: Arc<dyn SimulationEnvironment>,
    responders: Option<ResponderIndex>,
}

impl Orchestrator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.responder.clone(),
            simulation: Arc::new(TokioSimulation),
            responders: None,
        }
    }

    /// Replaces the timer/RNG source used by the simulated responder.
    pub fn with_simulation(mut self, simulation: Arc<dyn SimulationEnvironment>) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn bootstrap(mut self) -> Result<Self, OrchestratorError> {
        let simulated = Arc::new(SimulatedResponder::new(
            self.config.simulated.clone(),
            Arc::clone(&self.simulation),
        ));

        let client = VisionClient::from_config(&self.config.openai)?.map(Arc::new);
        match &client {
            Some(client) => info!(model = %client.model(), "vision client initialised"),
            None => info!("no OpenAI credential configured, real mode falls back to simulation"),
        }

        let openai = Arc::new(OpenAiResponder::new(client, Arc::clone(&simulated)));
        self.responders = Some(ResponderIndex { simulated, openai });
        Ok(self)
    }

    pub fn active_model(&self) -> Option<String> {
        let responders = self.responders.as_ref()?;
        if responders.openai.has_client() {
            Some(self.config.openai.model.clone())
        } else {
            None
        }
    }

    pub fn has_credential(&self) -> bool {
        self.responders
            .as_ref()
            .map(|responders| responders.openai.has_client())
            .unwrap_or(false)
    }

    pub fn responder(
        &self,
        mode: ResponderMode,
    ) -> Result<Arc<dyn BatchResponder>, OrchestratorError> {
        let responders = self
            .responders
            .as_ref()
            .ok_or(OrchestratorError::ResponderIndexMissing)?;

        debug!(mode = mode.label(), "resolving batch responder");
        let responder: Arc<dyn BatchResponder> = match mode {
            ResponderMode::Real => responders.openai.clone(),
            ResponderMode::Simulated => responders.simulated.clone(),
        };
        Ok(responder)
    }
}
