//! Deterministic doubles for exercising responders without timers or network.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use batchquery_config::{AppConfig, SimulatedResponderConfig};

use crate::{
    simulated::{SimulatedResponder, SimulationEnvironment},
    types::{BatchImage, BatchResult},
    BatchResponder, Orchestrator, OrchestratorError,
};

/// Replays a fixed list of unit samples (cycling when exhausted) and records
/// requested sleeps instead of waiting.
#[derive(Debug, Default)]
pub struct ScriptedSimulation {
    samples: Mutex<VecDeque<f64>>,
    script: Vec<f64>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ScriptedSimulation {
    pub fn new(samples: Vec<f64>) -> Self {
        Self {
            samples: Mutex::new(samples.iter().copied().collect()),
            script: samples,
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Script one success (`true`) or failure (`false`) per image, in order.
    /// Failures rely on a non-zero failure rate.
    pub fn with_outcomes(outcomes: &[bool]) -> Self {
        let samples = outcomes
            .iter()
            .flat_map(|ok| [0.5, if *ok { 0.999 } else { 0.0 }, 0.0])
            .collect();
        Self::new(samples)
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SimulationEnvironment for ScriptedSimulation {
    fn sample_unit(&self) -> f64 {
        let mut samples = self
            .samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if samples.is_empty() {
            samples.extend(self.script.iter().copied());
        }
        samples.pop_front().unwrap_or(0.5)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
        tokio::task::yield_now().await;
    }
}

/// Simulated responder with the default latency window and failure rate
/// driven by `outcomes`.
pub fn scripted_responder(outcomes: &[bool]) -> SimulatedResponder {
    SimulatedResponder::new(
        SimulatedResponderConfig::default(),
        Arc::new(ScriptedSimulation::with_outcomes(outcomes)),
    )
}

/// Orchestrator bootstrapped with a scripted simulation environment.
pub fn scripted_orchestrator(
    config: &AppConfig,
    outcomes: &[bool],
) -> Result<Orchestrator, OrchestratorError> {
    Orchestrator::new(config)
        .with_simulation(Arc::new(ScriptedSimulation::with_outcomes(outcomes)))
        .bootstrap()
}

/// Responder that returns a canned result list, for exercising callers
/// against defective or failing responders.
pub struct FixedResponder {
    outcome: Mutex<Option<Result<Vec<BatchResult>, OrchestratorError>>>,
}

impl FixedResponder {
    pub fn returning(results: Vec<BatchResult>) -> Self {
        Self {
            outcome: Mutex::new(Some(Ok(results))),
        }
    }

    pub fn failing(error: OrchestratorError) -> Self {
        Self {
            outcome: Mutex::new(Some(Err(error))),
        }
    }
}

#[async_trait]
impl BatchResponder for FixedResponder {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn respond(
        &self,
        _images: &[BatchImage],
        _prompt: &str,
    ) -> Result<Vec<BatchResult>, OrchestratorError> {
        self.outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .unwrap_or(Ok(Vec::new()))
    }
}
