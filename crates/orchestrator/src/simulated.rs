//! Offline stand-in for the vision model.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use batchquery_config::SimulatedResponderConfig;
use futures_util::future::join_all;
use rand::Rng;
use tracing::debug;

use crate::{
    types::{validate_batch, BatchImage, BatchResult},
    BatchResponder, OrchestratorError,
};

pub const SIMULATED_FAILURE_MESSAGE: &str = "Temporary model error. Please retry.";

pub const CANNED_FINDINGS: &[&str] = &[
    "No obvious defects; lighting is consistent and background looks clean.",
    "Minor glare detected near the top edge; consider diffusing the light source.",
    "Slight color cast compared to typical product imagery; white balance could be improved.",
    "Cropping could be tighter to center the subject; small empty space on the right.",
    "Possible smudge/fingerprint on the lower-right; recommend re-shoot or retouch.",
    "The item appears new; no visible wear or scratches.",
    "Composition is strong; diagonals lead the eye to the subject.",
    "Detected multiple similar items; ensure this aligns with listing guidelines.",
];

/// Source of time and randomness for the simulated responder.
#[async_trait]
pub trait SimulationEnvironment: Send + Sync {
    /// Uniform sample in `[0, 1)`.
    fn sample_unit(&self) -> f64;

    async fn sleep(&self, duration: Duration);
}

/// Production environment: tokio timers and the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSimulation;

#[async_trait]
impl SimulationEnvironment for TokioSimulation {
    fn sample_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SimulatedPlan {
    latency: Duration,
    outcome: BatchResult,
}

pub struct SimulatedResponder {
    config: SimulatedResponderConfig,
    environment: Arc<dyn SimulationEnvironment>,
}

impl SimulatedResponder {
    pub fn new(
        config: SimulatedResponderConfig,
        environment: Arc<dyn SimulationEnvironment>,
    ) -> Self {
        Self {
            config,
            environment,
        }
    }

    // Samples are drawn in a fixed order (latency, failure, finding) per
    // image before anything sleeps, so scripted environments stay
    // deterministic regardless of timer completion order.
    fn plan(&self, image: &BatchImage, prompt: &str) -> SimulatedPlan {
        let span = self
            .config
            .max_latency_ms
            .saturating_sub(self.config.min_latency_ms) as f64;
        let latency_ms =
            self.config.min_latency_ms as f64 + self.environment.sample_unit().clamp(0.0, 1.0) * span;
        let latency = Duration::from_millis(latency_ms as u64);

        let failed = self.environment.sample_unit() < self.config.failure_rate;
        let pick = pick_index(self.environment.sample_unit(), CANNED_FINDINGS.len());

        let outcome = if failed {
            BatchResult::failure(&image.id, SIMULATED_FAILURE_MESSAGE)
        } else {
            BatchResult::answer(
                &image.id,
                templated_answer(prompt, CANNED_FINDINGS[pick], &image.name),
            )
        };

        SimulatedPlan { latency, outcome }
    }
}

#[async_trait]
impl BatchResponder for SimulatedResponder {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn respond(
        &self,
        images: &[BatchImage],
        prompt: &str,
    ) -> Result<Vec<BatchResult>, OrchestratorError> {
        validate_batch(images, prompt)?;

        let plans: Vec<SimulatedPlan> = images.iter().map(|image| self.plan(image, prompt)).collect();

        let tasks = plans.into_iter().map(|plan| {
            let environment = Arc::clone(&self.environment);
            async move {
                debug!(
                    image_id = plan.outcome.image_id(),
                    latency_ms = plan.latency.as_millis() as u64,
                    "simulating model latency"
                );
                environment.sleep(plan.latency).await;
                plan.outcome
            }
        });

        Ok(join_all(tasks).await)
    }
}

pub fn templated_answer(prompt: &str, finding: &str, image_name: &str) -> String {
    format!("Q: {prompt}\nA: {finding} (based on \"{image_name}\")")
}

fn pick_index(sample: f64, len: usize) -> usize {
    ((sample.clamp(0.0, 1.0) * len as f64) as usize).min(len.saturating_sub(1))
}
