//! The chat session: registry, conversation, toggle and submit lifecycle.

use batchquery_config::SessionConfig;
use batchquery_orchestrator::{
    verify_coverage, BatchImage, BatchResponder, BatchResult, Orchestrator, OrchestratorError,
    ResponderMode,
};
use tracing::{debug, error, info, warn};

use crate::entities::{ChatMessage, ImageEntry, ImageFile};
use crate::services::conversation::{ConversationLog, UNMATCHED_PLACEHOLDER_MESSAGE};
use crate::services::diagnostic_log::DiagnosticLog;
use crate::services::image_registry::{AddOutcome, ImageRegistry};
use crate::services::preview_store::PreviewStore;
use crate::types::ChatResult;

const FALLBACK_BATCH_ERROR: &str = "Unexpected error while querying the model.";

pub const SIMULATED_FALLBACK_NOTICE: &str =
    "No OpenAI credential is configured, so answers come from the simulated responder.";

/// A submission that has been recorded in the conversation but whose batch
/// has not settled yet.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub images: Vec<BatchImage>,
    pub prompt: String,
    pub mode: ResponderMode,
    pub placeholder_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub answered: usize,
    pub failed: usize,
    /// Placeholders closed because the batch returned nothing for them.
    pub unmatched: usize,
    pub batch_error: Option<String>,
}

#[derive(Debug)]
pub struct ChatSession {
    registry: ImageRegistry,
    conversation: ConversationLog,
    logs: DiagnosticLog,
    prompt: String,
    use_real_model: bool,
    busy: bool,
    banner: Option<String>,
    fallback_noticed: bool,
}

impl ChatSession {
    pub fn new(config: &SessionConfig, previews: PreviewStore) -> Self {
        Self {
            registry: ImageRegistry::new(config.max_images, previews),
            conversation: ConversationLog::new(),
            logs: DiagnosticLog::new(config.log_capacity),
            prompt: config.default_prompt.clone(),
            use_real_model: config.use_real_model,
            busy: false,
            banner: None,
            fallback_noticed: false,
        }
    }

    pub fn images(&self) -> &[ImageEntry] {
        self.registry.entries()
    }

    pub fn registry(&self) -> &ImageRegistry {
        &self.registry
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn logs(&self) -> &DiagnosticLog {
        &self.logs
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn use_real_model(&self) -> bool {
        self.use_real_model
    }

    pub fn mode(&self) -> ResponderMode {
        ResponderMode::from_toggle(self.use_real_model)
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn set_use_real_model(&mut self, enabled: bool) {
        self.use_real_model = enabled;
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    pub fn add_files(&mut self, accepted: Vec<ImageFile>, rejected: usize) -> AddOutcome {
        let outcome = self.registry.add_files(accepted, rejected);
        if let Some(message) = outcome.banner() {
            self.banner = Some(message.to_string());
        }
        outcome
    }

    pub fn remove_image(&mut self, selector: &str) -> ChatResult<String> {
        let id = self.registry.resolve_id(selector)?;
        self.registry.remove(&id);
        Ok(id)
    }

    pub fn set_images(&mut self, images: Vec<ImageEntry>) -> ChatResult<()> {
        self.registry.set_images(images)
    }

    pub fn can_send(&self) -> bool {
        !self.registry.is_empty() && !self.prompt.trim().is_empty() && !self.busy
    }

    /// Record the question and one placeholder per image, and mark the
    /// session busy. Returns `None` (and changes nothing) when sending is not
    /// allowed.
    pub fn begin_submission(&mut self) -> Option<PendingBatch> {
        if !self.can_send() {
            return None;
        }

        self.banner = None;
        self.busy = true;

        let prompt = self.prompt.trim().to_string();
        let snapshots = self.registry.entries().iter().map(ImageEntry::snapshot).collect();
        self.conversation.push_user(prompt.clone(), snapshots);

        let placeholder_ids = self
            .conversation
            .push_placeholders(self.registry.entries().iter().map(|entry| entry.id.as_str()));
        let images: Vec<BatchImage> = self.registry.entries().iter().map(ImageEntry::batch_image).collect();
        let mode = self.mode();

        self.logs.record(format!(
            "Batch x{} | Model: {} | Prompt: \"{}\"",
            images.len(),
            mode.label(),
            prompt
        ));

        Some(PendingBatch {
            images,
            prompt,
            mode,
            placeholder_ids,
        })
    }

    /// Apply a settled batch. Always clears the busy flag.
    pub fn complete_submission(
        &mut self,
        pending: PendingBatch,
        outcome: Result<Vec<BatchResult>, OrchestratorError>,
    ) -> SubmissionSummary {
        let summary = match outcome {
            Ok(results) => self.reconcile(&pending, &results),
            Err(batch_error) => {
                let message = Some(batch_error.to_string())
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_BATCH_ERROR.to_string());
                error!(error = %message, "batch failed");
                self.logs.record(format!("Error: {message}"));
                self.banner = Some(message.clone());

                let unmatched = self.conversation.fail_pending(&pending.placeholder_ids, &message);
                SubmissionSummary {
                    unmatched,
                    batch_error: Some(message),
                    ..SubmissionSummary::default()
                }
            }
        };

        self.busy = false;
        summary
    }

    /// Tells the user once per session that real mode is being served by
    /// the simulated responder.
    fn notice_simulated_fallback(&mut self) {
        if self.fallback_noticed {
            return;
        }
        self.fallback_noticed = true;
        self.conversation.push(ChatMessage::system(SIMULATED_FALLBACK_NOTICE));
    }

    fn reconcile(&mut self, pending: &PendingBatch, results: &[BatchResult]) -> SubmissionSummary {
        let coverage = verify_coverage(&pending.images, results);
        if !coverage.is_complete() {
            let detail = coverage.describe();
            warn!(%detail, "responder returned an incomplete batch");
            self.logs.record(format!("Warning: incomplete batch ({detail})"));
            self.banner = Some(format!("The model returned an incomplete batch: {detail}."));
        }

        let report = self.conversation.apply_results(&pending.placeholder_ids, results);
        let unmatched = if report.unmatched.is_empty() {
            0
        } else {
            self.conversation
                .fail_pending(&report.unmatched, UNMATCHED_PLACEHOLDER_MESSAGE)
        };

        info!(
            answered = report.answered,
            failed = report.failed,
            unmatched,
            "batch reconciled"
        );
        self.logs.record("Batch completed.");

        SubmissionSummary {
            answered: report.answered,
            failed: report.failed,
            unmatched,
            batch_error: None,
        }
    }

    /// Submit the current prompt and images to `responder` and wait for the
    /// whole batch. `None` when sending is not allowed.
    pub async fn submit_with(&mut self, responder: &dyn BatchResponder) -> Option<SubmissionSummary> {
        let pending = self.begin_submission()?;
        debug!(responder = responder.name(), images = pending.images.len(), "dispatching batch");
        let outcome = responder.respond(&pending.images, &pending.prompt).await;
        Some(self.complete_submission(pending, outcome))
    }

    /// Submit using the responder the toggle selects.
    pub async fn submit(&mut self, orchestrator: &Orchestrator) -> Option<SubmissionSummary> {
        let pending = self.begin_submission()?;
        if pending.mode == ResponderMode::Real && !orchestrator.has_credential() {
            self.notice_simulated_fallback();
        }
        let outcome = match orchestrator.responder(pending.mode) {
            Ok(responder) => {
                debug!(responder = responder.name(), images = pending.images.len(), "dispatching batch");
                responder.respond(&pending.images, &pending.prompt).await
            }
            Err(error) => Err(error),
        };
        Some(self.complete_submission(pending, outcome))
    }
}
