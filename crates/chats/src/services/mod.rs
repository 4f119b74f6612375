//! Session services.

pub mod conversation;
pub mod diagnostic_log;
pub mod image_registry;
pub mod preview_store;
pub mod session;

pub use conversation::{ConversationLog, ReconcileReport};
pub use diagnostic_log::DiagnosticLog;
pub use image_registry::{AddOutcome, ImageRegistry};
pub use preview_store::{PreviewLease, PreviewStore};
pub use session::{ChatSession, PendingBatch, SubmissionSummary, SIMULATED_FALLBACK_NOTICE};
