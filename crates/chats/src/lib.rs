//! # BatchQuery Chats Crate
//!
//! Session state for asking one question across several images: the image
//! registry with its preview references, the conversation log and how batch
//! results are reconciled into it, the rolling diagnostic log, and plain-text
//! rendering.
//!
//! ## Architecture
//!
//! - **Entities**: Domain models (ImageEntry, ChatMessage, ...)
//! - **Services**: Registry, conversation, session lifecycle
//! - **Types**: Shared error types
//! - **Utils**: Media type inference, sanitisation, rendering
//!
//! ## Usage
//!
//! ```rust,no_run
//! use batchquery_chats::{ChatSession, PreviewStore};
//! use batchquery_config::AppConfig;
//! use batchquery_orchestrator::Orchestrator;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = AppConfig::default();
//! let orchestrator = Orchestrator::new(&config).bootstrap()?;
//! let mut session = ChatSession::new(&config.session, PreviewStore::new());
//! let summary = session.submit(&orchestrator).await;
//! # Ok(())
//! # }
//! ```

pub mod entities;
pub mod services;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use entities::{ChatMessage, ImageEntry, ImageFile, ImageSnapshot, MessageRole, MessageStatus};
pub use services::{
    AddOutcome, ChatSession, ConversationLog, DiagnosticLog, ImageRegistry, PendingBatch,
    PreviewLease, PreviewStore, ReconcileReport, SubmissionSummary, SIMULATED_FALLBACK_NOTICE,
};
pub use types::{ChatError, ChatResult};
pub use utils::render::{render_conversation, render_logs, render_registry};
