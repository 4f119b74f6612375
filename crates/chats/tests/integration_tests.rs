//! Integration tests for the chats crate.

use std::fs;

use batchquery_chats::{
    render_conversation, ChatSession, ImageFile, MessageRole, MessageStatus, PreviewStore,
    SIMULATED_FALLBACK_NOTICE,
};
use batchquery_config::{AppConfig, SessionConfig};
use batchquery_orchestrator::{
    simulated::SIMULATED_FAILURE_MESSAGE,
    test_support::{self, FixedResponder},
    BatchResult, OrchestratorError,
};
use tempfile::TempDir;

fn png(name: &str) -> ImageFile {
    ImageFile::new(name, "image/png", name.as_bytes().to_vec())
}

fn session() -> ChatSession {
    ChatSession::new(&SessionConfig::default(), PreviewStore::new())
}

fn session_with(names: &[&str], prompt: &str, use_real_model: bool) -> ChatSession {
    let mut session = session();
    session.add_files(names.iter().map(|name| png(name)).collect(), 0);
    session.set_prompt(prompt);
    session.set_use_real_model(use_real_model);
    session
}

fn assistant_messages(session: &ChatSession) -> Vec<&batchquery_chats::ChatMessage> {
    session
        .messages()
        .iter()
        .filter(|message| message.role == MessageRole::Assistant)
        .collect()
}

#[tokio::test]
async fn simulated_success_resolves_single_placeholder() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[true])
        .expect("bootstrap succeeds");
    let mut session = session_with(&["imgA.png"], "How many books?", false);
    let image_id = session.images()[0].id.clone();

    let summary = session.submit(&orchestrator).await.expect("submission runs");

    assert_eq!(summary.answered, 1);
    assert_eq!(session.messages().len(), 2);

    let user = &session.messages()[0];
    assert_eq!(user.role, MessageRole::User);
    assert_eq!(user.text, "How many books?");
    assert!(user.image_id.is_none());
    assert_eq!(user.images.as_ref().map(Vec::len), Some(1));

    let answer = &session.messages()[1];
    assert_eq!(answer.role, MessageRole::Assistant);
    assert_eq!(answer.image_id.as_deref(), Some(image_id.as_str()));
    assert_eq!(answer.status, Some(MessageStatus::Done));
    assert!(answer.text.contains("imgA.png"));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn simulated_failure_marks_placeholder_error() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[false])
        .expect("bootstrap succeeds");
    let mut session = session_with(&["imgA.png"], "How many books?", false);

    let summary = session.submit(&orchestrator).await.expect("submission runs");

    assert_eq!(summary.failed, 1);
    let answer = &session.messages()[1];
    assert_eq!(answer.status, Some(MessageStatus::Error));
    assert!(answer.text.is_empty());
    assert_eq!(answer.error.as_deref(), Some(SIMULATED_FAILURE_MESSAGE));
    assert!(session.banner().is_none());
}

#[tokio::test]
async fn mixed_outcomes_resolve_independently() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[true, false])
        .expect("bootstrap succeeds");
    let mut session = session_with(&["imgA.png", "imgB.png"], "How many books?", false);
    let ids: Vec<String> = session.images().iter().map(|image| image.id.clone()).collect();

    session.submit(&orchestrator).await.expect("submission runs");

    let answers = assistant_messages(&session);
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].image_id.as_deref(), Some(ids[0].as_str()));
    assert_eq!(answers[0].status, Some(MessageStatus::Done));
    assert!(answers[0].text.contains("imgA.png"));
    assert_eq!(answers[1].image_id.as_deref(), Some(ids[1].as_str()));
    assert_eq!(answers[1].status, Some(MessageStatus::Error));
    assert!(answers[1].text.is_empty());
}

#[tokio::test]
async fn real_mode_without_credential_falls_back_to_simulation() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[true])
        .expect("bootstrap succeeds");
    let mut session = session_with(&["imgA.png"], "How many books?", true);

    let summary = session.submit(&orchestrator).await.expect("submission runs");

    assert_eq!(summary.answered + summary.failed, 1);
    assert_eq!(summary.unmatched, 0);
    let answer = &session.messages()[1];
    assert!(matches!(
        answer.status,
        Some(MessageStatus::Done) | Some(MessageStatus::Error)
    ));
    assert!(session
        .logs()
        .entries()
        .any(|line| line.starts_with("Batch x1 | Model: OpenAI | Prompt: \"How many books?\"")));

    let notice = &session.messages()[2];
    assert_eq!(notice.role, MessageRole::System);
    assert_eq!(notice.text, SIMULATED_FALLBACK_NOTICE);
}

#[tokio::test]
async fn simulated_fallback_notice_is_posted_once() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[true])
        .expect("bootstrap succeeds");
    let mut session = session_with(&["imgA.png"], "How many books?", true);

    session.submit(&orchestrator).await.expect("first submission runs");
    session.submit(&orchestrator).await.expect("second submission runs");

    let notices = session
        .messages()
        .iter()
        .filter(|message| message.role == MessageRole::System)
        .count();
    assert_eq!(notices, 1);
}

#[tokio::test]
async fn mock_mode_posts_no_fallback_notice() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[true])
        .expect("bootstrap succeeds");
    let mut session = session_with(&["imgA.png"], "How many books?", false);

    session.submit(&orchestrator).await.expect("submission runs");

    assert!(session
        .messages()
        .iter()
        .all(|message| message.role != MessageRole::System));
}

#[tokio::test]
async fn submit_is_a_noop_without_images() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[true])
        .expect("bootstrap succeeds");
    let mut session = session();
    session.set_prompt("How many books?");

    assert!(!session.can_send());
    assert!(session.submit(&orchestrator).await.is_none());
    assert!(session.messages().is_empty());
    assert!(session.logs().is_empty());
}

#[tokio::test]
async fn submit_is_a_noop_with_blank_prompt() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[true])
        .expect("bootstrap succeeds");
    let mut session = session_with(&["imgA.png"], "   \t ", false);

    assert!(!session.can_send());
    assert!(session.submit(&orchestrator).await.is_none());
    assert!(session.messages().is_empty());
}

#[test]
fn submit_is_a_noop_while_a_batch_is_in_flight() {
    let mut session = session_with(&["imgA.png"], "How many books?", false);

    let pending = session.begin_submission().expect("first submission starts");
    assert!(session.is_busy());
    assert!(!session.can_send());
    assert!(session.begin_submission().is_none());
    assert_eq!(session.messages().len(), 2);

    let image_id = pending.images[0].id.clone();
    session.complete_submission(pending, Ok(vec![BatchResult::answer(image_id, "done")]));
    assert!(!session.is_busy());
    assert!(session.can_send());
}

#[test]
fn prompt_is_trimmed_before_sending() {
    let mut session = session_with(&["imgA.png"], "  How many books?  ", false);
    let pending = session.begin_submission().expect("submission starts");

    assert_eq!(pending.prompt, "How many books?");
    assert_eq!(session.messages()[0].text, "How many books?");
}

#[tokio::test]
async fn batch_error_sets_banner_and_clears_busy() {
    let mut session = session_with(&["imgA.png"], "How many books?", false);
    let responder = FixedResponder::failing(OrchestratorError::EmptyPrompt);

    let summary = session.submit_with(&responder).await.expect("submission runs");

    assert_eq!(summary.batch_error.as_deref(), Some("prompt cannot be empty"));
    assert_eq!(session.banner(), Some("prompt cannot be empty"));
    assert!(!session.is_busy());
    assert_eq!(session.messages()[1].status, Some(MessageStatus::Error));
    assert_eq!(
        session.messages()[1].error.as_deref(),
        Some("prompt cannot be empty")
    );
    assert!(session
        .logs()
        .entries()
        .any(|line| line == "Error: prompt cannot be empty"));
}

#[tokio::test]
async fn defective_batch_closes_unmatched_placeholders() {
    let mut session = session_with(&["imgA.png", "imgB.png"], "q", false);
    let first = session.images()[0].id.clone();
    let responder = FixedResponder::returning(vec![
        BatchResult::answer(first.clone(), "only one"),
        BatchResult::answer("stranger", "not ours"),
    ]);

    let summary = session.submit_with(&responder).await.expect("submission runs");

    assert_eq!(summary.answered, 1);
    assert_eq!(summary.unmatched, 1);
    let answers = assistant_messages(&session);
    assert_eq!(answers[0].status, Some(MessageStatus::Done));
    assert_eq!(answers[1].status, Some(MessageStatus::Error));
    assert!(answers.iter().all(|message| !message.is_loading()));
    assert!(session
        .banner()
        .map(|banner| banner.contains("incomplete batch"))
        .unwrap_or(false));
}

#[tokio::test]
async fn removed_image_stays_displayable_in_history() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[true])
        .expect("bootstrap succeeds");
    let mut session = session_with(&["imgA.png"], "How many books?", false);
    session.submit(&orchestrator).await.expect("submission runs");

    let before = render_conversation(session.messages());
    session.remove_image("1").expect("image removed");

    assert!(session.images().is_empty());
    assert_eq!(session.registry().previews().live(), 0);
    assert_eq!(render_conversation(session.messages()), before);
    assert!(before.contains("#1 imgA.png"));
}

#[test]
fn add_files_sets_banner_for_validation_errors() {
    let mut session = session_with(&["1.png", "2.png", "3.png", "4.png"], "q", false);

    let outcome = session.add_files(vec![png("5.png")], 0);

    assert!(outcome.added.is_empty());
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(session.banner(), Some("You can upload up to 4 images."));
    assert_eq!(session.images().len(), 4);

    session.dismiss_banner();
    assert!(session.banner().is_none());
}

#[tokio::test]
async fn new_submission_clears_previous_banner() {
    let orchestrator = test_support::scripted_orchestrator(&AppConfig::default(), &[true])
        .expect("bootstrap succeeds");
    let mut session = session_with(&["imgA.png"], "q", false);
    session.add_files(vec![ImageFile::new("notes.txt", "text/plain", b"x".to_vec())], 0);
    assert!(session.banner().is_some());

    session.submit(&orchestrator).await.expect("submission runs");
    assert!(session.banner().is_none());
}

#[tokio::test]
async fn image_files_are_read_from_disk() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("Shelf.JPG");
    fs::write(&path, b"\xff\xd8\xff").expect("write image");

    let file = ImageFile::read(&path).await.expect("file reads");
    assert_eq!(file.name, "Shelf.JPG");
    assert_eq!(file.media_type, "image/jpeg");
    assert!(file.is_image());

    let missing = ImageFile::read(&temp.path().join("missing.png")).await;
    assert!(missing.is_err());
}
