use std::time::Duration;

use anyhow::Result;
use batchquery_config::AppConfig;
use batchquery_runtime::{self, ClientServices};
use tokio::time::{sleep, timeout};

fn build_config(api_key: Option<&str>) -> AppConfig {
    let mut config = AppConfig::default();
    config.responder.openai.api_key = api_key.map(str::to_string);
    config.responder.simulated.min_latency_ms = 0;
    config.responder.simulated.max_latency_ms = 5;
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_bootstraps_orchestrator_with_credential() -> Result<()> {
    let config = build_config(Some("unit-test-key"));

    let services = ClientServices::initialise(&config).await?;

    assert!(services.orchestrator.has_credential());
    assert_eq!(
        Some(config.responder.openai.model.clone()),
        services.orchestrator.active_model()
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_without_credential_runs_simulated() -> Result<()> {
    let services = ClientServices::initialise(&build_config(None)).await?;

    assert!(!services.orchestrator.has_credential());
    assert!(services.orchestrator.active_model().is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_rejects_invalid_configuration() -> Result<()> {
    let mut config = build_config(None);
    config.responder.simulated.failure_rate = 2.0;

    let error = match ClientServices::initialise(&config).await {
        Ok(_) => panic!("expected validation to fail"),
        Err(error) => error,
    };
    assert!(
        error.to_string().contains("invalid configuration"),
        "expected validation context, got {error:?}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn sessions_share_the_preview_store() -> Result<()> {
    let services = ClientServices::initialise(&build_config(None)).await?;
    let mut first = services.new_session();
    let second = services.new_session();

    first.add_files(
        vec![batchquery_chats::ImageFile::new("a.png", "image/png", b"a".to_vec())],
        0,
    );

    assert_eq!(services.previews.live(), 1);
    assert_eq!(second.registry().previews().live(), 1);
    assert_eq!(first.prompt(), config_default_prompt());
    Ok(())
}

fn config_default_prompt() -> String {
    AppConfig::default().session.default_prompt
}

#[tokio::test(flavor = "multi_thread")]
async fn simulated_round_trip_through_services() -> Result<()> {
    let services = ClientServices::initialise(&build_config(None)).await?;
    let mut session = services.new_session();
    session.set_use_real_model(false);
    session.add_files(
        vec![batchquery_chats::ImageFile::new("a.png", "image/png", b"a".to_vec())],
        0,
    );

    let summary = session
        .submit(&services.orchestrator)
        .await
        .expect("submission runs");

    assert_eq!(summary.answered + summary.failed, 1);
    assert!(!session.is_busy());
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    batchquery_runtime::telemetry::init_tracing().expect("first initialisation should succeed");

    let second = batchquery_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { batchquery_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}
