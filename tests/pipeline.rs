//! End-to-end pipeline tests over the stub driver
//!
//! Drives the full controller loop: compile -> execute -> validate ->
//! retry/advance -> persist, with deterministic timing under tokio's
//! paused clock where backoff matters.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use navigation_engine::{StubDriverFactory, StubPage};
use spectra_cli::config::SpectraConfig;
use spectra_cli::controller::SpectraCore;
use spectra_core_types::AttemptOutcome;

fn default_core() -> SpectraCore {
    SpectraCore::new(SpectraConfig::default()).expect("pipeline init")
}

#[tokio::test]
async fn scenario_navigate_and_screenshot_succeeds() {
    let core = default_core();
    let result = core
        .execute_intent(
            "Navigate to https://example.com and take a screenshot",
            None,
            CancellationToken::new(),
        )
        .await;

    assert!(result.success, "error: {:?}", result.error_message);
    assert_eq!(result.actions_performed, 2);
    assert_eq!(result.retry_count, 0);
    assert!(result.error_message.is_none());
    assert_eq!(result.final_state["phase"], "completed");
}

#[tokio::test(start_paused = true)]
async fn scenario_missing_selector_retries_then_fails() {
    let core = default_core();
    let result = core
        .execute_intent(
            "go to https://example.com then click \"#signup\"",
            None,
            CancellationToken::new(),
        )
        .await;

    assert!(!result.success);
    // One action (the navigate) landed before the click gave up.
    assert_eq!(result.actions_performed, 1);
    assert_eq!(result.retry_count, 3);
    let error = result.error_message.expect("terminal error");
    assert!(error.contains("#signup"), "reason must cite the selector: {}", error);
}

#[tokio::test(start_paused = true)]
async fn backoff_schedule_spends_at_least_seven_seconds() {
    // A retry-safe extract against a selector that never appears: three
    // backoffs of 1 + 2 + 4 seconds before the terminal failure.
    let core = default_core();
    let result = core
        .execute_intent(
            "go to https://example.com then extract \"#prices\"",
            None,
            CancellationToken::new(),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.retry_count, 3);
    assert!(
        result.execution_time >= 7.0,
        "expected >= 7s of backoff, got {}",
        result.execution_time
    );
    assert!(result.execution_time <= 60.0);
}

#[tokio::test]
async fn session_expired_aborts_without_retry() {
    let config = SpectraConfig {
        session_timeout: 0,
        ..Default::default()
    };
    let core = SpectraCore::new(config).expect("pipeline init");
    let session = core.sessions().create_session().await.expect("session");

    let result = core
        .execute_intent(
            "go to https://example.com",
            Some(session.id.clone()),
            CancellationToken::new(),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.actions_performed, 0);
    assert_eq!(result.retry_count, 0, "fatal errors are never retried");
    let error = result.error_message.expect("terminal error");
    assert!(error.contains("session expired"), "got: {}", error);
}

#[tokio::test]
async fn repeated_navigation_is_idempotent() {
    let core = default_core();
    let result = core
        .execute_intent(
            "go to https://example.com then go to https://example.com",
            None,
            CancellationToken::new(),
        )
        .await;

    assert!(result.success, "error: {:?}", result.error_message);
    assert_eq!(result.actions_performed, 2);
    assert!(result
        .attempts
        .iter()
        .all(|a| a.outcome == AttemptOutcome::Success));
}

#[tokio::test]
async fn scripted_click_navigates_and_validates() {
    let factory = StubDriverFactory::default().with_page(
        "https://example.com",
        StubPage::new("Example Domain").with_link("#next", "https://example.com/next"),
    );
    let core =
        SpectraCore::with_driver_factory(SpectraConfig::default(), Arc::new(factory)).unwrap();

    let result = core
        .execute_intent(
            "go to https://example.com then click \"#next\"",
            None,
            CancellationToken::new(),
        )
        .await;

    assert!(result.success, "error: {:?}", result.error_message);
    assert_eq!(result.actions_performed, 2);
    assert_eq!(result.final_state["url"], "https://example.com/next");
}

#[tokio::test]
async fn terminal_run_appends_exactly_one_workflow() {
    let core = default_core();
    let session = core.sessions().create_session().await.expect("session");

    let result = core
        .execute_intent(
            "Navigate to https://example.com and take a screenshot",
            Some(session.id.clone()),
            CancellationToken::new(),
        )
        .await;
    assert!(result.success);

    let loaded = core.sessions().get_session(&session.id).await.unwrap();
    assert_eq!(loaded.workflows.len(), 1);
    let workflow = &loaded.workflows[0];
    assert_eq!(workflow.steps.len(), 2);
    assert_eq!(workflow.completed_steps(), 2);
}

#[tokio::test]
async fn unresolvable_intent_fails_with_compile_error() {
    let core = default_core();
    let result = core
        .execute_intent("ponder the meaning of life", None, CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.actions_performed, 0);
    let error = result.error_message.expect("terminal error");
    assert!(error.contains("intent unresolved"), "got: {}", error);
}

#[tokio::test]
async fn pre_cancelled_execution_aborts_at_first_checkpoint() {
    let core = default_core();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = core
        .execute_intent("go to https://example.com", None, cancel)
        .await;

    assert!(!result.success);
    assert_eq!(result.actions_performed, 0);
    let error = result.error_message.expect("terminal error");
    assert!(error.contains("cancelled"), "got: {}", error);
}

#[tokio::test]
async fn concurrent_intents_respect_the_worker_pool_bound() {
    let config = SpectraConfig {
        max_concurrent_sessions: 1,
        ..Default::default()
    };
    let core = Arc::new(SpectraCore::new(config).unwrap());

    let a = {
        let core = Arc::clone(&core);
        tokio::spawn(async move {
            core.execute_intent(
                "go to https://example.com",
                None,
                CancellationToken::new(),
            )
            .await
        })
    };
    let b = {
        let core = Arc::clone(&core);
        tokio::spawn(async move {
            core.execute_intent(
                "go to https://example.org",
                None,
                CancellationToken::new(),
            )
            .await
        })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a.success, "error: {:?}", a.error_message);
    assert!(b.success, "error: {:?}", b.error_message);
}

#[tokio::test]
async fn perception_summary_rides_in_the_final_state() {
    let core = default_core();
    let result = core
        .execute_intent(
            "go to https://example.com",
            None,
            CancellationToken::new(),
        )
        .await;

    assert!(result.success);
    // The stub driver's frames are not decodable images, so the summary
    // reflects the degraded (empty) analysis rather than being absent.
    assert!(result.final_state["perception"].is_object());
    assert_eq!(result.final_state["perception"]["is_captcha"], false);
}
