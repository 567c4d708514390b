//! Core Controller - the orchestration state machine
//!
//! Sequences one intent execution:
//! `Compiling -> Executing(i) -> Validating(i) -> {Retrying(i), Advancing,
//! Aborting} -> Completed | Failed`.
//!
//! Steps run strictly sequentially; retries follow exponential backoff and
//! respect retry-safety; fatal session/storage errors abort immediately.
//! Every terminal state produces exactly one `ExecutionResult` and at most
//! one workflow append (none when the session itself is unreachable).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use action_validator::{ActionValidator, ValidatorConfig};
use intent_compiler::{CompileContext, IntentCompiler};
use media_perception::{MediaPerceptionEngine, MediaType, PerceptionConfig};
use navigation_engine::{
    DriverFactory, DriverPool, NavError, ObservedState, StepExecutor, StubDriverFactory,
};
use session_manager::{
    FileStore, MemoryStore, SessionManager, SessionManagerConfig, SessionStore, Workflow,
    WorkflowStep,
};
use spectra_core_types::{
    ActionStep, ActionType, AttemptId, AttemptOutcome, ExecutionAttempt, SessionId, SpectraError,
};

use crate::config::SpectraConfig;
use crate::health::HealthRegistry;
use crate::metrics;

/// Phases of one intent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Compiling,
    Executing(usize),
    Validating(usize),
    Retrying(usize),
    Advancing,
    Aborting,
    Completed,
    Failed,
}

impl ExecutionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionPhase::Completed | ExecutionPhase::Failed)
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPhase::Compiling => write!(f, "compiling"),
            ExecutionPhase::Executing(i) => write!(f, "executing:{}", i),
            ExecutionPhase::Validating(i) => write!(f, "validating:{}", i),
            ExecutionPhase::Retrying(i) => write!(f, "retrying:{}", i),
            ExecutionPhase::Advancing => write!(f, "advancing"),
            ExecutionPhase::Aborting => write!(f, "aborting"),
            ExecutionPhase::Completed => write!(f, "completed"),
            ExecutionPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal artifact of one intent execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub actions_performed: usize,

    /// Wall time of the run, in seconds
    pub execution_time: f64,

    pub error_message: Option<String>,

    /// Terminal phase, session, page, and component health snapshot
    pub final_state: serde_json::Value,

    pub retry_count: u32,
    pub attempts: Vec<ExecutionAttempt>,
}

/// Outcome bookkeeping carried out of the run loop.
struct RunOutcome {
    phase: ExecutionPhase,
    error: Option<SpectraError>,
    actions_performed: usize,
    retry_count: u32,
    attempts: Vec<ExecutionAttempt>,
    workflow: Option<(SessionId, Workflow)>,
    last_url: Option<String>,
    last_screenshot: Option<Vec<u8>>,
}

pub struct SpectraCore {
    config: SpectraConfig,
    compiler: IntentCompiler,
    pool: DriverPool,
    validator: ActionValidator,
    perception: Arc<MediaPerceptionEngine>,
    sessions: Arc<SessionManager>,
    health: HealthRegistry,
    slots: Arc<Semaphore>,
}

impl SpectraCore {
    /// Build the pipeline against the built-in stub driver.
    pub fn new(config: SpectraConfig) -> anyhow::Result<Self> {
        Self::with_driver_factory(config, Arc::new(StubDriverFactory::default()))
    }

    pub fn with_driver_factory(
        config: SpectraConfig,
        factory: Arc<dyn DriverFactory>,
    ) -> anyhow::Result<Self> {
        let store: Arc<dyn SessionStore> = match &config.storage_dir {
            Some(dir) => Arc::new(FileStore::new(dir.clone())),
            None => Arc::new(MemoryStore::default()),
        };
        let sessions = Arc::new(SessionManager::new(
            store,
            SessionManagerConfig {
                session_timeout: Duration::from_secs(config.session_timeout),
                cleanup_interval: Duration::from_secs(config.cleanup_interval),
                ..Default::default()
            },
        )?);

        let perception = Arc::new(MediaPerceptionEngine::new(PerceptionConfig {
            cache_capacity: config.cache_max_size,
        }));

        let validator = ActionValidator::new(ValidatorConfig {
            screenshot_comparison_threshold: config.screenshot_comparison_threshold,
            ..Default::default()
        });

        let pool = DriverPool::new(factory, config.max_concurrent_sessions);
        let slots = Arc::new(Semaphore::new(config.max_concurrent_sessions.max(1)));

        metrics::register_metrics();

        Ok(Self {
            config,
            compiler: IntentCompiler::new(),
            pool,
            validator,
            perception,
            sessions,
            health: HealthRegistry::new(),
            slots,
        })
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        Arc::clone(&self.sessions)
    }

    pub fn perception(&self) -> Arc<MediaPerceptionEngine> {
        Arc::clone(&self.perception)
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Launch the session expiry sweeper and the metrics endpoint.
    pub fn start_background_tasks(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self.sessions.spawn_sweeper()];
        if let Some(handle) = metrics::spawn_metrics_server(self.config.metrics_port) {
            handles.push(handle);
        }
        handles
    }

    /// Execute one intent to a terminal state.
    ///
    /// Concurrency is bounded by the worker-pool semaphore; within the run,
    /// steps are strictly sequential because browser state is not
    /// reorderable.
    pub async fn execute_intent(
        &self,
        text: &str,
        session_id: Option<SessionId>,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let started = Instant::now();
        let _slot = self
            .slots
            .acquire()
            .await
            .expect("intent slot semaphore closed");

        let outcome = self.run(text, session_id, &cancel).await;

        // Exactly one workflow append per terminal run; skipped only when
        // the session itself was unreachable.
        if let Some((session_id, workflow)) = &outcome.workflow {
            if let Err(err) = self.sessions.append_workflow(session_id, workflow.clone()).await {
                warn!(session_id = %session_id, error = %err, "workflow append failed");
                self.health.mark_failed("session_manager", err.to_string());
            }
        }

        let perception_summary = self.analyze_final_frame(&outcome).await;
        metrics::PERCEPTION_CACHE_HITS.set(self.perception.cache_hits() as i64);

        let success = outcome.phase == ExecutionPhase::Completed;
        let outcome_label = if success { "completed" } else { "failed" };
        metrics::INTENTS_TOTAL
            .with_label_values(&[outcome_label])
            .inc();

        let execution_time = started.elapsed().as_secs_f64();
        info!(
            success,
            execution_time,
            retries = outcome.retry_count,
            actions = outcome.actions_performed,
            phase = %outcome.phase,
            "intent execution finished"
        );

        ExecutionResult {
            success,
            actions_performed: outcome.actions_performed,
            execution_time,
            error_message: outcome.error.as_ref().map(|e| e.to_string()),
            final_state: json!({
                "phase": outcome.phase.to_string(),
                "session_id": outcome.workflow.as_ref().map(|(id, _)| id.to_string()),
                "url": outcome.last_url,
                "health": self.health.snapshot(),
                "perception": perception_summary,
            }),
            retry_count: outcome.retry_count,
            attempts: outcome.attempts,
        }
    }

    async fn run(
        &self,
        text: &str,
        session_id: Option<SessionId>,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let mut outcome = RunOutcome {
            phase: ExecutionPhase::Compiling,
            error: None,
            actions_performed: 0,
            retry_count: 0,
            attempts: Vec::new(),
            workflow: None,
            last_url: None,
            last_screenshot: None,
        };

        // Session first: expiry and storage problems are fatal and must
        // surface verbatim, never silently retried.
        let session = match session_id {
            Some(id) => self.sessions.get_session(&id).await,
            None => self.sessions.create_session().await,
        };
        let session = match session {
            Ok(session) => {
                self.health.mark_healthy("session_manager");
                session
            }
            Err(err) => {
                let spectra = err.to_spectra();
                match spectra {
                    SpectraError::SessionExpired(_) => {
                        self.health.mark_degraded("session_manager", err.to_string())
                    }
                    _ => self.health.mark_failed("session_manager", err.to_string()),
                }
                outcome.phase = ExecutionPhase::Failed;
                outcome.error = Some(spectra);
                return outcome;
            }
        };

        // Compiling.
        let intent = match self.compiler.compile(text, &CompileContext::default()) {
            Ok(intent) => {
                self.health.mark_healthy("intent_compiler");
                intent
            }
            Err(err) => {
                self.health.mark_degraded("intent_compiler", err.to_string());
                outcome.phase = ExecutionPhase::Failed;
                outcome.error = Some(err.to_spectra());
                outcome.workflow = Some((session.id.clone(), failed_workflow(text)));
                return outcome;
            }
        };

        // One driver handle per in-flight intent.
        let lease = match self.pool.checkout().await {
            Ok(lease) => lease,
            Err(err) => {
                self.health.mark_failed("navigation_engine", err.to_string());
                outcome.phase = ExecutionPhase::Failed;
                outcome.error = Some(SpectraError::DriverInitFailure(err.to_string()));
                outcome.workflow = Some((session.id.clone(), failed_workflow(text)));
                return outcome;
            }
        };
        let executor = StepExecutor::new(lease.driver());

        let mut workflow = Workflow::new(text);
        let mut pre = match executor.observe().await {
            Ok(state) => state,
            Err(err) => {
                self.health.mark_failed("navigation_engine", err.to_string());
                outcome.phase = ExecutionPhase::Failed;
                outcome.error = Some(err.to_spectra());
                outcome.workflow = Some((session.id.clone(), failed_workflow(text)));
                return outcome;
            }
        };

        let deadline = Duration::from_secs_f64(self.config.default_timeout);
        let total_steps = intent.action_plan.len();

        for (index, step) in intent.action_plan.iter().enumerate() {
            // Safe checkpoint: between steps is the cancellation boundary.
            if cancel.is_cancelled() {
                outcome.phase = ExecutionPhase::Aborting;
                outcome.error = Some(SpectraError::NavigationFailure(
                    "execution cancelled between steps".into(),
                ));
                break;
            }

            match self
                .run_step(&executor, step, index, &mut pre, cancel, deadline, &mut outcome)
                .await
            {
                Ok(()) => {
                    workflow.steps.push(workflow_step(step, true));
                    outcome.actions_performed += 1;
                    outcome.phase = if index + 1 == total_steps {
                        ExecutionPhase::Completed
                    } else {
                        ExecutionPhase::Advancing
                    };
                }
                Err(err) => {
                    workflow.steps.push(workflow_step(step, false));
                    outcome.phase = ExecutionPhase::Aborting;
                    outcome.error = Some(err);
                    break;
                }
            }
        }

        outcome.last_url = Some(pre.url.clone());
        outcome.last_screenshot = pre.screenshot.clone();

        if outcome.phase == ExecutionPhase::Completed {
            self.health.mark_healthy("navigation_engine");
            self.health.mark_healthy("action_validator");
        } else {
            outcome.phase = ExecutionPhase::Failed;
        }
        outcome.workflow = Some((session.id.clone(), workflow));
        outcome
    }

    /// Execute one step through its retry loop. `pre` is advanced to the
    /// post-state on success.
    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        executor: &StepExecutor,
        step: &ActionStep,
        index: usize,
        pre: &mut ObservedState,
        cancel: &CancellationToken,
        deadline: Duration,
        outcome: &mut RunOutcome,
    ) -> Result<(), SpectraError> {
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            outcome.phase = ExecutionPhase::Executing(index);
            let attempt_started = Utc::now();
            let step_timer = Instant::now();

            let error: SpectraError = match executor.execute(step, deadline, cancel).await {
                Ok(post) => {
                    outcome.phase = ExecutionPhase::Validating(index);
                    let report = self.validator.validate(step, pre, &post);
                    metrics::STEP_LATENCY_SECONDS.observe(step_timer.elapsed().as_secs_f64());

                    outcome.attempts.push(ExecutionAttempt {
                        id: AttemptId::new(),
                        step_id: step.id.clone(),
                        started_at: attempt_started,
                        finished_at: Utc::now(),
                        outcome: if report.success {
                            AttemptOutcome::Success
                        } else {
                            AttemptOutcome::Failure
                        },
                        validator_confidence: report.confidence,
                        error: if report.success {
                            None
                        } else {
                            Some(report.reasons.join("; "))
                        },
                    });

                    if report.success {
                        *pre = post;
                        return Ok(());
                    }

                    self.health
                        .mark_degraded("action_validator", report.reasons.join("; "));
                    SpectraError::ValidationDisagreement(report.reasons.join("; "))
                }
                Err(NavError::Cancelled(msg)) => {
                    // Never leave a half-done `type` unaccounted for: the
                    // ambiguity is recorded in the surfaced error.
                    let msg = if step.action_type == ActionType::Type {
                        format!("{} (typed input may be uncommitted)", msg)
                    } else {
                        msg
                    };
                    outcome.attempts.push(failed_attempt(step, attempt_started, &msg));
                    return Err(SpectraError::NavigationFailure(msg));
                }
                Err(err) => {
                    let is_timeout = matches!(err, NavError::Timeout(_));
                    outcome.attempts.push(ExecutionAttempt {
                        id: AttemptId::new(),
                        step_id: step.id.clone(),
                        started_at: attempt_started,
                        finished_at: Utc::now(),
                        outcome: if is_timeout {
                            AttemptOutcome::Timeout
                        } else {
                            AttemptOutcome::Failure
                        },
                        validator_confidence: 0.0,
                        error: Some(err.to_string()),
                    });
                    self.health.mark_degraded("navigation_engine", err.to_string());

                    if !retry_allowed(step.action_type, &err) {
                        return Err(err.to_spectra());
                    }
                    err.to_spectra()
                }
            };

            if attempt == max_retries || !retryable_after_validation(step.action_type, &error) {
                return Err(error);
            }

            outcome.phase = ExecutionPhase::Retrying(index);
            outcome.retry_count += 1;
            metrics::STEP_RETRIES_TOTAL.inc();
            let backoff = retry_backoff(attempt);
            info!(
                step_id = %step.id,
                attempt = attempt + 1,
                backoff_secs = backoff.as_secs_f64(),
                error = %error,
                "retrying step after backoff"
            );
            tokio::time::sleep(backoff).await;
        }

        unreachable!("retry loop always returns before exhausting attempts")
    }

    /// Analyze the last captured frame, feeding the perception summary
    /// into the terminal state. Degrades to null when no frame exists.
    async fn analyze_final_frame(&self, outcome: &RunOutcome) -> serde_json::Value {
        let Some(frame) = &outcome.last_screenshot else {
            return serde_json::Value::Null;
        };
        let analysis = self.perception.analyze(frame, MediaType::Screenshot).await;
        json!({
            "elements": analysis.detected_elements.len(),
            "has_text": analysis.has_text,
            "is_captcha": analysis.is_captcha,
            "accessibility": analysis.accessibility_level,
            "quality": analysis.quality_score,
        })
    }
}

/// Exponential backoff: 1 s start, factor 2, capped at 10 s.
fn retry_backoff(attempt: u32) -> Duration {
    let secs = (1u64 << attempt.min(6)).min(10);
    Duration::from_secs(secs)
}

/// Whether a navigation-level failure may be retried for this action.
///
/// A failure before dispatch (selector never resolved) provably had no
/// side effect, so any action type may retry it. Timeouts and driver
/// failures leave the prior effect unknown, so only retry-safe actions
/// re-execute.
fn retry_allowed(action: ActionType, err: &NavError) -> bool {
    match err {
        NavError::ElementNotFound(_) => true,
        NavError::Timeout(_) | NavError::DriverFailure(_) => action.is_retry_safe(),
        NavError::InvalidInput(_) | NavError::InitFailure(_) | NavError::Cancelled(_) => false,
    }
}

/// Validation disagreements re-execute the action, so they are only
/// retryable for retry-safe action types.
fn retryable_after_validation(action: ActionType, error: &SpectraError) -> bool {
    match error {
        SpectraError::ValidationDisagreement(_) => action.is_retry_safe(),
        _ => error.is_retryable(),
    }
}

fn workflow_step(step: &ActionStep, completed: bool) -> WorkflowStep {
    let target = step
        .selector
        .clone()
        .or_else(|| step.parameter("url").map(str::to_string))
        .or_else(|| step.parameter("target").map(str::to_string))
        .unwrap_or_default();
    WorkflowStep {
        description: format!("{} {}", step.action_type, target).trim_end().to_string(),
        action_type: step.action_type,
        parameters: step.parameters.clone(),
        completed,
    }
}

fn failed_workflow(text: &str) -> Workflow {
    Workflow::new(text)
}

fn failed_attempt(
    step: &ActionStep,
    started_at: chrono::DateTime<Utc>,
    error: &str,
) -> ExecutionAttempt {
    ExecutionAttempt {
        id: AttemptId::new(),
        step_id: step.id.clone(),
        started_at,
        finished_at: Utc::now(),
        outcome: AttemptOutcome::Failure,
        validator_confidence: 0.0,
        error: Some(error.to_string()),
    }
}
