//! Sequential executor for approved intents.
//!
//! Actions run one at a time in declared order and execution stops at the
//! first failure. Only `rest.call` is retried. Every attempt is bounded by
//! the action timeout and raced against the cancellation token. The intent
//! changes state exactly once, after the loop and the post-execution steps.

use crate::adapter::{Backends, ProcessOutput, ProcessRequest};
use amen_core::{
    Action, ActionOutput, ActionResult, ExecutionError, ExecutionFailure, ExecutionOutcome,
    ExecutionResult, ExecutorConfig, FailureKind, Intent, RetryConfig, RuntimeKind,
};
use amen_planner::{app_port, container_name, image_tag};
use chrono::Utc;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-run execution settings.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Bound for each process spawn and each HTTP attempt.
    pub action_timeout: Duration,
    pub retry: RetryConfig,
    pub cancel: CancellationToken,
    /// Build the container image after all actions succeed (docker only).
    pub build_container: bool,
    /// Start the built image as a detached container.
    pub run_container: bool,
    pub container_prefix: String,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

impl ExecuteOptions {
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            action_timeout: config.action_timeout(),
            retry: config.retry,
            cancel: CancellationToken::new(),
            build_container: config.build_container,
            run_container: config.run_container,
            container_prefix: config.container_prefix.clone(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Why one attempt did not produce output.
#[derive(Debug)]
enum AttemptError {
    Failed {
        kind: FailureKind,
        message: String,
        retryable: bool,
    },
    Cancelled,
}

impl AttemptError {
    fn fatal(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
            retryable: false,
        }
    }

    fn transient(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
            retryable: true,
        }
    }
}

/// What the steps after the action loop produced.
#[derive(Debug, Default)]
struct PostSteps {
    artifacts: Vec<String>,
    image: Option<String>,
    container_id: Option<String>,
    endpoints: Vec<String>,
}

/// How one action ended after all its attempts.
enum ActionRun {
    Done { output: ActionOutput, attempts: u32 },
    Failed(ExecutionFailure),
    Cancelled,
}

pub struct Executor {
    backends: Backends,
}

impl Executor {
    pub fn new(backends: Backends) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Execute an approved intent.
    ///
    /// Fails with [`ExecutionError`] only when the precondition does not hold,
    /// in which case nothing has been touched. Action failures are reported in
    /// the returned [`ExecutionResult`] and leave the intent Failed.
    pub async fn execute(
        &self,
        intent: &mut Intent,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, ExecutionError> {
        let ticket = intent.begin_execution()?;
        let actions = intent.actions().to_vec();
        let total = actions.len();

        info!(
            intent_id = %intent.id(),
            fingerprint = %ticket.fingerprint.short(),
            approver = %ticket.approver,
            actions = total,
            "Executing intent"
        );

        let mut succeeded = Vec::with_capacity(total);
        let mut failed_at = None;
        let mut failure = None;
        let mut not_attempted = Vec::new();
        let mut outcome = ExecutionOutcome::Succeeded;

        if let Err(e) = self.backends.workspace.prepare().await {
            let message = format!("{:#}", e);
            warn!(intent_id = %intent.id(), error = %message, "Workspace unavailable");
            failure = Some(ExecutionFailure {
                index: None,
                kind: FailureKind::Backend,
                message,
                attempts: 1,
            });
            not_attempted = (0..total).collect();
            outcome = ExecutionOutcome::Failed;
        }
        let pending: &[Action] = if outcome == ExecutionOutcome::Succeeded {
            &actions
        } else {
            &[]
        };

        for (index, action) in pending.iter().enumerate() {
            let started = Instant::now();
            let run = if options.cancel.is_cancelled() {
                ActionRun::Cancelled
            } else {
                debug!(intent_id = %intent.id(), index, action = %action, "Running action");
                self.run_action(index, action, options).await
            };

            match run {
                ActionRun::Done { output, attempts } => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    debug!(index, attempts, duration_ms, "Action succeeded");
                    succeeded.push(ActionResult {
                        index,
                        action: action.clone(),
                        output,
                        attempts,
                        duration_ms,
                    });
                }
                ActionRun::Failed(f) => {
                    warn!(
                        intent_id = %intent.id(),
                        index,
                        kind = %f.kind,
                        attempts = f.attempts,
                        error = %f.message,
                        "Action failed, halting execution"
                    );
                    failed_at = Some(index);
                    failure = Some(f);
                    not_attempted = (index + 1..total).collect();
                    outcome = ExecutionOutcome::Failed;
                    break;
                }
                ActionRun::Cancelled => {
                    warn!(intent_id = %intent.id(), index, "Execution cancelled");
                    failure = Some(cancelled_failure());
                    not_attempted = (index..total).collect();
                    outcome = ExecutionOutcome::Cancelled;
                    break;
                }
            }
        }

        let mut post = PostSteps::default();
        if outcome == ExecutionOutcome::Succeeded {
            match self.finish(intent, options, &mut post).await {
                Ok(()) => {}
                Err(AttemptError::Cancelled) => {
                    failure = Some(cancelled_failure());
                    outcome = ExecutionOutcome::Cancelled;
                }
                Err(AttemptError::Failed { kind, message, .. }) => {
                    warn!(intent_id = %intent.id(), kind = %kind, error = %message, "Post-execution step failed");
                    failure = Some(ExecutionFailure {
                        index: None,
                        kind,
                        message,
                        attempts: 1,
                    });
                    outcome = ExecutionOutcome::Failed;
                }
            }
        }

        let result = ExecutionResult {
            fingerprint: ticket.fingerprint.clone(),
            approved_by: ticket.approver.clone(),
            outcome,
            succeeded,
            failed_at,
            failure,
            not_attempted,
            artifacts: post.artifacts,
            image: post.image,
            container_id: post.container_id,
            endpoints: post.endpoints,
            started_at: ticket.started_at,
            finished_at: Utc::now(),
        };

        info!(
            intent_id = %intent.id(),
            outcome = %result.outcome,
            succeeded = result.succeeded.len(),
            not_attempted = result.not_attempted.len(),
            "Execution finished"
        );

        intent.finish_execution(ticket, result).cloned()
    }

    async fn run_action(&self, index: usize, action: &Action, options: &ExecuteOptions) -> ActionRun {
        let max_attempts = if action.is_retryable() {
            options.retry.attempts()
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            let result = bounded(options, self.attempt(action)).await;
            match result {
                Ok(output) => {
                    return ActionRun::Done {
                        output,
                        attempts: attempt,
                    };
                }
                Err(AttemptError::Cancelled) => return ActionRun::Cancelled,
                Err(AttemptError::Failed {
                    kind,
                    message,
                    retryable,
                }) => {
                    if retryable && attempt < max_attempts {
                        let delay = options.retry.backoff(attempt);
                        warn!(
                            index,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %message,
                            "Retrying action"
                        );
                        tokio::select! {
                            _ = options.cancel.cancelled() => return ActionRun::Cancelled,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        attempt += 1;
                        continue;
                    }
                    return ActionRun::Failed(ExecutionFailure {
                        index: Some(index),
                        kind,
                        message,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    /// One attempt of one action against the backends.
    async fn attempt(&self, action: &Action) -> Result<ActionOutput, AttemptError> {
        let backends = &self.backends;
        match action {
            Action::ApiExpose { method, path } => {
                let manifest = backends
                    .workspace
                    .register_route(*method, path.as_str())
                    .await
                    .map_err(|e| AttemptError::fatal(FailureKind::Backend, format!("{:#}", e)))?;
                Ok(ActionOutput::Route {
                    method: *method,
                    path: path.to_string(),
                    manifest,
                })
            }
            Action::DbCreate { .. } | Action::DbAddColumn { .. } => {
                let statement = action.ddl().ok_or_else(|| {
                    AttemptError::fatal(FailureKind::Backend, "action has no DDL form")
                })?;
                let manifest = backends
                    .workspace
                    .apply_migration(&statement)
                    .await
                    .map_err(|e| AttemptError::fatal(FailureKind::Backend, format!("{:#}", e)))?;
                Ok(ActionOutput::Migration {
                    statement,
                    manifest,
                })
            }
            Action::ShellExec { command } => {
                let request =
                    ProcessRequest::shell(command).in_dir(backends.workspace.root().to_path_buf());
                let output = backends
                    .process
                    .run(&request)
                    .await
                    .map_err(|e| AttemptError::fatal(FailureKind::Backend, format!("{:#}", e)))?;
                if !output.success() {
                    let detail = output.stderr.trim();
                    return Err(AttemptError::fatal(
                        FailureKind::NonZeroExit,
                        if detail.is_empty() {
                            format!("exit status {}", output.exit_code)
                        } else {
                            format!("exit status {}: {}", output.exit_code, detail)
                        },
                    ));
                }
                Ok(ActionOutput::Shell {
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
            Action::RestCall { method, url } => {
                let response = backends
                    .http
                    .send(*method, url)
                    .await
                    .map_err(|e| AttemptError::transient(FailureKind::Backend, format!("{:#}", e)))?;
                match response.status {
                    200..=399 => Ok(ActionOutput::Http {
                        status: response.status,
                        body: response.body,
                    }),
                    429 | 500..=599 => Err(AttemptError::transient(
                        FailureKind::HttpStatus,
                        format!("{} {} answered {}", method, url, response.status),
                    )),
                    status => Err(AttemptError::fatal(
                        FailureKind::HttpStatus,
                        format!("{} {} answered {}", method, url, status),
                    )),
                }
            }
            Action::FileCreate { path } => {
                let path = backends
                    .workspace
                    .create_file(path)
                    .await
                    .map_err(|e| AttemptError::fatal(FailureKind::Backend, format!("{:#}", e)))?;
                Ok(ActionOutput::File { path })
            }
        }
    }

    /// Write the artifacts of the approved plan, then build the image and
    /// start the container when enabled. `post` keeps whatever completed
    /// before an error.
    async fn finish(
        &self,
        intent: &Intent,
        options: &ExecuteOptions,
        post: &mut PostSteps,
    ) -> Result<(), AttemptError> {
        let Some(plan) = intent
            .last_plan()
            .filter(|p| p.fingerprint == intent.fingerprint())
        else {
            return Ok(());
        };

        let mut files = Vec::new();
        if let Some(ref code) = plan.generated_code {
            files.push((code.file_name.as_str(), code.source.as_str()));
            if let Some(ref manifest) = code.manifest {
                files.push((manifest.file_name.as_str(), manifest.contents.as_str()));
            }
        }
        if let Some(ref descriptor) = plan.build_descriptor {
            files.push((descriptor.file_name.as_str(), descriptor.contents.as_str()));
        }

        for (name, contents) in files {
            let path = self
                .backends
                .workspace
                .write_artifact(name, contents)
                .await
                .map_err(|e| AttemptError::fatal(FailureKind::Artifact, format!("{:#}", e)))?;
            debug!(intent_id = %intent.id(), path = %path, "Artifact written");
            post.artifacts.push(path);
        }

        let descriptor = match plan.build_descriptor {
            Some(ref descriptor)
                if options.build_container
                    && intent.environment().runtime == RuntimeKind::Docker =>
            {
                descriptor
            }
            _ => return Ok(()),
        };

        let tag = image_tag(&options.container_prefix, intent);
        info!(intent_id = %intent.id(), image = %tag, "Building container image");
        let build = self
            .docker(
                options,
                FailureKind::Build,
                vec![
                    "build".to_string(),
                    "-t".to_string(),
                    tag.clone(),
                    "-f".to_string(),
                    descriptor.file_name.clone(),
                    ".".to_string(),
                ],
            )
            .await?;
        if !build.success() {
            return Err(AttemptError::fatal(
                FailureKind::Build,
                format!("docker build exited with {}: {}", build.exit_code, build.stderr.trim()),
            ));
        }
        post.image = Some(tag.clone());

        if options.run_container {
            self.start_container(intent, options, &tag, post).await?;
        }
        Ok(())
    }

    /// Replace any container of the same name with a fresh one from `tag`.
    async fn start_container(
        &self,
        intent: &Intent,
        options: &ExecuteOptions,
        tag: &str,
        post: &mut PostSteps,
    ) -> Result<(), AttemptError> {
        let name = container_name(&options.container_prefix, intent);
        let env = intent.environment();
        let port = app_port(intent);

        // Exits non-zero when there is nothing to remove.
        self.docker(
            options,
            FailureKind::Container,
            vec!["rm".to_string(), "-f".to_string(), name.clone()],
        )
        .await?;

        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            name.clone(),
            "-p".to_string(),
            format!("{}:{}", port, port),
        ];
        for extra in env.ports.iter().filter(|p| **p != port) {
            args.push("-p".to_string());
            args.push(format!("{}:{}", extra, extra));
        }
        for (key, value) in &env.env_vars {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(tag.to_string());

        info!(intent_id = %intent.id(), container = %name, image = %tag, "Starting container");
        let run = self.docker(options, FailureKind::Container, args).await?;
        if !run.success() {
            return Err(AttemptError::fatal(
                FailureKind::Container,
                format!("docker run exited with {}: {}", run.exit_code, run.stderr.trim()),
            ));
        }

        let id: String = run.stdout.trim().chars().take(12).collect();
        post.container_id = (!id.is_empty()).then_some(id);

        let base = format!("http://localhost:{}", port);
        post.endpoints.push(base.clone());
        for action in intent.actions() {
            if let Action::ApiExpose { path, .. } = action {
                post.endpoints.push(format!("{}{}", base, path.as_str()));
            }
        }
        Ok(())
    }

    /// Run one docker command in the workspace root. Not bounded by the
    /// per-action timeout; cancellation still applies.
    async fn docker(
        &self,
        options: &ExecuteOptions,
        kind: FailureKind,
        args: Vec<String>,
    ) -> Result<ProcessOutput, AttemptError> {
        let request = ProcessRequest::new("docker", args)
            .in_dir(self.backends.workspace.root().to_path_buf());
        let run = tokio::select! {
            _ = options.cancel.cancelled() => return Err(AttemptError::Cancelled),
            output = self.backends.process.run(&request) => output,
        };
        run.map_err(|e| AttemptError::fatal(kind, format!("{:#}", e)))
    }
}

/// Race one attempt against the timeout and the cancellation token. A
/// timeout is never retryable.
async fn bounded<F>(options: &ExecuteOptions, attempt: F) -> Result<ActionOutput, AttemptError>
where
    F: Future<Output = Result<ActionOutput, AttemptError>>,
{
    tokio::select! {
        biased;
        _ = options.cancel.cancelled() => Err(AttemptError::Cancelled),
        result = tokio::time::timeout(options.action_timeout, attempt) => match result {
            Ok(result) => result,
            Err(_) => Err(AttemptError::fatal(
                FailureKind::Timeout,
                format!("timed out after {}ms", options.action_timeout.as_millis()),
            )),
        },
    }
}

fn cancelled_failure() -> ExecutionFailure {
    ExecutionFailure {
        index: None,
        kind: FailureKind::Cancelled,
        message: "execution cancelled".to_string(),
        attempts: 0,
    }
}
