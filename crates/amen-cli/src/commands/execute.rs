//! `amen execute`: run an approved intent. Ctrl-C cancels.

use super::Context;
use amen_core::{ActionOutput, ExecutionMode, ExecutionResult};
use amen_runtime::{ExecuteOptions, StaticConfirmer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Default)]
pub struct ExecuteArgs {
    pub timeout_secs: Option<u64>,
    pub workspace: Option<PathBuf>,
    /// Execute even when the intent is declared `dry-run`.
    pub force: bool,
    /// Build the image and start it as a container after the actions.
    pub run_container: bool,
}

pub async fn execute(ctx: &Context, intent_id: &str, args: ExecuteArgs) -> anyhow::Result<()> {
    let handle = ctx.open(intent_id)?;

    let mode = handle.lock().await.execution_mode();
    if mode == ExecutionMode::DryRun && !args.force {
        return Err(anyhow::anyhow!(
            "Intent {} is declared '{}'. Use --force to execute it anyway.",
            intent_id,
            mode
        ));
    }

    let workspace = args
        .workspace
        .unwrap_or_else(|| ctx.project_dir.join(&ctx.config.executor.workspace_dir))
        .join(intent_id);
    let engine = ctx.engine_with(Arc::new(StaticConfirmer(false)), false, workspace.clone());

    let mut options = ExecuteOptions::from_config(&ctx.config.executor);
    if let Some(secs) = args.timeout_secs {
        options.action_timeout = Duration::from_secs(secs.max(1));
    }
    if args.run_container {
        options.build_container = true;
        options.run_container = true;
    }

    let cancel = CancellationToken::new();
    options = options.with_cancel(cancel.clone());
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling execution");
            cancel.cancel();
        }
    });

    let outcome = engine.execute(&handle, &options).await;
    watcher.abort();
    let result = outcome?;
    ctx.save(&handle).await?;

    print_result(&result);
    println!("Workspace: {}", workspace.display());
    if result.is_success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Execution {}", result.outcome))
    }
}

fn print_result(result: &ExecutionResult) {
    for r in &result.succeeded {
        let detail = match &r.output {
            ActionOutput::Route { manifest, .. } => format!("route -> {}", manifest),
            ActionOutput::Migration { manifest, .. } => format!("migration -> {}", manifest),
            ActionOutput::Shell { exit_code, .. } => format!("exit {}", exit_code),
            ActionOutput::Http { status, .. } => format!("HTTP {}", status),
            ActionOutput::File { path } => format!("created {}", path),
        };
        let retries = if r.attempts > 1 {
            format!(", {} attempts", r.attempts)
        } else {
            String::new()
        };
        println!(
            "✔ [{}] {} ({}, {}ms{})",
            r.index, r.action, detail, r.duration_ms, retries
        );
    }
    if let Some(ref failure) = result.failure {
        match failure.index {
            Some(index) => println!("✖ [{}] {}: {}", index, failure.kind, failure.message),
            None => println!("✖ {}: {}", failure.kind, failure.message),
        }
    }
    if !result.not_attempted.is_empty() {
        println!("  not attempted: {:?}", result.not_attempted);
    }
    for artifact in &result.artifacts {
        println!("  artifact: {}", artifact);
    }
    if let Some(ref image) = result.image {
        println!("  image: {}", image);
    }
    if let Some(ref id) = result.container_id {
        println!("  container: {}", id);
    }
    for endpoint in &result.endpoints {
        println!("  endpoint: {}", endpoint);
    }
    println!(
        "Outcome: {} in {}ms (approved by {})",
        result.outcome,
        result.duration_ms(),
        result.approved_by
    );
}
