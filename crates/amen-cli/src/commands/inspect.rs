//! Read-only commands: `status`, `show`, `list`.

use super::Context;
use amen_core::{Intent, PlanResult, Severity};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ShowView {
    /// Metadata, environment and actions
    #[default]
    Summary,
    /// The full intent as JSON
    Json,
    /// Source generated by the last plan
    Code,
    /// Build descriptor generated by the last plan
    Build,
    /// Iteration history and audit trail
    History,
}

pub fn print_plan(plan: &PlanResult) {
    println!("Plan {}", plan.fingerprint.short());
    for effect in &plan.effects {
        let marker = match effect.severity {
            Severity::Ok => "✔",
            Severity::Warning => "⚠",
            Severity::Error => "✖",
        };
        println!("  {} [{}] {} -> {}", marker, effect.index, effect.action, effect.preview);
        if let Some(ref message) = effect.message {
            println!("      {}", message);
        }
    }
    let intent_level: Vec<_> = plan
        .diagnostics
        .iter()
        .filter(|d| d.action_index.is_none())
        .collect();
    for d in intent_level {
        println!("  {}", d);
    }
    if let Some(ref code) = plan.generated_code {
        println!("  generates {} ({})", code.file_name, code.language);
    }
    if let Some(ref build) = plan.build_descriptor {
        println!("  generates {}", build.file_name);
    }
    let r = &plan.estimated_resources;
    println!(
        "  estimate: {} MB, {} cpu, build ~{}s, startup ~{}s",
        r.memory_mb, r.cpu, r.build_time_secs, r.startup_time_secs
    );
    println!(
        "  {} error(s), {} warning(s)",
        plan.error_count(),
        plan.warning_count()
    );
}

pub async fn status(ctx: &Context, intent_id: &str) -> anyhow::Result<()> {
    let intent = ctx.store.load(intent_id)?;

    println!("Intent:  {} ({})", intent.id(), intent.name());
    println!("Path:    {}", ctx.store.intent_dir(intent_id)?.display());
    println!("State:   {}", intent.state());
    println!("Version: {}", intent.version());
    println!("Mode:    {}", intent.execution_mode());
    println!("Updated: {}", intent.updated_at().to_rfc3339());
    println!("Fingerprint: {}", intent.fingerprint());

    match intent.last_plan() {
        Some(plan) => println!(
            "Plan:    {} ({} error(s), {} warning(s)){}",
            plan.fingerprint.short(),
            plan.error_count(),
            plan.warning_count(),
            if intent.is_plan_current() { "" } else { " [stale]" }
        ),
        None => println!("Plan:    (none)"),
    }

    match intent.approval() {
        Some(a) => {
            println!("Approval:");
            println!("  approver: {}", a.approver);
            println!("  at:       {}", a.approved_at.to_rfc3339());
        }
        None => println!("Approval: (none)"),
    }

    if let Some(result) = intent.last_execution() {
        println!(
            "Execution: {} ({} succeeded, {} not attempted)",
            result.outcome,
            result.succeeded.len(),
            result.not_attempted.len()
        );
    }

    println!("Next: {}", next_step(&intent));
    Ok(())
}

fn next_step(intent: &Intent) -> String {
    use amen_core::LifecycleState::*;
    match intent.state() {
        Draft => format!("amen plan {}", intent.id()),
        Planned => format!("amen approve {}", intent.id()),
        Approved => format!("amen execute {}", intent.id()),
        Executed => "done".to_string(),
        Failed => format!("amen iterate {} ... or amen plan {}", intent.id(), intent.id()),
    }
}

pub async fn show(ctx: &Context, intent_id: &str, view: ShowView) -> anyhow::Result<()> {
    let intent = ctx.store.load(intent_id)?;
    match view {
        ShowView::Summary => print_summary(&intent),
        ShowView::Json => println!("{}", serde_json::to_string_pretty(&intent)?),
        ShowView::Code => {
            let code = intent
                .last_plan()
                .and_then(|p| p.generated_code.as_ref())
                .ok_or_else(|| anyhow::anyhow!("No generated code. Run: amen plan {}", intent_id))?;
            println!("# {}", code.file_name);
            println!("{}", code.source);
            if let Some(ref manifest) = code.manifest {
                println!("# {}", manifest.file_name);
                println!("{}", manifest.contents);
            }
        }
        ShowView::Build => {
            let build = intent
                .last_plan()
                .and_then(|p| p.build_descriptor.as_ref())
                .ok_or_else(|| {
                    anyhow::anyhow!("No build descriptor. Run: amen plan {}", intent_id)
                })?;
            println!("{}", build.contents);
        }
        ShowView::History => {
            println!("Iterations:");
            if intent.iteration_history().is_empty() {
                println!("  (none)");
            }
            for entry in intent.iteration_history() {
                println!(
                    "  v{} {} [{}] {}",
                    entry.version,
                    entry.recorded_at.to_rfc3339(),
                    entry.origin,
                    entry.change
                );
            }
            println!("Audit:");
            for event in ctx.audit.history(intent.id()).await? {
                println!("  {}", event.to_log_line());
            }
        }
    }
    Ok(())
}

fn print_summary(intent: &Intent) {
    let env = intent.environment();
    let imp = intent.implementation();
    println!("{} ({})", intent.name(), intent.id());
    println!("Goal: {}", intent.goal());
    if let Some(description) = intent.description() {
        println!("Description: {}", description);
    }
    println!("State: {} (v{})", intent.state(), intent.version());
    println!("Environment:");
    println!("  runtime:    {}", env.runtime);
    println!("  base_image: {}", env.base_image);
    if !env.ports.is_empty() {
        println!("  ports:      {:?}", env.ports);
    }
    if !env.services.is_empty() {
        println!("  services:   {}", env.services.join(", "));
    }
    if !env.volumes.is_empty() {
        println!("  volumes:    {}", env.volumes.join(", "));
    }
    for (key, value) in &env.env_vars {
        println!("  env {}={}", key, value);
    }
    println!("Implementation:");
    println!("  language:  {}", imp.language);
    println!(
        "  framework: {}",
        imp.framework.as_deref().unwrap_or("(none)")
    );
    println!("Actions:");
    for (index, action) in imp.actions.iter().enumerate() {
        println!("  [{}] {}", index, action);
    }
}

pub async fn list(ctx: &Context) -> anyhow::Result<()> {
    let intents = ctx.store.list()?;
    if intents.is_empty() {
        println!("No intents. Create one with: amen new <name> --goal \"...\"");
        return Ok(());
    }
    println!("{:<10} {:<10} {:>4} {:>8}  NAME", "ID", "STATE", "VER", "ACTIONS");
    for intent in intents {
        println!(
            "{:<10} {:<10} {:>4} {:>8}  {}",
            intent.id(),
            intent.state().to_string(),
            intent.version(),
            intent.actions().len(),
            intent.name()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use amen_core::LifecycleState;

    #[test]
    fn next_step_follows_state() {
        let intent = Intent::new("svc", "test");
        assert_eq!(intent.state(), LifecycleState::Draft);
        assert_eq!(next_step(&intent), format!("amen plan {}", intent.id()));
    }
}
