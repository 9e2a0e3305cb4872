//! Authoring commands: `new`, `parse`, `plan`, `iterate`, `suggest`.

use super::Context;
use super::inspect::print_plan;
use amen_core::{
    Action, DiffOrigin, Intent, IntentDraft, IterationDiff, RuntimeKind, parse_action,
};
use amen_dsl::{DslError, parse_dsl};
use amen_planner::{Advisor, HeuristicAdvisor, NoopAdvisor};
use anyhow::Context as _;
use clap::Subcommand;
use std::fs;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum IterateCommand {
    /// Append an action, e.g. `add api.expose GET /health`
    Add {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        action: Vec<String>,
    },
    /// Remove the action at INDEX
    Remove { index: usize },
    /// Replace the action at INDEX
    Replace {
        index: usize,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        action: Vec<String>,
    },
    /// Change the implementation language
    Language { language: String },
    /// Change the framework; omit to clear it
    Framework { framework: Option<String> },
}

impl IterateCommand {
    fn into_diff(self) -> anyhow::Result<IterationDiff> {
        Ok(match self {
            Self::Add { action } => IterationDiff::AddAction(action_from_words(&action)?),
            Self::Remove { index } => IterationDiff::RemoveAction(index),
            Self::Replace { index, action } => {
                IterationDiff::ReplaceAction(index, action_from_words(&action)?)
            }
            Self::Language { language } => IterationDiff::SetLanguage(language.to_lowercase()),
            Self::Framework { framework } => {
                IterationDiff::SetFramework(framework.map(|f| f.to_lowercase()))
            }
        })
    }
}

fn action_from_words(words: &[String]) -> anyhow::Result<Action> {
    Ok(parse_action(&words.join(" "))?)
}

#[derive(Debug, Default)]
pub struct NewArgs {
    pub name: String,
    pub goal: String,
    pub description: Option<String>,
    pub runtime: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
    pub actions: Vec<String>,
}

pub async fn new_intent(ctx: &Context, args: NewArgs) -> anyhow::Result<()> {
    let mut draft = IntentDraft::new(args.name, args.goal);
    draft.description = args.description;
    if let Some(runtime) = args.runtime {
        draft.environment.runtime = RuntimeKind::parse(&runtime)
            .ok_or_else(|| anyhow::anyhow!("Unknown runtime '{}'", runtime))?;
    }
    if let Some(language) = args.language {
        draft.implementation.language = language.to_lowercase();
    }
    draft.implementation.framework = args.framework.map(|f| f.to_lowercase());

    let mut actions = Vec::with_capacity(args.actions.len());
    let mut problems = Vec::new();
    for raw in &args.actions {
        match parse_action(raw) {
            Ok(action) => actions.push(action),
            Err(e) => problems.push(e.to_string()),
        }
    }
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("✖ {}", problem);
        }
        return Err(anyhow::anyhow!("{} invalid action(s)", problems.len()));
    }
    draft.implementation.actions = actions;

    register(ctx, Intent::draft(draft)).await
}

pub async fn parse(ctx: &Context, file: &Path, strict: bool) -> anyhow::Result<()> {
    let text =
        fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;

    let parsed = match parse_dsl(&text) {
        Ok(parsed) => parsed,
        Err(DslError::Fatal { diagnostics }) => {
            for d in &diagnostics {
                eprintln!("✖ {}", d);
            }
            return Err(anyhow::anyhow!("{} is not a valid intent", file.display()));
        }
        Err(e) => return Err(e.into()),
    };

    for d in &parsed.diagnostics {
        if d.is_error() {
            eprintln!("✖ {}", d);
        } else {
            eprintln!("⚠ {}", d);
        }
    }
    if strict && parsed.has_errors() {
        return Err(anyhow::anyhow!(
            "{} has errors (--strict); nothing registered",
            file.display()
        ));
    }

    register(ctx, parsed.intent).await
}

async fn register(ctx: &Context, intent: Intent) -> anyhow::Result<()> {
    let handle = ctx.engine().register(intent).await;
    let intent = ctx.save(&handle).await?;
    println!("✔ Registered intent: {}", intent.id());
    println!("  name:    {}", intent.name());
    println!("  actions: {}", intent.actions().len());
    println!("Next: amen plan {}", intent.id());
    Ok(())
}

pub async fn plan(ctx: &Context, intent_id: &str) -> anyhow::Result<()> {
    let handle = ctx.open(intent_id)?;
    let plan = ctx.engine().plan(&handle).await?;
    let intent = ctx.save(&handle).await?;

    print_plan(&plan);
    println!();
    if plan.blocking {
        println!("✖ Plan is blocked; fix the errors above and plan again.");
    } else {
        println!("✔ Intent {} is {}.", intent.id(), intent.state());
        println!("Next: amen approve {}", intent.id());
    }
    Ok(())
}

pub async fn iterate(ctx: &Context, intent_id: &str, change: IterateCommand) -> anyhow::Result<()> {
    let handle = ctx.open(intent_id)?;
    let diff = change.into_diff()?;
    let entry = ctx
        .engine()
        .iterate(&handle, diff, DiffOrigin::Manual)
        .await?;
    let intent = ctx.save(&handle).await?;

    println!("✔ v{}: {}", entry.version, entry.change);
    println!("Intent {} is {}; plan again before approval.", intent.id(), intent.state());
    Ok(())
}

pub async fn suggest(
    ctx: &Context,
    intent_id: &str,
    focus: Option<&str>,
    apply: bool,
) -> anyhow::Result<()> {
    let handle = ctx.open(intent_id)?;
    let advisor: &dyn Advisor = if ctx.config.advisor.enabled {
        &HeuristicAdvisor
    } else {
        &NoopAdvisor
    };

    let engine = ctx.engine();
    let proposals = engine.suggest(&handle, advisor, focus).await;
    if proposals.is_empty() {
        println!("No suggestions.");
        return Ok(());
    }

    for (i, p) in proposals.iter().enumerate() {
        println!(
            "{:>2}. [{}/{}] {}: {}",
            i + 1,
            p.priority,
            p.category,
            p.diff,
            p.rationale
        );
    }

    if !apply {
        println!();
        println!("Run with --apply to apply these suggestions.");
        return Ok(());
    }

    let outcome = engine.apply_suggestions(&handle, proposals).await;
    let intent = ctx.save(&handle).await?;
    println!();
    for entry in &outcome.applied {
        println!("✔ v{}: {}", entry.version, entry.change);
    }
    for (proposal, e) in &outcome.rejected {
        println!("✖ {}: {}", proposal.diff, e);
    }
    println!("Intent {} is {}.", intent.id(), intent.state());
    Ok(())
}
