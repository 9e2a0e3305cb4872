mod commands;

use amen_core::EngineConfig;
use clap::{Parser, Subcommand};
use commands::Context;
use commands::author::{IterateCommand, NewArgs};
use commands::execute::ExecuteArgs;
use commands::inspect::ShowView;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "amen",
    version,
    about = "Intent lifecycle engine: describe, plan, say AMEN, execute"
)]
struct Cli {
    /// Project directory holding amen.yaml and the .amen/ state directory
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new Draft intent
    New {
        name: String,
        #[arg(long)]
        goal: String,
        #[arg(long)]
        description: Option<String>,
        /// docker | kubernetes | local
        #[arg(long)]
        runtime: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        framework: Option<String>,
        /// Action in DSL form, repeatable: --action "api.expose GET /users"
        #[arg(long = "action")]
        actions: Vec<String>,
    },

    /// Parse an intent document (YAML) and register it
    Parse {
        file: PathBuf,
        /// Refuse to register when any action is malformed
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Dry-run the intent and record the plan
    Plan { intent_id: String },

    /// Change an intent (resets it to Draft)
    Iterate {
        intent_id: String,
        #[command(subcommand)]
        change: IterateCommand,
    },

    /// Ask the advisor for improvements
    Suggest {
        intent_id: String,
        /// Only suggestions in this category (reliability, consistency, features)
        #[arg(long)]
        focus: Option<String>,
        /// Apply the suggestions as advisory iterations
        #[arg(long, default_value_t = false)]
        apply: bool,
    },

    /// Say AMEN: approve a planned intent
    Approve {
        intent_id: String,
        /// Approver name. Defaults to approval.default_approver.
        #[arg(long = "as")]
        approver: Option<String>,
        /// Skip the interactive confirmation
        #[arg(long, env = "AMEN_AUTO_APPROVE", default_value_t = false)]
        yes: bool,
    },

    /// Execute an approved intent (Ctrl-C cancels)
    Execute {
        intent_id: String,
        /// Per-action timeout in seconds
        #[arg(long, env = "AMEN_ACTION_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,
        /// Workspace root; the intent runs in <workspace>/<id>
        #[arg(long, env = "AMEN_WORKSPACE")]
        workspace: Option<PathBuf>,
        /// Execute even if the intent is declared dry-run
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Build the image and start the service container (docker runtime)
        #[arg(long, env = "AMEN_RUN_CONTAINER", default_value_t = false)]
        run_container: bool,
    },

    /// Show lifecycle status of an intent
    Status { intent_id: String },

    /// Show an intent
    Show {
        intent_id: String,
        #[arg(value_enum, default_value_t = ShowView::Summary)]
        view: ShowView,
    },

    /// List intents
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load_from_dir(&cli.project_dir)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::new(&cli.project_dir, config)?;

    match cli.cmd {
        Command::New {
            name,
            goal,
            description,
            runtime,
            language,
            framework,
            actions,
        } => {
            commands::author::new_intent(
                &ctx,
                NewArgs {
                    name,
                    goal,
                    description,
                    runtime,
                    language,
                    framework,
                    actions,
                },
            )
            .await?
        }
        Command::Parse { file, strict } => commands::author::parse(&ctx, &file, strict).await?,
        Command::Plan { intent_id } => commands::author::plan(&ctx, &intent_id).await?,
        Command::Iterate { intent_id, change } => {
            commands::author::iterate(&ctx, &intent_id, change).await?
        }
        Command::Suggest {
            intent_id,
            focus,
            apply,
        } => commands::author::suggest(&ctx, &intent_id, focus.as_deref(), apply).await?,
        Command::Approve {
            intent_id,
            approver,
            yes,
        } => commands::approve::approve(&ctx, &intent_id, approver.as_deref(), yes).await?,
        Command::Execute {
            intent_id,
            timeout_secs,
            workspace,
            force,
            run_container,
        } => {
            commands::execute::execute(
                &ctx,
                &intent_id,
                ExecuteArgs {
                    timeout_secs,
                    workspace,
                    force,
                    run_container,
                },
            )
            .await?
        }
        Command::Status { intent_id } => commands::inspect::status(&ctx, &intent_id).await?,
        Command::Show { intent_id, view } => {
            commands::inspect::show(&ctx, &intent_id, view).await?
        }
        Command::List => commands::inspect::list(&ctx).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn iterate_add_takes_raw_words() {
        let cli = Cli::try_parse_from([
            "amen", "iterate", "ab12cd34", "add", "shell.exec", "ls", "-la",
        ])
        .unwrap();
        match cli.cmd {
            Command::Iterate {
                change: IterateCommand::Add { action },
                ..
            } => assert_eq!(action, vec!["shell.exec", "ls", "-la"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn execute_accepts_run_container() {
        let cli =
            Cli::try_parse_from(["amen", "execute", "ab12cd34", "--run-container"]).unwrap();
        match cli.cmd {
            Command::Execute { run_container, .. } => assert!(run_container),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
