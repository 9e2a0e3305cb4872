//! `amen approve`: the interactive AMEN gate.

use super::Context;
use amen_core::{Intent, Severity};
use amen_runtime::Confirmer;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// The word an operator has to type.
pub const CONFIRMATION_WORD: &str = "AMEN";

/// Shows what is about to be approved and waits for the operator to type
/// AMEN on stdin.
pub struct TerminalConfirmer;

#[async_trait]
impl Confirmer for TerminalConfirmer {
    async fn confirm(&self, intent: &Intent, approver: &str) -> anyhow::Result<bool> {
        let mut out = tokio::io::stdout();
        out.write_all(approval_summary(intent, approver).as_bytes())
            .await?;
        out.write_all(format!("Type {} to approve: ", CONFIRMATION_WORD).as_bytes())
            .await?;
        out.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            anyhow::bail!("stdin closed before confirmation");
        }
        Ok(is_confirmation(&line))
    }
}

pub fn is_confirmation(line: &str) -> bool {
    line.trim() == CONFIRMATION_WORD
}

fn approval_summary(intent: &Intent, approver: &str) -> String {
    let mut text = format!(
        "Intent {} ({}) v{}\nGoal: {}\nFingerprint: {}\nApprover: {}\nActions:\n",
        intent.id(),
        intent.name(),
        intent.version(),
        intent.goal(),
        intent.fingerprint(),
        approver,
    );
    for (index, action) in intent.actions().iter().enumerate() {
        text.push_str(&format!("  [{}] {}\n", index, action));
    }
    if let Some(plan) = intent.last_plan() {
        let warnings: Vec<_> = plan
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect();
        if !warnings.is_empty() {
            text.push_str("Warnings:\n");
            for w in warnings {
                text.push_str(&format!("  {}\n", w));
            }
        }
    }
    text
}

pub async fn approve(
    ctx: &Context,
    intent_id: &str,
    approver: Option<&str>,
    yes: bool,
) -> anyhow::Result<()> {
    let approver = approver.unwrap_or(ctx.config.approval.default_approver.as_str());
    let handle = ctx.open(intent_id)?;
    let engine = ctx.engine_with(
        Arc::new(TerminalConfirmer),
        yes,
        ctx.project_dir.join(&ctx.config.executor.workspace_dir),
    );

    let outcome = engine.approve(&handle, approver).await?;
    ctx.save(&handle).await?;

    let approval = outcome.approval();
    if outcome.is_new() {
        println!("✔ AMEN. Approved intent: {}", intent_id);
    } else {
        println!("✔ Intent {} was already approved.", intent_id);
    }
    println!("  approver:    {}", approval.approver);
    println!("  fingerprint: {}", approval.fingerprint);
    println!("  at:          {}", approval.approved_at.to_rfc3339());
    println!("Next: amen execute {}", intent_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use amen_core::{IntentDraft, parse_action};

    #[test]
    fn only_the_exact_word_confirms() {
        assert!(is_confirmation("AMEN\n"));
        assert!(is_confirmation("  AMEN  "));
        assert!(!is_confirmation("amen"));
        assert!(!is_confirmation("yes"));
        assert!(!is_confirmation(""));
    }

    #[test]
    fn summary_lists_actions_and_fingerprint() {
        let intent = Intent::draft(
            IntentDraft::new("svc", "test")
                .with_actions(vec![parse_action("db.create users").unwrap()]),
        );
        let text = approval_summary(&intent, "alice");
        assert!(text.contains("[0] db.create users"));
        assert!(text.contains(intent.fingerprint().as_str()));
        assert!(text.contains("Approver: alice"));
    }
}
