//! Suggestion sources.
//!
//! An [`Advisor`] only proposes diffs. Proposals reach an intent through
//! [`apply_suggestions`], which routes each one through the regular iteration
//! path with [`DiffOrigin::Advisory`]: history, versioning and approval
//! invalidation apply exactly as for manual edits.

use amen_core::{
    Action, DiffOrigin, EndpointPath, HttpMethod, Intent, IterationDiff, IterationEntry,
    IterationError, iterate,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::codegen::framework_language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One proposed change with its rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedDiff {
    pub diff: IterationDiff,
    pub rationale: String,
    /// Free-form area, e.g. `reliability`, `consistency`. Matched by `focus`.
    pub category: String,
    pub priority: Priority,
}

#[async_trait]
pub trait Advisor: Send + Sync {
    /// Propose diffs for `intent`, optionally narrowed to a category.
    async fn suggest(
        &self,
        intent: &Intent,
        focus: Option<&str>,
    ) -> anyhow::Result<Vec<ProposedDiff>>;
}

/// Advisor that never proposes anything.
pub struct NoopAdvisor;

#[async_trait]
impl Advisor for NoopAdvisor {
    async fn suggest(
        &self,
        _intent: &Intent,
        _focus: Option<&str>,
    ) -> anyhow::Result<Vec<ProposedDiff>> {
        Ok(Vec::new())
    }
}

/// Rule-based advisor covering common gaps: missing health/ping endpoints
/// and framework/language mismatches.
pub struct HeuristicAdvisor;

#[async_trait]
impl Advisor for HeuristicAdvisor {
    async fn suggest(
        &self,
        intent: &Intent,
        focus: Option<&str>,
    ) -> anyhow::Result<Vec<ProposedDiff>> {
        let mut proposals = Vec::new();
        let imp = intent.implementation();

        let has_endpoint = |needle: &str| {
            imp.actions.iter().any(|a| match a {
                Action::ApiExpose { path, .. } => path.as_str().contains(needle),
                _ => false,
            })
        };

        if !has_endpoint("/health") {
            proposals.push(ProposedDiff {
                diff: IterationDiff::AddAction(Action::ApiExpose {
                    method: HttpMethod::Get,
                    path: EndpointPath::new("/health")?,
                }),
                rationale: "add a health check endpoint".to_string(),
                category: "reliability".to_string(),
                priority: Priority::High,
            });
        }
        if !has_endpoint("/ping") {
            proposals.push(ProposedDiff {
                diff: IterationDiff::AddAction(Action::ApiExpose {
                    method: HttpMethod::Get,
                    path: EndpointPath::new("/ping")?,
                }),
                rationale: "add a ping endpoint".to_string(),
                category: "reliability".to_string(),
                priority: Priority::Low,
            });
        }

        if let Some(framework) = imp.framework.as_deref() {
            if let Some(required) = framework_language(framework) {
                if required != imp.language {
                    proposals.push(ProposedDiff {
                        diff: IterationDiff::SetLanguage(required.to_string()),
                        rationale: format!("{} runs on {}", framework, required),
                        category: "consistency".to_string(),
                        priority: Priority::High,
                    });
                }
            }
        } else if imp.language == "python"
            && imp
                .actions
                .iter()
                .any(|a| matches!(a, Action::ApiExpose { .. }))
        {
            proposals.push(ProposedDiff {
                diff: IterationDiff::SetFramework(Some("fastapi".to_string())),
                rationale: "serve the declared endpoints with fastapi".to_string(),
                category: "features".to_string(),
                priority: Priority::Medium,
            });
        }

        if let Some(focus) = focus {
            proposals.retain(|p| p.category.eq_ignore_ascii_case(focus));
        }
        proposals.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(proposals)
    }
}

/// Ask `advisor` for proposals; a failing advisor yields none.
pub async fn suggest_or_empty(
    advisor: &dyn Advisor,
    intent: &Intent,
    focus: Option<&str>,
) -> Vec<ProposedDiff> {
    match advisor.suggest(intent, focus).await {
        Ok(proposals) => {
            debug!(intent_id = %intent.id(), count = proposals.len(), "Advisor proposals");
            proposals
        }
        Err(e) => {
            warn!(intent_id = %intent.id(), error = %e, "Advisor failed, continuing without suggestions");
            Vec::new()
        }
    }
}

/// Outcome of applying a batch of proposals.
#[derive(Debug, Default)]
pub struct AppliedSuggestions {
    pub applied: Vec<IterationEntry>,
    pub rejected: Vec<(ProposedDiff, IterationError)>,
}

/// Apply proposals in order. A proposal that fails (e.g. an index that no
/// longer exists) is skipped and reported; the rest still apply.
pub fn apply_suggestions(intent: &mut Intent, proposals: Vec<ProposedDiff>) -> AppliedSuggestions {
    let mut outcome = AppliedSuggestions::default();
    for proposal in proposals {
        match iterate(intent, proposal.diff.clone(), DiffOrigin::Advisory) {
            Ok(entry) => outcome.applied.push(entry),
            Err(e) => outcome.rejected.push((proposal, e)),
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use amen_core::{IntentDraft, LifecycleState, parse_action};

    struct FailingAdvisor;

    #[async_trait]
    impl Advisor for FailingAdvisor {
        async fn suggest(
            &self,
            _intent: &Intent,
            _focus: Option<&str>,
        ) -> anyhow::Result<Vec<ProposedDiff>> {
            anyhow::bail!("service unavailable")
        }
    }

    fn intent(actions: &[&str]) -> Intent {
        Intent::draft(
            IntentDraft::new("svc", "test")
                .with_actions(actions.iter().map(|a| parse_action(a).unwrap()).collect()),
        )
    }

    #[tokio::test]
    async fn heuristic_proposes_health_and_ping() {
        let intent = intent(&["api.expose GET /users"]);
        let proposals = HeuristicAdvisor.suggest(&intent, None).await.unwrap();
        let diffs: Vec<String> = proposals.iter().map(|p| p.diff.to_string()).collect();
        assert_eq!(
            diffs,
            vec![
                "add 'api.expose GET /health'",
                "set framework to fastapi",
                "add 'api.expose GET /ping'",
            ]
        );
    }

    #[tokio::test]
    async fn focus_filters_by_category() {
        let intent = intent(&["api.expose GET /health"]);
        let proposals = HeuristicAdvisor
            .suggest(&intent, Some("reliability"))
            .await
            .unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].rationale, "add a ping endpoint");
    }

    #[tokio::test]
    async fn mismatched_framework_proposes_language() {
        let mut draft = IntentDraft::new("svc", "test");
        draft.implementation.framework = Some("express".to_string());
        let proposals = HeuristicAdvisor
            .suggest(&Intent::draft(draft), Some("consistency"))
            .await
            .unwrap();
        assert_eq!(
            proposals[0].diff,
            IterationDiff::SetLanguage("node".to_string())
        );
    }

    #[tokio::test]
    async fn failures_degrade_to_no_suggestions() {
        let intent = intent(&[]);
        assert!(suggest_or_empty(&FailingAdvisor, &intent, None).await.is_empty());
        assert!(suggest_or_empty(&NoopAdvisor, &intent, None).await.is_empty());
    }

    #[tokio::test]
    async fn applied_suggestions_are_advisory_iterations() {
        let mut intent = intent(&["api.expose GET /users"]);
        let mut proposals = HeuristicAdvisor.suggest(&intent, None).await.unwrap();
        proposals.push(ProposedDiff {
            diff: IterationDiff::RemoveAction(99),
            rationale: "stale".to_string(),
            category: "features".to_string(),
            priority: Priority::Low,
        });

        let outcome = apply_suggestions(&mut intent, proposals);
        assert_eq!(outcome.applied.len(), 3);
        assert_eq!(outcome.rejected.len(), 1);
        assert!(outcome
            .applied
            .iter()
            .all(|e| e.origin == DiffOrigin::Advisory));
        assert_eq!(intent.version(), 4);
        assert_eq!(intent.state(), LifecycleState::Draft);
        assert_eq!(intent.actions().len(), 3);
    }
}
