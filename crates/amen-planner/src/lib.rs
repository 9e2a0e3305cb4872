//! Dry-run planning for amen intents.
//!
//! [`plan`] simulates an intent without side effects and returns a
//! [`PlanResult`] with per-action effects, diagnostics, generated source, a
//! build descriptor and a resource estimate. [`Planner::plan_intent`] also
//! records the result on the intent, which moves it to Planned or back to
//! Draft.

pub mod advisor;
pub mod codegen;
pub mod descriptor;
pub mod simulator;

use amen_core::{Intent, PlanRecordError, PlanResult};
use tracing::info;

pub use advisor::{
    Advisor, AppliedSuggestions, HeuristicAdvisor, NoopAdvisor, Priority, ProposedDiff,
    apply_suggestions, suggest_or_empty,
};
pub use codegen::app_port;
pub use descriptor::{container_name, image_tag};
pub use simulator::plan;

/// Stateless planner front door.
#[derive(Debug, Clone, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Plan without recording.
    pub fn preview(&self, intent: &Intent) -> PlanResult {
        plan(intent)
    }

    /// Plan and record the result on `intent`.
    pub fn plan_intent<'a>(
        &self,
        intent: &'a mut Intent,
    ) -> Result<&'a PlanResult, PlanRecordError> {
        let result = plan(intent);
        info!(
            intent_id = %intent.id(),
            fingerprint = %result.fingerprint.short(),
            effects = result.effects.len(),
            errors = result.error_count(),
            warnings = result.warning_count(),
            "Plan produced"
        );
        intent.record_plan(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amen_core::{IntentDraft, LifecycleState, parse_action};

    #[test]
    fn plan_intent_records_and_transitions() {
        let mut intent = Intent::draft(IntentDraft::new("svc", "test").with_actions(vec![
            parse_action("db.create users").unwrap(),
            parse_action("api.expose GET /users").unwrap(),
        ]));
        let blocking = Planner::new().plan_intent(&mut intent).unwrap().blocking;
        assert!(!blocking);
        assert_eq!(intent.state(), LifecycleState::Planned);
        assert!(intent.is_plan_current());
    }

    #[test]
    fn blocking_plan_returns_to_draft() {
        let mut intent = Intent::draft(
            IntentDraft::new("svc", "test").with_actions(vec![parse_action("shell.exec").unwrap()]),
        );
        Planner::new().plan_intent(&mut intent).unwrap();
        assert_eq!(intent.state(), LifecycleState::Draft);
        assert!(intent.last_plan().unwrap().blocking);
    }
}
