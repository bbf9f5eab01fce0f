use super::domain::{Actor, Role, WorkflowState};

/// Guarded action kinds, named for error messages and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedAction {
    Reject,
    RecommendDecision,
    Close,
    RecordDecision,
}

impl GuardedAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reject => "reject application",
            Self::RecommendDecision => "submit director recommendation",
            Self::Close => "close application",
            Self::RecordDecision => "record ministerial decision",
        }
    }
}

/// Role gating for transitions that carry authority rather than document completeness.
///
/// Forward edges not listed here are open to any authenticated actor.
#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    rejection: Vec<Role>,
    recommendation: Vec<Role>,
    decision: Vec<Role>,
}

impl AuthorizationPolicy {
    pub fn standard() -> Self {
        Self {
            rejection: vec![Role::Director, Role::Minister, Role::Administrator],
            recommendation: vec![Role::Director],
            decision: vec![Role::Minister],
        }
    }

    /// Returns the action that `actor` is not permitted to perform, if any.
    pub fn check_transition(&self, actor: &Actor, target: WorkflowState) -> Result<(), GuardedAction> {
        match target {
            WorkflowState::Rejected => require(actor, &self.rejection, GuardedAction::Reject),
            WorkflowState::MinisterDecision => require(
                actor,
                &self.recommendation,
                GuardedAction::RecommendDecision,
            ),
            WorkflowState::Closure => require(actor, &self.decision, GuardedAction::Close),
            _ => Ok(()),
        }
    }

    pub fn check_decision(&self, actor: &Actor) -> Result<(), GuardedAction> {
        require(actor, &self.decision, GuardedAction::RecordDecision)
    }
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

fn require(actor: &Actor, roles: &[Role], action: GuardedAction) -> Result<(), GuardedAction> {
    if actor.has_any(roles) {
        Ok(())
    } else {
        Err(action)
    }
}
