use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    Actor, ApplicationId, ApplicationStep, DecisionType, StepStatus, WorkflowState,
};
use super::engine::{validate_amount, TransitionEngine, TransitionError};
use super::repository::{WorkflowEvent, WorkflowStore};

/// Audit step name written for every ministerial decision.
pub const DECISION_STEP: &str = "MINISTER_DECISION";

/// States from which a ministerial decision may be recorded.
pub const DECISION_STAGES: [WorkflowState; 2] =
    [WorkflowState::DirectorReview, WorkflowState::MinisterDecision];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub decision: DecisionType,
    pub notes: String,
    #[serde(default)]
    pub approved_amount: Option<Decimal>,
}

impl DecisionType {
    /// Terminal state a decision leads to; `None` keeps the application where it is.
    pub const fn target_state(self) -> Option<WorkflowState> {
        match self {
            DecisionType::Approved | DecisionType::ConditionalApproval => {
                Some(WorkflowState::Closure)
            }
            DecisionType::Rejected => Some(WorkflowState::Rejected),
            DecisionType::Deferred => None,
        }
    }
}

impl<S> TransitionEngine<S>
where
    S: WorkflowStore + 'static,
{
    /// Record the ministerial decision on an application awaiting one.
    ///
    /// Approvals close the application with the approved amount, rejections end it, and a
    /// deferral writes a pending audit step while leaving the state untouched.
    pub async fn record_decision(
        &self,
        id: &ApplicationId,
        actor: &Actor,
        request: DecisionRequest,
    ) -> Result<ApplicationStep, TransitionError> {
        let _slot = self.acquire(id)?;
        let snapshot = self.load_active(id).await?;
        let from = snapshot.application.state;
        let target = request.decision.target_state();

        if !DECISION_STAGES.contains(&from) {
            return Err(TransitionError::IllegalTransition {
                from,
                to: target.unwrap_or(WorkflowState::MinisterDecision),
            });
        }
        self.authorization
            .check_decision(actor)
            .map_err(|action| TransitionError::unauthorized(actor, action))?;
        if let Some(target) = target {
            self.ensure_gate(id, target, &snapshot)?;
        }

        let notes = request.notes.trim();
        if notes.is_empty() {
            return Err(TransitionError::MissingJustification {
                target: target.unwrap_or(from),
            });
        }
        let approval = request.decision.implies_approval();
        validate_amount(request.approved_amount, approval)?;
        let amount = if approval {
            request.approved_amount
        } else {
            None
        };

        let now = self.step_time(&snapshot.application);
        let update = target.map(|target| {
            let mut application = snapshot.application.clone();
            self.enter_state(&mut application, target, now);
            application.approved_amount = amount;
            application
        });

        let step = ApplicationStep {
            application_id: id.clone(),
            step_name: DECISION_STEP.to_string(),
            status: if target.is_some() {
                StepStatus::Completed
            } else {
                StepStatus::Pending
            },
            notes: Some(notes.to_string()),
            actor_id: actor.id.clone(),
            from_state: Some(from),
            to_state: target.unwrap_or(from),
            decision: Some(request.decision),
            amount,
            completed_at: now,
        };

        self.commit(&snapshot, update, step.clone()).await?;
        info!(
            application_id = %id,
            decision = request.decision.as_str(),
            actor = %actor.id,
            "decision recorded"
        );

        self.announce(WorkflowEvent::DecisionRecorded {
            application_id: id.clone(),
            decision: request.decision,
            actor_id: actor.id.clone(),
            at: now,
        });
        if let Some(target) = target {
            self.announce(WorkflowEvent::TransitionOccurred {
                application_id: id.clone(),
                from,
                to: target,
                actor_id: actor.id.clone(),
                at: now,
            });
        }

        Ok(step)
    }
}
