use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use super::authorization::{AuthorizationPolicy, GuardedAction};
use super::domain::{
    Actor, ActorId, Application, ApplicationId, ApplicationStep, ArtifactStatus, Priority,
    StepStatus, TransitionPayload, WorkflowState,
};
use super::gates::{GateEvaluator, GateRequirementTable, GateVerdict};
use super::graph::StateGraph;
use super::repository::{
    ApplicationSnapshot, Clock, EventDispatcher, StoreError, SystemClock, TransitionCommit,
    WorkflowEvent, WorkflowStore,
};
use super::sla::SlaPolicy;
use crate::config::WorkflowConfig;

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// Intake data for a new application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApplication {
    pub application_number: String,
    pub requested_amount: Decimal,
    #[serde(default)]
    pub priority: Priority,
}

/// Error raised by the transition engine and the decision recorder.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("application {id} is already in terminal state {state}")]
    AlreadyTerminal {
        id: ApplicationId,
        state: WorkflowState,
    },
    #[error("transition from {from} to {to} is not permitted")]
    IllegalTransition {
        from: WorkflowState,
        to: WorkflowState,
    },
    #[error("gate for {target} not satisfied: {}", .reasons.join("; "))]
    GateNotSatisfied {
        target: WorkflowState,
        reasons: Vec<String>,
    },
    #[error("a written justification is required for {target}")]
    MissingJustification { target: WorkflowState },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("actor {actor} is not permitted to {action}")]
    Unauthorized { actor: ActorId, action: &'static str },
    #[error("storage did not respond in time")]
    StorageTimeout,
    #[error("application {0} is being modified concurrently")]
    ConcurrentModification(ApplicationId),
    #[error(transparent)]
    Storage(StoreError),
}

impl TransitionError {
    /// True when the request did not apply and may be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransitionError::StorageTimeout | TransitionError::ConcurrentModification(_)
        )
    }

    pub(super) fn unauthorized(actor: &Actor, action: GuardedAction) -> Self {
        TransitionError::Unauthorized {
            actor: actor.id.clone(),
            action: action.label(),
        }
    }
}

/// Per-application exclusive slots; transitions on different applications never contend.
#[derive(Default)]
struct ApplicationLocks {
    slots: Mutex<HashMap<ApplicationId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ApplicationLocks {
    fn try_acquire(&self, id: &ApplicationId) -> Option<OwnedMutexGuard<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        let slot = slots.entry(id.clone()).or_default().clone();
        slot.try_lock_owned().ok()
    }
}

/// State machine core: validates, gates, and commits transitions with their audit steps.
pub struct TransitionEngine<S> {
    pub(super) store: Arc<S>,
    pub(super) graph: StateGraph,
    pub(super) gates: GateEvaluator,
    pub(super) authorization: AuthorizationPolicy,
    sla: SlaPolicy,
    dispatcher: Arc<dyn EventDispatcher>,
    clock: Arc<dyn Clock>,
    storage_timeout: Duration,
    locks: ApplicationLocks,
}

impl<S> TransitionEngine<S>
where
    S: WorkflowStore + 'static,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<dyn EventDispatcher>, config: &WorkflowConfig) -> Self {
        Self {
            store,
            graph: StateGraph::standard(),
            gates: GateEvaluator::new(GateRequirementTable::standard(
                config.minimum_control_photos,
            )),
            authorization: AuthorizationPolicy::standard(),
            sla: SlaPolicy::standard(),
            dispatcher,
            clock: Arc::new(SystemClock),
            storage_timeout: config.storage_timeout,
            locks: ApplicationLocks::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sla_policy(mut self, policy: SlaPolicy) -> Self {
        self.sla = policy;
        self
    }

    pub fn with_gates(mut self, gates: GateEvaluator) -> Self {
        self.gates = gates;
        self
    }

    /// Open a new application in DRAFT and write its first audit step.
    pub async fn create_application(
        &self,
        request: NewApplication,
        actor: &Actor,
    ) -> Result<Application, TransitionError> {
        let application_number = request.application_number.trim();
        if application_number.is_empty() {
            return Err(TransitionError::InvalidRequest(
                "application number is required".to_string(),
            ));
        }
        if request.requested_amount < Decimal::ZERO {
            return Err(TransitionError::InvalidRequest(
                "requested amount must not be negative".to_string(),
            ));
        }

        let now = self.clock.now();
        let id = next_application_id();
        let application = Application {
            id: id.clone(),
            application_number: application_number.to_string(),
            state: WorkflowState::Draft,
            requested_amount: request.requested_amount,
            approved_amount: None,
            priority: request.priority,
            submitted_at: now,
            completed_at: None,
            state_entered_at: now,
            sla_due_at: self.sla.deadline(WorkflowState::Draft, now),
        };
        let step = ApplicationStep {
            application_id: id.clone(),
            step_name: WorkflowState::Draft.as_str().to_string(),
            status: StepStatus::Completed,
            notes: None,
            actor_id: actor.id.clone(),
            from_state: None,
            to_state: WorkflowState::Draft,
            decision: None,
            amount: None,
            completed_at: now,
        };

        let stored = self
            .storage(&id, self.store.insert(application, step))
            .await?;
        info!(application_id = %stored.id, number = %stored.application_number, "application created");
        Ok(stored)
    }

    /// Move an application to `target`, enforcing graph, role, gate, and payload rules in order.
    ///
    /// Nothing is written unless every check passes; the state update and the audit step are
    /// committed together against the version the checks were evaluated on.
    pub async fn request_transition(
        &self,
        id: &ApplicationId,
        target: WorkflowState,
        actor: &Actor,
        payload: TransitionPayload,
    ) -> Result<Application, TransitionError> {
        let _slot = self.acquire(id)?;
        let snapshot = self.load_active(id).await?;
        let from = snapshot.application.state;

        if !self.graph.is_legal(from, target) {
            return Err(TransitionError::IllegalTransition { from, to: target });
        }
        self.authorization
            .check_transition(actor, target)
            .map_err(|action| TransitionError::unauthorized(actor, action))?;
        self.ensure_gate(id, target, &snapshot)?;
        validate_payload(target, &payload)?;

        let now = self.step_time(&snapshot.application);
        let mut application = snapshot.application.clone();
        self.enter_state(&mut application, target, now);
        if target == WorkflowState::Closure {
            application.approved_amount = payload.amount;
        }

        let step = ApplicationStep {
            application_id: id.clone(),
            step_name: target.as_str().to_string(),
            status: StepStatus::Completed,
            notes: payload.justification().map(str::to_string),
            actor_id: actor.id.clone(),
            from_state: Some(from),
            to_state: target,
            decision: payload.recommendation,
            amount: payload.amount,
            completed_at: now,
        };

        self.commit(&snapshot, Some(application.clone()), step).await?;
        info!(application_id = %id, %from, to = %target, actor = %actor.id, "transition committed");
        self.announce(WorkflowEvent::TransitionOccurred {
            application_id: id.clone(),
            from,
            to: target,
            actor_id: actor.id.clone(),
            at: now,
        });

        Ok(application)
    }

    /// Gate evaluation for `target` without attempting the transition.
    pub async fn evaluate_gate(
        &self,
        id: &ApplicationId,
        target: WorkflowState,
    ) -> Result<GateVerdict, TransitionError> {
        let snapshot = self
            .storage(id, self.store.load(id))
            .await?
            .ok_or_else(|| TransitionError::ApplicationNotFound(id.clone()))?;
        Ok(self.gates.evaluate(target, &snapshot.artifacts))
    }

    pub async fn get(&self, id: &ApplicationId) -> Result<Application, TransitionError> {
        let snapshot = self
            .storage(id, self.store.load(id))
            .await?
            .ok_or_else(|| TransitionError::ApplicationNotFound(id.clone()))?;
        Ok(snapshot.application)
    }

    /// Audit trail in commit order.
    pub async fn steps(&self, id: &ApplicationId) -> Result<Vec<ApplicationStep>, TransitionError> {
        let exists = self.storage(id, self.store.load(id)).await?.is_some();
        if !exists {
            return Err(TransitionError::ApplicationNotFound(id.clone()));
        }
        self.storage(id, self.store.steps(id)).await
    }

    pub(super) fn acquire(&self, id: &ApplicationId) -> Result<OwnedMutexGuard<()>, TransitionError> {
        self.locks
            .try_acquire(id)
            .ok_or_else(|| TransitionError::ConcurrentModification(id.clone()))
    }

    /// Load an application that exists and can still move.
    pub(super) async fn load_active(
        &self,
        id: &ApplicationId,
    ) -> Result<ApplicationSnapshot, TransitionError> {
        let snapshot = self
            .storage(id, self.store.load(id))
            .await?
            .ok_or_else(|| TransitionError::ApplicationNotFound(id.clone()))?;
        if snapshot.application.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                id: id.clone(),
                state: snapshot.application.state,
            });
        }
        Ok(snapshot)
    }

    pub(super) fn ensure_gate(
        &self,
        id: &ApplicationId,
        target: WorkflowState,
        snapshot: &ApplicationSnapshot,
    ) -> Result<(), TransitionError> {
        let verdict = self.gates.evaluate(target, &snapshot.artifacts);
        if verdict.allowed {
            return Ok(());
        }
        warn!(application_id = %id, %target, reasons = ?verdict.reasons, "gate not satisfied");
        Err(TransitionError::GateNotSatisfied {
            target,
            reasons: verdict.reasons,
        })
    }

    /// Current time, never earlier than the moment the application entered its state.
    pub(super) fn step_time(&self, application: &Application) -> DateTime<Utc> {
        self.clock.now().max(application.state_entered_at)
    }

    /// Apply the state change and restart (or clear) the SLA timer.
    pub(super) fn enter_state(
        &self,
        application: &mut Application,
        target: WorkflowState,
        now: DateTime<Utc>,
    ) {
        application.state = target;
        application.state_entered_at = now;
        application.sla_due_at = self.sla.deadline(target, now);
        application.completed_at = target.is_terminal().then_some(now);
    }

    pub(super) async fn commit(
        &self,
        snapshot: &ApplicationSnapshot,
        update: Option<Application>,
        step: ApplicationStep,
    ) -> Result<(), TransitionError> {
        let id = &snapshot.application.id;
        let commit = TransitionCommit {
            application_id: id.clone(),
            expected_version: snapshot.version,
            update,
            step,
        };
        self.storage(id, self.store.commit(commit)).await
    }

    /// Replace the artifact signals for `id` under the same storage deadline as transitions.
    pub async fn record_artifacts(
        &self,
        id: &ApplicationId,
        artifacts: ArtifactStatus,
    ) -> Result<(), TransitionError> {
        self.storage(id, self.store.record_artifacts(id, artifacts)).await?;
        debug!(application_id = %id, "artifacts recorded");
        Ok(())
    }

    pub(super) fn announce(&self, event: WorkflowEvent) {
        if let Err(err) = self.dispatcher.dispatch(&event) {
            warn!(%err, "workflow notification dropped");
        }
    }

    async fn storage<T, F>(&self, id: &ApplicationId, call: F) -> Result<T, TransitionError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.storage_timeout, call).await {
            Err(_) => Err(TransitionError::StorageTimeout),
            Ok(Ok(value)) => Ok(value),
            Ok(Err(StoreError::NotFound)) => Err(TransitionError::ApplicationNotFound(id.clone())),
            Ok(Err(StoreError::VersionConflict { .. })) => {
                Err(TransitionError::ConcurrentModification(id.clone()))
            }
            Ok(Err(err)) => Err(TransitionError::Storage(err)),
        }
    }
}

/// Justification and amount rules for decision-bearing targets.
fn validate_payload(
    target: WorkflowState,
    payload: &TransitionPayload,
) -> Result<(), TransitionError> {
    if target.requires_justification() && payload.justification().is_none() {
        return Err(TransitionError::MissingJustification { target });
    }

    let approval = match target {
        WorkflowState::Closure => true,
        WorkflowState::MinisterDecision => payload
            .recommendation
            .map_or(false, |decision| decision.implies_approval()),
        _ => false,
    };
    validate_amount(payload.amount, approval)
}

pub(super) fn validate_amount(
    amount: Option<Decimal>,
    approval: bool,
) -> Result<(), TransitionError> {
    match amount {
        Some(amount) if amount < Decimal::ZERO => Err(TransitionError::InvalidRequest(
            "amount must not be negative".to_string(),
        )),
        None if approval => Err(TransitionError::InvalidRequest(
            "an approved amount is required for approval".to_string(),
        )),
        _ => Ok(()),
    }
}
