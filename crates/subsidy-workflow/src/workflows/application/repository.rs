use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    ActorId, Application, ApplicationId, ApplicationStep, ArtifactStatus, DecisionType,
    WorkflowState,
};
use super::sla::Alert;

/// Application row together with the artifact signals and version read in the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSnapshot {
    pub application: Application,
    pub artifacts: ArtifactStatus,
    pub version: u64,
}

/// Unit of work applied atomically by the store.
///
/// `update` is absent only for audit-only entries such as deferred decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionCommit {
    pub application_id: ApplicationId,
    pub expected_version: u64,
    pub update: Option<Application>,
    pub step: ApplicationStep,
}

/// Storage abstraction so the engine and monitor can be exercised in isolation.
///
/// `commit` must apply the application update and the step insert together or not at all, and
/// must reject the commit when the stored version no longer matches `expected_version`.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert(
        &self,
        application: Application,
        step: ApplicationStep,
    ) -> Result<Application, StoreError>;
    async fn load(&self, id: &ApplicationId) -> Result<Option<ApplicationSnapshot>, StoreError>;
    async fn commit(&self, commit: TransitionCommit) -> Result<(), StoreError>;
    async fn record_artifacts(
        &self,
        id: &ApplicationId,
        artifacts: ArtifactStatus,
    ) -> Result<(), StoreError>;
    async fn steps(&self, id: &ApplicationId) -> Result<Vec<ApplicationStep>, StoreError>;
    /// Every application not yet in a terminal state.
    async fn active(&self) -> Result<Vec<Application>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record changed since it was read (expected version {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Events emitted to the notification dispatcher and in-process listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    TransitionOccurred {
        application_id: ApplicationId,
        from: WorkflowState,
        to: WorkflowState,
        actor_id: ActorId,
        at: DateTime<Utc>,
    },
    DecisionRecorded {
        application_id: ApplicationId,
        decision: DecisionType,
        actor_id: ActorId,
        at: DateTime<Utc>,
    },
    AlertRaised(Alert),
    AlertResolved {
        alert_id: String,
    },
}

/// Fire-and-forget outbound hook (e-mail, in-app notices, in-process listeners).
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event: &WorkflowEvent) -> Result<(), DispatchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch transport unavailable: {0}")]
    Transport(String),
}

/// Fans each event out to every registered dispatcher.
///
/// Every sink is attempted; the first failure is reported after the rest have run.
#[derive(Default, Clone)]
pub struct DispatcherSet {
    sinks: Vec<Arc<dyn EventDispatcher>>,
}

impl DispatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventDispatcher>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventDispatcher for DispatcherSet {
    fn dispatch(&self, event: &WorkflowEvent) -> Result<(), DispatchError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.dispatch(event) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Dispatcher that only writes events to the trace log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

impl EventDispatcher for TracingDispatcher {
    fn dispatch(&self, event: &WorkflowEvent) -> Result<(), DispatchError> {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(%payload, "workflow event"),
            Err(err) => tracing::warn!(%err, "workflow event could not be serialized"),
        }
        Ok(())
    }
}

/// Time source; swapped for a fixed clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
