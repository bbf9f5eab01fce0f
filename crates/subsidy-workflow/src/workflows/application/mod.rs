//! Application workflow engine: state graph, gate evaluation, role gating, transition commits,
//! ministerial decisions, SLA monitoring, and the action-dispatch surface in front of them.

pub mod authorization;
pub mod decision;
pub mod domain;
pub mod engine;
pub mod gates;
pub mod graph;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod sla;

#[cfg(test)]
mod tests;

pub use authorization::{AuthorizationPolicy, GuardedAction};
pub use decision::{DecisionRequest, DECISION_STAGES, DECISION_STEP};
pub use domain::{
    Actor, ActorId, Application, ApplicationId, ApplicationStatusView, ApplicationStep,
    ArtifactStatus, DecisionType, PhotoCategory, Priority, Role, StepStatus, TransitionPayload,
    WorkflowState,
};
pub use engine::{NewApplication, TransitionEngine, TransitionError};
pub use gates::{GateEvaluator, GateRequirement, GateRequirementTable, GateVerdict};
pub use graph::StateGraph;
pub use memory::{InMemoryWorkflowStore, ManualClock, RecordingDispatcher, StoreFault};
pub use repository::{
    ApplicationSnapshot, Clock, DispatchError, DispatcherSet, EventDispatcher, StoreError,
    SystemClock, TracingDispatcher, TransitionCommit, WorkflowEvent, WorkflowStore,
};
pub use router::{actor_from_headers, workflow_router, ACTOR_ID_HEADER, ACTOR_ROLES_HEADER};
pub use service::{WorkflowCommand, WorkflowError, WorkflowResponse, WorkflowService};
pub use sla::{
    Alert, AlertFilter, AlertKind, AlertSeverity, PerformanceMetrics, SlaMonitor, SlaPolicy,
};
