use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::decision::DecisionRequest;
use super::domain::{
    Actor, Application, ApplicationId, ApplicationStatusView, ApplicationStep, ArtifactStatus,
    DecisionType, Priority, TransitionPayload, WorkflowState,
};
use super::engine::{NewApplication, TransitionEngine, TransitionError};
use super::repository::{Clock, DispatcherSet, EventDispatcher, WorkflowStore};
use super::sla::{
    Alert, AlertError, AlertFilter, MonitorError, MonitorSettings, PerformanceMetrics, SlaMonitor,
    SlaPolicy,
};
use crate::config::WorkflowConfig;

/// Actions outside the engine that the legacy endpoint still advertises.
pub const PERIPHERAL_ACTIONS: [&str; 5] = [
    "execute_uat_scenario",
    "generate_uat_report",
    "generate_documentation",
    "run_production_checks",
    "run_accessibility_audit",
];

/// Typed form of the `{action, ...params}` request body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowCommand {
    CreateApplication {
        application_number: String,
        requested_amount: Decimal,
        #[serde(default)]
        priority: Priority,
    },
    UpdateArtifacts {
        application_id: ApplicationId,
        artifacts: ArtifactStatus,
    },
    TransitionState {
        application_id: ApplicationId,
        target_state: WorkflowState,
        #[serde(default)]
        payload: TransitionPayload,
    },
    RecordDecision {
        application_id: ApplicationId,
        decision: DecisionType,
        notes: String,
        #[serde(default)]
        approved_amount: Option<Decimal>,
    },
    GetApplication {
        application_id: ApplicationId,
    },
    GetApplicationSteps {
        application_id: ApplicationId,
    },
    GetAlerts {
        #[serde(default)]
        filters: AlertFilter,
    },
    ResolveAlert {
        alert_id: String,
    },
    ResolveAllAlerts,
    RunSlaScan,
    GetSlaMetrics,
}

/// Result payload for each command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkflowResponse {
    Application(ApplicationStatusView),
    Step(ApplicationStep),
    Steps(Vec<ApplicationStep>),
    Alerts(Vec<Alert>),
    Alert(Alert),
    Resolved { resolved: usize },
    Metrics(PerformanceMetrics),
    Acknowledged { application_id: ApplicationId },
}

/// Error raised at the command boundary.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Alert(#[from] AlertError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

/// Facade composing the engine, the SLA monitor, and the artifact feed behind one command
/// handler.
pub struct WorkflowService<S> {
    store: Arc<S>,
    engine: TransitionEngine<S>,
    monitor: Arc<SlaMonitor<S>>,
}

impl<S> WorkflowService<S>
where
    S: WorkflowStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifications: Arc<dyn EventDispatcher>,
        config: &WorkflowConfig,
    ) -> Self {
        Self::build(store, notifications, config, None, SlaPolicy::standard())
    }

    /// Same wiring with an explicit clock and SLA table.
    pub fn with_clock(
        store: Arc<S>,
        notifications: Arc<dyn EventDispatcher>,
        config: &WorkflowConfig,
        clock: Arc<dyn Clock>,
        policy: SlaPolicy,
    ) -> Self {
        Self::build(store, notifications, config, Some(clock), policy)
    }

    fn build(
        store: Arc<S>,
        notifications: Arc<dyn EventDispatcher>,
        config: &WorkflowConfig,
        clock: Option<Arc<dyn Clock>>,
        policy: SlaPolicy,
    ) -> Self {
        let mut monitor = SlaMonitor::new(
            store.clone(),
            notifications.clone(),
            MonitorSettings::from(config),
        )
        .with_policy(policy.clone());
        if let Some(clock) = &clock {
            monitor = monitor.with_clock(clock.clone());
        }

        let dispatcher = DispatcherSet::new()
            .with(monitor.transition_listener())
            .with(notifications);
        let mut engine = TransitionEngine::new(store.clone(), Arc::new(dispatcher), config)
            .with_sla_policy(policy);
        if let Some(clock) = clock {
            engine = engine.with_clock(clock);
        }

        Self {
            store,
            engine,
            monitor: Arc::new(monitor),
        }
    }

    pub fn engine(&self) -> &TransitionEngine<S> {
        &self.engine
    }

    pub fn monitor(&self) -> &Arc<SlaMonitor<S>> {
        &self.monitor
    }

    /// Start the periodic SLA scan on the current runtime.
    pub fn spawn_monitor(&self, config: &WorkflowConfig) -> JoinHandle<()> {
        self.monitor.clone().spawn(config.scan_interval)
    }

    pub async fn create_application(
        &self,
        request: NewApplication,
        actor: &Actor,
    ) -> Result<Application, WorkflowError> {
        Ok(self.engine.create_application(request, actor).await?)
    }

    /// Artifact ingestion; the engine itself only ever reads these signals.
    pub async fn update_artifacts(
        &self,
        id: &ApplicationId,
        artifacts: ArtifactStatus,
    ) -> Result<(), WorkflowError> {
        Ok(self.engine.record_artifacts(id, artifacts).await?)
    }

    /// Single dispatch point for every typed command.
    pub async fn dispatch(
        &self,
        command: WorkflowCommand,
        actor: &Actor,
    ) -> Result<WorkflowResponse, WorkflowError> {
        match command {
            WorkflowCommand::CreateApplication {
                application_number,
                requested_amount,
                priority,
            } => {
                let request = NewApplication {
                    application_number,
                    requested_amount,
                    priority,
                };
                let application = self.create_application(request, actor).await?;
                Ok(WorkflowResponse::Application(application.status_view()))
            }
            WorkflowCommand::UpdateArtifacts {
                application_id,
                artifacts,
            } => {
                self.update_artifacts(&application_id, artifacts).await?;
                Ok(WorkflowResponse::Acknowledged { application_id })
            }
            WorkflowCommand::TransitionState {
                application_id,
                target_state,
                payload,
            } => {
                let application = self
                    .engine
                    .request_transition(&application_id, target_state, actor, payload)
                    .await?;
                Ok(WorkflowResponse::Application(application.status_view()))
            }
            WorkflowCommand::RecordDecision {
                application_id,
                decision,
                notes,
                approved_amount,
            } => {
                let request = DecisionRequest {
                    decision,
                    notes,
                    approved_amount,
                };
                let step = self
                    .engine
                    .record_decision(&application_id, actor, request)
                    .await?;
                Ok(WorkflowResponse::Step(step))
            }
            WorkflowCommand::GetApplication { application_id } => {
                let application = self.engine.get(&application_id).await?;
                Ok(WorkflowResponse::Application(application.status_view()))
            }
            WorkflowCommand::GetApplicationSteps { application_id } => {
                Ok(WorkflowResponse::Steps(self.engine.steps(&application_id).await?))
            }
            WorkflowCommand::GetAlerts { filters } => {
                Ok(WorkflowResponse::Alerts(self.monitor.alerts(&filters)))
            }
            WorkflowCommand::ResolveAlert { alert_id } => {
                Ok(WorkflowResponse::Alert(self.monitor.resolve_alert(&alert_id)?))
            }
            WorkflowCommand::ResolveAllAlerts => Ok(WorkflowResponse::Resolved {
                resolved: self.monitor.resolve_all(),
            }),
            WorkflowCommand::RunSlaScan => Ok(WorkflowResponse::Alerts(self.monitor.scan().await)),
            WorkflowCommand::GetSlaMetrics => {
                Ok(WorkflowResponse::Metrics(self.monitor.metrics().await?))
            }
        }
    }
}
