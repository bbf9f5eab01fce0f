use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use subsidy_workflow::config::WorkflowConfig;
use subsidy_workflow::error::AppError;
use subsidy_workflow::workflows::application::{
    Actor, Application, ApplicationId, ArtifactStatus, DispatcherSet, InMemoryWorkflowStore,
    ManualClock, NewApplication, PhotoCategory, Priority, RecordingDispatcher, Role, SlaPolicy,
    TracingDispatcher, TransitionPayload, WorkflowService, WorkflowState,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local workflow driven by a hand-advanced clock, used by the `scan` and `demo` commands.
pub(crate) struct Sandbox {
    pub(crate) service: WorkflowService<InMemoryWorkflowStore>,
    pub(crate) events: RecordingDispatcher,
    pub(crate) clock: ManualClock,
}

impl Sandbox {
    pub(crate) fn new(config: &WorkflowConfig) -> Self {
        let store = Arc::new(InMemoryWorkflowStore::default());
        let events = RecordingDispatcher::default();
        let clock = ManualClock::new(Utc::now());
        let notifications = DispatcherSet::new()
            .with(Arc::new(events.clone()))
            .with(Arc::new(TracingDispatcher));

        let service = WorkflowService::with_clock(
            store,
            Arc::new(notifications),
            config,
            Arc::new(clock.clone()),
            SlaPolicy::standard(),
        );
        Self {
            service,
            events,
            clock,
        }
    }
}

pub(crate) fn clerk() -> Actor {
    Actor::new("intake-clerk", [Role::IntakeStaff, Role::Controller])
}

pub(crate) fn director() -> Actor {
    Actor::new("housing-director", [Role::Director])
}

pub(crate) fn minister() -> Actor {
    Actor::new("housing-minister", [Role::Minister])
}

/// Field work done: documents checked, controller assigned, visit booked.
pub(crate) fn field_work() -> ArtifactStatus {
    ArtifactStatus {
        documents_verified: true,
        controller_assigned: true,
        visit_scheduled: true,
        ..ArtifactStatus::default()
    }
}

/// Everything director review asks for.
pub(crate) fn review_ready() -> ArtifactStatus {
    let photos: BTreeMap<PhotoCategory, u32> = [
        (PhotoCategory::FrontExterior, 1),
        (PhotoCategory::BackExterior, 1),
        (PhotoCategory::MainInterior, 1),
        (PhotoCategory::Utilities, 1),
    ]
    .into_iter()
    .collect();

    ArtifactStatus {
        photos,
        technical_report_submitted: true,
        social_report_submitted: true,
        ..field_work()
    }
}

const FORWARD_PATH: [WorkflowState; 7] = [
    WorkflowState::Draft,
    WorkflowState::IntakeReview,
    WorkflowState::ControlAssign,
    WorkflowState::VisitScheduled,
    WorkflowState::ControlInProgress,
    WorkflowState::TechnicalReview,
    WorkflowState::DirectorReview,
];

/// Move an application along the forward path, from wherever it sits, until it reaches `target`.
pub(crate) async fn walk_to(
    service: &WorkflowService<InMemoryWorkflowStore>,
    id: &ApplicationId,
    target: WorkflowState,
) -> Result<Application, AppError> {
    let mut current = service.engine().get(id).await?;
    let remaining: Vec<WorkflowState> = FORWARD_PATH
        .into_iter()
        .skip_while(|state| *state != current.state)
        .skip(1)
        .collect();

    for state in remaining {
        if current.state == target {
            break;
        }
        current = service
            .engine()
            .request_transition(id, state, &clerk(), TransitionPayload::default())
            .await?;
    }
    Ok(current)
}

/// Stage `count` applications across intake, control assignment, and director review.
pub(crate) async fn seed_backlog(
    sandbox: &Sandbox,
    count: usize,
) -> Result<Vec<Application>, AppError> {
    const STAGES: [WorkflowState; 3] = [
        WorkflowState::IntakeReview,
        WorkflowState::ControlAssign,
        WorkflowState::DirectorReview,
    ];

    let mut seeded = Vec::with_capacity(count);
    for index in 0..count {
        let request = NewApplication {
            application_number: format!("SUB-SEED-{:04}", index + 1),
            requested_amount: Decimal::from(15_000 + 2_500 * index as i64),
            priority: if index % 4 == 0 {
                Priority::URGENT
            } else {
                Priority::NORMAL
            },
        };
        let application = sandbox.service.create_application(request, &clerk()).await?;
        sandbox
            .service
            .update_artifacts(&application.id, review_ready())
            .await?;
        let staged = walk_to(&sandbox.service, &application.id, STAGES[index % STAGES.len()]).await?;
        seeded.push(staged);
    }
    Ok(seeded)
}
