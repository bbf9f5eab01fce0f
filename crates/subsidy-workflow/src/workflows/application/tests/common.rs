use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::application::domain::{
    Actor, Application, ApplicationId, ArtifactStatus, PhotoCategory, Priority, Role,
    TransitionPayload, WorkflowState,
};
use crate::workflows::application::engine::{NewApplication, TransitionEngine};
use crate::workflows::application::memory::{
    InMemoryWorkflowStore, ManualClock, RecordingDispatcher,
};
use crate::workflows::application::repository::WorkflowStore;
use crate::workflows::application::service::WorkflowService;
use crate::workflows::application::sla::SlaPolicy;

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn config() -> WorkflowConfig {
    WorkflowConfig {
        storage_timeout: Duration::from_millis(500),
        bottleneck_threshold: 3,
        ..WorkflowConfig::default()
    }
}

pub(super) fn staff() -> Actor {
    Actor::new("intake-01", [Role::IntakeStaff, Role::Controller])
}

pub(super) fn director() -> Actor {
    Actor::new("director-01", [Role::Director])
}

pub(super) fn minister() -> Actor {
    Actor::new("minister-01", [Role::Minister])
}

pub(super) fn amount(value: i64) -> Decimal {
    Decimal::from(value)
}

pub(super) fn complete_artifacts() -> ArtifactStatus {
    let photos: BTreeMap<PhotoCategory, u32> = [
        (PhotoCategory::FrontExterior, 1),
        (PhotoCategory::BackExterior, 1),
        (PhotoCategory::MainInterior, 2),
        (PhotoCategory::Utilities, 1),
    ]
    .into_iter()
    .collect();

    ArtifactStatus {
        documents_verified: true,
        controller_assigned: true,
        visit_scheduled: true,
        photos,
        technical_report_submitted: true,
        social_report_submitted: true,
    }
}

/// Artifacts that clear every gate up to, but not including, director review.
pub(super) fn field_artifacts() -> ArtifactStatus {
    ArtifactStatus {
        documents_verified: true,
        controller_assigned: true,
        visit_scheduled: true,
        ..ArtifactStatus::default()
    }
}

pub(super) struct Harness {
    pub(super) engine: TransitionEngine<InMemoryWorkflowStore>,
    pub(super) store: Arc<InMemoryWorkflowStore>,
    pub(super) events: RecordingDispatcher,
    pub(super) clock: ManualClock,
}

pub(super) fn harness() -> Harness {
    harness_with(config())
}

pub(super) fn harness_with(config: WorkflowConfig) -> Harness {
    let store = Arc::new(InMemoryWorkflowStore::default());
    let events = RecordingDispatcher::default();
    let clock = ManualClock::new(start());
    let engine = TransitionEngine::new(store.clone(), Arc::new(events.clone()), &config)
        .with_clock(Arc::new(clock.clone()));
    Harness {
        engine,
        store,
        events,
        clock,
    }
}

pub(super) struct ServiceHarness {
    pub(super) service: Arc<WorkflowService<InMemoryWorkflowStore>>,
    pub(super) store: Arc<InMemoryWorkflowStore>,
    pub(super) events: RecordingDispatcher,
    pub(super) clock: ManualClock,
}

pub(super) fn service_harness() -> ServiceHarness {
    service_harness_with(config(), SlaPolicy::standard())
}

pub(super) fn service_harness_with(config: WorkflowConfig, policy: SlaPolicy) -> ServiceHarness {
    let store = Arc::new(InMemoryWorkflowStore::default());
    let events = RecordingDispatcher::default();
    let clock = ManualClock::new(start());
    let service = WorkflowService::with_clock(
        store.clone(),
        Arc::new(events.clone()),
        &config,
        Arc::new(clock.clone()),
        policy,
    );
    ServiceHarness {
        service: Arc::new(service),
        store,
        events,
        clock,
    }
}

pub(super) fn new_application(number: &str) -> NewApplication {
    NewApplication {
        application_number: number.to_string(),
        requested_amount: amount(25_000),
        priority: Priority::NORMAL,
    }
}

pub(super) async fn create(
    engine: &TransitionEngine<InMemoryWorkflowStore>,
    number: &str,
) -> Application {
    engine
        .create_application(new_application(number), &staff())
        .await
        .expect("application created")
}

/// Forward path from DRAFT used to walk fixtures into later states. The social track is taken
/// instead of the technical one when SOCIAL_REVIEW is the destination.
const FORWARD_PATH: [WorkflowState; 7] = [
    WorkflowState::IntakeReview,
    WorkflowState::ControlAssign,
    WorkflowState::VisitScheduled,
    WorkflowState::ControlInProgress,
    WorkflowState::TechnicalReview,
    WorkflowState::DirectorReview,
    WorkflowState::MinisterDecision,
];

/// Satisfy every gate and walk the application forward until it sits in `target`.
pub(super) async fn advance_to(
    engine: &TransitionEngine<InMemoryWorkflowStore>,
    store: &InMemoryWorkflowStore,
    id: &ApplicationId,
    target: WorkflowState,
) -> Application {
    store
        .record_artifacts(id, complete_artifacts())
        .await
        .expect("artifacts recorded");

    let mut current = engine.get(id).await.expect("application exists");
    for mut state in FORWARD_PATH {
        if state == WorkflowState::TechnicalReview && target == WorkflowState::SocialReview {
            state = WorkflowState::SocialReview;
        }
        if current.state == target {
            break;
        }
        let (actor, payload) = if state == WorkflowState::MinisterDecision {
            (director(), TransitionPayload::with_notes("recommend approval"))
        } else {
            (staff(), TransitionPayload::default())
        };
        current = engine
            .request_transition(id, state, &actor, payload)
            .await
            .unwrap_or_else(|err| panic!("transition to {state} failed: {err}"));
    }
    assert_eq!(current.state, target, "fixture path does not reach {target}");
    current
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
