use std::time::Duration;

use crate::workflows::application::domain::{
    Actor, ApplicationId, DecisionType, Role, StepStatus, TransitionPayload, WorkflowState,
};
use crate::workflows::application::engine::TransitionError;
use crate::workflows::application::memory::StoreFault;
use crate::workflows::application::repository::{
    StoreError, TransitionCommit, WorkflowEvent, WorkflowStore,
};
use crate::workflows::application::service::WorkflowError;
use crate::workflows::application::sla::SlaPolicy;

use super::common::{
    advance_to, amount, config, create, director, field_artifacts, harness, harness_with,
    minister, new_application, service_harness_with, staff,
};

#[tokio::test]
async fn creation_opens_a_draft_with_an_initial_step() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0001").await;

    assert_eq!(application.state, WorkflowState::Draft);
    assert!(application.id.0.starts_with("app-"));
    assert_eq!(application.sla_due_at, None);

    let steps = h.engine.steps(&application.id).await.expect("steps");
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].from_state, None);
    assert_eq!(steps[0].to_state, WorkflowState::Draft);
    assert_eq!(steps[0].status, StepStatus::Completed);
}

#[tokio::test]
async fn creation_rejects_blank_numbers_and_negative_amounts() {
    let h = harness();
    let mut blank = new_application("   ");
    match h.engine.create_application(blank.clone(), &staff()).await {
        Err(TransitionError::InvalidRequest(_)) => {}
        other => panic!("expected invalid request, got {other:?}"),
    }

    blank.application_number = "SUB-2025-0002".to_string();
    blank.requested_amount = amount(-1);
    match h.engine.create_application(blank, &staff()).await {
        Err(TransitionError::InvalidRequest(_)) => {}
        other => panic!("expected invalid request, got {other:?}"),
    }
}

#[tokio::test]
async fn legal_transition_updates_state_and_writes_step() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0010").await;

    let updated = h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::IntakeReview,
            &staff(),
            TransitionPayload::with_notes("submitted at front desk"),
        )
        .await
        .expect("transition succeeds");
    assert_eq!(updated.state, WorkflowState::IntakeReview);
    assert!(updated.sla_due_at.is_some());

    let steps = h.engine.steps(&application.id).await.expect("steps");
    let last = steps.last().expect("step written");
    assert_eq!(last.step_name, "INTAKE_REVIEW");
    assert_eq!(last.from_state, Some(WorkflowState::Draft));
    assert_eq!(last.notes.as_deref(), Some("submitted at front desk"));
    assert_eq!(last.actor_id, staff().id);

    assert!(h.events.events().iter().any(|event| matches!(
        event,
        WorkflowEvent::TransitionOccurred { to: WorkflowState::IntakeReview, .. }
    )));
}

#[tokio::test]
async fn illegal_transition_leaves_application_untouched() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0011").await;

    match h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::DirectorReview,
            &staff(),
            TransitionPayload::default(),
        )
        .await
    {
        Err(TransitionError::IllegalTransition { from, to }) => {
            assert_eq!(from, WorkflowState::Draft);
            assert_eq!(to, WorkflowState::DirectorReview);
        }
        other => panic!("expected illegal transition, got {other:?}"),
    }

    let stored = h.engine.get(&application.id).await.expect("stored");
    assert_eq!(stored, application);
    assert_eq!(h.engine.steps(&application.id).await.expect("steps").len(), 1);
}

#[tokio::test]
async fn unmet_gate_lists_reasons_and_writes_nothing() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0012").await;
    h.engine
        .request_transition(
            &application.id,
            WorkflowState::IntakeReview,
            &staff(),
            TransitionPayload::default(),
        )
        .await
        .expect("intake review");

    match h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::ControlAssign,
            &staff(),
            TransitionPayload::default(),
        )
        .await
    {
        Err(TransitionError::GateNotSatisfied { target, reasons }) => {
            assert_eq!(target, WorkflowState::ControlAssign);
            assert_eq!(reasons, vec!["required documents have not been verified"]);
        }
        other => panic!("expected gate failure, got {other:?}"),
    }

    let stored = h.engine.get(&application.id).await.expect("stored");
    assert_eq!(stored.state, WorkflowState::IntakeReview);
    assert_eq!(h.engine.steps(&application.id).await.expect("steps").len(), 2);
}

#[tokio::test]
async fn director_review_waits_for_both_reports() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0013").await;
    advance_to(&h.engine, &h.store, &application.id, WorkflowState::SocialReview).await;

    let mut artifacts = super::common::complete_artifacts();
    artifacts.technical_report_submitted = false;
    h.store
        .record_artifacts(&application.id, artifacts)
        .await
        .expect("artifacts");

    let verdict = h
        .engine
        .evaluate_gate(&application.id, WorkflowState::DirectorReview)
        .await
        .expect("verdict");
    assert!(!verdict.allowed);
    assert_eq!(verdict.reasons, vec!["technical report has not been submitted"]);
}

#[tokio::test]
async fn rejection_requires_authority_and_justification() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0014").await;

    match h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::Rejected,
            &staff(),
            TransitionPayload::with_notes("incomplete file"),
        )
        .await
    {
        Err(TransitionError::Unauthorized { actor, .. }) => assert_eq!(actor, staff().id),
        other => panic!("expected unauthorized, got {other:?}"),
    }

    match h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::Rejected,
            &director(),
            TransitionPayload::with_notes("   "),
        )
        .await
    {
        Err(TransitionError::MissingJustification { target }) => {
            assert_eq!(target, WorkflowState::Rejected)
        }
        other => panic!("expected missing justification, got {other:?}"),
    }

    let rejected = h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::Rejected,
            &Actor::new("admin-01", [Role::Administrator]),
            TransitionPayload::with_notes("duplicate of SUB-2025-0001"),
        )
        .await
        .expect("administrator may reject");
    assert_eq!(rejected.state, WorkflowState::Rejected);
    assert!(rejected.completed_at.is_some());
    assert_eq!(rejected.sla_due_at, None);
}

#[tokio::test]
async fn terminal_applications_refuse_further_transitions() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0015").await;
    h.engine
        .request_transition(
            &application.id,
            WorkflowState::Rejected,
            &minister(),
            TransitionPayload::with_notes("withdrawn by applicant"),
        )
        .await
        .expect("rejected");

    match h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::IntakeReview,
            &staff(),
            TransitionPayload::default(),
        )
        .await
    {
        Err(TransitionError::AlreadyTerminal { state, .. }) => {
            assert_eq!(state, WorkflowState::Rejected)
        }
        other => panic!("expected terminal error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_application_is_not_found() {
    let h = harness();
    let missing = ApplicationId("app-999999".to_string());
    match h
        .engine
        .request_transition(
            &missing,
            WorkflowState::IntakeReview,
            &staff(),
            TransitionPayload::default(),
        )
        .await
    {
        Err(TransitionError::ApplicationNotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(matches!(
        h.engine.steps(&missing).await,
        Err(TransitionError::ApplicationNotFound(_))
    ));
}

#[tokio::test]
async fn director_recommendation_is_role_gated_and_needs_amount_for_approval() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0016").await;
    advance_to(&h.engine, &h.store, &application.id, WorkflowState::DirectorReview).await;

    let approve = TransitionPayload {
        notes: Some("recommend approval".to_string()),
        amount: None,
        recommendation: Some(DecisionType::Approved),
    };
    match h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::MinisterDecision,
            &minister(),
            approve.clone(),
        )
        .await
    {
        Err(TransitionError::Unauthorized { .. }) => {}
        other => panic!("expected unauthorized, got {other:?}"),
    }

    match h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::MinisterDecision,
            &director(),
            approve.clone(),
        )
        .await
    {
        Err(TransitionError::InvalidRequest(_)) => {}
        other => panic!("expected invalid request, got {other:?}"),
    }

    let recommended = h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::MinisterDecision,
            &director(),
            TransitionPayload {
                amount: Some(amount(20_000)),
                ..approve
            },
        )
        .await
        .expect("recommendation accepted");
    assert_eq!(recommended.state, WorkflowState::MinisterDecision);

    let steps = h.engine.steps(&application.id).await.expect("steps");
    let last = steps.last().expect("step");
    assert_eq!(last.decision, Some(DecisionType::Approved));
    assert_eq!(last.amount, Some(amount(20_000)));
}

#[tokio::test]
async fn failed_step_insert_rolls_back_the_state_change() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0017").await;

    h.store.inject_fault(StoreFault::FailStepInsert);
    match h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::IntakeReview,
            &staff(),
            TransitionPayload::default(),
        )
        .await
    {
        Err(TransitionError::Storage(StoreError::Unavailable(_))) => {}
        other => panic!("expected storage failure, got {other:?}"),
    }
    h.store.clear_fault();

    let stored = h.engine.get(&application.id).await.expect("stored");
    assert_eq!(stored.state, WorkflowState::Draft);
    assert_eq!(h.engine.steps(&application.id).await.expect("steps").len(), 1);
    assert!(!h
        .events
        .events()
        .iter()
        .any(|event| matches!(event, WorkflowEvent::TransitionOccurred { .. })));

    h.engine
        .request_transition(
            &application.id,
            WorkflowState::IntakeReview,
            &staff(),
            TransitionPayload::default(),
        )
        .await
        .expect("retry succeeds once the store recovers");
}

#[tokio::test]
async fn slow_store_surfaces_a_retryable_timeout() {
    let mut settings = config();
    settings.storage_timeout = Duration::from_millis(20);
    let h = harness_with(settings);
    let application = create(&h.engine, "SUB-2025-0018").await;

    h.store.inject_fault(StoreFault::Latency(Duration::from_millis(200)));
    let err = h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::IntakeReview,
            &staff(),
            TransitionPayload::default(),
        )
        .await
        .expect_err("timeout expected");
    assert_eq!(err, TransitionError::StorageTimeout);
    assert!(err.is_retryable());

    h.store.clear_fault();
    let stored = h.engine.get(&application.id).await.expect("stored");
    assert_eq!(stored.state, WorkflowState::Draft);
}

#[tokio::test]
async fn stalled_artifact_writes_time_out() {
    let mut settings = config();
    settings.storage_timeout = Duration::from_millis(20);
    let h = service_harness_with(settings, SlaPolicy::standard());
    let application = h
        .service
        .create_application(new_application("SUB-2025-0024"), &staff())
        .await
        .expect("created");

    h.store.inject_fault(StoreFault::Latency(Duration::from_millis(200)));
    let err = h
        .service
        .update_artifacts(&application.id, field_artifacts())
        .await
        .expect_err("timeout expected");
    h.store.clear_fault();

    match err {
        WorkflowError::Transition(TransitionError::StorageTimeout) => {}
        other => panic!("expected storage timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_transitions_on_one_application_do_not_both_apply() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0019").await;

    let clerk = staff();
    let head = director();
    h.store.inject_fault(StoreFault::Latency(Duration::from_millis(50)));
    let (first, second) = tokio::join!(
        h.engine.request_transition(
            &application.id,
            WorkflowState::IntakeReview,
            &clerk,
            TransitionPayload::default(),
        ),
        h.engine.request_transition(
            &application.id,
            WorkflowState::Rejected,
            &head,
            TransitionPayload::with_notes("ineligible"),
        ),
    );
    h.store.clear_fault();

    assert_eq!(first.expect("first wins").state, WorkflowState::IntakeReview);
    match second {
        Err(TransitionError::ConcurrentModification(id)) => assert_eq!(id, application.id),
        other => panic!("expected concurrent modification, got {other:?}"),
    }
    assert_eq!(h.engine.steps(&application.id).await.expect("steps").len(), 2);
}

#[tokio::test]
async fn stale_versions_are_refused_by_the_store() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0020").await;

    let snapshot = h
        .store
        .load(&application.id)
        .await
        .expect("load")
        .expect("present");
    h.store
        .record_artifacts(&application.id, field_artifacts())
        .await
        .expect("artifacts");

    let steps = h.engine.steps(&application.id).await.expect("steps");
    let commit = TransitionCommit {
        application_id: application.id.clone(),
        expected_version: snapshot.version,
        update: None,
        step: steps[0].clone(),
    };
    match h.store.commit(commit).await {
        Err(StoreError::VersionConflict { expected, found }) => {
            assert_eq!(expected, snapshot.version);
            assert_eq!(found, snapshot.version + 1);
        }
        other => panic!("expected version conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn entering_a_state_restarts_its_sla_timer() {
    let h = harness();
    let application = create(&h.engine, "SUB-2025-0021").await;
    h.clock.advance(chrono::Duration::hours(5));

    let intake = h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::IntakeReview,
            &staff(),
            TransitionPayload::default(),
        )
        .await
        .expect("intake review");
    assert_eq!(intake.state_entered_at, application.submitted_at + chrono::Duration::hours(5));
    assert_eq!(
        intake.sla_due_at,
        Some(intake.state_entered_at + chrono::Duration::hours(72))
    );

    h.store
        .record_artifacts(&application.id, field_artifacts())
        .await
        .expect("artifacts");
    h.clock.advance(chrono::Duration::hours(10));
    let assigned = h
        .engine
        .request_transition(
            &application.id,
            WorkflowState::ControlAssign,
            &staff(),
            TransitionPayload::default(),
        )
        .await
        .expect("control assignment");
    assert_eq!(
        assigned.sla_due_at,
        Some(assigned.state_entered_at + chrono::Duration::hours(48))
    );

    let steps = h.engine.steps(&application.id).await.expect("steps");
    assert!(steps
        .windows(2)
        .all(|pair| pair[0].completed_at <= pair[1].completed_at));
}
