use crate::workflows::application::domain::{ArtifactStatus, PhotoCategory, WorkflowState};
use crate::workflows::application::gates::{
    GateEvaluator, GateRequirement, GateRequirementTable,
};

use super::common::{complete_artifacts, field_artifacts};

#[test]
fn ungated_targets_always_pass() {
    let evaluator = GateEvaluator::default();
    let verdict = evaluator.evaluate(WorkflowState::IntakeReview, &ArtifactStatus::default());
    assert!(verdict.allowed);
    assert!(verdict.reasons.is_empty());
}

#[test]
fn control_assignment_requires_verified_documents() {
    let evaluator = GateEvaluator::default();
    let verdict = evaluator.evaluate(WorkflowState::ControlAssign, &ArtifactStatus::default());
    assert!(!verdict.allowed);
    assert_eq!(
        verdict.reasons,
        vec!["required documents have not been verified".to_string()]
    );
}

#[test]
fn director_review_reports_every_missing_artifact() {
    let evaluator = GateEvaluator::default();
    let verdict = evaluator.evaluate(WorkflowState::DirectorReview, &field_artifacts());

    assert!(!verdict.allowed);
    assert!(verdict
        .reasons
        .contains(&"technical report has not been submitted".to_string()));
    assert!(verdict
        .reasons
        .contains(&"social report has not been submitted".to_string()));
    assert!(verdict
        .reasons
        .contains(&"missing front exterior control photos (0 of 1)".to_string()));
    assert!(verdict
        .reasons
        .contains(&"insufficient control photos (0 of 4)".to_string()));
    assert_eq!(verdict.reasons.len(), 7);
}

#[test]
fn missing_social_report_alone_blocks_director_review() {
    let evaluator = GateEvaluator::default();
    let mut artifacts = complete_artifacts();
    artifacts.social_report_submitted = false;

    let verdict = evaluator.evaluate(WorkflowState::DirectorReview, &artifacts);
    assert!(!verdict.allowed);
    assert_eq!(
        verdict.reasons,
        vec!["social report has not been submitted".to_string()]
    );
}

#[test]
fn photo_total_counts_optional_categories() {
    let evaluator = GateEvaluator::new(GateRequirementTable::standard(6));
    let mut artifacts = complete_artifacts();
    assert_eq!(artifacts.total_photos(), 5);

    let verdict = evaluator.evaluate(WorkflowState::DirectorReview, &artifacts);
    assert_eq!(
        verdict.reasons,
        vec!["insufficient control photos (5 of 6)".to_string()]
    );

    artifacts.photos.insert(PhotoCategory::Kitchen, 1);
    assert!(evaluator
        .evaluate(WorkflowState::DirectorReview, &artifacts)
        .allowed);
}

#[test]
fn photo_total_does_not_overflow_on_huge_counts() {
    let evaluator = GateEvaluator::default();
    let mut artifacts = complete_artifacts();
    artifacts.photos.insert(PhotoCategory::FrontExterior, u32::MAX);
    artifacts.photos.insert(PhotoCategory::BackExterior, 2);

    assert_eq!(artifacts.total_photos(), u64::from(u32::MAX) + 5);
    let verdict = evaluator.evaluate(WorkflowState::DirectorReview, &artifacts);
    assert!(verdict.allowed, "unexpected reasons: {:?}", verdict.reasons);
}

#[test]
fn custom_tables_replace_a_target_checklist() {
    let table = GateRequirementTable::standard(4).with(
        WorkflowState::TechnicalReview,
        vec![GateRequirement::PhotosInCategory {
            category: PhotoCategory::Roof,
            minimum: 2,
        }],
    );
    let evaluator = GateEvaluator::new(table);

    let mut artifacts = ArtifactStatus::default();
    artifacts.photos.insert(PhotoCategory::Roof, 1);
    let verdict = evaluator.evaluate(WorkflowState::TechnicalReview, &artifacts);
    assert_eq!(
        verdict.reasons,
        vec!["missing roof control photos (1 of 2)".to_string()]
    );
}
