use std::collections::BTreeMap;

use super::super::domain::{PhotoCategory, WorkflowState};

/// Photo categories that must each carry at least one control photo before director review.
pub const REQUIRED_CONTROL_PHOTOS: [PhotoCategory; 4] = [
    PhotoCategory::FrontExterior,
    PhotoCategory::BackExterior,
    PhotoCategory::MainInterior,
    PhotoCategory::Utilities,
];

/// Single precondition on the artifacts attached to an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRequirement {
    DocumentsVerified,
    ControllerAssigned,
    VisitScheduled,
    TechnicalReportSubmitted,
    SocialReportSubmitted,
    PhotosInCategory { category: PhotoCategory, minimum: u32 },
    TotalControlPhotos { minimum: u32 },
}

/// Per-target-state checklist. Targets without an entry carry no additional gate.
#[derive(Debug, Clone, Default)]
pub struct GateRequirementTable {
    entries: BTreeMap<WorkflowState, Vec<GateRequirement>>,
}

impl GateRequirementTable {
    pub fn standard(minimum_control_photos: u32) -> Self {
        let mut director_review = vec![
            GateRequirement::DocumentsVerified,
            GateRequirement::TechnicalReportSubmitted,
            GateRequirement::SocialReportSubmitted,
        ];
        director_review.extend(REQUIRED_CONTROL_PHOTOS.into_iter().map(|category| {
            GateRequirement::PhotosInCategory {
                category,
                minimum: 1,
            }
        }));
        director_review.push(GateRequirement::TotalControlPhotos {
            minimum: minimum_control_photos,
        });

        Self::default()
            .with(
                WorkflowState::ControlAssign,
                vec![GateRequirement::DocumentsVerified],
            )
            .with(
                WorkflowState::VisitScheduled,
                vec![GateRequirement::ControllerAssigned],
            )
            .with(
                WorkflowState::ControlInProgress,
                vec![GateRequirement::VisitScheduled],
            )
            .with(WorkflowState::DirectorReview, director_review)
    }

    pub fn with(mut self, target: WorkflowState, requirements: Vec<GateRequirement>) -> Self {
        self.entries.insert(target, requirements);
        self
    }

    pub fn requirements_for(&self, target: WorkflowState) -> &[GateRequirement] {
        self.entries
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
