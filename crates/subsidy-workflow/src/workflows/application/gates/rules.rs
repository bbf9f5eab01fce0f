use super::super::domain::ArtifactStatus;
use super::requirements::GateRequirement;

/// Returns a human-readable reason when `requirement` is not met.
pub(crate) fn check(requirement: &GateRequirement, artifacts: &ArtifactStatus) -> Option<String> {
    match requirement {
        GateRequirement::DocumentsVerified if !artifacts.documents_verified => {
            Some("required documents have not been verified".to_string())
        }
        GateRequirement::ControllerAssigned if !artifacts.controller_assigned => {
            Some("no controller has been assigned".to_string())
        }
        GateRequirement::VisitScheduled if !artifacts.visit_scheduled => {
            Some("control visit has not been scheduled".to_string())
        }
        GateRequirement::TechnicalReportSubmitted if !artifacts.technical_report_submitted => {
            Some("technical report has not been submitted".to_string())
        }
        GateRequirement::SocialReportSubmitted if !artifacts.social_report_submitted => {
            Some("social report has not been submitted".to_string())
        }
        GateRequirement::PhotosInCategory { category, minimum } => {
            let found = artifacts.photo_count(*category);
            (found < *minimum).then(|| {
                format!(
                    "missing {} control photos ({found} of {minimum})",
                    category.label()
                )
            })
        }
        GateRequirement::TotalControlPhotos { minimum } => {
            let found = artifacts.total_photos();
            (found < u64::from(*minimum))
                .then(|| format!("insufficient control photos ({found} of {minimum})"))
        }
        _ => None,
    }
}
