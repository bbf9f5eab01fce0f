use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for subsidy applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier supplied by the identity provider for the acting staff member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle stages of a subsidy application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Draft,
    IntakeReview,
    ControlAssign,
    VisitScheduled,
    ControlInProgress,
    TechnicalReview,
    SocialReview,
    DirectorReview,
    MinisterDecision,
    Closure,
    Rejected,
}

impl WorkflowState {
    pub const fn ordered() -> [Self; 11] {
        [
            Self::Draft,
            Self::IntakeReview,
            Self::ControlAssign,
            Self::VisitScheduled,
            Self::ControlInProgress,
            Self::TechnicalReview,
            Self::SocialReview,
            Self::DirectorReview,
            Self::MinisterDecision,
            Self::Closure,
            Self::Rejected,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::IntakeReview => "INTAKE_REVIEW",
            Self::ControlAssign => "CONTROL_ASSIGN",
            Self::VisitScheduled => "VISIT_SCHEDULED",
            Self::ControlInProgress => "CONTROL_IN_PROGRESS",
            Self::TechnicalReview => "TECHNICAL_REVIEW",
            Self::SocialReview => "SOCIAL_REVIEW",
            Self::DirectorReview => "DIRECTOR_REVIEW",
            Self::MinisterDecision => "MINISTER_DECISION",
            Self::Closure => "CLOSURE",
            Self::Rejected => "REJECTED",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::IntakeReview => "Intake review",
            Self::ControlAssign => "Control assignment",
            Self::VisitScheduled => "Visit scheduled",
            Self::ControlInProgress => "Control in progress",
            Self::TechnicalReview => "Technical review",
            Self::SocialReview => "Social review",
            Self::DirectorReview => "Director review",
            Self::MinisterDecision => "Minister decision",
            Self::Closure => "Closure",
            Self::Rejected => "Rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closure | Self::Rejected)
    }

    /// Targets whose entry must carry a written justification.
    pub const fn requires_justification(self) -> bool {
        matches!(
            self,
            Self::MinisterDecision | Self::Closure | Self::Rejected
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal urgency; higher is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u8);

impl Priority {
    pub const LOW: Self = Self(1);
    pub const NORMAL: Self = Self(2);
    pub const HIGH: Self = Self(3);
    pub const URGENT: Self = Self(4);

    pub fn is_urgent(self) -> bool {
        self >= Self::URGENT
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// The case under review. Only the transition engine writes `state` and its timers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub application_number: String,
    pub state: WorkflowState,
    pub requested_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub priority: Priority,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub state_entered_at: DateTime<Utc>,
    pub sla_due_at: Option<DateTime<Utc>>,
}

impl Application {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn time_in_state(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.state_entered_at)
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id.clone(),
            application_number: self.application_number.clone(),
            state: self.state,
            state_label: self.state.label(),
            approved_amount: self.approved_amount,
            completed_at: self.completed_at,
            sla_due_at: self.sla_due_at,
        }
    }
}

/// Sanitized representation of an application exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub application_number: String,
    pub state: WorkflowState,
    pub state_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Completed,
    Pending,
}

/// Append-only audit record written for every committed transition or decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStep {
    pub application_id: ApplicationId,
    pub step_name: String,
    pub status: StepStatus,
    pub notes: Option<String>,
    pub actor_id: ActorId,
    pub from_state: Option<WorkflowState>,
    pub to_state: WorkflowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    pub completed_at: DateTime<Utc>,
}

/// Outcomes the minister (or the director, as a recommendation) can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    Approved,
    Rejected,
    ConditionalApproval,
    Deferred,
}

impl DecisionType {
    pub const fn implies_approval(self) -> bool {
        matches!(self, Self::Approved | Self::ConditionalApproval)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::ConditionalApproval => "CONDITIONAL_APPROVAL",
            Self::Deferred => "DEFERRED",
        }
    }
}

/// Control photo categories captured during the field inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoCategory {
    FrontExterior,
    BackExterior,
    MainInterior,
    Utilities,
    Kitchen,
    Bathroom,
    Roof,
    Other,
}

impl PhotoCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FrontExterior => "front exterior",
            Self::BackExterior => "back exterior",
            Self::MainInterior => "main interior",
            Self::Utilities => "utilities",
            Self::Kitchen => "kitchen",
            Self::Bathroom => "bathroom",
            Self::Roof => "roof",
            Self::Other => "other",
        }
    }
}

/// Completion signals reported by the document, photo, and report stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactStatus {
    pub documents_verified: bool,
    pub controller_assigned: bool,
    pub visit_scheduled: bool,
    pub photos: BTreeMap<PhotoCategory, u32>,
    pub technical_report_submitted: bool,
    pub social_report_submitted: bool,
}

impl ArtifactStatus {
    pub fn photo_count(&self, category: PhotoCategory) -> u32 {
        self.photos.get(&category).copied().unwrap_or(0)
    }

    /// Widened so request-supplied counts cannot overflow the total.
    pub fn total_photos(&self) -> u64 {
        self.photos.values().map(|count| u64::from(*count)).sum()
    }
}

/// Staff roles asserted by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    IntakeStaff,
    Controller,
    TechnicalReviewer,
    SocialReviewer,
    Director,
    Minister,
    Administrator,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "intake_staff" | "intake" => Some(Self::IntakeStaff),
            "controller" | "inspector" => Some(Self::Controller),
            "technical_reviewer" => Some(Self::TechnicalReviewer),
            "social_reviewer" => Some(Self::SocialReviewer),
            "director" => Some(Self::Director),
            "minister" => Some(Self::Minister),
            "administrator" | "admin" => Some(Self::Administrator),
            _ => None,
        }
    }
}

/// Capability object handed to every engine call in place of ambient session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub roles: BTreeSet<Role>,
}

impl Actor {
    pub fn new(id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            id: ActorId(id.into()),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }
}

/// Caller-supplied data accompanying a transition request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionPayload {
    pub notes: Option<String>,
    pub amount: Option<Decimal>,
    /// Director recommendation carried into MINISTER_DECISION.
    pub recommendation: Option<DecisionType>,
}

impl TransitionPayload {
    pub fn with_notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::default()
        }
    }

    /// Notes trimmed, `None` when missing or blank.
    pub fn justification(&self) -> Option<&str> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
    }
}
