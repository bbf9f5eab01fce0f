use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::super::domain::WorkflowState;

/// Maximum dwell time per state. States without an entry are not monitored.
#[derive(Debug, Clone)]
pub struct SlaPolicy {
    limits: BTreeMap<WorkflowState, Duration>,
}

impl SlaPolicy {
    pub fn standard() -> Self {
        use WorkflowState::*;

        let limits = [
            (IntakeReview, Duration::hours(72)),
            (ControlAssign, Duration::hours(48)),
            (VisitScheduled, Duration::days(7)),
            (ControlInProgress, Duration::days(5)),
            (TechnicalReview, Duration::days(5)),
            (SocialReview, Duration::days(5)),
            (DirectorReview, Duration::hours(72)),
            (MinisterDecision, Duration::days(7)),
        ]
        .into_iter()
        .collect();

        Self { limits }
    }

    pub fn empty() -> Self {
        Self {
            limits: BTreeMap::new(),
        }
    }

    pub fn with_limit(mut self, state: WorkflowState, limit: Duration) -> Self {
        self.limits.insert(state, limit);
        self
    }

    pub fn limit_for(&self, state: WorkflowState) -> Option<Duration> {
        if state.is_terminal() {
            return None;
        }
        self.limits.get(&state).copied()
    }

    /// Deadline for an application entering `state` at `entered_at`.
    pub fn deadline(&self, state: WorkflowState, entered_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.limit_for(state).map(|limit| entered_at + limit)
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self::standard()
    }
}
