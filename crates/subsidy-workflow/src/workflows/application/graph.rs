use super::domain::WorkflowState;

/// Directed transition graph between workflow states.
///
/// REJECTED is reachable from every non-terminal state. TECHNICAL_REVIEW and SOCIAL_REVIEW are
/// parallel tracks; the join into DIRECTOR_REVIEW is enforced by its gate, which requires both
/// reports regardless of which review state the application is parked in.
#[derive(Debug, Clone)]
pub struct StateGraph {
    edges: Vec<(WorkflowState, WorkflowState)>,
}

impl StateGraph {
    pub fn standard() -> Self {
        use WorkflowState::*;

        let mut edges = vec![
            (Draft, IntakeReview),
            (IntakeReview, ControlAssign),
            (ControlAssign, VisitScheduled),
            (VisitScheduled, ControlInProgress),
            (ControlInProgress, TechnicalReview),
            (ControlInProgress, SocialReview),
            (TechnicalReview, DirectorReview),
            (SocialReview, DirectorReview),
            (DirectorReview, MinisterDecision),
            (MinisterDecision, Closure),
        ];

        edges.extend(
            WorkflowState::ordered()
                .into_iter()
                .filter(|state| !state.is_terminal())
                .map(|state| (state, Rejected)),
        );

        Self { edges }
    }

    pub fn is_legal(&self, from: WorkflowState, to: WorkflowState) -> bool {
        self.edges.contains(&(from, to))
    }

    pub fn successors(&self, from: WorkflowState) -> Vec<WorkflowState> {
        self.edges
            .iter()
            .filter(|(source, _)| *source == from)
            .map(|(_, target)| *target)
            .collect()
    }

    pub fn edges(&self) -> &[(WorkflowState, WorkflowState)] {
        &self.edges
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::standard()
    }
}
