use crate::workflows::application::domain::WorkflowState;
use crate::workflows::application::graph::StateGraph;

#[test]
fn rejection_is_reachable_from_every_open_state() {
    let graph = StateGraph::standard();
    for state in WorkflowState::ordered() {
        let expected = !state.is_terminal();
        assert_eq!(
            graph.is_legal(state, WorkflowState::Rejected),
            expected,
            "rejection edge from {state}"
        );
    }
}

#[test]
fn terminal_states_have_no_successors() {
    let graph = StateGraph::standard();
    assert!(graph.successors(WorkflowState::Closure).is_empty());
    assert!(graph.successors(WorkflowState::Rejected).is_empty());
}

#[test]
fn control_splits_into_parallel_reviews_that_join_at_director() {
    let graph = StateGraph::standard();
    let after_control = graph.successors(WorkflowState::ControlInProgress);
    assert!(after_control.contains(&WorkflowState::TechnicalReview));
    assert!(after_control.contains(&WorkflowState::SocialReview));

    assert!(graph.is_legal(WorkflowState::TechnicalReview, WorkflowState::DirectorReview));
    assert!(graph.is_legal(WorkflowState::SocialReview, WorkflowState::DirectorReview));
    assert!(!graph.is_legal(WorkflowState::TechnicalReview, WorkflowState::SocialReview));
}

#[test]
fn no_shortcuts_or_backward_edges() {
    let graph = StateGraph::standard();
    assert!(!graph.is_legal(WorkflowState::Draft, WorkflowState::Closure));
    assert!(!graph.is_legal(WorkflowState::IntakeReview, WorkflowState::DirectorReview));
    assert!(!graph.is_legal(WorkflowState::DirectorReview, WorkflowState::IntakeReview));
    assert!(!graph.is_legal(WorkflowState::Rejected, WorkflowState::Draft));

    for (from, to) in graph.edges() {
        assert_ne!(from, to, "self loop on {from}");
        assert!(!from.is_terminal(), "edge leaves terminal state {from}");
    }
}
