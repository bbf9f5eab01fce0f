use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use super::domain::{Actor, ApplicationId, Role};
use super::engine::TransitionError;
use super::repository::WorkflowStore;
use super::service::{
    WorkflowCommand, WorkflowError, WorkflowResponse, WorkflowService, PERIPHERAL_ACTIONS,
};
use super::sla::{AlertError, MonitorError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLES_HEADER: &str = "x-actor-roles";

/// Router exposing the action-dispatch endpoint and read-only application views.
pub fn workflow_router<S>(service: Arc<WorkflowService<S>>) -> Router
where
    S: WorkflowStore + 'static,
{
    Router::new()
        .route("/api/v1/workflow", post(dispatch_handler::<S>))
        .route(
            "/api/v1/applications/:application_id",
            get(status_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/steps",
            get(steps_handler::<S>),
        )
        .with_state(service)
}

/// Build the acting identity from the identity provider's forwarded claims.
pub fn actor_from_headers(headers: &HeaderMap) -> Option<Actor> {
    let id = headers
        .get(ACTOR_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())?;

    let roles: Vec<Role> = headers
        .get(ACTOR_ROLES_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|raw| raw.split(',').filter_map(Role::parse).collect())
        .unwrap_or_default();

    Some(Actor::new(id, roles))
}

pub(crate) async fn dispatch_handler<S>(
    State(service): State<Arc<WorkflowService<S>>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response
where
    S: WorkflowStore + 'static,
{
    let Some(actor) = actor_from_headers(&headers) else {
        return error_body(StatusCode::UNAUTHORIZED, "missing actor identity", false);
    };

    let Some(action) = body
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_owned)
    else {
        return error_body(StatusCode::BAD_REQUEST, "request body must name an action", false);
    };
    if PERIPHERAL_ACTIONS.contains(&action.as_str()) {
        return error_body(
            StatusCode::NOT_IMPLEMENTED,
            &format!("action '{action}' is not served by the workflow engine"),
            false,
        );
    }

    let command: WorkflowCommand = match serde_json::from_value(body) {
        Ok(command) => command,
        Err(err) => {
            return error_body(
                StatusCode::BAD_REQUEST,
                &format!("unsupported or malformed action '{action}': {err}"),
                false,
            )
        }
    };

    match service.dispatch(command, &actor).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<S>(
    State(service): State<Arc<WorkflowService<S>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: WorkflowStore + 'static,
{
    let id = ApplicationId(application_id);
    match service.engine().get(&id).await {
        Ok(application) => (
            StatusCode::OK,
            Json(WorkflowResponse::Application(application.status_view())),
        )
            .into_response(),
        Err(err) => error_response(err.into()),
    }
}

pub(crate) async fn steps_handler<S>(
    State(service): State<Arc<WorkflowService<S>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: WorkflowStore + 'static,
{
    let id = ApplicationId(application_id);
    match service.engine().steps(&id).await {
        Ok(steps) => (StatusCode::OK, Json(WorkflowResponse::Steps(steps))).into_response(),
        Err(err) => error_response(err.into()),
    }
}

/// HTTP status for a command-boundary failure; shared by every surface that renders one.
pub(crate) fn status_for(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Transition(transition) => match transition {
            TransitionError::ApplicationNotFound(_) => StatusCode::NOT_FOUND,
            TransitionError::AlreadyTerminal { .. }
            | TransitionError::IllegalTransition { .. }
            | TransitionError::ConcurrentModification(_) => StatusCode::CONFLICT,
            TransitionError::GateNotSatisfied { .. }
            | TransitionError::MissingJustification { .. }
            | TransitionError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TransitionError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            TransitionError::StorageTimeout => StatusCode::GATEWAY_TIMEOUT,
            TransitionError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        },
        WorkflowError::Alert(AlertError::NotFound(_)) => StatusCode::NOT_FOUND,
        WorkflowError::Monitor(MonitorError::StorageTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        WorkflowError::Monitor(MonitorError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn is_retryable(err: &WorkflowError) -> bool {
    match err {
        WorkflowError::Transition(transition) => transition.is_retryable(),
        WorkflowError::Alert(_) => false,
        WorkflowError::Monitor(_) => true,
    }
}

fn error_response(err: WorkflowError) -> Response {
    let status = status_for(&err);
    let message = err.to_string();
    if let WorkflowError::Transition(TransitionError::GateNotSatisfied { target, reasons }) = err {
        let payload = json!({
            "error": message,
            "target_state": target,
            "reasons": reasons,
            "retryable": false,
        });
        return (status, Json(payload)).into_response();
    }
    error_body(status, &message, is_retryable(&err))
}

fn error_body(status: StatusCode, message: &str, retryable: bool) -> Response {
    let payload = json!({
        "error": message,
        "retryable": retryable,
    });
    (status, Json(payload)).into_response()
}
