use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::workflows::application::domain::Role;
use crate::workflows::application::memory::InMemoryWorkflowStore;
use crate::workflows::application::router::{
    actor_from_headers, workflow_router, ACTOR_ID_HEADER, ACTOR_ROLES_HEADER,
};

use super::common::{new_application, read_json_body, service_harness, staff};

fn workflow_request(roles: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/workflow")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(roles) = roles {
        builder = builder
            .header(ACTOR_ID_HEADER, "staff-42")
            .header(ACTOR_ROLES_HEADER, roles);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[test]
fn actor_headers_parse_known_roles() {
    let mut headers = HeaderMap::new();
    headers.insert(ACTOR_ID_HEADER, HeaderValue::from_static(" director-7 "));
    headers.insert(
        ACTOR_ROLES_HEADER,
        HeaderValue::from_static("Director, admin, janitor"),
    );

    let actor = actor_from_headers(&headers).expect("actor");
    assert_eq!(actor.id.0, "director-7");
    assert!(actor.roles.contains(&Role::Director));
    assert!(actor.roles.contains(&Role::Administrator));
    assert_eq!(actor.roles.len(), 2);

    assert!(actor_from_headers(&HeaderMap::new()).is_none());
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let h = service_harness();
    let app = workflow_router(h.service.clone());

    let response = app
        .oneshot(workflow_request(None, json!({ "action": "run_sla_scan" })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn peripheral_actions_are_not_implemented() {
    let h = service_harness();
    let app = workflow_router(h.service.clone());

    let response = app
        .oneshot(workflow_request(
            Some("administrator"),
            json!({ "action": "generate_uat_report" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

    let body = read_json_body(response).await;
    assert_eq!(body["retryable"], json!(false));
}

#[tokio::test]
async fn unknown_or_missing_actions_are_bad_requests() {
    let h = service_harness();

    let response = workflow_router(h.service.clone())
        .oneshot(workflow_request(Some("intake"), json!({ "action": "teleport" })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    let message = body["error"].as_str().expect("error message");
    assert!(message.contains("'teleport'"), "unexpected message: {message}");

    let response = workflow_router(h.service.clone())
        .oneshot(workflow_request(Some("intake"), json!({ "target": "CLOSURE" })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gate_failures_report_their_reasons() {
    let h = service_harness();

    let created = workflow_router(h.service.clone())
        .oneshot(workflow_request(
            Some("intake"),
            json!({
                "action": "create_application",
                "application_number": "SUB-2025-0300",
                "requested_amount": "25000",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(created.status(), StatusCode::OK);
    let created = read_json_body(created).await;
    assert_eq!(created["state"], json!("DRAFT"));
    let id = created["application_id"]
        .as_str()
        .expect("application id")
        .to_string();

    let response = workflow_router(h.service.clone())
        .oneshot(workflow_request(
            Some("intake"),
            json!({
                "action": "transition_state",
                "application_id": id,
                "target_state": "INTAKE_REVIEW",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = workflow_router(h.service.clone())
        .oneshot(workflow_request(
            Some("intake"),
            json!({
                "action": "transition_state",
                "application_id": id,
                "target_state": "CONTROL_ASSIGN",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["target_state"], json!("CONTROL_ASSIGN"));
    assert_eq!(
        body["reasons"],
        json!(["required documents have not been verified"])
    );
}

#[tokio::test]
async fn status_and_steps_views_are_served() {
    let h = service_harness();
    let application = h
        .service
        .create_application(new_application("SUB-2025-0301"), &staff())
        .await
        .expect("created");

    let response = workflow_router(h.service.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/applications/{}", application.id))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["application_number"], json!("SUB-2025-0301"));
    assert_eq!(body["state_label"], json!("Draft"));

    let response = workflow_router(h.service.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/applications/{}/steps", application.id))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let response = workflow_router(h.service.clone())
        .oneshot(
            Request::builder()
                .uri("/api/v1/applications/app-404404")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn steps_handler_returns_not_found_for_unknown_application() {
    let h = service_harness();

    let response = crate::workflows::application::router::steps_handler::<InMemoryWorkflowStore>(
        State(h.service.clone()),
        Path("app-000000".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["retryable"], json!(false));
}
