use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use subsidy_workflow::config::AppConfig;
use subsidy_workflow::error::AppError;
use subsidy_workflow::telemetry;
use subsidy_workflow::workflows::application::{
    InMemoryWorkflowStore, TracingDispatcher, WorkflowService,
};
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryWorkflowStore::default());
    let workflow_service = Arc::new(WorkflowService::new(
        store,
        Arc::new(TracingDispatcher),
        &config.workflow,
    ));
    let scanner = workflow_service.spawn_monitor(&config.workflow);

    let app = with_workflow_routes(workflow_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        scan_interval = ?config.workflow.scan_interval,
        "subsidy workflow service ready"
    );

    let served = axum::serve(listener, app).await;
    scanner.abort();
    served?;
    Ok(())
}
