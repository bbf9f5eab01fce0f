use crate::infra::{
    clerk, director, field_work, minister, review_ready, seed_backlog, walk_to, Sandbox,
};
use clap::Args;
use rust_decimal::Decimal;
use subsidy_workflow::config::AppConfig;
use subsidy_workflow::error::AppError;
use subsidy_workflow::workflows::application::{
    Alert, AlertFilter, ApplicationId, DecisionType, NewApplication, PerformanceMetrics,
    Priority, TransitionError, TransitionPayload, WorkflowCommand, WorkflowError, WorkflowEvent,
    WorkflowResponse, WorkflowState,
};

#[derive(Args, Debug)]
pub(crate) struct ScanArgs {
    /// Number of applications to seed before scanning
    #[arg(long, default_value_t = 6)]
    pub(crate) applications: usize,
    /// Hours to fast-forward between seeding and scanning
    #[arg(long, default_value_t = 96)]
    pub(crate) elapsed_hours: i64,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Amount requested on the demo application
    #[arg(long, default_value = "25000")]
    pub(crate) requested_amount: Decimal,
    /// Amount granted by the ministerial decision
    #[arg(long, default_value = "20000")]
    pub(crate) approved_amount: Decimal,
    /// Stop at director review instead of recording a decision
    #[arg(long)]
    pub(crate) skip_decision: bool,
}

pub(crate) async fn run_scan(args: ScanArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let sandbox = Sandbox::new(&config.workflow);

    let seeded = seed_backlog(&sandbox, args.applications).await?;
    println!("Seeded {} applications", seeded.len());
    for application in &seeded {
        println!(
            "- {} [{}] {} (priority {})",
            application.application_number,
            application.id,
            application.state.label(),
            application.priority.0
        );
    }

    sandbox
        .clock
        .advance(chrono::Duration::hours(args.elapsed_hours));
    println!("\nFast-forwarded {}h; running SLA scan", args.elapsed_hours);

    match sandbox
        .service
        .dispatch(WorkflowCommand::RunSlaScan, &clerk())
        .await?
    {
        WorkflowResponse::Alerts(alerts) => render_alerts(&alerts),
        other => println!("unexpected scan response: {other:?}"),
    }

    let metrics = sandbox
        .service
        .monitor()
        .metrics()
        .await
        .map_err(WorkflowError::from)?;
    render_metrics(&metrics);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let sandbox = Sandbox::new(&config.workflow);
    let service = &sandbox.service;

    println!("Housing subsidy workflow demo");
    let application = service
        .create_application(
            NewApplication {
                application_number: "SUB-DEMO-0001".to_string(),
                requested_amount: args.requested_amount,
                priority: Priority::NORMAL,
            },
            &clerk(),
        )
        .await?;
    let id = application.id.clone();
    println!(
        "- Opened {} ({}) requesting {}",
        application.application_number, id, application.requested_amount
    );

    let intake = service
        .engine()
        .request_transition(
            &id,
            WorkflowState::IntakeReview,
            &clerk(),
            TransitionPayload::with_notes("file received at the front desk"),
        )
        .await?;
    println!("- {} (SLA due {:?})", intake.state.label(), intake.sla_due_at);

    let verdict = service
        .engine()
        .evaluate_gate(&id, WorkflowState::DirectorReview)
        .await?;
    println!("- Director review gate before field work:");
    for reason in &verdict.reasons {
        println!("    x {reason}");
    }

    service.update_artifacts(&id, field_work()).await?;
    sandbox.clock.advance(chrono::Duration::hours(20));
    let in_review = walk_to(service, &id, WorkflowState::TechnicalReview).await?;
    println!("- Field control complete; now in {}", in_review.state.label());

    match service
        .engine()
        .request_transition(
            &id,
            WorkflowState::DirectorReview,
            &clerk(),
            TransitionPayload::default(),
        )
        .await
    {
        Err(TransitionError::GateNotSatisfied { reasons, .. }) => {
            println!("- Director review refused ({} open items)", reasons.len());
        }
        Err(err) => return Err(err.into()),
        Ok(_) => println!("- Director review unexpectedly opened before reports were filed"),
    }

    service.update_artifacts(&id, review_ready()).await?;
    sandbox.clock.advance(chrono::Duration::hours(30));
    let reviewed = service
        .engine()
        .request_transition(
            &id,
            WorkflowState::DirectorReview,
            &clerk(),
            TransitionPayload::default(),
        )
        .await?;
    println!("- Reports and photos filed; now in {}", reviewed.state.label());

    if args.skip_decision {
        return render_trail(&sandbox, &id).await;
    }

    service
        .engine()
        .request_transition(
            &id,
            WorkflowState::MinisterDecision,
            &director(),
            TransitionPayload {
                notes: Some("household meets the eligibility criteria".to_string()),
                amount: Some(args.approved_amount),
                recommendation: Some(DecisionType::Approved),
            },
        )
        .await?;
    println!("- Director recommended approval of {}", args.approved_amount);

    let response = service
        .dispatch(
            WorkflowCommand::RecordDecision {
                application_id: id.clone(),
                decision: DecisionType::Approved,
                notes: "meets criteria".to_string(),
                approved_amount: Some(args.approved_amount),
            },
            &minister(),
        )
        .await?;
    if let WorkflowResponse::Step(step) = response {
        println!(
            "- Minister recorded {} -> {}",
            step.decision.map_or("no decision", DecisionType::as_str),
            step.to_state.label()
        );
    }

    let closed = service.engine().get(&id).await?;
    println!(
        "- Final state {} | approved {} | completed {:?}",
        closed.state.label(),
        closed
            .approved_amount
            .map_or_else(|| "n/a".to_string(), |amount| amount.to_string()),
        closed.completed_at
    );

    render_trail(&sandbox, &id).await
}

async fn render_trail(sandbox: &Sandbox, id: &ApplicationId) -> Result<(), AppError> {
    println!("\nAudit trail");
    for step in sandbox.service.engine().steps(id).await? {
        println!(
            "  {} | {} -> {} | {} | {}",
            step.completed_at.format("%Y-%m-%d %H:%M"),
            step.from_state.map_or("-", WorkflowState::as_str),
            step.to_state,
            step.actor_id,
            step.notes.as_deref().unwrap_or("")
        );
    }

    let transitions = sandbox
        .events
        .events()
        .iter()
        .filter(|event| matches!(event, WorkflowEvent::TransitionOccurred { .. }))
        .count();
    println!("{transitions} transition notifications dispatched");

    let open = sandbox.service.monitor().alerts(&AlertFilter {
        resolved: Some(false),
        limit: None,
    });
    println!("{} open alerts", open.len());
    Ok(())
}

fn render_alerts(alerts: &[Alert]) {
    if alerts.is_empty() {
        println!("No open alerts");
        return;
    }
    println!("Open alerts ({})", alerts.len());
    for alert in alerts {
        println!(
            "- {} {:?}/{:?}: {}",
            alert.id, alert.kind, alert.severity, alert.message
        );
    }
}

fn render_metrics(metrics: &PerformanceMetrics) {
    println!(
        "\nSLA compliance {:.0}% across {} active applications",
        metrics.sla_compliance_rate * 100.0,
        metrics.active_applications
    );
    for slice in &metrics.states {
        println!(
            "- {}: {} applications | {:.1}h average | {} violations",
            slice.state_label, slice.applications, slice.average_hours_in_state, slice.sla_violations
        );
    }
}
