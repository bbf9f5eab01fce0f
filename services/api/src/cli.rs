use crate::demo::{run_demo, run_scan, DemoArgs, ScanArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use subsidy_workflow::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Subsidy Workflow",
    about = "Run and demonstrate the housing-subsidy application workflow engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and the periodic SLA scan (default command)
    Serve(ServeArgs),
    /// Seed an overdue backlog, run one SLA scan, and print the resulting alerts
    Scan(ScanArgs),
    /// Walk one application from intake to the ministerial decision
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Scan(args) => run_scan(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
