use anyhow::Result;
use clap::{Parser, Subcommand};
use tephra_backend::api;
use tephra_backend::config::GatewayConfig;
use tephra_backend::diagnostics;
use tephra_backend::telemetry;
use tephra_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Tephra community record gateway")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (Axum) for posts, comments, and storage
    Serve,
    /// Probe the remote platform and print the diagnostics report as JSON
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();
    let config = GatewayConfig::from_env()?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => api::serve_http(config).await,
        Command::Probe => {
            let state = api::build_state(config, api::shared_http_client()?);
            let report = diagnostics::collect_report(
                &state.config,
                &state.http_client,
                &state.posts,
                &state.comments,
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
