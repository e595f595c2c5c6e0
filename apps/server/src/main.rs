mod console;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nooverfit_backend_api::{build_router, AppState};
use nooverfit_config::load as load_config;
use nooverfit_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "nooverfit")]
#[command(about = "NoOverfit document analysis (console by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Start interactive console (default)
    Console,
    /// List the configured model catalogue
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Console) {
        Commands::Serve => run_server().await,
        Commands::Console => console::run().await,
        Commands::Models => list_models(),
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting NoOverfit backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let app = build_router(AppState::new(services.config.clone(), services.gateway.clone()));

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(nooverfit_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

fn list_models() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    println!("{:<36} {:<28} {}", "ID", "Name", "Default");
    for model in &config.inference.models {
        let marker = if model.id == config.inference.default_model {
            "*"
        } else {
            ""
        };
        println!("{:<36} {:<28} {}", model.id, model.name, marker);
    }
    Ok(())
}
