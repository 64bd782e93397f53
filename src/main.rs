use std::sync::Arc;

use clap::{Parser, Subcommand};
use disaster_recovery_daemon::config::{Config, ConfigArgs};
use disaster_recovery_daemon::daemon::Daemon;
use disaster_recovery_daemon::document::KubeDocumentStore;
use disaster_recovery_daemon::switchover::ModeReader;
use disaster_recovery_daemon::{telemetry, Error};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the disaster recovery REST API
    Run(RunArgs),
    /// Print the persisted switchover state as JSON
    Status(StatusArgs),
    /// Show version and build information
    Version,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Parser, Debug)]
struct StatusArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("Disaster Recovery Daemon v{}", env!("CARGO_PKG_VERSION"));
            println!("Build Date: {}", env!("BUILD_DATE"));
            println!("Git SHA: {}", env!("GIT_SHA"));
            println!("Rust Version: {}", env!("RUST_VERSION"));
            Ok(())
        }
        Commands::Status(status_args) => run_status(status_args).await,
        Commands::Run(run_args) => run_daemon(run_args).await,
    }
}

async fn run_status(args: StatusArgs) -> Result<(), Error> {
    let config = Config::try_from(args.config)?;
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    let store = Arc::new(KubeDocumentStore::new(client, &config.resource));
    let state = ModeReader::new(store, config.paths.status)
        .get_mode_and_status()
        .await?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

async fn run_daemon(args: RunArgs) -> Result<(), Error> {
    init_tracing();

    info!(
        "Starting Disaster Recovery Daemon v{}",
        env!("CARGO_PKG_VERSION")
    );

    let result = match Config::try_from(args.config) {
        Ok(config) => Daemon::new(config).run().await,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            Err(e)
        }
    };

    // Flush any remaining traces
    telemetry::shutdown_telemetry();

    result
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let (text_layer, json_layer) = if json {
        (None, Some(fmt::layer().json().with_target(true)))
    } else {
        (Some(fmt::layer().with_target(true)), None)
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer);

    // Only enable OTEL if an endpoint is provided
    let otel_enabled = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok();

    if otel_enabled {
        let otel_layer = telemetry::init_telemetry(&registry);
        registry.with(otel_layer).init();
        info!("OpenTelemetry tracing initialized");
    } else {
        registry.init();
        info!("OpenTelemetry tracing disabled (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
    }
}
