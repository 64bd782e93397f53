//! Embedding the daemon in a service that knows how to switch itself over.
//!
//! Reads the usual configuration flags and environment variables, then runs
//! the REST API together with the controller.
//!
//! ```sh
//! RESOURCE_FOR_DR='"" v1 configmaps my-service-dr' NAMESPACE=my-service \
//! USE_DEFAULT_PATHS=true TREAT_STATUS_AS_FIELD=true \
//! HEALTH_MAIN_SERVICES_ACTIVE="deployment my-service" \
//! cargo run --example embedded
//! ```

use std::time::Duration;

use clap::Parser;
use disaster_recovery_daemon::config::{Config, ConfigArgs};
use disaster_recovery_daemon::controller::{ControllerRequest, ControllerResponse, FnAction};
use disaster_recovery_daemon::crd::{SwitchoverState, SwitchoverStatus};
use disaster_recovery_daemon::daemon::Daemon;
use disaster_recovery_daemon::health::{FnHealthSource, HealthRequest, HealthStatus};
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,
}

fn switch_over(request: ControllerRequest) -> anyhow::Result<ControllerResponse> {
    info!(mode = %request.mode, no_wait = request.no_wait, "Switching over");

    // Stop or promote the replicas here. Returning an error makes the
    // controller retry; returning a state persists it as is.
    std::thread::sleep(Duration::from_secs(1));

    Ok(SwitchoverState::new(request.mode, SwitchoverStatus::Done, "switchover finished").into())
}

fn health(request: &HealthRequest) -> anyhow::Result<HealthStatus> {
    match request.mode.as_str() {
        "active" | "standby" => Ok(HealthStatus::Up),
        "disabled" => Ok(HealthStatus::Down),
        other => anyhow::bail!("unexpected mode {other}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(true).init();

    let config = Config::try_from(Args::parse().config)?;
    Daemon::new(config)
        .with_action(FnAction::new(switch_over))
        .with_health_source(FnHealthSource::new(health), false)
        .with_retry(3, Duration::from_secs(10))
        .with_action_timeout(Duration::from_secs(300))
        .run()
        .await?;
    Ok(())
}
