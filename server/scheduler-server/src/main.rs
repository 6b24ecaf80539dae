use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scheduler_server::{create_app, SchedulerServer, ServerConfig};
use scheduling_engine::SweeperConfig;

/// ClinicFlow scheduling HTTP server
#[derive(Parser, Debug)]
#[command(name = "scheduler-server")]
#[command(about = "Appointment scheduling and capacity engine HTTP API")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0", env = "SCHEDULER_HOST")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "8080", env = "SCHEDULER_PORT")]
    port: u16,

    /// Minutes past the scheduled start before a silent appointment becomes
    /// a no-show
    #[arg(long, default_value = "120", env = "SCHEDULER_NO_SHOW_GRACE_MINUTES")]
    no_show_grace_minutes: i64,

    /// Seconds between no-show sweep runs
    #[arg(long, default_value = "300", env = "SCHEDULER_SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    info!("🏥 Starting ClinicFlow scheduling server");
    info!("📋 Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig {
        name: "ClinicFlow Scheduling Engine".to_string(),
        sweeper: SweeperConfig {
            grace_period_minutes: args.no_show_grace_minutes,
            interval_secs: args.sweep_interval_secs,
        },
    };
    let server = SchedulerServer::new(config);

    // the sweeper lives on its own timer, decoupled from request handling
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = Arc::clone(&server.sweeper).spawn(shutdown_rx);

    let app = create_app(server);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("🌐 Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // stop the sweeper once the HTTP side has drained
    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;
    info!("👋 Scheduler shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(signal_err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %signal_err, "failed to listen for shutdown signal");
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
