use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use cadence_core::CadenceConfig;
use cadence_scheduler::{Evaluator, Firing, SchedulerEngine};

#[derive(Parser)]
#[command(
    name = "cadence-agent",
    about = "Job scheduler for the Cadence configuration-management agent"
)]
struct Cli {
    /// Path to cadence.toml. Falls back to $CADENCE_CONFIG, then
    /// ~/.cadence/cadence.toml.
    #[arg(long)]
    config: Option<String>,

    /// Validate the configuration and schedule table, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: explicit path > CADENCE_CONFIG env > ~/.cadence/cadence.toml
    let config_path = cli.config.or_else(|| std::env::var("CADENCE_CONFIG").ok());
    let config = CadenceConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CadenceConfig::default()
    });

    // Surface malformed job specs before the engine starts ticking.
    for (name, spec) in &config.schedule.jobs {
        cadence_scheduler::trigger::resolve(name, spec)?;
    }
    if cli.check {
        info!(jobs = config.schedule.jobs.len(), "configuration OK");
        return Ok(());
    }

    let CadenceConfig {
        agent,
        loop_interval,
        schedule,
    } = config;
    info!(
        agent = %agent.id,
        jobs = schedule.jobs.len(),
        loop_interval,
        "starting scheduler"
    );

    // Fired-job channel: SchedulerEngine → dispatcher task
    let (fired_tx, mut fired_rx) = mpsc::channel::<Firing>(256);
    let engine = SchedulerEngine::new(Evaluator::new(schedule, loop_interval), Some(fired_tx));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    // Dispatch boundary: the scheduler decides what is due, an external
    // runner owns invocation. This built-in dispatcher only logs.
    let dispatcher = tokio::spawn(async move {
        while let Some(firing) = fired_rx.recv().await {
            info!(
                agent = %agent.id,
                firing_id = %firing.id,
                function = %firing.function,
                dry_run = firing.dry_run,
                "dispatching job"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown_tx.send(true)?;
    engine_task.await?;
    // Engine gone, sender dropped: the dispatcher drains and exits.
    dispatcher.await?;
    Ok(())
}
