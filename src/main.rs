use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use smtop::config::{Cli, MonitorConfig};
use smtop::monitor::{Monitor, headless};
use smtop::shutdown::{self, ShutdownFlag};
use smtop::source::JobSource;
use smtop::tui::{self, app::App};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // In headless mode: log to stderr, stdout carries the snapshots
    // In TUI mode: log to file to avoid interference
    if cli.headless {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "smtop=info".into()),
            ))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        let log_dir = dirs::data_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("smtop");
        std::fs::create_dir_all(&log_dir)?;
        let log_file = std::fs::File::create(log_dir.join("smtop.log"))?;

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "smtop=info".into()),
            ))
            .with(fmt::layer().with_writer(log_file).with_ansi(false))
            .init();
    }

    let config = MonitorConfig::from_cli(&cli).context("Invalid configuration")?;

    let source = config.build_source();
    source
        .probe()
        .await
        .with_context(|| format!("Status source {} is unavailable", source.describe()))?;

    tracing::info!(
        "Monitoring {} via {} every {}s",
        config
            .workflow_id
            .as_ref()
            .map(|id| format!("workflow {}", id))
            .unwrap_or_else(|| "all jobs".to_string()),
        source.describe(),
        config.refresh_interval.as_secs()
    );

    let mut monitor = Monitor::new(source, config.workflow_id.clone());

    if config.headless {
        tracing::info!("Running in headless mode (no TUI), press Ctrl+C to stop");
        let mut stdout = std::io::stdout();
        headless::run_headless(
            &mut monitor,
            config.refresh_interval,
            config.show_all,
            &mut stdout,
            shutdown::wait_for_signal(),
        )
        .await?;
    } else {
        let shutdown = ShutdownFlag::new();
        shutdown.listen();

        // Run TUI (this blocks until quit)
        let app = App::new(monitor, config.refresh_interval, config.show_all);
        tui::run(app, shutdown).await?;
    }

    Ok(())
}
