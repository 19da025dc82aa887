//! Plain-text rendering and the headless polling loop

use anyhow::Result;
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::{COLUMNS, Monitor, Snapshot, job_cells, visible_jobs};
use crate::jobs::WorkflowId;

/// Pad each value to its column width and join with two spaces
pub fn format_table_row<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .zip(COLUMNS.iter())
        .map(|(value, col)| {
            let value = value.as_ref();
            if col.left_align {
                format!("{:<width$}", value, width = col.width)
            } else {
                format!("{:>width$}", value, width = col.width)
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Render one snapshot as a text block
pub fn render_text(
    snapshot: &Snapshot,
    filter: Option<&WorkflowId>,
    source: &str,
    show_all: bool,
) -> String {
    let mut lines = Vec::new();

    lines.push("Snakemake Slurm Monitor".to_string());
    lines.push(format!(
        "Workflow ID: {}",
        filter.map(|id| id.as_str()).unwrap_or("All")
    ));
    lines.push(format!(
        "Last updated: {}",
        snapshot
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string())
    ));
    lines.push(format!("Source: {}", source));
    if let Some(err) = &snapshot.last_error {
        lines.push(format!(
            "Error: {} (showing last known state, retrying)",
            err
        ));
    }
    lines.push(String::new());

    lines.push("Job Statistics:".to_string());
    if snapshot.stats.is_empty() {
        lines.push("  no jobs".to_string());
    }
    for (state, count) in snapshot.stats.iter() {
        lines.push(format!("  {}: {}", state, count));
    }
    lines.push(String::new());

    lines.push(if show_all { "All Jobs:" } else { "Active Jobs:" }.to_string());
    let headers: Vec<&str> = COLUMNS.iter().map(|c| c.header).collect();
    lines.push(format_table_row(&headers));
    let separator: Vec<String> = COLUMNS.iter().map(|c| "-".repeat(c.width)).collect();
    lines.push(format_table_row(&separator));
    for job in visible_jobs(snapshot, show_all) {
        lines.push(format_table_row(&job_cells(job)));
    }

    lines.join("\n")
}

/// Tick, print, wait `interval`, repeat until `shutdown` resolves.
///
/// The first tick happens immediately. Shutdown also interrupts a fetch that
/// is still in flight.
pub async fn run_headless<W, F>(
    monitor: &mut Monitor,
    interval: Duration,
    show_all: bool,
    out: &mut W,
    shutdown: F,
) -> Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let source = monitor.source_description();
    let filter = monitor.filter().cloned();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let snapshot = tokio::select! {
            biased;

            _ = &mut shutdown => break,
            snapshot = monitor.tick() => snapshot,
        };
        writeln!(out, "{}\n", render_text(snapshot, filter.as_ref(), &source, show_all))?;
        out.flush()?;
    }

    tracing::info!("Shutdown requested, stopping monitor");
    Ok(())
}
