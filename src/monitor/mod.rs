//! The polling core shared by the dashboard and headless mode.

pub mod headless;

use chrono::{DateTime, Local};

use crate::jobs::{Job, JobStats, WorkflowId};
use crate::source::JobSource;

/// What the monitor knows after its latest tick
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub jobs: Vec<Job>,
    pub stats: JobStats,
    /// Time of the last successful fetch
    pub updated_at: Option<DateTime<Local>>,
    /// Error from the most recent tick, cleared by the next success
    pub last_error: Option<String>,
    pub ticks: u64,
    pub consecutive_failures: u64,
}

impl Snapshot {
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn active_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|j| j.is_active())
    }
}

pub struct Monitor {
    source: Box<dyn JobSource>,
    filter: Option<WorkflowId>,
    snapshot: Snapshot,
}

impl Monitor {
    pub fn new(source: impl JobSource + 'static, filter: Option<WorkflowId>) -> Self {
        Self {
            source: Box::new(source),
            filter,
            snapshot: Snapshot::default(),
        }
    }

    pub fn filter(&self) -> Option<&WorkflowId> {
        self.filter.as_ref()
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Fetch once and update the snapshot.
    ///
    /// A failed fetch never propagates: the error is recorded, the previous
    /// jobs stay visible and the next tick tries again. Dropping the future
    /// before it resolves leaves the snapshot untouched.
    pub async fn tick(&mut self) -> &Snapshot {
        let result = self.source.fetch(self.filter.as_ref()).await;
        self.snapshot.ticks += 1;

        match result {
            Ok(jobs) => {
                let jobs = apply_filter(jobs, self.filter.as_ref());
                tracing::debug!(
                    "Tick {}: {} jobs from {}",
                    self.snapshot.ticks,
                    jobs.len(),
                    self.source.name()
                );
                self.snapshot.stats = JobStats::from_jobs(&jobs);
                self.snapshot.jobs = jobs;
                self.snapshot.updated_at = Some(Local::now());
                self.snapshot.last_error = None;
                self.snapshot.consecutive_failures = 0;
            }
            Err(e) => {
                self.snapshot.consecutive_failures += 1;
                tracing::warn!(
                    "Tick {}: failed to read job status ({} in a row): {}",
                    self.snapshot.ticks,
                    self.snapshot.consecutive_failures,
                    e
                );
                self.snapshot.last_error = Some(e.to_string());
            }
        }

        &self.snapshot
    }
}

/// A job table column: header, width and alignment
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    pub width: usize,
    pub left_align: bool,
}

pub const COLUMNS: [Column; 7] = [
    Column { header: "JobID", width: 15, left_align: true },
    Column { header: "Name", width: 25, left_align: true },
    Column { header: "Rule", width: 20, left_align: true },
    Column { header: "State", width: 12, left_align: true },
    Column { header: "Elapsed", width: 12, left_align: true },
    Column { header: "Memory", width: 10, left_align: false },
    Column { header: "CPUs", width: 6, left_align: false },
];

/// Cell values for one job, in `COLUMNS` order
pub fn job_cells(job: &Job) -> [String; 7] {
    [
        job.job_id.clone(),
        truncate(&job.name, COLUMNS[1].width),
        truncate(job.rule.as_deref().unwrap_or("-"), COLUMNS[2].width),
        job.state.label().to_string(),
        job.elapsed.clone().unwrap_or_else(|| "-".to_string()),
        crate::jobs::format_memory(job.max_rss),
        job.cpus.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
    ]
}

/// Jobs to list in the table: active ones unless `show_all`, never steps
pub fn visible_jobs(snapshot: &Snapshot, show_all: bool) -> Vec<&Job> {
    snapshot
        .jobs
        .iter()
        .filter(|j| !j.is_step() && (show_all || j.is_active()))
        .collect()
}

pub fn truncate(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

/// Keep only jobs of the given workflow run; everything when unfiltered.
pub fn apply_filter(jobs: Vec<Job>, filter: Option<&WorkflowId>) -> Vec<Job> {
    match filter {
        Some(id) => jobs.into_iter().filter(|j| j.belongs_to(id)).collect(),
        None => jobs,
    }
}
