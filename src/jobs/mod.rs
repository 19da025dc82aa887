//! Job records as seen by the monitor.
//!
//! Everything here is read-only data owned by the workflow engine and the
//! scheduler; smtop only observes it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// `[D-][HH:]MM:SS[.fff]`, as printed by sacct's Elapsed column
static ELAPSED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+)-)?(?:(\d+):)?(\d+):(\d+)(?:\.\d+)?$").expect("valid elapsed regex")
});

/// Snakemake's Slurm executor tags jobs with `rule_<name>_wildcards_<...>`
static RULE_COMMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rule_(.+?)(?:_wildcards_.*)?$").expect("valid rule comment regex")
});

/// Scheduler state of a job.
///
/// Parsing never fails: anything unrecognised lands in [`JobState::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Pending,
    Running,
    Completing,
    Completed,
    Failed,
    Cancelled,
    Timeout,
    OutOfMemory,
    NodeFail,
    Preempted,
    Suspended,
    Other(String),
}

impl JobState {
    pub fn parse(raw: &str) -> Self {
        // sacct appends qualifiers ("CANCELLED by 1234") and truncation marks ("CANCELLED+")
        let token = raw.split_whitespace().next().unwrap_or("");
        let token = token.trim_end_matches('+').to_ascii_uppercase();

        match token.as_str() {
            "PENDING" | "PD" => JobState::Pending,
            "RUNNING" | "R" => JobState::Running,
            "COMPLETING" | "CG" => JobState::Completing,
            "COMPLETED" | "CD" => JobState::Completed,
            "FAILED" | "F" => JobState::Failed,
            "CANCELLED" | "CA" => JobState::Cancelled,
            "TIMEOUT" | "TO" => JobState::Timeout,
            "OUT_OF_MEMORY" | "OOM" => JobState::OutOfMemory,
            "NODE_FAIL" | "NF" => JobState::NodeFail,
            "PREEMPTED" | "PR" => JobState::Preempted,
            "SUSPENDED" | "S" => JobState::Suspended,
            "" => JobState::Other("UNKNOWN".to_string()),
            _ => JobState::Other(token),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Completing => "COMPLETING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
            JobState::Timeout => "TIMEOUT",
            JobState::OutOfMemory => "OUT_OF_MEMORY",
            JobState::NodeFail => "NODE_FAIL",
            JobState::Preempted => "PREEMPTED",
            JobState::Suspended => "SUSPENDED",
            JobState::Other(s) => s.as_str(),
        }
    }

    /// Still occupying (or waiting for) the scheduler
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::Pending | JobState::Running | JobState::Completing
        )
    }

    /// Ended without success
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobState::Failed
                | JobState::Cancelled
                | JobState::Timeout
                | JobState::OutOfMemory
                | JobState::NodeFail
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        JobState::parse(&s)
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        state.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidWorkflowId {
    #[error("workflow id must not be empty")]
    Empty,
    #[error("workflow id {0:?} contains whitespace or control characters")]
    BadCharacters(String),
}

/// Opaque identifier of one workflow run, matched exactly against job records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(raw: &str) -> Result<Self, InvalidWorkflowId> {
        if raw.trim().is_empty() {
            return Err(InvalidWorkflowId::Empty);
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(InvalidWorkflowId::BadCharacters(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for WorkflowId {
    type Err = InvalidWorkflowId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One job (or job step) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    #[serde(default)]
    pub name: String,
    pub state: JobState,
    /// Workflow run this job belongs to, if the source knows it
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub elapsed: Option<String>,
    /// Peak resident memory in bytes
    #[serde(default)]
    pub max_rss: Option<u64>,
    #[serde(default)]
    pub cpus: Option<u32>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, name: impl Into<String>, state: JobState) -> Self {
        Self {
            job_id: job_id.into(),
            name: name.into(),
            state,
            workflow_id: None,
            rule: None,
            start: None,
            end: None,
            elapsed: None,
            max_rss: None,
            cpus: None,
        }
    }

    pub fn with_workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// Slurm step records look like `1234.batch`, `1234.extern` or `1234.0`
    pub fn is_step(&self) -> bool {
        self.job_id.contains('.')
    }

    /// Id of the job this step belongs to (the id itself for top-level jobs)
    pub fn parent_id(&self) -> &str {
        self.job_id
            .split_once('.')
            .map(|(parent, _)| parent)
            .unwrap_or(&self.job_id)
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn belongs_to(&self, workflow: &WorkflowId) -> bool {
        self.workflow_id.as_deref() == Some(workflow.as_str())
    }

    pub fn elapsed_secs(&self) -> Option<u64> {
        self.elapsed.as_deref().and_then(parse_elapsed)
    }
}

/// Per-state job counts over top-level jobs only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    counts: BTreeMap<JobState, usize>,
}

impl JobStats {
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let mut counts = BTreeMap::new();
        for job in jobs.iter().filter(|j| !j.is_step()) {
            *counts.entry(job.state.clone()).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn count(&self, state: &JobState) -> usize {
        self.counts.get(state).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn active(&self) -> usize {
        self.counts
            .iter()
            .filter(|(state, _)| state.is_active())
            .map(|(_, n)| n)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JobState, usize)> {
        self.counts.iter().map(|(state, n)| (state, *n))
    }
}

/// Parse a Slurm elapsed time into seconds.
///
/// Values too large for a `u64` are rejected rather than wrapped.
pub fn parse_elapsed(raw: &str) -> Option<u64> {
    let caps = ELAPSED_RE.captures(raw.trim())?;
    let mut total: u64 = 0;
    for (group, unit) in [(1, 86_400u64), (2, 3600), (3, 60), (4, 1)] {
        let Some(m) = caps.get(group) else {
            continue;
        };
        let value: u64 = m.as_str().parse().ok()?;
        total = total.checked_add(value.checked_mul(unit)?)?;
    }
    Some(total)
}

/// Parse a Slurm memory value (`1234K`, `56.50M`, `2G`, bare bytes) into bytes.
pub fn parse_memory(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (number, multiplier) = match raw.chars().last()? {
        'K' | 'k' => (&raw[..raw.len() - 1], 1u64 << 10),
        'M' | 'm' => (&raw[..raw.len() - 1], 1u64 << 20),
        'G' | 'g' => (&raw[..raw.len() - 1], 1u64 << 30),
        'T' | 't' => (&raw[..raw.len() - 1], 1u64 << 40),
        _ => (raw, 1),
    };

    let value: f64 = number.parse().ok()?;
    if value < 0.0 || !value.is_finite() {
        return None;
    }
    Some((value * multiplier as f64).round() as u64)
}

/// Human readable memory, `0` when unknown.
pub fn format_memory(bytes: Option<u64>) -> String {
    let Some(bytes) = bytes.filter(|b| *b > 0) else {
        return "0".to_string();
    };

    const UNITS: [(&str, u64); 4] = [("T", 1 << 40), ("G", 1 << 30), ("M", 1 << 20), ("K", 1 << 10)];
    for (suffix, size) in UNITS {
        if bytes >= size {
            let value = bytes as f64 / size as f64;
            return if value < 10.0 {
                format!("{:.1}{}", value, suffix)
            } else {
                format!("{:.0}{}", value, suffix)
            };
        }
    }
    format!("{}B", bytes)
}

/// Human readable elapsed seconds (e.g. "1h 23m")
pub fn format_elapsed(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let mins = (secs % 3600) / 60;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Rule name from a Snakemake job comment, if it carries one.
pub fn rule_from_comment(comment: &str) -> Option<String> {
    RULE_COMMENT_RE
        .captures(comment.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
