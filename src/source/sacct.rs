//! Slurm accounting (`sacct`) source
//!
//! Snakemake's Slurm executor submits every job of a run with the run UUID as
//! the Slurm job name and `rule_<name>_wildcards_<...>` as the comment, so the
//! job name doubles as the workflow id.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{JobSource, SourceError};
use crate::jobs::{Job, JobState, WorkflowId, parse_memory, rule_from_comment};

pub const SACCT_FORMAT: &str = "JobID,JobName,State,Start,End,Elapsed,MaxRSS,NCPUS,Comment";

/// Fields that must be present for a line to be usable (Comment is optional)
const REQUIRED_FIELDS: usize = 8;

/// How long one sacct invocation may run before the tick is failed
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SacctSource {
    binary: PathBuf,
    since: Option<String>,
    timeout: Duration,
}

impl SacctSource {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            since: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Kill sacct and fail the fetch if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Passed through as `sacct -S`; sacct defaults to midnight today.
    pub fn with_since(mut self, since: Option<String>) -> Self {
        self.since = since;
        self
    }

    pub fn args(&self, workflow: Option<&WorkflowId>) -> Vec<String> {
        let mut args = vec![
            "-n".to_string(),
            "--parsable2".to_string(),
            "-o".to_string(),
            SACCT_FORMAT.to_string(),
        ];
        if let Some(since) = &self.since {
            args.push("-S".to_string());
            args.push(since.clone());
        }
        if let Some(id) = workflow {
            args.push("--name".to_string());
            args.push(id.as_str().to_string());
        }
        args
    }

    fn command_line(&self) -> String {
        self.binary.display().to_string()
    }

    /// Run sacct with `args`, killing it when the timeout fires or the
    /// returned future is dropped.
    async fn run(&self, args: &[String]) -> Result<Output, SourceError> {
        let output = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, output).await {
            Ok(result) => result.map_err(|source| SourceError::Spawn {
                command: self.command_line(),
                source,
            }),
            Err(_) => Err(SourceError::Unavailable(format!(
                "`{}` did not answer within {}s",
                self.command_line(),
                self.timeout.as_secs_f64()
            ))),
        }
    }
}

impl Default for SacctSource {
    fn default() -> Self {
        Self::new("sacct")
    }
}

#[async_trait]
impl JobSource for SacctSource {
    fn name(&self) -> &'static str {
        "sacct"
    }

    fn describe(&self) -> String {
        match &self.since {
            Some(since) => format!("sacct (since {})", since),
            None => "sacct".to_string(),
        }
    }

    async fn probe(&self) -> Result<(), SourceError> {
        let output = self.run(&["--version".to_string()]).await?;

        if !output.status.success() {
            return Err(SourceError::CommandFailed {
                command: format!("{} --version", self.command_line()),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::info!(
            "Using {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    async fn fetch(&self, workflow: Option<&WorkflowId>) -> Result<Vec<Job>, SourceError> {
        let args = self.args(workflow);
        tracing::debug!("Running {} {}", self.command_line(), args.join(" "));

        let output = self.run(&args).await?;

        if !output.status.success() {
            return Err(SourceError::CommandFailed {
                command: self.command_line(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let jobs = parse_sacct_output(&String::from_utf8_lossy(&output.stdout));
        Ok(fold_steps(jobs))
    }
}

/// Parse `sacct --parsable2` output, skipping lines that are blank or short.
pub fn parse_sacct_output(output: &str) -> Vec<Job> {
    output.lines().filter_map(parse_sacct_line).collect()
}

/// Parse a single `|`-separated sacct line.
pub fn parse_sacct_line(line: &str) -> Option<Job> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < REQUIRED_FIELDS {
        tracing::debug!("Skipping short sacct line: {}", line);
        return None;
    }

    let optional = |s: &str| {
        let s = s.trim();
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    };

    let job_id = fields[0].trim().to_string();
    let name = fields[1].trim().to_string();
    let is_step = job_id.contains('.');

    Some(Job {
        // steps are named "batch"/"extern"; only the allocation carries the run id
        workflow_id: if is_step { None } else { optional(&name) },
        rule: fields.get(8).and_then(|c| rule_from_comment(c)),
        state: JobState::parse(fields[2]),
        start: optional(fields[3]),
        end: optional(fields[4]),
        elapsed: optional(fields[5]),
        max_rss: parse_memory(fields[6]),
        cpus: fields[7].trim().parse().ok(),
        job_id,
        name,
    })
}

/// Fold step records into their parent job.
///
/// The parent's peak memory becomes the max over itself and its steps (Slurm
/// only reports MaxRSS on steps). Steps whose parent is absent are kept.
pub fn fold_steps(jobs: Vec<Job>) -> Vec<Job> {
    let mut step_rss: HashMap<String, u64> = HashMap::new();
    for job in jobs.iter().filter(|j| j.is_step()) {
        if let Some(rss) = job.max_rss {
            let entry = step_rss.entry(job.parent_id().to_string()).or_insert(0);
            *entry = (*entry).max(rss);
        }
    }

    let parents: std::collections::HashSet<String> = jobs
        .iter()
        .filter(|j| !j.is_step())
        .map(|j| j.job_id.clone())
        .collect();

    jobs.into_iter()
        .filter(|j| !j.is_step() || !parents.contains(j.parent_id()))
        .map(|mut job| {
            if !job.is_step()
                && let Some(rss) = step_rss.get(&job.job_id)
            {
                job.max_rss = Some(job.max_rss.unwrap_or(0).max(*rss));
            }
            job
        })
        .collect()
}
