//! Status sources for job records.
//!
//! A source is an opaque read interface over whatever the workflow engine or
//! scheduler exposes. The monitor only ever sees `Vec<Job>`:
//! - `sacct` queries Slurm accounting (the default)
//! - `file` reads a JSON snapshot written by some other tool

pub mod file;
pub mod sacct;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::jobs::{Job, WorkflowId};

pub use file::JsonFileSource;
pub use sacct::SacctSource;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("status file {0} does not exist")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The source did not answer in time, or is otherwise unreachable
    #[error("{0}")]
    Unavailable(String),
}

/// Read-only view onto the workflow engine's job status.
///
/// Fetches are awaited inside `select!` against shutdown, so dropping the
/// future must abandon the work (and any child process) it started.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Short label (e.g., "sacct")
    fn name(&self) -> &'static str;

    /// Human description shown in the dashboard header
    fn describe(&self) -> String {
        self.name().to_string()
    }

    /// Startup availability check. Failing here is fatal; failing a later
    /// fetch is not.
    async fn probe(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Current job records. `workflow` is a narrowing hint; the monitor
    /// filters the result again, so sources may ignore it.
    async fn fetch(&self, workflow: Option<&WorkflowId>) -> Result<Vec<Job>, SourceError>;
}

#[async_trait]
impl<S: JobSource + ?Sized> JobSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn probe(&self) -> Result<(), SourceError> {
        (**self).probe().await
    }

    async fn fetch(&self, workflow: Option<&WorkflowId>) -> Result<Vec<Job>, SourceError> {
        (**self).fetch(workflow).await
    }
}
