//! JSON snapshot source
//!
//! Reads a file containing a JSON array of job records. The file may be
//! rewritten by the engine between ticks; every fetch re-reads it.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{JobSource, SourceError};
use crate::jobs::{Job, WorkflowId};

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl JobSource for JsonFileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn probe(&self) -> Result<(), SourceError> {
        if !self.path.exists() {
            return Err(SourceError::Missing(self.path.clone()));
        }
        Ok(())
    }

    async fn fetch(&self, _workflow: Option<&WorkflowId>) -> Result<Vec<Job>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Read {
                path: self.path.clone(),
                source,
            })?;

        serde_json::from_str(&content).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}
