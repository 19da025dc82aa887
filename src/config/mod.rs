use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::jobs::{InvalidWorkflowId, WorkflowId};
use crate::source::{JobSource, JsonFileSource, SacctSource};

pub const DEFAULT_REFRESH_SECS: u64 = 30;
const DEFAULT_SACCT: &str = "sacct";

/// Monitor Snakemake jobs on Slurm
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "smtop", version, about)]
pub struct Cli {
    /// Only show jobs belonging to this workflow run
    #[arg(long, value_name = "ID")]
    pub workflow_id: Option<String>,

    /// Refresh rate in seconds (default: 30)
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_rate: Option<u64>,

    /// Read job records from a JSON file instead of sacct
    #[arg(long, value_name = "PATH")]
    pub status_file: Option<PathBuf>,

    /// Path to the sacct binary
    #[arg(long, value_name = "PATH")]
    pub sacct: Option<PathBuf>,

    /// Only list jobs started after this time (passed to `sacct -S`)
    #[arg(long, value_name = "TIME")]
    pub since: Option<String>,

    /// Show jobs in every state, not just pending/running
    #[arg(long)]
    pub all: bool,

    /// Print plain-text snapshots instead of the interactive dashboard
    #[arg(short = 'H', long)]
    pub headless: bool,

    /// Config file (default: <config dir>/smtop/config.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("refresh rate must be a positive number of seconds, got {0}")]
    InvalidRefreshRate(u64),

    #[error(transparent)]
    InvalidWorkflowId(#[from] InvalidWorkflowId),

    #[error("config file {0} does not exist")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk defaults; every key is optional and CLI flags win.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub refresh_rate: Option<u64>,
    pub sacct_path: Option<PathBuf>,
    pub since: Option<String>,
    pub status_file: Option<PathBuf>,
    pub show_all: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Sacct {
        binary: PathBuf,
        since: Option<String>,
    },
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub workflow_id: Option<WorkflowId>,
    pub refresh_interval: Duration,
    pub source: SourceConfig,
    pub show_all: bool,
    pub headless: bool,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("smtop").join("config.json"))
}

/// Load the config file. An explicitly named file must exist; the default
/// location is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    parse_file_config(&path)
}

pub fn parse_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("Loaded config from {:?}", path);
    Ok(config)
}

impl MonitorConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let file = load_file_config(cli.config.as_deref())?;
        Self::resolve(cli, file)
    }

    /// Merge CLI over file over defaults, then validate.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let refresh_secs = cli
            .refresh_rate
            .or(file.refresh_rate)
            .unwrap_or(DEFAULT_REFRESH_SECS);
        if refresh_secs == 0 {
            return Err(ConfigError::InvalidRefreshRate(refresh_secs));
        }

        let workflow_id = cli
            .workflow_id
            .as_deref()
            .map(WorkflowId::new)
            .transpose()?;

        let source = match cli.status_file.clone().or(file.status_file) {
            Some(path) => SourceConfig::File(path),
            None => SourceConfig::Sacct {
                binary: cli
                    .sacct
                    .clone()
                    .or(file.sacct_path)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SACCT)),
                since: cli.since.clone().or(file.since),
            },
        };

        Ok(Self {
            workflow_id,
            refresh_interval: Duration::from_secs(refresh_secs),
            source,
            show_all: cli.all || file.show_all.unwrap_or(false),
            headless: cli.headless,
        })
    }

    pub fn build_source(&self) -> Box<dyn JobSource> {
        match &self.source {
            SourceConfig::Sacct { binary, since } => {
                Box::new(SacctSource::new(binary.clone()).with_since(since.clone()))
            }
            SourceConfig::File(path) => Box::new(JsonFileSource::new(path.clone())),
        }
    }
}
