//! Configuration tests
//!
//! These tests verify CLI parsing, config file loading and the precedence of
//! CLI flags over file values over built-in defaults.

use clap::Parser;
use smtop::config::{
    Cli, ConfigError, DEFAULT_REFRESH_SECS, FileConfig, MonitorConfig, SourceConfig,
    load_file_config, parse_file_config,
};
use smtop::jobs::InvalidWorkflowId;
use smtop::source::JobSource;
use std::path::PathBuf;
use std::time::Duration;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("smtop").chain(args.iter().copied())).unwrap()
}

// =============================================================================
// CLI
// =============================================================================

/// No arguments: all jobs, 30 second refresh, sacct
#[test]
fn test_defaults_without_arguments() {
    let config = MonitorConfig::resolve(&parse(&[]), FileConfig::default()).unwrap();

    assert_eq!(config.workflow_id, None);
    assert_eq!(config.refresh_interval, Duration::from_secs(30));
    assert_eq!(DEFAULT_REFRESH_SECS, 30);
    assert_eq!(
        config.source,
        SourceConfig::Sacct {
            binary: PathBuf::from("sacct"),
            since: None
        }
    );
    assert!(!config.show_all);
    assert!(!config.headless);
}

#[test]
fn test_workflow_id_and_refresh_rate() {
    let cli = parse(&["--workflow-id", "a1b2c3", "--refresh-rate", "10"]);
    let config = MonitorConfig::resolve(&cli, FileConfig::default()).unwrap();

    assert_eq!(config.workflow_id.unwrap().as_str(), "a1b2c3");
    assert_eq!(config.refresh_interval, Duration::from_secs(10));
}

#[test]
fn test_zero_refresh_rate_rejected_by_cli() {
    let result = Cli::try_parse_from(["smtop", "--refresh-rate", "0"]);
    assert!(result.is_err());
}

#[test]
fn test_non_numeric_refresh_rate_rejected_by_cli() {
    assert!(Cli::try_parse_from(["smtop", "--refresh-rate", "fast"]).is_err());
    assert!(Cli::try_parse_from(["smtop", "--refresh-rate", "-5"]).is_err());
}

#[test]
fn test_zero_refresh_rate_in_file_rejected() {
    let file = FileConfig {
        refresh_rate: Some(0),
        ..Default::default()
    };
    let err = MonitorConfig::resolve(&parse(&[]), file).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRefreshRate(0)));
}

#[test]
fn test_malformed_workflow_id_rejected() {
    let err = MonitorConfig::resolve(&parse(&["--workflow-id", ""]), FileConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidWorkflowId(InvalidWorkflowId::Empty)
    ));

    let err = MonitorConfig::resolve(
        &parse(&["--workflow-id", "has space"]),
        FileConfig::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("whitespace"));
}

#[test]
fn test_status_file_selects_file_source() {
    let cli = parse(&["--status-file", "/tmp/jobs.json", "--all", "-H"]);
    let config = MonitorConfig::resolve(&cli, FileConfig::default()).unwrap();

    assert_eq!(
        config.source,
        SourceConfig::File(PathBuf::from("/tmp/jobs.json"))
    );
    assert!(config.show_all);
    assert!(config.headless);
    assert_eq!(config.build_source().name(), "file");
}

#[test]
fn test_sacct_options() {
    let cli = parse(&["--sacct", "/opt/slurm/bin/sacct", "--since", "now-1day"]);
    let config = MonitorConfig::resolve(&cli, FileConfig::default()).unwrap();

    assert_eq!(
        config.source,
        SourceConfig::Sacct {
            binary: PathBuf::from("/opt/slurm/bin/sacct"),
            since: Some("now-1day".to_string())
        }
    );
    let source = config.build_source();
    assert_eq!(source.name(), "sacct");
    assert_eq!(source.describe(), "sacct (since now-1day)");
}

// =============================================================================
// Config file
// =============================================================================

#[test]
fn test_file_values_apply_when_cli_silent() {
    let file = FileConfig {
        refresh_rate: Some(60),
        sacct_path: Some(PathBuf::from("/usr/local/bin/sacct")),
        since: Some("2024-05-01".to_string()),
        status_file: None,
        show_all: Some(true),
    };
    let config = MonitorConfig::resolve(&parse(&[]), file).unwrap();

    assert_eq!(config.refresh_interval, Duration::from_secs(60));
    assert!(config.show_all);
    assert_eq!(
        config.source,
        SourceConfig::Sacct {
            binary: PathBuf::from("/usr/local/bin/sacct"),
            since: Some("2024-05-01".to_string())
        }
    );
}

#[test]
fn test_cli_overrides_file() {
    let file = FileConfig {
        refresh_rate: Some(60),
        since: Some("2024-05-01".to_string()),
        ..Default::default()
    };
    let cli = parse(&["--refresh-rate", "5", "--since", "now-1hour"]);
    let config = MonitorConfig::resolve(&cli, file).unwrap();

    assert_eq!(config.refresh_interval, Duration::from_secs(5));
    assert!(matches!(
        config.source,
        SourceConfig::Sacct { since: Some(ref s), .. } if s == "now-1hour"
    ));
}

#[test]
fn test_parse_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"refresh_rate": 15, "status_file": "/var/run/snakemake/jobs.json"}"#,
    )
    .unwrap();

    let file = parse_file_config(&path).unwrap();
    assert_eq!(file.refresh_rate, Some(15));
    assert_eq!(
        file.status_file,
        Some(PathBuf::from("/var/run/snakemake/jobs.json"))
    );
    assert_eq!(file.sacct_path, None);

    let explicit = load_file_config(Some(&path)).unwrap();
    assert_eq!(explicit, file);
}

#[test]
fn test_config_file_unknown_key_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"refresh": 15}"#).unwrap();

    let err = parse_file_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_explicit_missing_config_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.json");

    let err = load_file_config(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn test_from_cli_with_config_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("smtop.json");
    std::fs::write(&path, r#"{"refresh_rate": 45, "show_all": true}"#).unwrap();

    let cli = parse(&["--config", path.to_str().unwrap()]);
    let config = MonitorConfig::from_cli(&cli).unwrap();
    assert_eq!(config.refresh_interval, Duration::from_secs(45));
    assert!(config.show_all);
}
