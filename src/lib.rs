//! smtop - htop for Snakemake workflows
//!
//! A terminal status monitor for the Slurm jobs of running Snakemake workflows.

pub mod config;
pub mod jobs;
pub mod monitor;
pub mod shutdown;
pub mod source;
pub mod tui;
