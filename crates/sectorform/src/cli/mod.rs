//! Command-line interface for sectorform.
//!
//! This module provides the CLI structure for the `sectorform` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, CreateCommand, DeleteCommand, EditCommand, ListCommand, OutputFormat,
    SectorsCommand, StatusCommand,
};

use crate::logging::Verbosity;

/// sectorform - Record which sectors you are involved in
///
/// Pick sectors from a hierarchical taxonomy, submit a choice record and
/// view, edit or delete saved records in a document store.
#[derive(Debug, Parser)]
#[command(name = "sectorform")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show or seed the sector taxonomy
    #[command(subcommand)]
    Sectors(SectorsCommand),

    /// List saved choices
    List(ListCommand),

    /// Submit a new choice
    Create(CreateCommand),

    /// Change a saved choice and submit it again
    Edit(EditCommand),

    /// Delete a saved choice
    Delete(DeleteCommand),

    /// Show store location and document counts
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
