//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Sector taxonomy commands.
#[derive(Debug, Subcommand)]
pub enum SectorsCommand {
    /// Show the sector hierarchy
    List {
        /// Output format (table renders like plain)
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Seed sectors from a JSON array of {id?, name, nesting} objects
    Import {
        /// Path to the JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Create command arguments.
#[derive(Debug, Args)]
pub struct CreateCommand {
    /// Display name of the user
    #[arg(short, long)]
    pub user: Option<String>,

    /// Selected sector id (repeatable, order is kept)
    #[arg(short, long = "sector", value_name = "ID")]
    pub sectors: Vec<String>,

    /// Agree to the terms
    #[arg(short, long)]
    pub agree: bool,
}

/// Edit command arguments.
///
/// Unset options keep the saved values; the whole record is written back.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Id of the choice to edit
    pub id: String,

    /// New display name
    #[arg(short, long)]
    pub user: Option<String>,

    /// Replacement sector ids (repeatable)
    #[arg(short, long = "sector", value_name = "ID")]
    pub sectors: Vec<String>,

    /// Agree to the terms
    #[arg(short, long, conflicts_with = "no_agree")]
    pub agree: bool,

    /// Withdraw agreement to the terms
    #[arg(long)]
    pub no_agree: bool,
}

impl EditCommand {
    /// The requested terms flag, if either switch was given.
    #[must_use]
    pub fn agree_to_terms(&self) -> Option<bool> {
        match (self.agree, self.no_agree) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Id of the choice to delete
    pub id: String,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration (connection values masked)
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
