//! `sectorform` - CLI for the sector choice form
//!
//! This binary loads the configuration, opens the document store and drives
//! the form controller for one command.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::watch;

use sectorform::cli::{
    Cli, Command, ConfigCommand, CreateCommand, EditCommand, OutputFormat, SectorsCommand,
};
use sectorform::model::{CHOICES_COLLECTION, SECTORS_COLLECTION};
use sectorform::render;
use sectorform::sectors::SectorIndexBuilder;
use sectorform::{
    init_logging, Config, DocumentStore, FormController, LoadOutcome, Notice, Outcome,
    SqliteStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Execute the command
    match cli.command {
        Command::Sectors(SectorsCommand::List { format }) => {
            let (config, store) = open(cli.config)?;
            handle_sectors_list(store, &config, format).await
        }
        Command::Sectors(SectorsCommand::Import { file }) => {
            let (config, store) = open(cli.config)?;
            handle_sectors_import(store, &config, &file).await
        }
        Command::List(list_cmd) => {
            let (config, store) = open(cli.config)?;
            handle_list(store, &config, list_cmd.format).await
        }
        Command::Create(create_cmd) => {
            let (config, store) = open(cli.config)?;
            handle_create(store, &config, create_cmd).await
        }
        Command::Edit(edit_cmd) => {
            let (config, store) = open(cli.config)?;
            handle_edit(store, &config, edit_cmd).await
        }
        Command::Delete(delete_cmd) => {
            let (config, store) = open(cli.config)?;
            handle_delete(store, &config, &delete_cmd.id).await
        }
        Command::Status(status_cmd) => {
            let (_, store) = open(cli.config)?;
            handle_status(&store, status_cmd.json)
        }
        Command::Config(config_cmd) => handle_config(cli.config, config_cmd),
    }
}

/// Load the configuration and open the document store it points at.
fn open(config_path: Option<PathBuf>) -> anyhow::Result<(Config, Arc<SqliteStore>)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    let store = SqliteStore::open(config.database_path(), config.store.project_id.clone())
        .context("failed to open document store")?;
    Ok((config, Arc::new(store)))
}

/// Build the controller, run the initial load and report its notices.
///
/// Returns the controller and whether any part of the load failed.
async fn load_controller(
    store: Arc<SqliteStore>,
    config: &Config,
) -> anyhow::Result<(FormController, bool)> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let store: Arc<dyn DocumentStore> = store;
    let mut controller = FormController::from_config(store, config).with_shutdown(shutdown_rx);
    if controller.initial_load().await == LoadOutcome::Cancelled {
        bail!("interrupted");
    }

    let notices = controller.take_notices();
    let failed = notices.iter().any(Notice::is_error);
    print_notices(&notices);
    Ok((controller, failed))
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        if notice.is_error() {
            eprintln!("{notice}");
        } else {
            println!("{notice}");
        }
    }
}

async fn handle_sectors_list(
    store: Arc<SqliteStore>,
    config: &Config,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let index = SectorIndexBuilder::from_config(store, &config.sectors)
        .load()
        .await
        .context("could not load sectors")?;

    match format {
        OutputFormat::Json => println!("{}", render::sectors_json(&index)?),
        OutputFormat::Plain | OutputFormat::Table => {
            if index.is_empty() {
                println!("No sectors. Seed them with `sectorform sectors import FILE`.");
            } else {
                print!("{}", render::sector_options(&index, None));
            }
        }
    }
    Ok(())
}

async fn handle_sectors_import(
    store: Arc<SqliteStore>,
    config: &Config,
    file: &Path,
) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("could not read {}", file.display()))?;
    let seeds = SectorIndexBuilder::parse_seeds(&json)
        .with_context(|| format!("invalid sector file {}", file.display()))?;

    let written = SectorIndexBuilder::from_config(store, &config.sectors)
        .import(seeds)
        .await
        .context("could not import sectors")?;
    println!("Imported {written} sectors");
    Ok(())
}

async fn handle_list(
    store: Arc<SqliteStore>,
    config: &Config,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (controller, failed) = load_controller(store, config).await?;
    if failed {
        bail!("could not load choices");
    }

    let choices = controller.choices();
    let index = controller.sector_index();
    match format {
        OutputFormat::Json => println!("{}", render::choices_json(choices, index)?),
        OutputFormat::Table => print!("{}", render::choice_table(choices, index)),
        OutputFormat::Plain => print!("{}", render::choice_lines(choices, index)),
    }
    Ok(())
}

async fn handle_create(
    store: Arc<SqliteStore>,
    config: &Config,
    cmd: CreateCommand,
) -> anyhow::Result<()> {
    let (mut controller, _) = load_controller(store, config).await?;

    controller.create();
    controller.set_user(cmd.user.unwrap_or_default());
    controller.set_chosen_ids(cmd.sectors);
    controller.set_agree_to_terms(cmd.agree);

    let outcome = controller.submit().await;
    finish_submit(&mut controller, outcome)
}

async fn handle_edit(
    store: Arc<SqliteStore>,
    config: &Config,
    cmd: EditCommand,
) -> anyhow::Result<()> {
    let (mut controller, failed) = load_controller(store, config).await?;
    if failed {
        bail!("could not load choices");
    }

    if !controller.edit(&cmd.id) {
        print_notices(&controller.take_notices());
        bail!("no choice with id {}", cmd.id);
    }
    let agree = cmd.agree_to_terms();
    if let Some(user) = cmd.user {
        controller.set_user(user);
    }
    if !cmd.sectors.is_empty() {
        controller.set_chosen_ids(cmd.sectors);
    }
    if let Some(agree) = agree {
        controller.set_agree_to_terms(agree);
    }

    let outcome = controller.submit().await;
    finish_submit(&mut controller, outcome)
}

fn finish_submit(controller: &mut FormController, outcome: Outcome) -> anyhow::Result<()> {
    print_notices(&controller.take_notices());
    match outcome {
        Outcome::Saved(_) => Ok(()),
        Outcome::Invalid => {
            if let Some(form) = controller.form() {
                for line in render::field_errors(&form.errors) {
                    eprintln!("{line}");
                }
            }
            bail!("choice rejected")
        }
        Outcome::Failed => bail!("could not save choice"),
        Outcome::Deleted(_) | Outcome::Ignored => bail!("form was not open"),
    }
}

async fn handle_delete(store: Arc<SqliteStore>, config: &Config, id: &str) -> anyhow::Result<()> {
    let (mut controller, failed) = load_controller(store, config).await?;
    if failed {
        bail!("could not load choices");
    }

    let outcome = controller.delete(id).await;
    print_notices(&controller.take_notices());
    match outcome {
        Outcome::Deleted(_) => Ok(()),
        _ => bail!("could not delete choice {id}"),
    }
}

fn handle_status(store: &SqliteStore, json: bool) -> anyhow::Result<()> {
    let stats = store.stats()?;
    let sectors = stats.count_of(SECTORS_COLLECTION);
    let choices = stats.count_of(CHOICES_COLLECTION);

    if json {
        let status = serde_json::json!({
            "database_path": store.path(),
            "project": stats.project,
            "sectors": sectors,
            "choices": choices,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("sectorform status");
        println!("-----------------");
        println!("Database:      {}", store.path().display());
        println!("Project:       {}", stats.project);
        println!("Sectors:       {sectors}");
        println!("Choices:       {choices}");
        println!("Size (bytes):  {}", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)
                .context("failed to load configuration")?
                .redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Store]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Project:            {}", config.store.project_id);
                println!(
                    "  Connection keys:    {}",
                    config
                        .store
                        .connection
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                println!();
                println!("[Sectors]");
                println!("  Delimiter:          {}", config.sectors.delimiter);
                println!("  Order:              {}", config.sectors.order);
                println!();
                println!("[Choices]");
                println!("  Refresh:            {}", config.choices.refresh);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
