pub mod card;
pub mod cli;
pub mod data;
pub mod error;
pub mod grid;
pub mod heuristics;
pub mod io_utils;
pub mod mapping;
pub mod project;
pub mod session;
pub mod table;
pub mod tokenizer;
pub mod translate;
pub mod validate;

use std::{env, io::Write, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    card::Card,
    cli::{Cli, Commands, SessionArgs},
    project::InMemoryProject,
    session::{ImportOptions, ImportSession},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("card_import", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Mappings(args) => handle_mappings(&args.session),
        Commands::Validate(args) => handle_validate(&args.session),
        Commands::Import(args) => handle_import(&args),
    }
}

fn load_project(path: Option<&Path>) -> Result<InMemoryProject> {
    match path {
        Some(path) => InMemoryProject::load(path)
            .with_context(|| format!("Loading project from {path:?}")),
        None => {
            debug!("No project file given; importing into an empty project");
            Ok(InMemoryProject::new())
        }
    }
}

fn open_session(args: &SessionArgs, project: &InMemoryProject) -> Result<ImportSession> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let options = ImportOptions {
        overrides: args.kinds.clone().map(|kinds| kinds.0).unwrap_or_default(),
        tree: args.tree.clone(),
        sample_rows: args.sample_rows,
        allow_new_card_types: args.admin,
        ..ImportOptions::default()
    };
    info!(
        "Reading '{}' with encoding {}",
        args.input.display(),
        encoding.name()
    );
    let input = io_utils::open_input(&args.input)?;
    ImportSession::open(input, encoding, project, options)
        .with_context(|| format!("Reading table from {:?}", args.input))
}

fn handle_mappings(args: &SessionArgs) -> Result<()> {
    let project = load_project(args.project.as_deref())?;
    let session = open_session(args, &project)?;
    let first_row = match session.row_count() {
        0 => None,
        _ => Some(session.row(0)?),
    };
    table::mapping_table(session.header(), first_row.as_deref()).print();
    session.warnings(&project)?;
    Ok(())
}

fn handle_validate(args: &SessionArgs) -> Result<()> {
    let project = load_project(args.project.as_deref())?;
    let session = open_session(args, &project)?;
    session.validate(&project)?;
    let warnings = session.warnings(&project)?;
    info!(
        "{} row(s) ready to import with {} warning(s)",
        session.row_count(),
        warnings.len()
    );
    println!("OK: {} row(s) ready to import", session.row_count());
    Ok(())
}

#[derive(Serialize)]
struct ImportedCard<'a> {
    row: usize,
    #[serde(flatten)]
    card: &'a Card,
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let mut project = load_project(args.session.project.as_deref())?;
    let session = open_session(&args.session, &project)?;
    session.warnings(&project)?;
    let prepared = session.prepare_schema(&mut project)?;
    for name in &prepared.changes().properties {
        info!("Created property '{name}'");
    }
    for name in &prepared.changes().card_types {
        info!("Created card type '{name}'");
    }

    let mut writer = io_utils::open_output(args.output.as_deref())?;
    let mut imported = Vec::new();
    for item in prepared.translate(&project, args.start_row)? {
        let (card, row) = item?;
        serde_json::to_writer(&mut writer, &ImportedCard { row, card: &card })
            .context("Writing card")?;
        writeln!(writer)?;
        imported.push(card);
    }
    writer.flush().context("Flushing output")?;

    let erred = imported.iter().filter(|card| card.has_errors()).count();
    info!(
        "Imported {} card(s) starting at position {}; {} with property errors",
        imported.len(),
        args.start_row,
        erred
    );

    if let Some(path) = &args.save_project {
        for card in imported {
            project.store_card(card);
        }
        project
            .save(path)
            .with_context(|| format!("Writing project to {path:?}"))?;
        info!("Project written to {path:?}");
    }
    Ok(())
}
