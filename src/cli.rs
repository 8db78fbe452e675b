use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};

use crate::mapping::ImportKind;

#[derive(Debug, Parser)]
#[command(author, version, about = "Import pasted spreadsheet tables as cards", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the inferred kind of every column in a formatted table
    Mappings(MappingsArgs),
    /// Check a table against a project without changing anything
    Validate(ValidateArgs),
    /// Translate every row into a card and emit the cards as JSON lines
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Tab-separated input file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Project definition (YAML); an empty project is used when omitted
    #[arg(short = 'p', long = "project")]
    pub project: Option<PathBuf>,
    /// Comma-separated column kinds by position; empty entries keep the inferred kind
    #[arg(long = "kinds", value_parser = parse_kind_overrides)]
    pub kinds: Option<KindOverrides>,
    /// Tree to import the cards into
    #[arg(long)]
    pub tree: Option<String>,
    /// Number of rows sampled when inferring column kinds (0 means every row)
    #[arg(long, default_value_t = crate::session::DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// Character encoding of the input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Allow unknown card types to be created
    #[arg(long)]
    pub admin: bool,
}

#[derive(Debug, Args)]
pub struct MappingsArgs {
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Output file for JSON lines (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Position in the translation order to resume from
    #[arg(long = "start-row", default_value_t = 0)]
    pub start_row: usize,
    /// Write the grown project back to this YAML file
    #[arg(long = "save-project")]
    pub save_project: Option<PathBuf>,
}

/// Positional kind overrides parsed from `--kinds`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KindOverrides(pub Vec<Option<ImportKind>>);

pub fn parse_kind_overrides(value: &str) -> Result<KindOverrides, String> {
    value
        .split(',')
        .map(str::trim)
        .map(|token| {
            if token.is_empty() {
                Ok(None)
            } else {
                ImportKind::from_str(token)
                    .map(Some)
                    .map_err(|err| err.to_string())
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(KindOverrides)
}
