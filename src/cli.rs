use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "tdk")]
#[command(bin_name = "tdk")]
#[command(version)]
#[command(about = "A single-user task tracker with a normalizing import pipeline")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'D',
        long,
        env = "TASKDECK_DATA_DIR",
        help = "Data directory holding the task database (defaults to ~/.taskdeck)."
    )]
    pub data_dir: Option<PathBuf>,

    #[arg(
        short = 'n',
        long,
        env = "TASKDECK_DB_NAME",
        help = "Database file name inside the data directory."
    )]
    pub db_name: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Create a new task.")]
    Add(AddArgs),
    #[command(about = "Import task files, leaving the sources in place.")]
    Import(ImportArgs),
    #[command(about = "Import task files, edit each one, then delete the sources.")]
    Ingest(ImportArgs),
    #[command(about = "Edit one task in the external editor.")]
    Edit(EditArgs),
    #[command(about = "Export every task as csv, ndjson, json, or a sql dump.")]
    Export(ExportArgs),
    #[command(about = "Snapshot the live database into the backups directory.")]
    Backup,
}

#[derive(Debug, Args)]
#[command(about = "Create a new task.")]
pub struct AddArgs {
    #[arg(help = "Task body text.")]
    pub body: String,

    #[arg(short = 'g', long = "tag", help = "Tag to attach; repeatable.")]
    pub tags: Vec<String>,
}

#[derive(Debug, Args)]
#[command(about = "Import task files (.json or .eml).")]
pub struct ImportArgs {
    #[arg(
        required_unless_present = "dir",
        help = "Task files to import (.json or .eml)."
    )]
    pub paths: Vec<PathBuf>,

    #[arg(
        short = 'd',
        long = "dir",
        conflicts_with = "paths",
        help = "Import every supported file in this directory, sorted by name."
    )]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
#[command(about = "Edit one task in the external editor.")]
pub struct EditArgs {
    #[arg(help = "Task id.")]
    pub id: String,
}

#[derive(Debug, Args)]
#[command(about = "Export every task.")]
pub struct ExportArgs {
    #[arg(help = "Output format: csv, ndjson, json, or sql.")]
    pub format: String,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
