//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Fleetmap: deterministic placement over a hierarchical storage fleet.
#[derive(Parser)]
#[command(name = "fleetmap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive shell.
    Repl(ReplArgs),
    /// Run a single placement query against a map file.
    Query(QueryArgs),
    /// Write a GraphViz dump of a map file.
    Dump(DumpArgs),
    /// Print version information.
    Version,
}

/// Arguments for the repl command.
#[derive(Args)]
pub struct ReplArgs {
    /// Map file to preload.
    #[arg(short, long)]
    pub map: Option<PathBuf>,
}

/// Arguments for the query command.
#[derive(Args)]
pub struct QueryArgs {
    /// Map file to query.
    #[arg(short, long)]
    pub map: PathBuf,

    /// Selector, as `<count> <key>`; repeatable, applied in order.
    ///
    /// Example: --select "1 Location" --select "2 City"
    #[arg(short, long)]
    pub select: Vec<String>,

    /// Filter, as `<key> <op> <value>` with op one of EQ, NE, LT, LE, GT, GE.
    ///
    /// Example: --filter "Location EQ Europe"
    #[arg(short, long)]
    pub filter: Vec<String>,

    /// Node ids to exclude.
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Vec<u32>,

    /// Pivot string salting the ranking; typically the object id.
    #[arg(short, long, default_value = "")]
    pub pivot: String,
}

/// Arguments for the dump command.
#[derive(Args)]
pub struct DumpArgs {
    /// Map file to render.
    #[arg(short, long)]
    pub map: PathBuf,

    /// Output path for the .dot file.
    #[arg(short, long)]
    pub out: PathBuf,
}
