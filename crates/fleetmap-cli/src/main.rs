//! Fleetmap CLI: interactive shell, one-shot queries and DOT dumps over
//! binary fleet map files.

use anyhow::{Context, Result};
use clap::Parser;
use fleetmap::{Bucket, Filter, SFGroup};
use tracing::info;

mod cli;
mod repl;

use cli::{Cli, Commands, DumpArgs, QueryArgs, ReplArgs};
use repl::{load_map, parse_predicate, parse_select, Repl};

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Repl(args) => run_repl(args),
        Commands::Query(args) => run_query(args),
        Commands::Dump(args) => run_dump(args),
        Commands::Version => {
            println!("fleetmap {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run_repl(args: ReplArgs) -> Result<()> {
    let mut repl = match args.map {
        Some(path) => {
            let map = load_map(&path)?;
            info!(map = %path.display(), nodes = map.nodelist().len(), "map loaded");
            Repl::with_map(map)
        }
        None => Repl::default(),
    };
    repl.run()
}

fn run_query(args: QueryArgs) -> Result<()> {
    let map = load_map(&args.map)?;
    let group = parse_group(&args)?;

    info!(nodes = map.nodelist().len(), "running query");
    let placed = map.find_nodes(args.pivot.as_bytes(), &[group]);
    if placed.is_empty() {
        println!("no selection");
        std::process::exit(1);
    }
    for id in placed.ids() {
        println!("{id}");
    }
    Ok(())
}

fn parse_group(args: &QueryArgs) -> Result<SFGroup> {
    let mut group = SFGroup { exclude: args.exclude.clone(), ..SFGroup::default() };

    for s in &args.select {
        let (count, key) = s
            .split_once(' ')
            .with_context(|| format!("selector {s:?} must be '<count> <key>'"))?;
        group.selectors.push(parse_select(count.trim(), key.trim())?);
    }

    for f in &args.filter {
        let parts: Vec<&str> = f.split_whitespace().collect();
        let &[key, op, value] = parts.as_slice() else {
            anyhow::bail!("filter {f:?} must be '<key> <op> <value>'");
        };
        group.filters.push(Filter::new(key, parse_predicate(op, value)?));
    }

    Ok(group)
}

fn run_dump(args: DumpArgs) -> Result<()> {
    let map: Bucket = load_map(&args.map)?;
    std::fs::write(&args.out, map.to_dot())
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!(out = %args.out.display(), "dump written");
    Ok(())
}
