//! The interactive shell over an in-memory fleet map.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use fleetmap::{Bucket, Filter, Node, SFGroup, Select, SimpleFilter};
use tracing::debug;

const HELP: &str = "\
commands:
  load <file>              load a map from a binary file
  save <file>              save the map to a binary file
  add <id> <path>...       add a node under one or more /k:v/... paths
  select <count> <key>     append a selector to the current rule
  filter <key> <op> <val>  append a filter (op: EQ NE LT LE GT GE)
  exclude <id>...          exclude node ids from selection
  get-selection [pivot]    run the rule and print the selected node ids
  max-selection            print the maximal satisfiable node set
  clear-selection          drop the current selectors/filters/excludes
  clear                    drop the whole map
  dump <file>              write the map as GraphViz .dot
  help                     this text
  exit                     leave the shell";

/// Shell state: the map plus the rule built up so far.
#[derive(Default)]
pub struct Repl {
    map: Bucket,
    selectors: Vec<Select>,
    filters: Vec<Filter>,
    exclude: Vec<u32>,
}

impl Repl {
    /// Create a shell around an existing map.
    pub fn with_map(map: Bucket) -> Self {
        Self { map, ..Self::default() }
    }

    fn group(&self) -> SFGroup {
        SFGroup {
            selectors: self.selectors.clone(),
            filters: self.filters.clone(),
            exclude: self.exclude.clone(),
        }
    }

    /// Run the shell until EOF or `exit`.
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut out = io::stdout();

        loop {
            write!(out, ">>> ")?;
            out.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" {
                return Ok(());
            }

            match self.dispatch(line) {
                Ok(Some(output)) => writeln!(out, "{output}")?,
                Ok(None) => {}
                Err(err) => writeln!(out, "error: {err:#}")?,
            }
        }
    }

    /// Execute one command line; returns the text to print, if any.
    pub fn dispatch(&mut self, line: &str) -> Result<Option<String>> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        debug!(command, ?args, "dispatch");

        match command {
            "load" => {
                let &[path] = args.as_slice() else { bail!("usage: load <file>") };
                self.map = load_map(Path::new(path))?;
                Ok(Some(format!("loaded {} nodes", self.map.nodelist().len())))
            }
            "save" => {
                let &[path] = args.as_slice() else { bail!("usage: save <file>") };
                std::fs::write(path, self.map.encode())
                    .with_context(|| format!("writing {path}"))?;
                Ok(None)
            }
            "add" => {
                let [id, paths @ ..] = &args[..] else {
                    bail!("usage: add <id> <path>...")
                };
                if paths.is_empty() {
                    bail!("usage: add <id> <path>...");
                }
                let id: u32 = id.parse().context("node id must be a u32")?;
                self.map.add_node(Node::new(id), paths)?;
                Ok(None)
            }
            "select" => {
                let &[count, key] = args.as_slice() else {
                    bail!("usage: select <count> <key>")
                };
                self.selectors.push(parse_select(count, key)?);
                Ok(None)
            }
            "filter" => {
                let &[key, op, value] = args.as_slice() else {
                    bail!("usage: filter <key> <op> <value>")
                };
                self.filters.push(Filter::new(key, parse_predicate(op, value)?));
                Ok(None)
            }
            "exclude" => {
                for id in &args {
                    self.exclude.push(id.parse().context("node id must be a u32")?);
                }
                Ok(None)
            }
            "get-selection" => {
                let pivot = args.first().map_or(&b""[..], |p| p.as_bytes());
                let nodes = self.map.find_nodes(pivot, &[self.group()]);
                if nodes.is_empty() {
                    Ok(Some("no selection".to_owned()))
                } else {
                    Ok(Some(format!("{:?}", nodes.ids())))
                }
            }
            "max-selection" => match self.map.get_max_selection(&self.group()) {
                Some(b) => Ok(Some(format!("{:?}", b.nodelist().ids()))),
                None => Ok(Some("no selection".to_owned())),
            },
            "clear-selection" => {
                self.selectors.clear();
                self.filters.clear();
                self.exclude.clear();
                Ok(None)
            }
            "clear" => {
                self.map = Bucket::default();
                Ok(None)
            }
            "dump" => {
                let &[path] = args.as_slice() else { bail!("usage: dump <file>") };
                std::fs::write(path, self.map.to_dot())
                    .with_context(|| format!("writing {path}"))?;
                Ok(None)
            }
            "help" => Ok(Some(HELP.to_owned())),
            other => bail!("unknown command {other:?}, try 'help'"),
        }
    }
}

/// Load and sanity-check a map file.
pub fn load_map(path: &Path) -> Result<Bucket> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let map = Bucket::decode(&data).with_context(|| format!("decoding {}", path.display()))?;
    map.validate().context("map fails tree invariants")?;
    Ok(map)
}

/// Parse a `<count> <key>` selector.
pub fn parse_select(count: &str, key: &str) -> Result<Select> {
    let count: u32 = count.parse().context("selector count must be a u32")?;
    Ok(Select::new(key, count))
}

/// Parse a `<op> <value>` predicate.
pub fn parse_predicate(op: &str, value: &str) -> Result<SimpleFilter> {
    let numeric = |value: &str| -> Result<i64> {
        value.parse::<i64>().context("numeric filters take an i64 literal")
    };
    Ok(match op {
        "EQ" => SimpleFilter::Eq(value.to_owned()),
        "NE" => SimpleFilter::Ne(value.to_owned()),
        "LT" => SimpleFilter::Lt(numeric(value)?),
        "LE" => SimpleFilter::Le(numeric(value)?),
        "GT" => SimpleFilter::Gt(numeric(value)?),
        "GE" => SimpleFilter::Ge(numeric(value)?),
        other => bail!("unknown filter op {other:?}, expected EQ/NE/LT/LE/GT/GE"),
    })
}
