// src/main.rs

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use pmquery::config::{RepositoryEntry, StackConfig};
use pmquery::packages::{DependencyClass, MemoryPackage};
use pmquery::query::ValueMatcher;
use pmquery::repository::RepositoryStack;
use pmquery::{DepAtom, Filter, Package, PackageSet};
use std::io;
use std::path::PathBuf;
use tracing::{debug, info};

/// Dependency variable selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DepKindArg {
    Run,
    Build,
    Bdepend,
    Post,
}

impl From<DepKindArg> for DependencyClass {
    fn from(kind: DepKindArg) -> Self {
        match kind {
            DepKindArg::Run => DependencyClass::Run,
            DepKindArg::Build => DependencyClass::Build,
            DepKindArg::Bdepend => DependencyClass::CbuildBuild,
            DepKindArg::Post => DependencyClass::Post,
        }
    }
}

#[derive(Parser)]
#[command(name = "pmquery")]
#[command(author, version, about = "Query Gentoo-style package repositories", long_about = None)]
struct Cli {
    /// Repository index to stack, as [NAME=]PATH[:PRIORITY] (repeatable)
    #[arg(short, long = "repo", global = true, value_name = "REPO")]
    repos: Vec<RepositoryEntry>,

    /// JSON stack configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the backend name
    PackageManager,
    /// Print the best package matching an atom and attribute filters
    Select {
        /// Package atom
        atom: String,
        /// Attribute condition KEY=VALUE (repeatable)
        #[arg(short = 'a', long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,
    },
    /// Print every package matching the filters
    Filter {
        /// Package atom (optional, matches everything if omitted)
        atom: Option<String>,
        /// Attribute condition KEY=VALUE (repeatable)
        #[arg(short = 'a', long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,
        /// Regex attribute condition KEY=PATTERN (repeatable)
        #[arg(long = "regex", value_name = "KEY=PATTERN")]
        regexes: Vec<String>,
    },
    /// Print the single package matching an atom
    Get {
        /// Package atom
        atom: String,
    },
    /// Group packages by attribute values
    GroupBy {
        /// Attribute names forming the group key
        #[arg(required = true)]
        attributes: Vec<String>,
        /// Restrict grouping to packages matching this atom
        #[arg(long)]
        atom: Option<String>,
    },
    /// Show the dependencies of the best package matching an atom
    Depends {
        /// Package atom
        atom: String,
        /// Dependency variable
        #[arg(short, long, value_enum, default_value = "run")]
        kind: DepKindArg,
        /// Applied USE flag (repeatable; defaults to the package's own)
        #[arg(short = 'u', long = "use", value_name = "FLAG")]
        use_flags: Vec<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

/// Split a KEY=VALUE argument
fn split_condition(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => bail!("Expected KEY=VALUE, got '{}'", arg),
    }
}

/// Build a filter from an optional atom plus attribute conditions
///
/// `KEY=VALUE` compares the textual form of the attribute, so it works for
/// numeric and list attributes as well as strings.
fn build_filter(atom: Option<&str>, attrs: &[String], regexes: &[String]) -> Result<Filter> {
    let mut filter = Filter::new();
    if let Some(atom) = atom {
        filter = filter.atom(DepAtom::parse(atom)?);
    }
    for arg in attrs {
        let (key, value) = split_condition(arg)?;
        filter = filter.attr(key, ValueMatcher::regex(&regex::escape(value))?);
    }
    for arg in regexes {
        let (key, pattern) = split_condition(arg)?;
        filter = filter.attr(key, ValueMatcher::regex(pattern)?);
    }
    debug!("Built filter with {} matchers", filter.len());
    Ok(filter)
}

fn open_stack(config: Option<&PathBuf>, repos: &[RepositoryEntry]) -> Result<RepositoryStack> {
    let mut stack_config = match config {
        Some(path) => StackConfig::load(path)
            .with_context(|| format!("Failed to read stack configuration {}", path.display()))?,
        None => StackConfig::default(),
    };
    stack_config.extend(repos.iter().cloned());

    if stack_config.repositories.is_empty() {
        bail!("No repositories given; use --repo or --config");
    }
    let stack = stack_config.build_stack()?;
    info!("Opened stack of {} repositories", stack.repositories().len());
    Ok(stack)
}

fn cpv(pkg: &MemoryPackage) -> String {
    let mut s = format!("{}-{}:{}", pkg.key(), pkg.version(), pkg.slot());
    if let Some(repo) = pkg.repository() {
        s.push_str("::");
        s.push_str(repo);
    }
    s
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::PackageManager => {
            println!("pmquery");
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pmquery", &mut io::stdout());
        }
        Commands::Select { atom, attrs } => {
            let stack = open_stack(cli.config.as_ref(), &cli.repos)?;
            let filter = build_filter(Some(&atom), &attrs, &[])?;
            let pkg = stack.select(filter)?;
            println!("{}", cpv(pkg));
        }
        Commands::Filter {
            atom,
            attrs,
            regexes,
        } => {
            let stack = open_stack(cli.config.as_ref(), &cli.repos)?;
            let filter = build_filter(atom.as_deref(), &attrs, &regexes)?;
            let matches = stack.filter(filter);

            let mut count = 0;
            for pkg in matches.iter() {
                println!("{}", cpv(pkg?));
                count += 1;
            }
            if count == 0 {
                println!("No packages found.");
            }
        }
        Commands::Get { atom } => {
            let stack = open_stack(cli.config.as_ref(), &cli.repos)?;
            let pkg = stack.get(DepAtom::parse(&atom)?)?;
            println!("{}", cpv(pkg));
        }
        Commands::GroupBy { attributes, atom } => {
            let stack = open_stack(cli.config.as_ref(), &cli.repos)?;
            let criteria: Vec<&str> = attributes.iter().map(String::as_str).collect();
            let filter = build_filter(atom.as_deref(), &[], &[])?;
            let matches = stack.filter(filter);
            let groups = matches.group_by(&criteria)?;

            for (key, group) in groups.items() {
                let key: Vec<String> = key.iter().map(ToString::to_string).collect();
                println!("({}):", key.join(", "));
                for pkg in group.as_slice() {
                    println!("  {}", cpv(pkg));
                }
            }
            println!("\nTotal: {} group(s)", groups.len());
        }
        Commands::Depends {
            atom,
            kind,
            use_flags,
        } => {
            let stack = open_stack(cli.config.as_ref(), &cli.repos)?;
            let pkg = stack.select(DepAtom::parse(&atom)?)?;
            let class = DependencyClass::from(kind);

            let raw = pkg.dependencies(class)?;
            let evaluated = if use_flags.is_empty() {
                pkg.evaluated_dependencies(class)?
            } else {
                raw.without_conditionals(&use_flags)
            };

            println!("{}", cpv(pkg));
            println!("  Declared:  {}", raw);
            println!("  Evaluated: {}", evaluated);
        }
    }

    Ok(())
}
