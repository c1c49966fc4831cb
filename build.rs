// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn atom_arg() -> Arg {
    Arg::new("atom").required(true).help("Package atom")
}

fn attr_arg() -> Arg {
    Arg::new("attrs")
        .short('a')
        .long("attr")
        .value_name("KEY=VALUE")
        .action(ArgAction::Append)
        .help("Attribute condition (repeatable)")
}

fn build_cli() -> Command {
    Command::new("pmquery")
        .version(env!("CARGO_PKG_VERSION"))
        .author("pmquery Contributors")
        .about("Query Gentoo-style package repositories")
        .subcommand_required(true)
        .arg(
            Arg::new("repo")
                .short('r')
                .long("repo")
                .value_name("REPO")
                .action(ArgAction::Append)
                .global(true)
                .help("Repository index to stack, as [NAME=]PATH[:PRIORITY]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("JSON stack configuration file"),
        )
        .subcommand(Command::new("package-manager").about("Print the backend name"))
        .subcommand(
            Command::new("select")
                .about("Print the best package matching an atom and attribute filters")
                .arg(atom_arg())
                .arg(attr_arg()),
        )
        .subcommand(
            Command::new("filter")
                .about("Print every package matching the filters")
                .arg(Arg::new("atom").help("Package atom (optional)"))
                .arg(attr_arg())
                .arg(
                    Arg::new("regexes")
                        .long("regex")
                        .value_name("KEY=PATTERN")
                        .action(ArgAction::Append)
                        .help("Regex attribute condition (repeatable)"),
                ),
        )
        .subcommand(
            Command::new("get")
                .about("Print the single package matching an atom")
                .arg(atom_arg()),
        )
        .subcommand(
            Command::new("group-by")
                .about("Group packages by attribute values")
                .arg(
                    Arg::new("attributes")
                        .required(true)
                        .num_args(1..)
                        .help("Attribute names forming the group key"),
                )
                .arg(
                    Arg::new("atom")
                        .long("atom")
                        .help("Restrict grouping to packages matching this atom"),
                ),
        )
        .subcommand(
            Command::new("depends")
                .about("Show the dependencies of the best package matching an atom")
                .arg(atom_arg())
                .arg(
                    Arg::new("kind")
                        .short('k')
                        .long("kind")
                        .value_parser(["run", "build", "bdepend", "post"])
                        .default_value("run")
                        .help("Dependency variable"),
                )
                .arg(
                    Arg::new("use_flags")
                        .short('u')
                        .long("use")
                        .value_name("FLAG")
                        .action(ArgAction::Append)
                        .help("Applied USE flag (defaults to the package's own)"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("pmquery.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
