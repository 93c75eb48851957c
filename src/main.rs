mod config;
mod store;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser as _};
use sieve_syntax::Parser;
use tracing::Level;

use crate::config::ValidatorConfig;
use crate::store::script_io::{self, ScriptSource};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

/// Validate SIEVE mail filter scripts.
#[derive(Debug, clap::Parser)]
#[command(name = "sieve-check", version = VERSION, about)]
struct Cli {
    /// Scripts to check; reads stdin when none are given
    files: Vec<PathBuf>,

    /// Print the parse tree of every script
    #[arg(long)]
    dump: bool,

    /// Print the script text reassembled from the parse tree
    #[arg(long)]
    text: bool,

    /// List the extensions a script may require and exit
    #[arg(long)]
    list_extensions: bool,

    /// Only offer this built-in extension (repeatable)
    #[arg(long = "extension", value_name = "NAME")]
    extensions: Vec<String>,

    /// Load an extra extension resource (repeatable)
    #[arg(long = "custom", value_name = "PATH")]
    custom: Vec<PathBuf>,

    /// Ignore the configuration file
    #[arg(long)]
    no_config: bool,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = if cli.no_config {
        ValidatorConfig::default()
    } else {
        ValidatorConfig::load()
    };
    config.apply_overrides(cli.extensions, cli.custom);

    let mut parser = match Parser::new(config.extensions.as_deref(), &config.custom_extensions) {
        Ok(parser) => parser,
        Err(e) => {
            eprintln!("sieve-check: {e}");
            return ExitCode::from(2);
        }
    };

    if cli.list_extensions {
        for name in parser.registry().require_strings() {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    let mut failed = false;
    for source in read_sources(&cli.files) {
        let source = match source {
            Ok(source) => source,
            Err((name, e)) => {
                println!("{name}: {e}");
                failed = true;
                continue;
            }
        };

        match parser.parse(&source.text) {
            Ok(()) => println!("{}: ok", source.name),
            Err(e) => {
                println!("{}: {e}", source.name);
                failed = true;
            }
        }
        if cli.dump {
            print!("{}", parser.dump_parse_tree());
        }
        if cli.text {
            print!("{}", parser.script_text());
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn read_sources(files: &[PathBuf]) -> Vec<Result<ScriptSource, (String, io::Error)>> {
    if files.is_empty() {
        let name = "<stdin>";
        let source = script_io::read_script(&mut io::stdin().lock(), name)
            .map_err(|e| (name.to_string(), e));
        return vec![source];
    }
    files
        .iter()
        .map(|path| {
            let name = path.display().to_string();
            script_io::load_script(path).map_err(|e| (name, e))
        })
        .collect()
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}
