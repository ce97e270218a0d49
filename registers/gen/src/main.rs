// Licensed under the Apache-2.0 license

use clap::{ArgAction, Parser};
use log::LevelFilter;
use registers_context::OutputFormat;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

mod generate;

#[derive(Parser, Debug)]
#[command(
    name = "regmap-gen",
    author,
    version,
    about = "Generate register-map sources, headers and docs from an elaborated register tree"
)]
struct Cli {
    /// Elaborated register tree (JSON)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: PathBuf,

    /// Output formats: vhdl, map, h, adoc, tcl
    #[arg(short = 'f', long = "format-out", value_name = "FORMAT", num_args = 1..)]
    formats: Vec<OutputFormat>,

    /// Root directory of the generated files
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Per-format template sets
    #[arg(short = 't', long = "templates-dir", value_name = "DIR")]
    templates_dir: Option<PathBuf>,

    /// Per-format library sets
    #[arg(short = 'l', long = "libraries-dir", value_name = "DIR")]
    libraries_dir: Option<PathBuf>,

    /// TOML file with generator options; flags take precedence
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Worker threads for per-map rendering
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,

    /// More output (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(err) = generate::run(&cli) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
