//! Canopy CLI Binary
//!
//! Command-line inspector for hierarchical tab-tree state.

use canopy::logging::init_logging;
use canopy::tooling::cli::{Cli, CliContext};
use clap::Parser;
use std::process;

fn main() {
    let cli = Cli::parse();

    let context = match CliContext::new(cli.file.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let mut logging = context.config().logging.clone();
    if let Some(level) = cli.log_level.clone() {
        logging.level = level;
    }
    if let Some(format) = cli.log_format.clone() {
        logging.format = format;
    }
    if let Some(output) = cli.log_output.clone() {
        logging.output = output;
    }
    if let Some(file) = cli.log_file.clone() {
        logging.file = Some(file);
    }
    if let Err(e) = init_logging(Some(&logging)) {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    match context.execute(&cli.command) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
