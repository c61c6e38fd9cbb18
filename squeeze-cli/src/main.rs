// squeeze-cli/src/main.rs
//
// Entry point of the `squeeze` binary.
//
// Responsibilities include:
// - Parsing the command line.
// - Installing console and optional file logging.
// - Dispatching to the requested command.
// - Reporting errors and setting the process exit code.

use clap::Parser;
use console::style;
use indicatif::MultiProgress;
use std::process;

use squeeze_cli::error::exit_code;
use squeeze_cli::logging::init_logging;
use squeeze_cli::{Cli, Commands, run_capabilities, run_compress};

fn main() {
    let cli = Cli::parse();
    let multi = MultiProgress::new();

    match init_logging(cli.verbose, cli.log_dir.as_deref(), &multi) {
        Ok(Some(path)) => log::info!("Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Compress(args) => run_compress(args, &multi),
        Commands::Capabilities(args) => run_capabilities(args),
    };

    if let Err(e) = result {
        log::debug!("Command failed: {e:?}");
        eprintln!("{} {e:#}", style("Error:").red().bold());
        process::exit(exit_code(&e));
    }
}
