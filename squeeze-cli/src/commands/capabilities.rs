//! Implementation of the 'capabilities' subcommand.
//!
//! Loads the codec engine the same way a compression job would and prints
//! which build was selected for this host.

use crate::cli::CapabilitiesArgs;
use crate::commands::compress::build_config;
use crate::error::CliResult;

use anyhow::Context;
use console::style;
use squeeze_core::{EngineBuild, format_budget};

/// Runs the capabilities command.
pub fn run_capabilities(args: CapabilitiesArgs) -> CliResult<()> {
    let config = build_config(args.config.as_deref(), None, None, args.threads)?;
    let engine = squeeze_core::load(&config.engine).context("Failed to load the codec engine")?;
    let caps = engine.capabilities();

    let build = match caps.build {
        EngineBuild::Threaded { threads } => format!("threaded ({threads} threads)"),
        EngineBuild::SingleThreaded => "single-threaded".to_string(),
    };
    println!("{}", style("Engine Capabilities:").bold());
    println!("  {} {}", style("Build:").bold(), build);
    println!("  {} {}", style("Hardware threads:").bold(), caps.hardware_threads);
    println!("  {} {}", style("Engine arguments:").bold(), caps.thread_args().join(" "));
    println!("  {} {}", style("Byte budget:").bold(), format_budget(config.budget.bytes));
    println!("  {} {}", style("Video mode:").bold(), config.video.mode);
    Ok(())
}
