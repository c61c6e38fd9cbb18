//! Implementation of the 'compress' subcommand.
//!
//! Builds the configuration from file, environment and flags, runs the batch
//! through squeeze-core with one progress bar per file, writes every finished
//! result into the output directory and prints a summary.

use crate::cli::CompressArgs;
use crate::error::{BatchFailed, CliResult};
use crate::progress::AttachmentBars;

use squeeze_core::{
    BatchOutcome, CancelToken, CompressionResult, Config, ConfigBuilder, PendingAttachments,
    Pipeline, SourceFile, TempId, format_budget, format_bytes,
};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use console::style;
use indicatif::{MultiProgress, ProgressDrawTarget};
use log::{debug, info};
use serde_json::json;

/// Loads the configuration file (if any), applies `SQUEEZE_*` overrides and
/// then the command-line flags.
pub fn build_config(
    config_path: Option<&Path>,
    budget: Option<u64>,
    mode: Option<squeeze_core::VideoMode>,
    threads: Option<u16>,
) -> CliResult<Config> {
    let mut config = match config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration '{}'", path.display()))?,
        None => Config::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid SQUEEZE_* environment override")?;

    let mut builder = ConfigBuilder::from_config(config);
    if let Some(bytes) = budget {
        builder = builder.byte_budget(bytes);
    }
    if let Some(mode) = mode {
        builder = builder.video_mode(mode);
    }
    if let Some(threads) = threads {
        builder = builder.engine_threads(usize::from(threads));
    }
    let config = builder.build();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Declared MIME type for `path`: the override, else a guess from the extension.
#[must_use]
pub fn declared_mime(path: &Path, override_mime: Option<&str>) -> String {
    match override_mime {
        Some(mime) => mime.to_string(),
        None => mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default(),
    }
}

/// A path in `dir` for `filename` that does not exist yet.
///
/// `photo.jpg` becomes `photo-1.jpg`, `photo-2.jpg`, ... on collision.
#[must_use]
pub fn unique_output_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match filename.split_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (filename, String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{stem}-{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

fn load_sources(paths: &[PathBuf], mime: Option<&str>) -> CliResult<Vec<SourceFile>> {
    paths
        .iter()
        .map(|path| {
            if !path.is_file() {
                bail!("Input '{}' is not a readable file", path.display());
            }
            let declared = declared_mime(path, mime);
            debug!("{} declared as '{}'", path.display(), declared);
            SourceFile::from_path(path, declared)
                .with_context(|| format!("Failed to open '{}'", path.display()))
        })
        .collect()
}

fn write_results(
    output_dir: &Path,
    ready: Vec<(TempId, CompressionResult)>,
) -> CliResult<HashMap<TempId, (PathBuf, CompressionResult)>> {
    let mut written = HashMap::new();
    for (temp_id, result) in ready {
        let path = unique_output_path(output_dir, result.filename());
        fs::write(&path, result.payload())
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        info!("Wrote {} ({})", path.display(), format_bytes(result.len() as u64));
        written.insert(temp_id, (path, result));
    }
    Ok(written)
}

fn print_summary(
    inputs: &[PathBuf],
    outcomes: &[BatchOutcome],
    written: &HashMap<TempId, (PathBuf, CompressionResult)>,
) {
    println!("{}", style("Compression Summary:").bold());
    for (input, outcome) in inputs.iter().zip(outcomes) {
        match (&outcome.error, written.get(&outcome.temp_id)) {
            (None, Some((path, result))) => println!(
                "  {} {} -> {} ({}, {}{})",
                style("[OK]").green(),
                input.display(),
                path.display(),
                result.mime_type(),
                format_bytes(result.len() as u64),
                result
                    .content_encoding()
                    .map_or(String::new(), |e| format!(", {e}"))
            ),
            (Some(message), _) => println!("  {} {}", style("[FAIL]").red().bold(), message),
            (None, None) => println!(
                "  {} {}: no output was produced",
                style("[FAIL]").red().bold(),
                input.display()
            ),
        }
    }
}

fn json_summary(
    budget: u64,
    inputs: &[PathBuf],
    outcomes: &[BatchOutcome],
    written: &HashMap<TempId, (PathBuf, CompressionResult)>,
) -> serde_json::Value {
    let files: Vec<serde_json::Value> = inputs
        .iter()
        .zip(outcomes)
        .map(|(input, outcome)| match written.get(&outcome.temp_id) {
            Some((path, result)) if outcome.error.is_none() => json!({
                "input": input.display().to_string(),
                "output": path.display().to_string(),
                "mime_type": result.mime_type(),
                "content_encoding": result.content_encoding().map(|e| e.as_str()),
                "bytes": result.len(),
                "error": null,
            }),
            _ => json!({
                "input": input.display().to_string(),
                "output": null,
                "error": outcome.error.clone().unwrap_or_else(|| "no output was produced".to_string()),
            }),
        })
        .collect();
    json!({ "budget": budget, "files": files })
}

/// Runs the compress command. Fails with [`BatchFailed`] after printing the
/// summary when any file could not be compressed.
pub fn run_compress(args: CompressArgs, multi: &MultiProgress) -> CliResult<()> {
    let started = Instant::now();
    let config = build_config(args.config.as_deref(), args.budget, args.mode, args.threads)?;
    let budget = config.budget.bytes;
    let sources = load_sources(&args.files, args.mime.as_deref())?;

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Failed to create output directory '{}'", args.output_dir.display())
    })?;

    info!(
        "Compressing {} file(s) under {} into {}",
        sources.len(),
        format_budget(budget),
        args.output_dir.display()
    );

    if args.json {
        multi.set_draw_target(ProgressDrawTarget::hidden());
    }
    let bars = Arc::new(AttachmentBars::new(multi.clone()));
    let listener = Arc::clone(&bars);
    let attachments = PendingAttachments::with_listener(move |event| listener.handle(event));

    let pipeline = Pipeline::new(config);
    let outcomes = pipeline
        .compress_batch(
            &sources,
            &attachments,
            &CancelToken::new(),
            args.jobs.map(usize::from),
        )
        .context("Failed to run the compression batch")?;

    let written = write_results(&args.output_dir, attachments.take_ready())?;
    multi.clear().ok();

    if args.json {
        let summary = json_summary(budget, &args.files, &outcomes, &written);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&args.files, &outcomes, &written);
    }

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    info!(
        "Finished {} file(s) in {:.1}s, {} failed",
        outcomes.len(),
        started.elapsed().as_secs_f64(),
        failed
    );
    if failed > 0 {
        return Err(BatchFailed {
            failed,
            total: outcomes.len(),
        }
        .into());
    }
    Ok(())
}
