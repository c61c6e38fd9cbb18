// squeeze-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use squeeze_core::VideoMode;
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Squeeze: compress files under a byte budget",
    long_about = "Compresses images, audio, video and other files so each output fits a hard byte budget, using ffmpeg via squeeze-core."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug output to the console (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Also write a timestamped log file into this directory
    #[arg(long, global = true, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compresses files into an output directory
    Compress(CompressArgs),
    /// Loads the codec engine and prints the selected build
    Capabilities(CapabilitiesArgs),
}

#[derive(Args, Debug)]
pub struct CompressArgs {
    /// Files to compress
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Directory where compressed files will be saved
    #[arg(short = 'o', long = "output", required = true, value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Byte budget per output, e.g. 1048576, 512K or 2M
    #[arg(short, long, value_name = "BYTES", value_parser = parse_budget)]
    pub budget: Option<u64>,

    /// Video handling: keep the whole duration or a short excerpt
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<VideoMode>,

    /// Declared MIME type for every input (guessed from the extension otherwise)
    #[arg(long, value_name = "TYPE")]
    pub mime: Option<String>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "SQUEEZE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of files compressed concurrently
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Engine thread count (1 forces the single-threaded build)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: Option<u16>,

    /// Print the summary as JSON on stdout and hide progress bars
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CapabilitiesArgs {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "SQUEEZE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Engine thread count to request
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: Option<u16>,
}

/// Parses a byte count with an optional binary suffix (`K`, `KB`, `KiB`, `M`, ...).
pub fn parse_budget(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, suffix) = value.split_at(split);
    let number: u64 = digits
        .parse()
        .map_err(|_| format!("'{value}' is not a byte count"))?;
    let multiplier: u64 = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        "g" | "gb" | "gib" => 1024 * 1024 * 1024,
        other => return Err(format!("unknown size suffix '{other}'")),
    };
    match number.checked_mul(multiplier) {
        Some(0) => Err("the budget must be positive".to_string()),
        Some(bytes) => Ok(bytes),
        None => Err(format!("'{value}' is too large")),
    }
}

fn parse_mode(value: &str) -> Result<VideoMode, String> {
    value.parse().map_err(|e: squeeze_core::CoreError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compress_basic_args() {
        let cli = Cli::parse_from(["squeeze", "compress", "a.png", "b.mp4", "-o", "out"]);
        match cli.command {
            Commands::Compress(args) => {
                assert_eq!(args.files, vec![PathBuf::from("a.png"), PathBuf::from("b.mp4")]);
                assert_eq!(args.output_dir, PathBuf::from("out"));
                assert!(args.budget.is_none());
                assert!(args.mode.is_none());
                assert!(!args.json);
            }
            Commands::Capabilities(_) => panic!("Expected Compress command"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_compress_with_overrides() {
        let cli = Cli::parse_from([
            "squeeze", "compress", "clip.mov", "-o", "out", "--budget", "512K", "--mode",
            "excerpt", "--jobs", "2", "--threads", "1", "--mime", "video/quicktime", "--verbose",
            "--log-dir", "logs",
        ]);
        let Commands::Compress(args) = cli.command else {
            panic!("Expected Compress command");
        };
        assert_eq!(args.budget, Some(524_288));
        assert_eq!(args.mode, Some(VideoMode::Excerpt));
        assert_eq!(args.jobs, Some(2));
        assert_eq!(args.threads, Some(1));
        assert_eq!(args.mime.as_deref(), Some("video/quicktime"));
        assert!(cli.verbose);
        assert_eq!(cli.log_dir, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_parse_budget() {
        assert_eq!(parse_budget("1048576"), Ok(1_048_576));
        assert_eq!(parse_budget("1M"), Ok(1_048_576));
        assert_eq!(parse_budget("2 MiB"), Ok(2_097_152));
        assert_eq!(parse_budget("300kb"), Ok(307_200));
        assert!(parse_budget("0").is_err());
        assert!(parse_budget("abc").is_err());
        assert!(parse_budget("10X").is_err());
    }
}
