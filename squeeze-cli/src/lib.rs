// squeeze-cli/src/lib.rs
//
// Library portion of the Squeeze CLI application.
// Contains argument definitions, logging setup and command logic.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod progress;

// Re-export items needed by the binary or integration tests
pub use cli::{CapabilitiesArgs, Cli, Commands, CompressArgs};
pub use commands::capabilities::run_capabilities;
pub use commands::compress::run_compress;
