//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

/// Module containing the implementation of the `capabilities` command.
/// This command loads the codec engine and reports the build it selected.
pub mod capabilities;

/// Module containing the implementation of the `compress` command.
/// This command compresses files under the byte budget into an output directory.
pub mod compress;
