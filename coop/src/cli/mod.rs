//! CLI module
//!
//! Argument definitions for the `coop` binary.

pub mod args;

pub use args::{Cli, Commands};
