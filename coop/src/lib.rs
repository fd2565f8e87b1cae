//! Cooperations command-line front end
//!
//! Everything around the workflow engine that a runnable program needs:
//! layered configuration, a SQLite task store, model-backed and scripted
//! agents, an operator console on stdin and terminal rendering of the
//! engine's observer channels.

pub mod agents;
pub mod cli;
pub mod config;
pub mod console;
pub mod db;
pub mod handlers;
pub mod output;
