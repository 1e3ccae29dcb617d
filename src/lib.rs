// ABOUTME: Library root for flotilla - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod cli;
pub mod commands;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod exec;
pub mod fix;
pub mod hooks;
pub mod output;
pub mod plugin;
pub mod secrets;
pub mod spec;
pub mod ssh;
pub mod topology;
pub mod types;
