//! CLI module - argument parsing, prompts and stage commands

mod args;
pub mod commands;
mod prompts;

pub use args::{Cli, Commands};
pub use commands::RunContext;
pub use prompts::*;
