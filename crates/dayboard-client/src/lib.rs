//! CLI, configuration, output rendering
//!
//! This crate provides the `dayboard` command-line interface on top of the
//! `dayboard-providers` engine.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod render;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
