//! Subcommand implementations.

pub mod agenda;
pub mod auth;
pub mod config;
pub mod weather;
