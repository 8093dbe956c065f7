//! Whereabouts CLI library.
//!
//! This crate provides the CLI interface for the country-visit tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, SortField};
pub use config::Config;
