//! CLI subcommand implementations.

pub mod countries;
pub mod country;
pub mod demo;
pub mod history;
pub mod reset;
pub mod status;
pub mod track;
pub mod util;
