use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wb_cli::commands::{countries, country, demo, history, reset, status, track};
use wb_cli::{Cli, Commands, Config};
use wb_core::{Coordinate, SortOrder};

/// Load config and open the database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<wb_db::Database> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    wb_db::Database::open(&config.database_path).context("failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let now = Utc::now();
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Track { code, at, lat, lon }) => {
            let mut db = open_database(cli.config.as_deref())?;
            let coordinate = lat.zip(*lon).map(|(latitude, longitude)| Coordinate {
                latitude,
                longitude,
            });
            track::run(&mut stdout, &mut db, code, at.unwrap_or(now), coordinate)?;
        }
        Some(Commands::Status) => {
            let db = open_database(cli.config.as_deref())?;
            status::run(&mut stdout, &db, now, &Local, &timezone)?;
        }
        Some(Commands::History { json }) => {
            let db = open_database(cli.config.as_deref())?;
            history::run(&mut stdout, &db, *json, now, &Local)?;
        }
        Some(Commands::Countries { sort, desc, json }) => {
            let db = open_database(cli.config.as_deref())?;
            let order = if *desc {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            countries::run(&mut stdout, &db, (*sort).into(), order, *json, now, &Local)?;
        }
        Some(Commands::Country { code, json }) => {
            let db = open_database(cli.config.as_deref())?;
            country::run(&mut stdout, &db, code, *json, now, &Local)?;
        }
        Some(Commands::Reset { yes }) => {
            let mut db = open_database(cli.config.as_deref())?;
            reset::run(&mut stdout, &mut db, *yes)?;
        }
        Some(Commands::Demo) => {
            let mut db = open_database(cli.config.as_deref())?;
            demo::run(&mut stdout, &mut db)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
