//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// dayboard - today's calendars at a glance
#[derive(Debug, Parser)]
#[command(name = "dayboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "DAYBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the Google OAuth client credentials JSON
    #[arg(long, global = true, env = "DAYBOARD_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Returns the command to run, `today` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Today(TodayArgs::default()))
    }
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show the day's events grouped by calendar (default)
    Today(TodayArgs),

    /// List every accessible calendar, hidden ones included
    Calendars {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the signed-in Google account
    Whoami,

    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Show the weather forecast
    Weather(WeatherArgs),

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `dayboard today`.
#[derive(Debug, Clone, Default, Args)]
pub struct TodayArgs {
    /// Day to show instead of today (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// IANA timezone the day is observed in (defaults to local time)
    #[arg(long)]
    pub timezone: Option<chrono_tz::Tz>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `dayboard weather`.
#[derive(Debug, Clone, Default, Args)]
pub struct WeatherArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// Number of forecast days (1-16)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub days: Option<u8>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Authentication actions.
#[derive(Debug, Clone, Subcommand)]
pub enum AuthAction {
    /// Forget the stored Google session
    Reset,
}

/// Configuration actions.
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}
