use crate::config::TomlConfig;
use crate::domain::model::TimeSlot;
use crate::utils::error::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "booking.toml";

#[derive(Debug, Parser)]
#[command(name = "booking-access")]
#[command(about = "Book facility sessions and issue access tokens")]
pub struct Cli {
    /// Path to TOML configuration file (defaults to ./booking.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List bookable start times
    Slots,

    /// List the class catalog
    Classes,

    /// Book a session and print its access token
    Book {
        #[arg(long)]
        subject: String,

        #[arg(long)]
        class: Option<String>,

        /// Calendar date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Start time (HH:MM)
        #[arg(long, value_parser = parse_slot)]
        start: TimeSlot,

        /// Session length in minutes, overriding the class default
        #[arg(long)]
        duration: Option<i64>,
    },

    /// Evaluate a token (text or hex) as a reader would
    Check {
        token: String,

        /// Evaluation instant (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Decode and validate a token (text or hex)
    Decode { token: String },
}

pub fn parse_slot(value: &str) -> std::result::Result<TimeSlot, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map(TimeSlot::from)
        .map_err(|e| format!("expected HH:MM, got '{}': {}", value, e))
}

/// 載入配置：指定檔案、預設檔案，或內建預設值
pub fn load_config(path: Option<&str>) -> Result<TomlConfig> {
    match path {
        Some(path) => TomlConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => TomlConfig::from_file(DEFAULT_CONFIG_FILE),
        None => Ok(TomlConfig::default()),
    }
}
