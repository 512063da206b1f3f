use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{FleetError, Result};
use crate::models::ValueKind;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Fleet fuel and maintenance reporting with year / month / day drill-down
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fleet-dashboard",
    about = "Fleet fuel and maintenance reporting with year / month / day drill-down",
    version
)]
pub struct Settings {
    /// Directory holding machines.csv, fuel.csv and maintenance.csv
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Dataset driving the chart
    #[arg(long, default_value = "fuel", value_parser = ["fuel", "maintenance"])]
    pub view: String,

    /// Report to print
    #[arg(long, default_value = "dashboard", value_parser = ["dashboard", "alerts", "projects", "machines"])]
    pub report: String,

    /// Drill into this year
    #[arg(long)]
    pub year: Option<i32>,

    /// Drill into this month (1-12), requires --year
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Show the per-machine detail of this day (1-31), requires --month
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=31))]
    pub day: Option<u32>,

    /// Only include this machine code
    #[arg(long)]
    pub machine: Option<String>,

    /// Only include this project
    #[arg(long)]
    pub project: Option<String>,

    /// Number of machines in the ranking (1-100)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub top: u32,

    /// Days before expiry at which documents are flagged
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u32).range(0..=365))]
    pub warning_days: u32,

    /// Case-insensitive code or plate search for the machines report
    #[arg(long)]
    pub search: Option<String>,

    /// Exact machine type filter for the machines report
    #[arg(long)]
    pub machine_type: Option<String>,

    /// Timezone used to decide "today" (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.fleet-dashboard/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_days: Option<u32>,
}

impl LastUsedParams {
    /// Default path of the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".fleet-dashboard").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit args and
    /// config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "could not clear saved configuration");
            }
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. Drill path and filters are never persisted.
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "data_dir") && settings.data_dir.is_none() {
            settings.data_dir = last.data_dir;
        }
        if !is_arg_explicitly_set(&matches, "top") {
            if let Some(v) = last.top {
                settings.top = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "warning_days") {
            if let Some(v) = last.warning_days {
                settings.warning_days = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::warn!(error = %e, "could not persist last-used parameters");
        }

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }

    /// Check the cross-argument rules clap cannot express on its own.
    pub fn validate(&self) -> Result<()> {
        if self.month.is_some() && self.year.is_none() {
            return Err(FleetError::Config("--month requires --year".to_string()));
        }
        if self.day.is_some() && self.month.is_none() {
            return Err(FleetError::Config("--day requires --month".to_string()));
        }
        if self.timezone != "auto" && !crate::time_utils::validate_timezone(&self.timezone) {
            return Err(FleetError::Config(format!(
                "unknown timezone: {}",
                self.timezone
            )));
        }
        Ok(())
    }

    /// Dataset selected by `--view`.
    pub fn value_kind(&self) -> ValueKind {
        self.view.parse().unwrap_or(ValueKind::Fuel)
    }

    /// `true` when JSON output was requested.
    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            view: Some(s.view.clone()),
            timezone: Some(s.timezone.clone()),
            data_dir: s.data_dir.clone(),
            top: Some(s.top),
            format: Some(s.format.clone()),
            warning_days: Some(s.warning_days),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
