use std::path::PathBuf;
use thiserror::Error;

/// Caller contract violations raised by the navigation state machine and the
/// day-level helpers. These indicate a bug in the calling code, never bad data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// Day granularity was requested without a selected month.
    #[error("Day level requires a selected month")]
    MissingMonth,

    /// Month or Day granularity was used without a selected year.
    #[error("A selected year is required at this level")]
    MissingYear,

    /// A bucket label of one granularity was used at another level.
    #[error("Cannot drill into {label} while at {level} level")]
    LabelMismatch { label: String, level: String },

    /// A month index outside `0..=11`.
    #[error("Month index out of range: {0}")]
    MonthOutOfRange(u32),

    /// A day number outside the selected month.
    #[error("Day {day} is outside the selected month ({days_in_month} days)")]
    DayOutOfRange { day: u32, days_in_month: u32 },

    /// An operation that only makes sense at Day level was called elsewhere.
    #[error("Operation requires Day level, current level is {0}")]
    NotAtDayLevel(String),
}

/// All errors produced by the fleet dashboard.
#[derive(Error, Debug)]
pub enum FleetError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV document could not be decoded.
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A feed is missing a column the schema marks as required.
    #[error("Missing required column '{field}' in {dataset} data")]
    MissingColumn { dataset: String, field: String },

    /// The expected data directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// The machine registry loaded without a single row.
    #[error("Machine registry is empty")]
    EmptyRegistry,

    /// A navigation call broke the caller contract.
    #[error("Invalid navigation: {0}")]
    Navigation(#[from] NavigationError),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the fleet crates.
pub type Result<T> = std::result::Result<T, FleetError>;
