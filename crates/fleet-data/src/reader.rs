//! CSV feed loading for the fleet dashboard.
//!
//! Turns the machine registry and the fuel / maintenance logs into typed
//! [`Machine`] and [`Record`] values. Column names are resolved through the
//! declared schemas in [`crate::schema`]; malformed cells never fail a load
//! (bad dates become `None`, bad numbers become zero), only an unreadable
//! file or a missing required column does.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use fleet_core::error::{FleetError, Result};
use fleet_core::models::{Dataset, Machine, Record, ValueKind, UNSPECIFIED_PROJECT};
use fleet_core::time_utils::{parse_date, parse_number};
use serde::Serialize;
use tracing::{debug, warn};

use crate::schema::{self, ColumnMap, FeedSchema};

pub const MACHINES_FILE: &str = "machines.csv";
pub const FUEL_FILE: &str = "fuel.csv";
pub const MAINTENANCE_FILE: &str = "maintenance.csv";

// ── LoadReport ────────────────────────────────────────────────────────────────

/// Row accounting for one loaded feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub dataset: String,
    /// Data rows seen, including skipped ones.
    pub rows_read: usize,
    /// Rows the CSV decoder rejected.
    pub decode_errors: usize,
    /// Rows kept but without a usable date (log feeds only).
    pub undated_rows: usize,
    /// Rows kept.
    pub rows_loaded: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Path of a feed file inside `data_dir`.
pub fn feed_path(data_dir: &Path, kind: Option<ValueKind>) -> PathBuf {
    match kind {
        None => data_dir.join(MACHINES_FILE),
        Some(ValueKind::Fuel) => data_dir.join(FUEL_FILE),
        Some(ValueKind::Maintenance) => data_dir.join(MAINTENANCE_FILE),
    }
}

/// Load the machine registry from a CSV file.
pub fn load_machines(path: &Path) -> Result<(Vec<Machine>, LoadReport)> {
    read_machines(open(path)?)
}

/// Load a fuel or maintenance log from a CSV file.
pub fn load_records(path: &Path, kind: ValueKind) -> Result<(Vec<Record>, LoadReport)> {
    read_records(open(path)?, kind)
}

/// Combine loaded feeds into a [`Dataset`].
///
/// Fails with [`FleetError::EmptyRegistry`] when the registry has no machines;
/// empty logs are fine.
pub fn assemble_dataset(
    machines: Vec<Machine>,
    fuel: Vec<Record>,
    maintenance: Vec<Record>,
) -> Result<Dataset> {
    if machines.is_empty() {
        return Err(FleetError::EmptyRegistry);
    }
    Ok(Dataset {
        machines,
        fuel,
        maintenance,
    })
}

/// Parse a machine registry from any CSV source.
pub fn read_machines<R: Read>(source: R) -> Result<(Vec<Machine>, LoadReport)> {
    let mut report = LoadReport {
        dataset: schema::MACHINE_SCHEMA.dataset.to_string(),
        ..Default::default()
    };
    let mut machines = Vec::new();

    for_each_row(source, &schema::MACHINE_SCHEMA, &mut report, |cols, row| {
        let code = cols.get(schema::FIELD_CODE, row);
        machines.push(Machine {
            code: code.to_string(),
            machine_type: cols.get(schema::FIELD_TYPE, row).to_string(),
            brand: cols.get(schema::FIELD_BRAND, row).to_string(),
            plate: cols.get(schema::FIELD_PLATE, row).to_string(),
            engine_number: cols.get(schema::FIELD_ENGINE, row).to_string(),
            chassis_number: cols.get(schema::FIELD_CHASSIS, row).to_string(),
            registration_expiry: parse_date(cols.get(schema::FIELD_REGISTRATION_EXPIRY, row)),
            insurance_expiry: parse_date(cols.get(schema::FIELD_INSURANCE_EXPIRY, row)),
        });
    })?;

    report.rows_loaded = machines.len();
    debug!(
        rows = report.rows_read,
        loaded = report.rows_loaded,
        "machine registry loaded"
    );
    Ok((machines, report))
}

/// Parse a fuel or maintenance log from any CSV source.
///
/// Records are returned sorted by date, undated rows last in file order.
pub fn read_records<R: Read>(source: R, kind: ValueKind) -> Result<(Vec<Record>, LoadReport)> {
    let feed = match kind {
        ValueKind::Fuel => &schema::FUEL_SCHEMA,
        ValueKind::Maintenance => &schema::MAINTENANCE_SCHEMA,
    };
    let mut report = LoadReport {
        dataset: feed.dataset.to_string(),
        ..Default::default()
    };
    let mut records = Vec::new();
    let mut undated = 0usize;

    for_each_row(source, feed, &mut report, |cols, row| {
        let date = parse_date(cols.get(schema::FIELD_DATE, row));
        if date.is_none() {
            undated += 1;
        }
        let project = cols.get(schema::FIELD_PROJECT, row);
        records.push(Record {
            date,
            machine_id: cols.get(schema::FIELD_MACHINE, row).to_string(),
            project_id: if project.is_empty() {
                UNSPECIFIED_PROJECT.to_string()
            } else {
                project.to_string()
            },
            value: parse_number(cols.get(schema::FIELD_VALUE, row)),
            kind,
        });
    })?;

    records.sort_by_key(|r| (r.date.is_none(), r.date));

    report.undated_rows = undated;
    report.rows_loaded = records.len();
    if undated > 0 {
        warn!(
            dataset = feed.dataset,
            undated, "rows without a usable date are excluded from aggregation"
        );
    }
    debug!(
        dataset = feed.dataset,
        rows = report.rows_read,
        loaded = report.rows_loaded,
        "log feed loaded"
    );
    Ok((records, report))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| FleetError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Drive `visit` over every non-blank data row of `source`.
fn for_each_row<R, F>(
    source: R,
    feed: &FeedSchema,
    report: &mut LoadReport,
    mut visit: F,
) -> Result<()>
where
    R: Read,
    F: FnMut(&ColumnMap, &StringRecord),
{
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let headers = rdr.headers()?.clone();
    let cols = feed.resolve(&headers)?;

    for result in rdr.records() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                report.rows_read += 1;
                report.decode_errors += 1;
                warn!(dataset = feed.dataset, error = %e, "skipping undecodable row");
                continue;
            }
        };
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        report.rows_read += 1;
        visit(&cols, &row);
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
