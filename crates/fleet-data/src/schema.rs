//! Declared column schemas for the three CSV feeds.
//!
//! Feed headers drift between exports (Thai and English names, units glued to
//! the name, stray whitespace). Each expected field lists the exact header
//! names it accepts and, as a fallback, substrings that identify it. Headers
//! are resolved once per file into a [`ColumnMap`].

use std::collections::HashMap;

use csv::StringRecord;
use fleet_core::error::{FleetError, Result};
use tracing::{debug, warn};

// ── Field names ───────────────────────────────────────────────────────────────

pub const FIELD_CODE: &str = "code";
pub const FIELD_TYPE: &str = "machine_type";
pub const FIELD_BRAND: &str = "brand";
pub const FIELD_PLATE: &str = "plate";
pub const FIELD_ENGINE: &str = "engine_number";
pub const FIELD_CHASSIS: &str = "chassis_number";
pub const FIELD_REGISTRATION_EXPIRY: &str = "registration_expiry";
pub const FIELD_INSURANCE_EXPIRY: &str = "insurance_expiry";
pub const FIELD_DATE: &str = "date";
pub const FIELD_MACHINE: &str = "machine";
pub const FIELD_PROJECT: &str = "project";
pub const FIELD_VALUE: &str = "value";

// ── Schema types ──────────────────────────────────────────────────────────────

/// One expected column and the header names that identify it.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Header names matched in full (case-insensitive, trimmed).
    pub exact: &'static [&'static str],
    /// Substrings tried only when no exact alias matched.
    pub contains: &'static [&'static str],
    pub required: bool,
}

/// The columns of one feed.
#[derive(Debug, Clone, Copy)]
pub struct FeedSchema {
    pub dataset: &'static str,
    pub fields: &'static [FieldSpec],
}

const MACHINE_ID_EXACT: &[&str] = &["รหัส", "รหัสรถ", "code", "machine code", "machine"];
const MACHINE_ID_CONTAINS: &[&str] = &["รหัส", "machine", "code"];
const DATE_EXACT: &[&str] = &["วันที่", "date"];
const DATE_CONTAINS: &[&str] = &["วันที่", "date"];
const PROJECT_EXACT: &[&str] = &["โครงการ", "project"];
const PROJECT_CONTAINS: &[&str] = &["โครงการ", "project"];

pub const MACHINE_SCHEMA: FeedSchema = FeedSchema {
    dataset: "machines",
    fields: &[
        FieldSpec {
            name: FIELD_CODE,
            exact: MACHINE_ID_EXACT,
            contains: MACHINE_ID_CONTAINS,
            required: true,
        },
        FieldSpec {
            name: FIELD_TYPE,
            exact: &["ประเภทรถ", "ประเภท", "type", "machine type"],
            contains: &["ประเภท", "type"],
            required: false,
        },
        FieldSpec {
            name: FIELD_BRAND,
            exact: &["ยี่ห้อรถ", "ยี่ห้อ", "brand"],
            contains: &["ยี่ห้อ", "brand"],
            required: false,
        },
        FieldSpec {
            name: FIELD_PLATE,
            exact: &["ทะเบียน", "plate", "license plate"],
            contains: &["plate"],
            required: false,
        },
        FieldSpec {
            name: FIELD_ENGINE,
            exact: &["เลขเครื่อง", "engine number", "engine no"],
            contains: &["เลขเครื่อง", "engine"],
            required: false,
        },
        FieldSpec {
            name: FIELD_CHASSIS,
            exact: &["เลขตัวถัง", "chassis number", "chassis no"],
            contains: &["เลขตัวถัง", "chassis"],
            required: false,
        },
        FieldSpec {
            name: FIELD_REGISTRATION_EXPIRY,
            exact: &["วันที่ทะเบียนขาด", "registration expiry"],
            contains: &["ทะเบียนขาด", "registration"],
            required: false,
        },
        FieldSpec {
            name: FIELD_INSURANCE_EXPIRY,
            exact: &["วันที่ประกัน+พรบ.ขาด", "insurance expiry"],
            contains: &["ประกัน", "insurance"],
            required: false,
        },
    ],
};

pub const FUEL_SCHEMA: FeedSchema = FeedSchema {
    dataset: "fuel",
    fields: &[
        FieldSpec {
            name: FIELD_DATE,
            exact: DATE_EXACT,
            contains: DATE_CONTAINS,
            required: true,
        },
        FieldSpec {
            name: FIELD_MACHINE,
            exact: MACHINE_ID_EXACT,
            contains: MACHINE_ID_CONTAINS,
            required: false,
        },
        FieldSpec {
            name: FIELD_PROJECT,
            exact: PROJECT_EXACT,
            contains: PROJECT_CONTAINS,
            required: false,
        },
        FieldSpec {
            name: FIELD_VALUE,
            exact: &["ปริมาณ(ลิตร)", "liters", "litres", "quantity"],
            contains: &["ปริมาณ", "ลิตร", "liter", "litre", "quantity"],
            required: true,
        },
    ],
};

pub const MAINTENANCE_SCHEMA: FeedSchema = FeedSchema {
    dataset: "maintenance",
    fields: &[
        FieldSpec {
            name: FIELD_DATE,
            exact: DATE_EXACT,
            contains: DATE_CONTAINS,
            required: true,
        },
        FieldSpec {
            name: FIELD_MACHINE,
            exact: MACHINE_ID_EXACT,
            contains: MACHINE_ID_CONTAINS,
            required: false,
        },
        FieldSpec {
            name: FIELD_PROJECT,
            exact: PROJECT_EXACT,
            contains: PROJECT_CONTAINS,
            required: false,
        },
        FieldSpec {
            name: FIELD_VALUE,
            exact: &["ค่าซ่อมบำรุง", "cost", "maintenance cost"],
            contains: &["ค่าใช้จ่าย", "ค่าซ่อม", "cost", "amount"],
            required: true,
        },
    ],
};

// ── ColumnMap ─────────────────────────────────────────────────────────────────

/// Field name → column index for one parsed header row.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    indices: HashMap<&'static str, usize>,
}

impl ColumnMap {
    /// Column index of `field`, if the feed has it.
    pub fn index(&self, field: &str) -> Option<usize> {
        self.indices.get(field).copied()
    }

    /// Trimmed cell of `field` in `row`; empty when the column or cell is
    /// missing.
    pub fn get<'r>(&self, field: &str, row: &'r StringRecord) -> &'r str {
        self.index(field)
            .and_then(|i| row.get(i))
            .map(str::trim)
            .unwrap_or("")
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

impl FeedSchema {
    /// Resolve `headers` against the schema.
    ///
    /// Exact aliases are tried for every field before any substring alias,
    /// and a header column is claimed by at most one field. A missing
    /// required field is an error; a missing optional one is logged.
    pub fn resolve(&self, headers: &StringRecord) -> Result<ColumnMap> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut claimed = vec![false; normalized.len()];
        let mut map = ColumnMap::default();

        for field in self.fields {
            let hit = normalized
                .iter()
                .enumerate()
                .find(|(i, h)| !claimed[*i] && field.exact.iter().any(|a| h.as_str() == a.to_lowercase()));
            if let Some((i, _)) = hit {
                claimed[i] = true;
                map.indices.insert(field.name, i);
            }
        }

        for field in self.fields {
            if map.indices.contains_key(field.name) {
                continue;
            }
            let hit = normalized.iter().enumerate().find(|(i, h)| {
                !claimed[*i] && field.contains.iter().any(|a| h.contains(&a.to_lowercase()))
            });
            if let Some((i, _)) = hit {
                claimed[i] = true;
                map.indices.insert(field.name, i);
            }
        }

        for field in self.fields {
            if map.indices.contains_key(field.name) {
                continue;
            }
            if field.required {
                return Err(FleetError::MissingColumn {
                    dataset: self.dataset.to_string(),
                    field: field.name.to_string(),
                });
            }
            warn!(
                dataset = self.dataset,
                field = field.name,
                "optional column not found"
            );
        }

        debug!(dataset = self.dataset, columns = map.indices.len(), "schema resolved");
        Ok(map)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
