//! Document expiry alerts for the machine registry.
//!
//! Every machine carries two dated documents (registration and insurance).
//! Each is classified against "today" as expired, expiring within the
//! warning window, or fine, and the per-machine results are collected into
//! an [`AlertReport`] for the alert lists.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::formatting::format_date_short;
use crate::models::Machine;

/// Days before expiry at which a document starts to be flagged.
pub const DEFAULT_WARNING_DAYS: i64 = 30;

// ── Classification ────────────────────────────────────────────────────────────

/// The dated documents tracked per machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Registration,
    Insurance,
}

impl DocumentKind {
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Registration => "Registration",
            DocumentKind::Insurance => "Insurance",
        }
    }
}

/// Derived status of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    /// Expiry date is today or already past.
    Expired,
    /// Expires within the warning window.
    Expiring,
    Ok,
    /// No usable date on file.
    Unknown,
}

/// Classify an expiry date relative to `today`.
///
/// `days_left <= 0` is expired, `days_left <= warning_days` is expiring.
pub fn classify_expiry(
    expiry: Option<NaiveDate>,
    today: NaiveDate,
    warning_days: i64,
) -> ExpiryStatus {
    let Some(expiry) = expiry else {
        return ExpiryStatus::Unknown;
    };
    let days_left = (expiry - today).num_days();
    if days_left <= 0 {
        ExpiryStatus::Expired
    } else if days_left <= warning_days {
        ExpiryStatus::Expiring
    } else {
        ExpiryStatus::Ok
    }
}

// ── Report types ──────────────────────────────────────────────────────────────

/// One flagged document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentIssue {
    pub document: DocumentKind,
    pub expiry: NaiveDate,
    /// Whole days until expiry; zero or negative once expired.
    pub days_left: i64,
}

impl DocumentIssue {
    /// Short description such as `"Insurance: 05 Mar 24"`.
    pub fn describe(&self) -> String {
        format!(
            "{}: {}",
            self.document.label(),
            format_date_short(Some(self.expiry))
        )
    }
}

/// Alert state of a single machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineAlert {
    pub machine: Machine,
    pub expired: Vec<DocumentIssue>,
    pub expiring: Vec<DocumentIssue>,
}

/// Registry-wide alert lists.
///
/// `all` holds every machine with a code, in registry order. A machine is in
/// `expired` when at least one document has expired, and in `warning` when at
/// least one is expiring; it can be in both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertReport {
    pub all: Vec<MachineAlert>,
    pub expired: Vec<MachineAlert>,
    pub warning: Vec<MachineAlert>,
}

// ── AlertChecker ──────────────────────────────────────────────────────────────

/// Builds alert reports against a fixed reference date.
#[derive(Debug, Clone, Copy)]
pub struct AlertChecker {
    today: NaiveDate,
    warning_days: i64,
}

impl AlertChecker {
    pub fn new(today: NaiveDate, warning_days: i64) -> Self {
        Self {
            today,
            warning_days,
        }
    }

    /// Status of both documents of `machine`, registration first.
    pub fn document_statuses(&self, machine: &Machine) -> [(DocumentKind, ExpiryStatus); 2] {
        [
            (
                DocumentKind::Registration,
                classify_expiry(machine.registration_expiry, self.today, self.warning_days),
            ),
            (
                DocumentKind::Insurance,
                classify_expiry(machine.insurance_expiry, self.today, self.warning_days),
            ),
        ]
    }

    /// Classify every machine in the registry.
    ///
    /// Rows without a code are skipped. Duplicate codes keep the first row's
    /// details and merge the issues of every row.
    pub fn build_report(&self, machines: &[Machine]) -> AlertReport {
        let mut order: Vec<String> = Vec::new();
        let mut by_code: HashMap<String, MachineAlert> = HashMap::new();

        for machine in machines {
            if machine.code.is_empty() {
                continue;
            }
            let entry = by_code.entry(machine.code.clone()).or_insert_with(|| {
                order.push(machine.code.clone());
                MachineAlert {
                    machine: machine.clone(),
                    expired: Vec::new(),
                    expiring: Vec::new(),
                }
            });

            let docs = [
                (DocumentKind::Registration, machine.registration_expiry),
                (DocumentKind::Insurance, machine.insurance_expiry),
            ];
            for (document, expiry) in docs {
                let Some(date) = expiry else { continue };
                let issue = DocumentIssue {
                    document,
                    expiry: date,
                    days_left: (date - self.today).num_days(),
                };
                match classify_expiry(expiry, self.today, self.warning_days) {
                    ExpiryStatus::Expired => entry.expired.push(issue),
                    ExpiryStatus::Expiring => entry.expiring.push(issue),
                    ExpiryStatus::Ok | ExpiryStatus::Unknown => {}
                }
            }
        }

        let mut report = AlertReport::default();
        for code in order {
            if let Some(alert) = by_code.remove(&code) {
                if !alert.expired.is_empty() {
                    report.expired.push(alert.clone());
                }
                if !alert.expiring.is_empty() {
                    report.warning.push(alert.clone());
                }
                report.all.push(alert);
            }
        }

        tracing::debug!(
            machines = report.all.len(),
            expired = report.expired.len(),
            warning = report.warning.len(),
            "alert report built"
        );
        report
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
