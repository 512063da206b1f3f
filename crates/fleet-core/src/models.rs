use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Project id given to records whose feed row names no project.
pub const UNSPECIFIED_PROJECT: &str = "unspecified";

/// Grouping key used when a listing must show records without a machine id.
pub const UNSPECIFIED_MACHINE: &str = "unspecified";

/// Which log a record came from, and therefore what its value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Fuel fill-ups, value in liters.
    Fuel,
    /// Maintenance actions, value in currency.
    Maintenance,
}

impl ValueKind {
    /// Display unit appended to totals of this kind.
    pub fn unit(self) -> &'static str {
        match self {
            ValueKind::Fuel => "L",
            ValueKind::Maintenance => "฿",
        }
    }

    /// Human-readable name used in report titles.
    pub fn title(self) -> &'static str {
        match self {
            ValueKind::Fuel => "Fuel Usage",
            ValueKind::Maintenance => "Maintenance",
        }
    }
}

impl std::str::FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fuel" => Ok(ValueKind::Fuel),
            "maintenance" | "maint" => Ok(ValueKind::Maintenance),
            other => Err(format!("unknown value kind: {}", other)),
        }
    }
}

/// One dated, tagged, valued observation: a fuel fill or a maintenance action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Calendar date; `None` when the source cell was empty or unparsable.
    pub date: Option<NaiveDate>,
    /// Machine code; empty when the source row had none.
    #[serde(default)]
    pub machine_id: String,
    /// Owning project, [`UNSPECIFIED_PROJECT`] when absent.
    pub project_id: String,
    /// Non-negative quantity (liters or cost).
    pub value: f64,
    /// Which log the record belongs to.
    pub kind: ValueKind,
}

impl Record {
    /// `true` when the record can be attributed to a machine.
    pub fn has_machine(&self) -> bool {
        !self.machine_id.is_empty()
    }
}

/// Picks the number a record contributes to a sum.
///
/// Implemented for [`ValueKind`] (the record's value when its kind matches,
/// zero otherwise) and for any `Fn(&Record) -> f64`.
pub trait ValueSelector {
    fn value_of(&self, record: &Record) -> f64;
}

impl ValueSelector for ValueKind {
    fn value_of(&self, record: &Record) -> f64 {
        if record.kind == *self {
            record.value
        } else {
            0.0
        }
    }
}

impl<F> ValueSelector for F
where
    F: Fn(&Record) -> f64,
{
    fn value_of(&self, record: &Record) -> f64 {
        self(record)
    }
}

/// A machine registry row. Joined against records by `code`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub code: String,
    #[serde(default)]
    pub machine_type: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub engine_number: String,
    #[serde(default)]
    pub chassis_number: String,
    /// Registration (road tax) expiry date.
    pub registration_expiry: Option<NaiveDate>,
    /// Insurance and compulsory-cover expiry date.
    pub insurance_expiry: Option<NaiveDate>,
}

/// The three feeds, fully materialised and typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub machines: Vec<Machine>,
    pub fuel: Vec<Record>,
    pub maintenance: Vec<Record>,
}

impl Dataset {
    /// The log backing `kind`.
    pub fn records(&self, kind: ValueKind) -> &[Record] {
        match kind {
            ValueKind::Fuel => &self.fuel,
            ValueKind::Maintenance => &self.maintenance,
        }
    }

    /// First registry row with the given code.
    pub fn machine(&self, code: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.code == code)
    }
}
