//! Data layer for the fleet dashboard.
//!
//! Reads the machine registry and the fuel / maintenance logs from CSV
//! through a declared column schema, and provides the drill-down navigation
//! state, the time-bucketed aggregation engine and the supporting analysis
//! helpers used by the reports.

pub mod aggregator;
pub mod analysis;
pub mod navigation;
pub mod reader;
pub mod schema;

pub use fleet_core as core;
