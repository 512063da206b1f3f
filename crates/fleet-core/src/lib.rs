//! Core domain layer for the fleet dashboard.
//!
//! Holds the strongly-typed record and registry models, the shared error
//! type, date and number parsing helpers, display formatting, document
//! expiry alerts and the command-line settings.

pub mod alerts;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;
