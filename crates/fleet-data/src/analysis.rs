//! Report helpers built on top of the aggregation engine: summary tiles,
//! per-project overview, single-day detail, record listings, filter options
//! and registry search.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, Local};
use fleet_core::error::NavigationError;
use fleet_core::models::{
    Dataset, Machine, Record, ValueKind, ValueSelector, UNSPECIFIED_MACHINE, UNSPECIFIED_PROJECT,
};
use fleet_core::time_utils::days_in_month;
use serde::Serialize;
use tracing::debug;

use crate::aggregator::{rank, Aggregator, RankEntry};
use crate::navigation::NavigationContext;

/// Rows shown by record listings unless the caller asks otherwise.
pub const DEFAULT_LISTING_LIMIT: usize = 100;

/// Maximum machines returned by [`search_machines`].
pub const MACHINE_SEARCH_LIMIT: usize = 50;

// ── Summary tiles ─────────────────────────────────────────────────────────────

/// Headline numbers shown above the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTiles {
    /// Fuel liters inside the context.
    pub fuel_total: f64,
    /// Maintenance cost inside the context.
    pub maintenance_total: f64,
    /// Distinct named projects across both logs.
    pub project_count: usize,
    /// Registry size.
    pub machine_count: usize,
}

/// Tiles for `ctx`. Totals follow the same scoping as the chart; the counts
/// describe the whole dataset.
///
/// An unpinned Month context is pinned once against both logs, so the two
/// totals always cover the same year and the caller sees the pinned year.
pub fn summary_tiles(dataset: &Dataset, ctx: &mut NavigationContext) -> SummaryTiles {
    ctx.pin_default_year(
        dataset.fuel.iter().chain(&dataset.maintenance),
        Local::now().year(),
    );
    let project_count = dataset
        .fuel
        .iter()
        .chain(&dataset.maintenance)
        .map(|r| r.project_id.as_str())
        .filter(|p| !p.is_empty() && *p != UNSPECIFIED_PROJECT)
        .collect::<BTreeSet<_>>()
        .len();

    SummaryTiles {
        fuel_total: Aggregator::grand_total(&dataset.fuel, ValueKind::Fuel, ctx),
        maintenance_total: Aggregator::grand_total(
            &dataset.maintenance,
            ValueKind::Maintenance,
            ctx,
        ),
        project_count,
        machine_count: dataset.machines.len(),
    }
}

// ── Projects ──────────────────────────────────────────────────────────────────

/// Lifetime totals of one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project_id: String,
    pub fuel_total: f64,
    pub maintenance_total: f64,
}

/// Per-project totals over every dated record, most expensive first, then
/// by name.
pub fn project_overview(dataset: &Dataset) -> Vec<ProjectSummary> {
    let mut by_project: HashMap<&str, ProjectSummary> = HashMap::new();
    let dated = dataset
        .fuel
        .iter()
        .chain(&dataset.maintenance)
        .filter(|r| r.date.is_some());

    for r in dated {
        let id = if r.project_id.is_empty() {
            UNSPECIFIED_PROJECT
        } else {
            r.project_id.as_str()
        };
        let entry = by_project.entry(id).or_insert_with(|| ProjectSummary {
            project_id: id.to_string(),
            fuel_total: 0.0,
            maintenance_total: 0.0,
        });
        entry.fuel_total += ValueKind::Fuel.value_of(r);
        entry.maintenance_total += ValueKind::Maintenance.value_of(r);
    }

    let mut projects: Vec<ProjectSummary> = by_project.into_values().collect();
    projects.sort_by(|a, b| {
        b.maintenance_total
            .total_cmp(&a.maintenance_total)
            .then_with(|| a.project_id.cmp(&b.project_id))
    });
    debug!(projects = projects.len(), "project overview built");
    projects
}

// ── Daily detail ──────────────────────────────────────────────────────────────

/// Per-machine totals for one day of a Day-level context, ordered like a
/// ranking but untruncated. Records without a machine are grouped under
/// [`UNSPECIFIED_MACHINE`].
pub fn daily_detail(
    records: &[Record],
    value_of: impl ValueSelector,
    ctx: &NavigationContext,
    day: u32,
) -> Result<Vec<RankEntry>, NavigationError> {
    let (Some(year), Some(month)) = (ctx.selected_year(), ctx.selected_month()) else {
        return Err(NavigationError::NotAtDayLevel(ctx.granularity().to_string()));
    };
    let days = days_in_month(year, month).ok_or(NavigationError::MonthOutOfRange(month))?;
    if day == 0 || day > days {
        return Err(NavigationError::DayOutOfRange {
            day,
            days_in_month: days,
        });
    }

    let mut totals: HashMap<&str, f64> = HashMap::new();
    let on_day = Aggregator::scoped_records(records, ctx)
        .filter(|r| r.date.map(|d| d.day()) == Some(day));
    for r in on_day {
        let id = if r.has_machine() {
            r.machine_id.as_str()
        } else {
            UNSPECIFIED_MACHINE
        };
        *totals.entry(id).or_insert(0.0) += value_of.value_of(r);
    }
    Ok(rank(totals))
}

// ── Listings ──────────────────────────────────────────────────────────────────

/// Scoped records, newest first, at most `limit`.
pub fn recent_records<'a>(
    records: &'a [Record],
    ctx: &NavigationContext,
    limit: usize,
) -> Vec<&'a Record> {
    let mut scoped: Vec<&Record> = Aggregator::scoped_records(records, ctx).collect();
    scoped.sort_by(|a, b| b.date.cmp(&a.date));
    scoped.truncate(limit);
    scoped
}

/// Distinct machine codes seen in `records`, sorted.
pub fn machine_options(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.has_machine())
        .map(|r| r.machine_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct named projects seen in `records`, sorted.
pub fn project_options(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.project_id.as_str())
        .filter(|p| !p.is_empty() && *p != UNSPECIFIED_PROJECT)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Distinct non-empty machine types in the registry, sorted.
pub fn machine_types(machines: &[Machine]) -> Vec<String> {
    machines
        .iter()
        .map(|m| m.machine_type.as_str())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

// ── Registry search ───────────────────────────────────────────────────────────

/// Registry rows whose code or plate contains `text` (case-insensitive) and,
/// when given, whose type equals `machine_type`. Empty criteria match all.
/// Returns at most [`MACHINE_SEARCH_LIMIT`] rows in registry order.
pub fn search_machines<'a>(
    machines: &'a [Machine],
    text: Option<&str>,
    machine_type: Option<&str>,
) -> Vec<&'a Machine> {
    let needle = text.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
    let wanted_type = machine_type.map(str::trim).filter(|t| !t.is_empty());

    machines
        .iter()
        .filter(|m| match &needle {
            Some(n) => m.code.to_lowercase().contains(n) || m.plate.to_lowercase().contains(n),
            None => true,
        })
        .filter(|m| wanted_type.map_or(true, |t| m.machine_type == t))
        .take(MACHINE_SEARCH_LIMIT)
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
