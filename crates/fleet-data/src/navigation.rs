//! Drill-down navigation state for one chart view.
//!
//! A [`NavigationContext`] moves between three calendar granularities:
//! Year → Month (of a selected year) → Day (of a selected month). Drilling in
//! always narrows by exactly one level and drilling out widens by one; filters
//! on machine and project ride alongside and are untouched by drilling.
//!
//! The selected year and month live inside the level itself, so a Day context
//! without a month cannot be represented. The one partially specified state
//! is Month without a year, which the aggregation engine pins to a default
//! year on first use.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use fleet_core::error::NavigationError;
use fleet_core::formatting::{month_long_name, month_short_name};
use fleet_core::models::Record;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ── Granularity & labels ──────────────────────────────────────────────────────

/// Calendar resolution of a chart, ordered from coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Year,
    Month,
    Day,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Granularity::Year => "year",
            Granularity::Month => "month",
            Granularity::Day => "day",
        };
        f.write_str(s)
    }
}

/// Key of one chart bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "lowercase")]
pub enum BucketLabel {
    /// Calendar year.
    Year(i32),
    /// 0-based month index.
    Month(u32),
    /// 1-based day of month.
    Day(u32),
}

impl BucketLabel {
    pub fn granularity(&self) -> Granularity {
        match self {
            BucketLabel::Year(_) => Granularity::Year,
            BucketLabel::Month(_) => Granularity::Month,
            BucketLabel::Day(_) => Granularity::Day,
        }
    }
}

impl fmt::Display for BucketLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketLabel::Year(y) => write!(f, "{}", y),
            BucketLabel::Month(m) => f.write_str(month_short_name(*m)),
            BucketLabel::Day(d) => write!(f, "{}", d),
        }
    }
}

// ── TimeWindow ────────────────────────────────────────────────────────────────

/// The span of dates a context currently looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeWindow {
    All,
    Year(i32),
    Month { year: i32, month: u32 },
}

impl TimeWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            TimeWindow::All => true,
            TimeWindow::Year(y) => date.year() == y,
            TimeWindow::Month { year, month } => date.year() == year && date.month0() == month,
        }
    }
}

// ── NavigationContext ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Level {
    Year,
    Month { year: Option<i32> },
    Day { year: i32, month: u32 },
}

/// Per-view navigation state: current level, selected year/month, filters.
///
/// Filters are `None` for "all".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationContext {
    level: Level,
    machine_filter: Option<String>,
    project_filter: Option<String>,
}

impl Default for NavigationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationContext {
    /// Root context: Year level, no filters.
    pub fn new() -> Self {
        Self {
            level: Level::Year,
            machine_filter: None,
            project_filter: None,
        }
    }

    /// Context opened directly at a level, e.g. a detail view inheriting the
    /// position of the view it was opened from.
    ///
    /// `year` and `month` are ignored at levels where they carry no meaning.
    /// Month without a year is allowed and gets a default year pinned on first
    /// aggregation. Day requires both.
    pub fn at(
        granularity: Granularity,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Self, NavigationError> {
        let level = match granularity {
            Granularity::Year => Level::Year,
            Granularity::Month => Level::Month { year },
            Granularity::Day => {
                let year = year.ok_or(NavigationError::MissingYear)?;
                let month = month.ok_or(NavigationError::MissingMonth)?;
                if month > 11 {
                    return Err(NavigationError::MonthOutOfRange(month));
                }
                Level::Day { year, month }
            }
        };
        Ok(Self {
            level,
            ..Self::new()
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn granularity(&self) -> Granularity {
        match self.level {
            Level::Year => Granularity::Year,
            Level::Month { .. } => Granularity::Month,
            Level::Day { .. } => Granularity::Day,
        }
    }

    /// Selected year; `None` at Year level or before a Month default is pinned.
    pub fn selected_year(&self) -> Option<i32> {
        match self.level {
            Level::Year => None,
            Level::Month { year } => year,
            Level::Day { year, .. } => Some(year),
        }
    }

    /// Selected 0-based month; only set at Day level.
    pub fn selected_month(&self) -> Option<u32> {
        match self.level {
            Level::Day { month, .. } => Some(month),
            _ => None,
        }
    }

    pub fn machine_filter(&self) -> Option<&str> {
        self.machine_filter.as_deref()
    }

    pub fn project_filter(&self) -> Option<&str> {
        self.project_filter.as_deref()
    }

    /// Dates currently in view.
    ///
    /// An unpinned Month context has no year yet and reports
    /// [`TimeWindow::All`]; the aggregation entry points pin before reading it.
    pub fn window(&self) -> TimeWindow {
        match self.level {
            Level::Year | Level::Month { year: None } => TimeWindow::All,
            Level::Month { year: Some(y) } => TimeWindow::Year(y),
            Level::Day { year, month } => TimeWindow::Month { year, month },
        }
    }

    /// `true` when `record` passes the machine and project filters.
    pub fn matches_filters(&self, record: &Record) -> bool {
        if let Some(machine) = &self.machine_filter {
            if &record.machine_id != machine {
                return false;
            }
        }
        if let Some(project) = &self.project_filter {
            if &record.project_id != project {
                return false;
            }
        }
        true
    }

    /// `true` when `record` is dated, passes the filters and falls inside the
    /// current window.
    pub fn includes(&self, record: &Record) -> bool {
        match record.date {
            Some(date) => self.matches_filters(record) && self.window().contains(date),
            None => false,
        }
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    /// Narrow one level using a clicked bucket.
    ///
    /// Returns `Ok(true)` when the level changed and `Ok(false)` for the
    /// Day-level no-op. A label of the wrong granularity, or a month click on
    /// an unpinned Month context, is an error.
    pub fn try_drill_in(&mut self, label: BucketLabel) -> Result<bool, NavigationError> {
        let next = match (self.level, label) {
            (Level::Year, BucketLabel::Year(y)) => Level::Month { year: Some(y) },
            (Level::Month { year: Some(y) }, BucketLabel::Month(m)) => {
                if m > 11 {
                    return Err(NavigationError::MonthOutOfRange(m));
                }
                Level::Day { year: y, month: m }
            }
            (Level::Month { year: None }, BucketLabel::Month(_)) => {
                return Err(NavigationError::MissingYear);
            }
            (Level::Day { .. }, BucketLabel::Day(_)) => return Ok(false),
            (_, label) => {
                return Err(NavigationError::LabelMismatch {
                    label: label.granularity().to_string(),
                    level: self.granularity().to_string(),
                });
            }
        };
        debug!(from = %self.granularity(), %label, "drill in");
        self.level = next;
        Ok(true)
    }

    /// Like [`try_drill_in`](Self::try_drill_in), but treats a contract
    /// violation as a caller bug: asserts in debug builds, logs and ignores it
    /// otherwise.
    pub fn drill_in(&mut self, label: BucketLabel) -> bool {
        match self.try_drill_in(label) {
            Ok(changed) => changed,
            Err(e) => {
                debug_assert!(false, "invalid drill-in: {}", e);
                warn!(error = %e, "ignoring invalid drill-in");
                false
            }
        }
    }

    /// Widen one level. Returns `false` at Year level.
    pub fn drill_out(&mut self) -> bool {
        let prev = match self.level {
            Level::Year => return false,
            Level::Month { .. } => Level::Year,
            Level::Day { year, .. } => Level::Month { year: Some(year) },
        };
        debug!(from = %self.granularity(), "drill out");
        self.level = prev;
        true
    }

    /// Back to Year level, clearing the selected year and month.
    pub fn reset_to_root(&mut self) {
        self.level = Level::Year;
    }

    /// Replace both filters without touching the level.
    pub fn set_filter(&mut self, machine: Option<String>, project: Option<String>) {
        self.machine_filter = machine.filter(|m| !m.is_empty());
        self.project_filter = project.filter(|p| !p.is_empty());
    }

    /// Replace both filters and return to Year level, so the view never sits
    /// on a time window the new filter has no data for.
    pub fn set_filter_and_reset(&mut self, machine: Option<String>, project: Option<String>) {
        self.set_filter(machine, project);
        self.reset_to_root();
    }

    /// Detail context for one machine (ranking click-through): same level and
    /// selection, machine filter set, project filter cleared.
    pub fn for_machine(&self, code: &str) -> Self {
        Self {
            level: self.level,
            machine_filter: Some(code.to_string()),
            project_filter: None,
        }
    }

    /// Pin the year of an unpinned Month context.
    ///
    /// Uses the latest year among records passing the filters, or
    /// `fallback_year` when there are none. Once pinned the year is kept on
    /// every later call. Returns the selected year, if any.
    pub fn pin_default_year<'r>(
        &mut self,
        records: impl IntoIterator<Item = &'r Record>,
        fallback_year: i32,
    ) -> Option<i32> {
        if let Level::Month { year: None } = self.level {
            let latest = records
                .into_iter()
                .filter(|r| self.matches_filters(r))
                .filter_map(|r| r.date.map(|d| d.year()))
                .max()
                .unwrap_or(fallback_year);
            debug!(year = latest, "pinned default year");
            self.level = Level::Month { year: Some(latest) };
        }
        self.selected_year()
    }

    /// Short description of the current position, e.g. `"March 2024"`.
    pub fn breadcrumb(&self) -> String {
        match self.level {
            Level::Year => "All years".to_string(),
            Level::Month { year: Some(y) } => format!("Year {}", y),
            Level::Month { year: None } => "Latest year".to_string(),
            Level::Day { year, month } => format!("{} {}", month_long_name(month), year),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
