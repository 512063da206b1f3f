use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use tracing::warn;

/// Years above this are taken to be Buddhist-era and shifted back.
const BUDDHIST_ERA_THRESHOLD: i32 = 2400;

/// Offset between the Buddhist and Gregorian calendars.
const BUDDHIST_ERA_OFFSET: i32 = 543;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a configured timezone name. `"auto"` means the system timezone.
///
/// Unrecognised names fall back to UTC with a warning.
pub fn resolve_timezone(name: &str) -> Tz {
    let name = if name.eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        name.to_string()
    };
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", name);
        Tz::UTC
    })
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name.parse::<Tz>().is_ok()
}

/// Today's calendar date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

// ── Date parsing ──────────────────────────────────────────────────────────────

fn slash_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})(?:\s.*)?$").expect("regex is valid")
    })
}

fn leading_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)").expect("regex is valid"))
}

fn shift_buddhist_era(date: NaiveDate) -> Option<NaiveDate> {
    if date.year() > BUDDHIST_ERA_THRESHOLD {
        date.with_year(date.year() - BUDDHIST_ERA_OFFSET)
    } else {
        Some(date)
    }
}

/// Parse a feed date cell into a calendar date.
///
/// Accepted forms:
/// * `d/m/yyyy` (day first), optionally followed by a time part.
/// * `yyyy-mm-dd`.
/// * ISO date-times, with or without an offset; the date part is kept.
///
/// Years above 2400 are Buddhist-era and shifted by -543. Returns `None` for
/// empty cells, unknown formats and impossible dates such as `31/02/2024`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = slash_date_re().captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year > BUDDHIST_ERA_THRESHOLD {
            year -= BUDDHIST_ERA_OFFSET;
        }
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return shift_buddhist_era(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return shift_buddhist_era(dt.date_naive());
    }

    const FMTS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FMTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return shift_buddhist_era(naive.date());
        }
    }

    None
}

/// Parse a free-text quantity such as `"1,250.5"` or `"80 L"`.
///
/// Thousands separators and whitespace are stripped and the leading numeric
/// part is read. Anything unparsable, non-finite or negative yields `0.0`.
pub fn parse_number(s: &str) -> f64 {
    let cleaned: String = s
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let value = leading_number_re()
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ── Calendar helpers ──────────────────────────────────────────────────────────

/// Number of days in the month with 0-based index `month0` of `year`.
///
/// Returns `None` for a month index outside `0..=11`.
pub fn days_in_month(year: i32, month0: u32) -> Option<u32> {
    if month0 > 11 {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month0 + 1, 1)?;
    let next = if month0 == 11 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month0 + 2, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
