use chrono::NaiveDate;

use crate::models::ValueKind;

const MONTH_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MONTH_LONG: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Format a number with thousands separators and a fixed number of decimal
/// places.
///
/// # Examples
///
/// ```
/// use fleet_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let fixed = format!("{:.prec$}", value.abs(), prec = decimals as usize);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = group_thousands(int_part);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }

    // Avoid "-0" for values that round to zero.
    let is_zero = out.chars().all(|c| c == '0' || c == ',' || c == '.');
    if value < 0.0 && !is_zero {
        format!("-{}", out)
    } else {
        out
    }
}

/// Format a total with the unit of its value kind, e.g. `"1,250 L"`.
pub fn format_quantity(value: f64, kind: ValueKind) -> String {
    format!("{} {}", format_number(value, 0), kind.unit())
}

/// Three-letter English month name for a 0-based month index.
pub fn month_short_name(month0: u32) -> &'static str {
    MONTH_SHORT.get(month0 as usize).copied().unwrap_or("?")
}

/// Full English month name for a 0-based month index.
pub fn month_long_name(month0: u32) -> &'static str {
    MONTH_LONG.get(month0 as usize).copied().unwrap_or("?")
}

/// Compact date for listings, `"-"` when absent.
pub fn format_date_short(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%d %b %y").to_string(),
        None => "-".to_string(),
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
