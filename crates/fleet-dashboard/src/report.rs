//! Text and JSON rendering of the four reports.

use std::fmt::Write as _;

use fleet_core::alerts::{AlertReport, MachineAlert};
use fleet_core::formatting::{format_date_short, format_number, format_quantity};
use fleet_core::models::{Machine, Record, ValueKind};
use fleet_data::aggregator::{BucketSeries, RankEntry};
use fleet_data::analysis::{ProjectSummary, SummaryTiles};
use serde::Serialize;

// ── Report models ─────────────────────────────────────────────────────────────

/// One ranking row joined with the registry.
#[derive(Debug, Clone, Serialize)]
pub struct RankedMachine {
    pub rank: usize,
    pub machine_id: String,
    pub machine_type: Option<String>,
    pub total: f64,
}

impl RankedMachine {
    pub fn join<'m>(
        entries: Vec<RankEntry>,
        lookup: impl Fn(&str) -> Option<&'m Machine>,
    ) -> Vec<Self> {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| RankedMachine {
                rank: i + 1,
                machine_type: lookup(&e.machine_id)
                    .map(|m| m.machine_type.clone())
                    .filter(|t| !t.is_empty()),
                machine_id: e.machine_id,
                total: e.total,
            })
            .collect()
    }
}

/// Per-machine breakdown of one day.
#[derive(Debug, Clone, Serialize)]
pub struct DayDetail {
    pub day: u32,
    pub machines: Vec<RankEntry>,
}

/// Values available to the machine and project selectors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterOptions {
    pub machines: Vec<String>,
    pub projects: Vec<String>,
}

/// Everything the dashboard report shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub view: ValueKind,
    pub breadcrumb: String,
    pub machine_filter: Option<String>,
    pub project_filter: Option<String>,
    pub options: FilterOptions,
    pub series: BucketSeries,
    pub ranking: Vec<RankedMachine>,
    pub tiles: SummaryTiles,
    pub day_detail: Option<DayDetail>,
    /// Newest records of the selected month, only at Day level.
    pub records: Vec<Record>,
}

// ── JSON ──────────────────────────────────────────────────────────────────────

pub fn to_json<T: Serialize>(report: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

// ── Text ──────────────────────────────────────────────────────────────────────

const RULE: &str = "────────────────────────────────────────────────";

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", RULE);
}

pub fn render_dashboard(report: &DashboardReport) -> String {
    let kind = report.view;
    let mut out = String::new();

    let mut title = format!("{} · {}", kind.title(), report.breadcrumb);
    if let Some(m) = &report.machine_filter {
        let _ = write!(title, " · machine {}", m);
    }
    if let Some(p) = &report.project_filter {
        let _ = write!(title, " · project {}", p);
    }
    heading(&mut out, &title);

    let tiles = &report.tiles;
    let _ = writeln!(
        out,
        "Fuel {}   Maintenance {}   Projects {}   Machines {}",
        format_quantity(tiles.fuel_total, ValueKind::Fuel),
        format_quantity(tiles.maintenance_total, ValueKind::Maintenance),
        tiles.project_count,
        tiles.machine_count
    );
    out.push('\n');

    heading(&mut out, &format!("By {}", report.series.granularity));
    if report.series.buckets.is_empty() {
        let _ = writeln!(out, "  no data");
    }
    for bucket in &report.series.buckets {
        let _ = writeln!(
            out,
            "  {:<6} {:>16}",
            bucket.label.to_string(),
            format_quantity(bucket.total, kind)
        );
    }
    let _ = writeln!(
        out,
        "  {:<6} {:>16}",
        "Total",
        format_quantity(report.series.grand_total, kind)
    );
    out.push('\n');

    heading(&mut out, "Top machines");
    if report.ranking.is_empty() {
        let _ = writeln!(out, "  no data");
    }
    for row in &report.ranking {
        let _ = writeln!(
            out,
            "  {:>3}. {:<12} {:<16} {:>16}",
            row.rank,
            row.machine_id,
            row.machine_type.as_deref().unwrap_or("-"),
            format_quantity(row.total, kind)
        );
    }

    if !report.records.is_empty() {
        out.push('\n');
        heading(&mut out, &format!("Records ({})", report.records.len()));
        for r in &report.records {
            let _ = writeln!(
                out,
                "  {:<10} {:<12} {:<20} {:>16}",
                format_date_short(r.date),
                if r.machine_id.is_empty() { "-" } else { r.machine_id.as_str() },
                r.project_id,
                format_quantity(r.value, kind)
            );
        }
    }

    if let Some(detail) = &report.day_detail {
        out.push('\n');
        heading(&mut out, &format!("Day {}", detail.day));
        if detail.machines.is_empty() {
            let _ = writeln!(out, "  no records");
        }
        for entry in &detail.machines {
            let _ = writeln!(
                out,
                "  {:<12} {:>16}",
                entry.machine_id,
                format_quantity(entry.total, kind)
            );
        }
    }

    out
}

fn alert_line(out: &mut String, alert: &MachineAlert, expired: bool) {
    let issues = if expired { &alert.expired } else { &alert.expiring };
    let described: Vec<String> = issues.iter().map(|i| i.describe()).collect();
    let _ = writeln!(
        out,
        "  {:<12} {:<16} {}",
        alert.machine.code,
        alert.machine.plate,
        described.join("; ")
    );
}

pub fn render_alerts(report: &AlertReport) -> String {
    let mut out = String::new();

    heading(&mut out, &format!("Expired documents ({})", report.expired.len()));
    for alert in &report.expired {
        alert_line(&mut out, alert, true);
    }
    out.push('\n');

    heading(&mut out, &format!("Expiring soon ({})", report.warning.len()));
    for alert in &report.warning {
        alert_line(&mut out, alert, false);
    }

    let _ = writeln!(out, "\n{} machines checked", report.all.len());
    out
}

pub fn render_projects(projects: &[ProjectSummary]) -> String {
    let mut out = String::new();
    heading(&mut out, "Projects");
    let _ = writeln!(out, "  {:<24} {:>16} {:>18}", "Project", "Fuel", "Maintenance");
    for p in projects {
        let _ = writeln!(
            out,
            "  {:<24} {:>16} {:>18}",
            p.project_id,
            format_quantity(p.fuel_total, ValueKind::Fuel),
            format_quantity(p.maintenance_total, ValueKind::Maintenance)
        );
    }
    let fuel: f64 = projects.iter().map(|p| p.fuel_total).sum();
    let cost: f64 = projects.iter().map(|p| p.maintenance_total).sum();
    let _ = writeln!(
        out,
        "  {:<24} {:>16} {:>18}",
        "Total",
        format_quantity(fuel, ValueKind::Fuel),
        format_quantity(cost, ValueKind::Maintenance)
    );
    out
}

pub fn render_machines(machines: &[&Machine], types: &[String]) -> String {
    let mut out = String::new();
    heading(&mut out, &format!("Machines ({})", format_number(machines.len() as f64, 0)));
    if !types.is_empty() {
        let _ = writeln!(out, "  types: {}", types.join(", "));
    }
    for m in machines {
        let _ = writeln!(
            out,
            "  {:<12} {:<16} {:<12} {:<14} reg {:<10} ins {}",
            m.code,
            m.machine_type,
            m.brand,
            m.plate,
            format_date_short(m.registration_expiry),
            format_date_short(m.insurance_expiry)
        );
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fleet_core::alerts::AlertChecker;
    use fleet_data::aggregator::Bucket;
    use fleet_data::navigation::{BucketLabel, Granularity};

    fn dashboard() -> DashboardReport {
        DashboardReport {
            view: ValueKind::Fuel,
            breadcrumb: "All years".to_string(),
            machine_filter: Some("A1".to_string()),
            project_filter: None,
            options: FilterOptions::default(),
            series: BucketSeries {
                granularity: Granularity::Year,
                buckets: vec![Bucket {
                    label: BucketLabel::Year(2024),
                    total: 1250.0,
                    count: 3,
                }],
                grand_total: 1250.0,
            },
            ranking: vec![RankedMachine {
                rank: 1,
                machine_id: "A1".to_string(),
                machine_type: Some("Excavator".to_string()),
                total: 1250.0,
            }],
            tiles: SummaryTiles {
                fuel_total: 1250.0,
                maintenance_total: 0.0,
                project_count: 1,
                machine_count: 2,
            },
            day_detail: None,
            records: vec![],
        }
    }

    #[test]
    fn test_render_dashboard_text() {
        let text = render_dashboard(&dashboard());
        assert!(text.starts_with("Fuel Usage · All years · machine A1"));
        assert!(text.contains("By year"));
        assert!(text.contains("2024"));
        assert!(text.contains("1,250 L"));
        assert!(text.contains("Excavator"));
        assert!(!text.contains("Day "));
    }

    #[test]
    fn test_render_dashboard_with_day_detail() {
        let mut report = dashboard();
        report.day_detail = Some(DayDetail {
            day: 5,
            machines: vec![],
        });
        let text = render_dashboard(&report);
        assert!(text.contains("Day 5"));
        assert!(text.contains("no records"));
    }

    #[test]
    fn test_dashboard_json_shape() {
        let json = to_json(&dashboard()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["view"], "fuel");
        assert_eq!(value["series"]["granularity"], "year");
        assert_eq!(value["series"]["buckets"][0]["label"]["value"], 2024);
        assert_eq!(value["ranking"][0]["machine_id"], "A1");
        assert!(value["day_detail"].is_null());
    }

    #[test]
    fn test_ranked_machine_join() {
        let registry = vec![Machine {
            code: "A1".to_string(),
            machine_type: "Truck".to_string(),
            ..Default::default()
        }];
        let entries = vec![
            RankEntry { machine_id: "A1".to_string(), total: 5.0 },
            RankEntry { machine_id: "Z9".to_string(), total: 1.0 },
        ];
        let joined = RankedMachine::join(entries, |code| registry.iter().find(|m| m.code == code));
        assert_eq!(joined[0].rank, 1);
        assert_eq!(joined[0].machine_type.as_deref(), Some("Truck"));
        assert_eq!(joined[1].rank, 2);
        assert!(joined[1].machine_type.is_none());
    }

    #[test]
    fn test_render_alerts_sections() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let machines = vec![Machine {
            code: "A1".to_string(),
            plate: "กข 1234".to_string(),
            registration_expiry: NaiveDate::from_ymd_opt(2024, 5, 1),
            insurance_expiry: NaiveDate::from_ymd_opt(2024, 6, 10),
            ..Default::default()
        }];
        let report = AlertChecker::new(today, 30).build_report(&machines);
        let text = render_alerts(&report);
        assert!(text.contains("Expired documents (1)"));
        assert!(text.contains("Expiring soon (1)"));
        assert!(text.contains("1 machines checked"));
    }

    #[test]
    fn test_render_projects_totals_row() {
        let projects = vec![
            ProjectSummary {
                project_id: "P1".to_string(),
                fuel_total: 100.0,
                maintenance_total: 2000.0,
            },
            ProjectSummary {
                project_id: "P2".to_string(),
                fuel_total: 50.0,
                maintenance_total: 500.0,
            },
        ];
        let text = render_projects(&projects);
        assert!(text.contains("150 L"));
        assert!(text.contains("2,500 ฿"));
    }

    #[test]
    fn test_render_machines_lists_types() {
        let m = Machine {
            code: "A1".to_string(),
            machine_type: "Truck".to_string(),
            ..Default::default()
        };
        let text = render_machines(&[&m], &["Truck".to_string()]);
        assert!(text.starts_with("Machines (1)"));
        assert!(text.contains("types: Truck"));
        assert!(text.contains("A1"));
    }

    #[test]
    fn test_render_dashboard_lists_records() {
        let mut report = dashboard();
        report.records = vec![Record {
            date: NaiveDate::from_ymd_opt(2024, 3, 5),
            machine_id: String::new(),
            project_id: "P1".to_string(),
            value: 50.0,
            kind: ValueKind::Fuel,
        }];
        let text = render_dashboard(&report);
        assert!(text.contains("Records (1)"));
        assert!(text.contains("05 Mar 24"));
    }
}
