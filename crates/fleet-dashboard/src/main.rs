mod bootstrap;
mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fleet_core::alerts::AlertChecker;
use fleet_core::error::FleetError;
use fleet_core::models::{Dataset, ValueKind};
use fleet_core::settings::Settings;
use fleet_core::time_utils::{resolve_timezone, today_in};
use fleet_data::aggregator::Aggregator;
use fleet_data::analysis::{
    daily_detail, machine_options, machine_types, project_options, project_overview,
    recent_records, search_machines, summary_tiles, DEFAULT_LISTING_LIMIT,
};
use fleet_data::navigation::{BucketLabel, Granularity, NavigationContext};
use fleet_data::reader::{self, LoadReport};

use crate::report::{DashboardReport, DayDetail, FilterOptions, RankedMachine};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Fleet dashboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Report: {}, View: {}, Timezone: {}",
        settings.report,
        settings.view,
        settings.timezone
    );

    settings.validate()?;

    let data_dir = settings
        .data_dir
        .clone()
        .or_else(bootstrap::discover_data_path)
        .ok_or_else(|| FleetError::DataPathNotFound(PathBuf::from("data")))?;

    let (dataset, reports) = load_feeds(&data_dir).await?;
    for r in &reports {
        tracing::info!(
            dataset = %r.dataset,
            rows_read = r.rows_read,
            rows_loaded = r.rows_loaded,
            undated = r.undated_rows,
            decode_errors = r.decode_errors,
            "feed loaded"
        );
    }

    let output = match settings.report.as_str() {
        "alerts" => {
            let today = today_in(resolve_timezone(&settings.timezone));
            let alerts =
                AlertChecker::new(today, i64::from(settings.warning_days)).build_report(&dataset.machines);
            if settings.wants_json() {
                report::to_json(&alerts)?
            } else {
                report::render_alerts(&alerts)
            }
        }
        "projects" => {
            let projects = project_overview(&dataset);
            if settings.wants_json() {
                report::to_json(&projects)?
            } else {
                report::render_projects(&projects)
            }
        }
        "machines" => {
            let found = search_machines(
                &dataset.machines,
                settings.search.as_deref(),
                settings.machine_type.as_deref(),
            );
            if settings.wants_json() {
                report::to_json(&found)?
            } else {
                report::render_machines(&found, &machine_types(&dataset.machines))
            }
        }
        _ => {
            let dashboard = build_dashboard(&dataset, &settings)?;
            if settings.wants_json() {
                report::to_json(&dashboard)?
            } else {
                report::render_dashboard(&dashboard)
            }
        }
    };

    println!("{}", output);
    Ok(())
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Run a blocking feed loader on the blocking pool.
async fn spawn_feed<T, F>(load: F) -> Result<T>
where
    F: FnOnce() -> fleet_core::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(load)
        .await
        .context("feed loader panicked")??)
}

/// Load the registry and both logs in parallel.
async fn load_feeds(data_dir: &Path) -> Result<(Dataset, Vec<LoadReport>)> {
    if !data_dir.is_dir() {
        return Err(FleetError::DataPathNotFound(data_dir.to_path_buf()).into());
    }

    let machines_path = reader::feed_path(data_dir, None);
    let fuel_path = reader::feed_path(data_dir, Some(ValueKind::Fuel));
    let maint_path = reader::feed_path(data_dir, Some(ValueKind::Maintenance));

    let ((machines, machine_report), (fuel, fuel_report), (maintenance, maint_report)) = tokio::try_join!(
        spawn_feed(move || reader::load_machines(&machines_path)),
        spawn_feed(move || reader::load_records(&fuel_path, ValueKind::Fuel)),
        spawn_feed(move || reader::load_records(&maint_path, ValueKind::Maintenance)),
    )?;

    let dataset = reader::assemble_dataset(machines, fuel, maintenance)?;
    Ok((dataset, vec![machine_report, fuel_report, maint_report]))
}

// ── Dashboard ─────────────────────────────────────────────────────────────────

/// Context for the dashboard: filters first, then the drill path.
fn build_context(settings: &Settings) -> fleet_core::error::Result<NavigationContext> {
    let mut ctx = NavigationContext::new();
    ctx.set_filter_and_reset(settings.machine.clone(), settings.project.clone());

    if let Some(year) = settings.year {
        ctx.try_drill_in(BucketLabel::Year(year))?;
        if let Some(month) = settings.month {
            ctx.try_drill_in(BucketLabel::Month(month - 1))?;
        }
    }
    Ok(ctx)
}

fn build_dashboard(dataset: &Dataset, settings: &Settings) -> Result<DashboardReport> {
    let kind = settings.value_kind();
    let records = dataset.records(kind);
    let mut ctx = build_context(settings)?;

    let series = Aggregator::compute_buckets(records, kind, &mut ctx);
    let ranking = Aggregator::compute_ranking(records, kind, &mut ctx, settings.top as usize);
    let tiles = summary_tiles(dataset, &mut ctx);

    let day_detail = match settings.day {
        Some(day) => Some(DayDetail {
            day,
            machines: daily_detail(records, kind, &ctx, day).map_err(FleetError::from)?,
        }),
        None => None,
    };

    let listing = if ctx.granularity() == Granularity::Day {
        recent_records(records, &ctx, DEFAULT_LISTING_LIMIT)
            .into_iter()
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    Ok(DashboardReport {
        view: kind,
        breadcrumb: ctx.breadcrumb(),
        machine_filter: ctx.machine_filter().map(String::from),
        project_filter: ctx.project_filter().map(String::from),
        options: FilterOptions {
            machines: machine_options(records),
            projects: project_options(records),
        },
        series,
        ranking: RankedMachine::join(ranking, |code| dataset.machine(code)),
        tiles,
        day_detail,
        records: listing,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
