use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fleet_data::reader::MACHINES_FILE;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const APP_DIR: &str = ".fleet-dashboard";

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure `~/.fleet-dashboard/` and `~/.fleet-dashboard/logs/` exist.
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let app_dir = home.join(APP_DIR);
    std::fs::create_dir_all(&app_dir)?;
    std::fs::create_dir_all(app_dir.join("logs"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name to an `EnvFilter` directive.
fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        other => other.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Logs go to `log_file` (appended, no ANSI colours) when given, otherwise to
/// stderr so report output on stdout stays clean. Unknown levels fall back to
/// `info`.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }

    Ok(())
}

// ── Data-path discovery ────────────────────────────────────────────────────────

/// Locate a data directory holding the machine registry.
///
/// Checks `./data` first, then `~/.fleet-dashboard/data`.
pub fn discover_data_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok();
    let home = dirs::home_dir();
    discover_data_path_in(cwd.as_deref(), home.as_deref())
}

fn discover_data_path_in(cwd: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    let candidates = [
        cwd.map(|c| c.join("data")),
        home.map(|h| h.join(APP_DIR).join("data")),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|dir| dir.join(MACHINES_FILE).is_file())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_data_dir(root: &Path) -> PathBuf {
        let dir = root.join("data");
        std::fs::create_dir_all(&dir).expect("create data dir");
        std::fs::write(dir.join(MACHINES_FILE), "รหัส\nA1\n").expect("write registry");
        dir
    }

    // ── test_ensure_directories ───────────────────────────────────────────────

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");

        // Override HOME so that dirs::home_dir() resolves to our temp dir.
        let original_home = std::env::var_os("HOME");
        std::env::set_var("HOME", tmp.path());

        let result = ensure_directories();

        match original_home {
            Some(v) => std::env::set_var("HOME", v),
            None => std::env::remove_var("HOME"),
        }

        result.expect("ensure_directories should succeed");

        let app_dir = tmp.path().join(APP_DIR);
        assert!(app_dir.is_dir(), ".fleet-dashboard dir must exist");
        assert!(app_dir.join("logs").is_dir(), "logs subdir must exist");
    }

    // ── test_level_directive ──────────────────────────────────────────────────

    #[test]
    fn test_level_directive_maps_cli_names() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("info"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("ERROR"), "error");
    }

    // ── test_discover_data_path ───────────────────────────────────────────────

    #[test]
    fn test_discover_prefers_working_directory() {
        let cwd = TempDir::new().expect("tempdir");
        let home = TempDir::new().expect("tempdir");
        let local = make_data_dir(cwd.path());
        make_data_dir(&home.path().join(APP_DIR));

        let found = discover_data_path_in(Some(cwd.path()), Some(home.path()));
        assert_eq!(found, Some(local));
    }

    #[test]
    fn test_discover_falls_back_to_home() {
        let cwd = TempDir::new().expect("tempdir");
        let home = TempDir::new().expect("tempdir");
        let in_home = make_data_dir(&home.path().join(APP_DIR));

        let found = discover_data_path_in(Some(cwd.path()), Some(home.path()));
        assert_eq!(found, Some(in_home));
    }

    #[test]
    fn test_discover_ignores_dir_without_registry() {
        let cwd = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(cwd.path().join("data")).expect("create data dir");

        let found = discover_data_path_in(Some(cwd.path()), None);
        assert!(found.is_none(), "a data dir without machines.csv is not a match");
    }
}
