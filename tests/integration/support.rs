//! Shared helpers for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` with HOME and the XDG roots pointed into `temp`.
///
/// Environment changes are process-wide, so callers are serialized.
pub fn with_xdg_env<F, R>(temp: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let keys = ["HOME", "XDG_CONFIG_HOME", "XDG_STATE_HOME"];
    let saved: Vec<Option<String>> = keys.iter().map(|k| std::env::var(k).ok()).collect();

    std::env::set_var("HOME", temp.path().join("home"));
    std::env::set_var("XDG_CONFIG_HOME", temp.path().join("config"));
    std::env::set_var("XDG_STATE_HOME", temp.path().join("state"));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (key, value) in keys.iter().zip(saved) {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Write `content` to `<dir>/<rel>`, creating parents
pub fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Write a descriptor at `<agents>/<id>/agent.yaml`
pub fn write_descriptor(
    agents: &Path,
    id: &str,
    can: &[&str],
    cannot: &[&str],
    exclusive: &[&str],
) -> PathBuf {
    let list = |items: &[&str]| format!("[{}]", items.join(", "));
    write_file(
        agents,
        &format!("{}/agent.yaml", id),
        &format!(
            "agent:\n  id: {id}\n  name: {id} agent\nscope:\n  can: {}\n  cannot: {}\n  exclusive: {}\n",
            list(can),
            list(cannot),
            list(exclusive),
        ),
    )
}

/// The dev / ops / qa team used across scenarios
pub fn write_team(agents: &Path) {
    write_descriptor(agents, "dev", &["write_code", "run_tests"], &["publish_release", "run_audit"], &[]);
    write_descriptor(agents, "ops", &["deploy"], &[], &["publish_release"]);
    write_descriptor(agents, "qa", &["run_tests", "run_audit"], &["write_code"], &[]);
}
