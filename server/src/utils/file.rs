//! Path helpers for user-supplied locations

use std::path::PathBuf;

/// Resolve `~`, `~/...` and relative paths to an absolute path.
///
/// The result is not canonicalized and nothing touches the filesystem. An empty
/// string means the current directory. `~user` forms are left alone.
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = expand_home(path.trim());
    if expanded.is_absolute() {
        return expanded;
    }
    match std::env::current_dir() {
        Ok(cwd) if expanded.as_os_str().is_empty() => cwd,
        Ok(cwd) => cwd.join(expanded),
        Err(_) => expanded,
    }
}

fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    match (rest, dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
