use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Resolve a command name to an executable file the way a typical shell would.
///
/// - Absolute path: used as is.
/// - A path with a separator (`./foo`, `bin/sh`): resolved against `cwd`.
/// - A bare name: each directory of `search_paths` (PATH) is tried in order.
/// - Empty name: never found.
///
/// During the PATH walk only regular files with an execute bit count, so a
/// directory or a data file named like the command is skipped. An explicit
/// path only has to exist; launching it reports why it cannot run.
pub fn find_command_path(search_paths: &OsStr, cwd: &Path, name: &Path) -> Option<PathBuf> {
    if name.as_os_str().is_empty() {
        return None;
    }
    if name.is_absolute() {
        return name.exists().then(|| name.to_path_buf());
    }
    if name.components().count() > 1 || name.starts_with(".") {
        let candidate = cwd.join(name);
        return candidate.exists().then_some(candidate);
    }
    std::env::split_paths(search_paths)
        .map(|dir| {
            if dir.is_absolute() {
                dir.join(name)
            } else {
                cwd.join(dir).join(name)
            }
        })
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
