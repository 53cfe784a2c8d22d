use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::OsString;
use std::path::PathBuf;

/// Mutable, user-level view of the process environment used by the shell.
///
/// - `vars`: exported variables, passed to every launched process.
/// - `shell_vars`: shell-local variables (`setvar`/`getvar`), never exported.
/// - `current_dir`: the working directory for command execution.
/// - `should_exit`: set by `exit`; the interactive loop checks it after each line.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub shell_vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars: stdenv::vars().collect(),
            shell_vars: HashMap::new(),
            current_dir,
            should_exit: false,
        }
    }

    /// Get the value of an exported variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn get_shell_var(&self, key: &str) -> Option<&str> {
        self.shell_vars.get(key).map(String::as_str)
    }

    pub fn set_shell_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.shell_vars.insert(key.into(), val.into());
    }

    /// PATH as seen by launched processes; empty when unset.
    pub fn search_path(&self) -> OsString {
        self.get_var("PATH").map(OsString::from).unwrap_or_default()
    }

    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME").map(PathBuf::from).or_else(dirs::home_dir)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
