//! Startup configuration read from a JSON file in the home directory.
//!
//! Every key is optional:
//!
//! ```json
//! {
//!   "prompt": "{cwd}$ ",
//!   "history_file": "~/.myshell_history",
//!   "alias_file": "~/.myshell_aliases",
//!   "history_size": 1000,
//!   "log_level": "warn"
//! }
//! ```

use crate::error::ShellError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = ".myshellrc";
pub const HISTORY_FILE: &str = ".myshell_history";
pub const ALIAS_FILE: &str = ".myshell_aliases";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prompt template; `{cwd}` is replaced by the working directory.
    pub prompt: String,
    pub history_file: Option<PathBuf>,
    pub alias_file: Option<PathBuf>,
    pub history_size: usize,
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prompt: "{cwd}$ ".to_owned(),
            history_file: None,
            alias_file: None,
            history_size: 1000,
            log_level: "warn".to_owned(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILE))
    }

    /// Parse the file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ShellError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(ShellError::io(format!("reading {}", path.display()), e)),
        };
        serde_json::from_str(&contents).map_err(|e| {
            ShellError::io(
                format!("parsing {}", path.display()),
                io::Error::new(ErrorKind::InvalidData, e),
            )
        })
    }

    pub fn history_path(&self) -> Option<PathBuf> {
        resolve_file(self.history_file.as_deref(), HISTORY_FILE)
    }

    pub fn alias_path(&self) -> Option<PathBuf> {
        resolve_file(self.alias_file.as_deref(), ALIAS_FILE)
    }

    pub fn render_prompt(&self, cwd: &Path) -> String {
        self.prompt.replace("{cwd}", &cwd.display().to_string())
    }
}

/// Expand a leading `~/`, or fall back to `default_name` in the home directory.
fn resolve_file(configured: Option<&Path>, default_name: &str) -> Option<PathBuf> {
    match configured {
        Some(path) => match path.strip_prefix("~") {
            Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
            Err(_) => Some(path.to_path_buf()),
        },
        None => dirs::home_dir().map(|home| home.join(default_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rc.json");
        fs::write(&path, r#"{"prompt": "> ", "history_size": 5}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.prompt, "> ");
        assert_eq!(config.history_size, 5);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rc.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn prompt_substitutes_the_working_directory() {
        let config = Config::default();
        assert_eq!(config.render_prompt(Path::new("/tmp")), "/tmp$ ");
    }

    #[test]
    fn explicit_paths_are_used_verbatim() {
        let config = Config {
            history_file: Some(PathBuf::from("/var/tmp/h")),
            ..Config::default()
        };
        assert_eq!(config.history_path(), Some(PathBuf::from("/var/tmp/h")));
    }
}
