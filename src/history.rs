//! Command history with a bounded on-disk copy.

use crate::error::ShellError;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use tracing::debug;

/// Lines entered at the prompt, oldest first.
///
/// The line editor keeps its own copy for recall; `cleared` tells the
/// interactive loop that it has to drop that copy too.
#[derive(Debug)]
pub struct History {
    entries: Vec<String>,
    path: Option<PathBuf>,
    max_len: usize,
    cleared: bool,
}

impl History {
    /// In-memory history that is never saved.
    pub fn new(max_len: usize) -> Self {
        History {
            entries: Vec::new(),
            path: None,
            max_len,
            cleared: false,
        }
    }

    /// Read one entry per line from `path`. A missing file starts an empty history.
    pub fn load(path: impl Into<PathBuf>, max_len: usize) -> Result<Self, ShellError> {
        let path = path.into();
        let mut history = History::new(max_len);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                history.entries = contents
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(str::to_owned)
                    .collect();
                history.trim();
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(ShellError::io(format!("reading {}", path.display()), e)),
        }
        debug!(path = %path.display(), entries = history.entries.len(), "history loaded");
        history.path = Some(path);
        Ok(history)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn add(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.entries.push(line.to_owned());
        self.trim();
    }

    /// Forget every entry, on disk as well.
    pub fn clear(&mut self) -> Result<(), ShellError> {
        self.entries.clear();
        self.cleared = true;
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    return Err(ShellError::io(format!("removing {}", path.display()), e));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Whether `clear` ran since the last call.
    pub fn take_cleared(&mut self) -> bool {
        std::mem::take(&mut self.cleared)
    }

    /// Write the most recent `max_len` entries back to the history file.
    pub fn save(&self) -> Result<(), ShellError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut contents = self.entries.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        fs::write(path, contents)
            .map_err(|e: io::Error| ShellError::io(format!("writing {}", path.display()), e))?;
        debug!(path = %path.display(), entries = self.entries.len(), "history saved");
        Ok(())
    }

    fn trim(&mut self) {
        if self.entries.len() > self.max_len {
            let excess = self.entries.len() - self.max_len;
            self.entries.drain(..excess);
        }
    }
}
