//! Output and error redirection of a command's final stage.

use crate::error::ShellError;
use crate::lexer::Word;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Direction and open mode of a redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `>`: standard output, truncate.
    Stdout,
    /// `>>`: standard output, append.
    Append,
    /// `2>`: standard error only, truncate.
    Stderr,
    /// `&>`: standard output and standard error to the same file, truncate.
    Combined,
}

impl RedirectKind {
    const ALL: [RedirectKind; 4] = [
        RedirectKind::Stdout,
        RedirectKind::Append,
        RedirectKind::Stderr,
        RedirectKind::Combined,
    ];

    pub fn operator(self) -> &'static str {
        match self {
            RedirectKind::Stdout => ">",
            RedirectKind::Append => ">>",
            RedirectKind::Stderr => "2>",
            RedirectKind::Combined => "&>",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            RedirectKind::Stdout => "output redirection",
            RedirectKind::Append => "appending output",
            RedirectKind::Stderr => "stderr redirection",
            RedirectKind::Combined => "stdout and stderr redirection",
        }
    }

    fn from_word(word: &Word) -> Option<Self> {
        Self::ALL.into_iter().find(|k| word.is_operator(k.operator()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub kind: RedirectKind,
    pub target: PathBuf,
}

/// Files opened for a redirection. Dropping this closes them.
#[derive(Debug, Default)]
pub struct RedirectFiles {
    pub stdout: Option<File>,
    pub stderr: Option<File>,
}

impl Redirection {
    /// Open the target, resolving a relative path against `cwd`.
    pub fn open(&self, cwd: &Path) -> Result<RedirectFiles, ShellError> {
        let path = cwd.join(&self.target);
        let mut options = OpenOptions::new();
        match self.kind {
            RedirectKind::Append => options.append(true).create(true),
            _ => options.write(true).create(true).truncate(true),
        };
        let file = options
            .open(&path)
            .map_err(|e| ShellError::io(path.display().to_string(), e))?;
        Ok(match self.kind {
            RedirectKind::Stdout | RedirectKind::Append => RedirectFiles {
                stdout: Some(file),
                stderr: None,
            },
            RedirectKind::Stderr => RedirectFiles {
                stdout: None,
                stderr: Some(file),
            },
            RedirectKind::Combined => {
                let err = file
                    .try_clone()
                    .map_err(|e| ShellError::io(path.display().to_string(), e))?;
                RedirectFiles {
                    stdout: Some(file),
                    stderr: Some(err),
                }
            }
        })
    }
}

/// Argument vector left after redirection resolution, plus the redirection found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub argv: Vec<String>,
    pub redirection: Option<Redirection>,
}

/// Scan `words` left to right for the first redirection operator.
///
/// The operator and the word after it become the redirection; every word
/// from the operator onward is dropped from the argument vector. Later
/// operators are not looked at.
pub fn resolve(words: &[Word]) -> Result<Resolved, ShellError> {
    let Some((pos, kind)) = find_operator(words) else {
        return Ok(Resolved {
            argv: words.iter().map(|w| w.text.clone()).collect(),
            redirection: None,
        });
    };
    let target = words
        .get(pos + 1)
        .ok_or(ShellError::MissingRedirectTarget(kind))?;
    Ok(Resolved {
        argv: words[..pos].iter().map(|w| w.text.clone()).collect(),
        redirection: Some(Redirection {
            kind,
            target: PathBuf::from(&target.text),
        }),
    })
}

/// Position and kind of the first redirection operator in `words`.
pub fn find_operator(words: &[Word]) -> Option<(usize, RedirectKind)> {
    words
        .iter()
        .enumerate()
        .find_map(|(i, w)| RedirectKind::from_word(w).map(|k| (i, k)))
}
