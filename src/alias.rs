//! Alias store and single-pass alias expansion of the leading word.

use crate::error::ShellError;
use crate::lexer::{self, Token};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, warn};

static ALIAS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("alias name pattern is valid")
});

static ALIAS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^=\s]+)\s*=\s*(.*?)\s*$").expect("alias line pattern is valid")
});

/// Mapping from alias name to replacement text, optionally backed by a file.
#[derive(Debug, Default, Clone)]
pub struct AliasStore {
    aliases: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl AliasStore {
    /// In-memory store that is never persisted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load aliases from `path`. A missing file yields an empty store that
    /// will be created on the first save.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ShellError> {
        let path = path.into();
        let mut store = AliasStore {
            aliases: BTreeMap::new(),
            path: Some(path.clone()),
        };
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(ShellError::io(format!("alias: {}", path.display()), e)),
        };
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match ALIAS_LINE.captures(line) {
                Some(caps) => {
                    store.aliases.insert(caps[1].to_string(), caps[2].to_string());
                }
                None => warn!(%line, "skipping malformed alias line"),
            }
        }
        debug!(count = store.aliases.len(), path = %path.display(), "aliases loaded");
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn define(&mut self, name: &str, text: &str) -> Result<(), ShellError> {
        if !ALIAS_NAME.is_match(name) {
            return Err(ShellError::Usage(format!("alias: invalid alias name: {name}")));
        }
        self.aliases.insert(name.to_string(), text.trim().to_string());
        self.save()
    }

    /// Returns false when no alias of that name existed.
    pub fn remove(&mut self, name: &str) -> Result<bool, ShellError> {
        if self.aliases.remove(name).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<(), ShellError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents: String = self
            .aliases
            .iter()
            .map(|(name, text)| format!("{name}={text}\n"))
            .collect();
        fs::write(path, contents)
            .map_err(|e| ShellError::io(format!("alias: {}", path.display()), e))
    }
}

/// Replace the leading word by its alias expansion, if it has one.
///
/// The expansion text is lexed on its own and prepended to the remaining
/// tokens. Expansion is single pass: an alias whose text starts with another
/// alias name is not expanded again.
pub fn expand_alias(tokens: Vec<Token>, aliases: &AliasStore) -> Result<Vec<Token>, ShellError> {
    let expansion = match tokens.first() {
        Some(Token::Word(first)) if !first.quoted => aliases.get(&first.text),
        _ => None,
    };
    let Some(expansion) = expansion else {
        return Ok(tokens);
    };
    let mut expanded = lexer::split_into_tokens(expansion)?;
    expanded.extend(tokens.into_iter().skip(1));
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Word;

    fn texts(tokens: &[Token]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| match t {
                Token::Word(w) => w.text.clone(),
                Token::PipeOp => "|".into(),
            })
            .collect()
    }

    #[test]
    fn expands_leading_word_and_keeps_arguments() {
        let mut store = AliasStore::new();
        store.define("ll", "ls -l").unwrap();
        let tokens = lexer::split_into_tokens("ll /tmp 'a b'").unwrap();
        let out = expand_alias(tokens, &store).unwrap();
        assert_eq!(texts(&out), vec!["ls", "-l", "/tmp", "a b"]);
    }

    #[test]
    fn expansion_is_single_pass() {
        let mut store = AliasStore::new();
        store.define("a", "b --from-a").unwrap();
        store.define("b", "echo never").unwrap();
        let out = expand_alias(lexer::split_into_tokens("a x").unwrap(), &store).unwrap();
        assert_eq!(texts(&out), vec!["b", "--from-a", "x"]);
    }

    #[test]
    fn expansion_may_introduce_a_pipe() {
        let mut store = AliasStore::new();
        store.define("count", "ls | wc -l").unwrap();
        let out = expand_alias(lexer::split_into_tokens("count").unwrap(), &store).unwrap();
        assert_eq!(out[1], Token::PipeOp);
    }

    #[test]
    fn only_the_first_unquoted_word_is_looked_up() {
        let mut store = AliasStore::new();
        store.define("ll", "ls -l").unwrap();
        let quoted = vec![Token::Word(Word::quoted("ll"))];
        assert_eq!(expand_alias(quoted.clone(), &store).unwrap(), quoted);
        let later = lexer::split_into_tokens("echo ll").unwrap();
        assert_eq!(texts(&expand_alias(later, &store).unwrap()), vec!["echo", "ll"]);
    }

    #[test]
    fn broken_expansion_is_a_syntax_error() {
        let mut store = AliasStore::new();
        store.define("bad", "echo 'open").unwrap();
        let err = expand_alias(lexer::split_into_tokens("bad").unwrap(), &store).unwrap_err();
        assert!(matches!(err, ShellError::Syntax(_)));
    }

    #[test]
    fn rejects_invalid_names() {
        let mut store = AliasStore::new();
        assert!(store.define("9lives", "x").is_err());
        assert!(store.define("has space", "x").is_err());
        assert!(store.define("g.st", "git status").is_ok());
    }

    #[test]
    fn persists_between_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases");
        fs::write(&path, "# comment\n\n gs = git status \nnot an alias\n").unwrap();

        let mut store = AliasStore::load(&path).unwrap();
        assert_eq!(store.get("gs"), Some("git status"));
        store.define("ll", "ls -l").unwrap();
        assert!(store.remove("gs").unwrap());
        assert!(!store.remove("gs").unwrap());

        let reloaded = AliasStore::load(&path).unwrap();
        assert_eq!(reloaded.iter().collect::<Vec<_>>(), vec![("ll", "ls -l")]);
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = AliasStore::load(dir.path().join("nope")).unwrap();
        assert!(store.is_empty());
    }
}
