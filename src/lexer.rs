//! Lexical analysis of one command line into shell words and pipe operators.
//!
//! Quoting follows the usual shell rules: single quotes keep everything literal,
//! double quotes keep whitespace and honour `\` before `\`, `"`, `$` and `` ` ``,
//! and an unquoted backslash escapes the next character.

use crate::error::ShellError;
use std::fmt;

/// One shell word after quote removal.
///
/// `quoted` records whether any part of the word came from quoting or an
/// escape, so that `">"` stays an argument instead of becoming an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub quoted: bool,
}

impl Word {
    pub fn new(text: impl Into<String>) -> Self {
        Word {
            text: text.into(),
            quoted: false,
        }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Word {
            text: text.into(),
            quoted: true,
        }
    }

    /// True when this word is exactly the unquoted operator `op`.
    pub fn is_operator(&self, op: &str) -> bool {
        !self.quoted && self.text == op
    }
}

impl fmt::Display for Word {
    /// Renders the word so that lexing the output yields the same text back.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // unquoted operator words such as `>` or `&>` print as typed
        let is_operator = !self.quoted
            && !self.text.is_empty()
            && self.text.chars().all(|c| matches!(c, '&' | '<' | '>' | '2'));
        let needs_quotes = self.text.is_empty()
            || self
                .text
                .chars()
                .any(|c| c.is_whitespace() || "'\"\\|&<>$`".contains(c));
        if is_operator || !needs_quotes {
            return f.write_str(&self.text);
        }
        write!(f, "'{}'", self.text.replace('\'', r"'\''"))
    }
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(Word),
    /// The unquoted pipe operator, `|`.
    PipeOp,
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    UnfinishedQuote(char),
    /// The line ended right after a backslash.
    DanglingEscape,
}

impl From<LexingError> for ShellError {
    fn from(e: LexingError) -> Self {
        match e {
            LexingError::UnfinishedQuote(q) => {
                ShellError::Syntax(format!("no closing quotation ({q})"))
            }
            LexingError::DanglingEscape => ShellError::Syntax("no escaped character".into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
    quoted: bool,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
            quoted: false,
        }
    }

    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out)?,
                LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => return Err(LexingError::UnfinishedQuote('\'')),
            LexingState::ReadingDoubleQuote => return Err(LexingError::UnfinishedQuote('"')),
            LexingState::ReadingWord => self.finish_word(&mut out),
            LexingState::Start => {}
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexingError> {
        match ch {
            c if c.is_whitespace() => {}
            '|' => out.push(Token::PipeOp),
            _ => {
                self.state = LexingState::ReadingWord;
                self.handle_word(ch, out)?;
            }
        }
        Ok(())
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexingError> {
        match ch {
            c if c.is_whitespace() => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '|' => {
                self.finish_word(out);
                out.push(Token::PipeOp);
                self.state = LexingState::Start;
            }
            '\'' => {
                self.quoted = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.quoted = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => {
                let escaped = self.read_char().ok_or(LexingError::DanglingEscape)?;
                self.quoted = true;
                self.buffer.push(escaped);
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => match self.peek_char() {
                Some(next @ ('\\' | '"' | '$' | '`' | '\n')) => {
                    self.read_char();
                    self.buffer.push(next);
                }
                Some(_) => self.buffer.push('\\'),
                None => return Err(LexingError::UnfinishedQuote('"')),
            },
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        out.push(Token::Word(Word {
            text: std::mem::take(&mut self.buffer),
            quoted: std::mem::take(&mut self.quoted),
        }));
    }
}

/// The main entry point function to perform lexical analysis.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    let mut lexer = LexingFSM::new(line);
    lexer.make_tokens()
}
