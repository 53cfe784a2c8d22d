//! An interactive shell with job control.
//!
//! A command line goes through a fixed chain: [`lexer`] splits it into words
//! and pipe operators, [`alias`] expands the leading word, builtins run
//! in-process, and everything else becomes a [`parser::Pipeline`] of child
//! processes. A single command may redirect its output ([`redirect`]) or run
//! in the background with a trailing `&`. Background and suspended children
//! are tracked in the [`jobs`] table, and [`signals`] turns `^Z` and `^C`
//! into job state changes instead of letting them reach the shell itself.
//!
//! The main entry point is [`Interpreter`], which runs single lines with
//! [`Interpreter::dispatch`] or drives a terminal session with
//! [`Interpreter::repl`].

pub mod alias;
mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod external;
pub mod history;
mod interpreter;
pub mod jobs;
pub mod lexer;
pub mod parser;
pub mod process;
pub mod redirect;
pub mod signals;

pub use builtin::{BuiltinConstructor, BuiltinTable};
pub use config::Config;
pub use error::ShellError;
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::{Interpreter, ShellState};
