//! A small line-oriented command interpreter.
//!
//! A line goes through a fixed chain: the [`lexer`] turns it into tokens, the
//! [`parser`] splits them into pipeline stages and [`redirect`] pulls out each
//! stage's redirections, the [`dispatch`] table decides between a builtin and
//! an external program, and the [`engine`] runs all stages concurrently with
//! their streams wired together.
//!
//! The main entry point is [`Interpreter`], which keeps the working directory
//! between lines and offers an interactive loop.

pub mod builtin;
pub mod command;
pub mod dispatch;
pub mod engine;
pub mod env;
pub mod error;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod redirect;
pub mod search;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, SYNTAX_ERROR_STATUS};
