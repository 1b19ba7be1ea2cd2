//! Error types for parsing a line and starting a stage.

use crate::lexer::RedirectOp;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A problem with the shape of a line. The whole line is rejected and no stage runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    /// The line ended while a quote was still open.
    #[error("unexpected end of line while looking for matching `{0}'")]
    UnterminatedQuote(char),

    /// A leading, trailing or doubled `|`.
    #[error("syntax error near unexpected token `|'")]
    EmptySegment,

    /// A redirection operator with no file name after it.
    #[error("syntax error: missing file name after `{0}'")]
    DanglingRedirect(RedirectOp),

    /// An operator where a file name was expected.
    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),

    /// A segment made only of redirections, such as `> out.txt`.
    #[error("syntax error: redirection without a command")]
    EmptyCommand,
}

/// Why a single stage could not be started. Local to that stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// No builtin by that name and nothing executable on the search path.
    #[error("{0}: command not found")]
    NotFound(String),

    /// The program was found but the OS refused to start it.
    #[error("{name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// A redirection target exists in a usable directory but could not be opened.
    #[error("{}: {source}", path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
