//! Turning a line into a [`Pipeline`] of resolved stages.

use crate::error::SyntaxError;
use crate::lexer::{self, Token};
use crate::redirect::{self, RedirectionSpec};

/// One command of a pipeline together with its own redirections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// `argv[0]` is the command name. Never empty when built by [`build`].
    pub argv: Vec<String>,
    pub redirection: RedirectionSpec,
}

impl Stage {
    /// The command name, or `""` for a stage without words.
    pub fn name(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// A non-empty sequence of stages connected stdout to stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// A pipeline of one stage is a simple command.
    pub fn is_simple(&self) -> bool {
        self.stages.len() == 1
    }
}

/// Split tokens on standalone `|`. Every segment must be non-empty.
pub fn split(tokens: &[Token]) -> Result<Vec<Vec<Token>>, SyntaxError> {
    let segments: Vec<Vec<Token>> = tokens
        .split(|t| *t == Token::Pipe)
        .map(<[Token]>::to_vec)
        .collect();

    if segments.iter().any(Vec::is_empty) {
        return Err(SyntaxError::EmptySegment);
    }
    Ok(segments)
}

/// Build a pipeline from already lexed tokens.
pub fn build(tokens: &[Token]) -> Result<Pipeline, SyntaxError> {
    let stages = split(tokens)?
        .iter()
        .map(|segment| {
            let (argv, redirection) = redirect::resolve(segment)?;
            if argv.is_empty() {
                return Err(SyntaxError::EmptyCommand);
            }
            Ok(Stage { argv, redirection })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Pipeline { stages })
}

/// Parse one input line.
///
/// Returns `Ok(None)` for a line with no tokens. Any syntax error rejects the
/// whole line, so nothing from it is ever executed.
pub fn parse_line(line: &str) -> Result<Option<Pipeline>, SyntaxError> {
    let lexed = lexer::lex(line);
    if let Some(quote) = lexed.open_quote {
        return Err(SyntaxError::UnterminatedQuote(quote));
    }
    if lexed.tokens.is_empty() {
        return Ok(None);
    }
    build(&lexed.tokens).map(Some)
}
