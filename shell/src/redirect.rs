//! Redirection resolution and the output sinks a stage writes into.

use crate::error::{StageError, SyntaxError};
use crate::lexer::{Mode, RedirectOp, Stream, Token};
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Where one stream of a stage is redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// File name as written on the command line; relative names are resolved against the cwd.
    pub path: PathBuf,
    pub mode: Mode,
}

/// Per-stage redirections. Each stream has at most one target; the rightmost operator wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub stdout: Option<Target>,
    pub stderr: Option<Target>,
}

impl RedirectionSpec {
    fn set(&mut self, op: RedirectOp, path: String) {
        let target = Some(Target {
            path: PathBuf::from(path),
            mode: op.mode,
        });
        match op.stream {
            Stream::Stdout => self.stdout = target,
            Stream::Stderr => self.stderr = target,
        }
    }
}

struct Resolver<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Resolver<'a> {
    fn consume(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn resolve(mut self) -> Result<(Vec<String>, RedirectionSpec), SyntaxError> {
        let mut argv = Vec::new();
        let mut spec = RedirectionSpec::default();

        while let Some(token) = self.consume() {
            match token {
                Token::Word(w) => argv.push(w.clone()),
                Token::Redirect(op) => match self.consume() {
                    Some(Token::Word(path)) => spec.set(*op, path.clone()),
                    Some(other) => return Err(SyntaxError::UnexpectedToken(other.text())),
                    None => return Err(SyntaxError::DanglingRedirect(*op)),
                },
                Token::Pipe => return Err(SyntaxError::UnexpectedToken(token.text())),
            }
        }

        Ok((argv, spec))
    }
}

/// Separate one stage's tokens into its argument vector and its redirections.
///
/// Scanning is left to right, so a later operator for the same stream replaces
/// an earlier one. The segment must not contain a pipe.
pub fn resolve(tokens: &[Token]) -> Result<(Vec<String>, RedirectionSpec), SyntaxError> {
    Resolver { tokens, pos: 0 }.resolve()
}

/// Destination for a stage's stdout or stderr.
#[derive(Debug)]
pub enum Sink {
    /// The interpreter's own standard stream.
    Terminal(Stream),
    File(File),
    /// Writes are accepted and dropped.
    Discard,
}

impl Sink {
    /// Open a redirection target relative to `cwd`.
    ///
    /// A target whose parent directory does not exist yields [`Sink::Discard`]
    /// and no file is created. Append mode creates the file right away, even if
    /// nothing is ever written to it.
    pub fn open(target: &Target, cwd: &Path) -> Result<Sink, StageError> {
        let path = cwd.join(&target.path);
        if let Some(parent) = path.parent() {
            if !parent.is_dir() {
                debug!(
                    "discarding output for {}: {} is not a directory",
                    path.display(),
                    parent.display()
                );
                return Ok(Sink::Discard);
            }
        }

        let mut options = OpenOptions::new();
        match target.mode {
            Mode::Overwrite => options.write(true).create(true).truncate(true),
            Mode::Append => options.append(true).create(true),
        };
        options
            .open(&path)
            .map(Sink::File)
            .map_err(|source| StageError::Redirect { path, source })
    }

    pub fn try_clone(&self) -> io::Result<Sink> {
        Ok(match self {
            Sink::Terminal(stream) => Sink::Terminal(*stream),
            Sink::File(file) => Sink::File(file.try_clone()?),
            Sink::Discard => Sink::Discard,
        })
    }

    /// Handle for a child process.
    pub fn stdio(&self) -> io::Result<Stdio> {
        Ok(match self {
            Sink::Terminal(_) => Stdio::inherit(),
            Sink::File(file) => Stdio::from(file.try_clone()?),
            Sink::Discard => Stdio::null(),
        })
    }

    /// Writer for a builtin running inside the interpreter.
    pub fn writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(match self {
            Sink::Terminal(Stream::Stdout) => Box::new(io::stdout()),
            Sink::Terminal(Stream::Stderr) => Box::new(io::stderr()),
            Sink::File(file) => Box::new(file.try_clone()?),
            Sink::Discard => Box::new(io::sink()),
        })
    }

    /// Best-effort diagnostic line; a sink that cannot be written to swallows it.
    pub fn report(&self, message: impl std::fmt::Display) {
        if let Ok(mut w) = self.writer() {
            let _ = writeln!(w, "{message}");
            let _ = w.flush();
        }
    }
}
