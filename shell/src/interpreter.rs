use crate::command::ExitCode;
use crate::dispatch::Dispatcher;
use crate::engine::Engine;
use crate::env::Environment;
use crate::parser;
use log::{debug, info};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Status reported for a line rejected by the parser.
pub const SYNTAX_ERROR_STATUS: ExitCode = 2;

/// A minimal shell-like interpreter that can execute builtin and external commands.
///
/// The interpreter owns the [`Environment`], the single authoritative copy of
/// the working directory between lines, and an [`Engine`] that runs each line.
///
/// Example
/// ```
/// use lineshell::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.execute_line("echo hello world");
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    engine: Engine,
    last_status: ExitCode,
}

impl Interpreter {
    pub fn new(env: Environment, engine: Engine) -> Self {
        Self {
            env,
            engine,
            last_status: 0,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Parse and run one line, returning its status.
    ///
    /// A blank line leaves the previous status unchanged.
    pub fn execute_line(&mut self, line: &str) -> ExitCode {
        let pipeline = match parser::parse_line(line) {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => return self.last_status,
            Err(e) => {
                self.engine.stderr().report(format_args!("lineshell: {e}"));
                self.last_status = SYNTAX_ERROR_STATUS;
                return self.last_status;
            }
        };

        let mut outcome = self.engine.run(&pipeline, &self.env.context());
        if let Some(cwd) = outcome.cwd.take() {
            debug!("working directory is now {}", cwd.display());
            self.env.current_dir = cwd;
        }
        if let Some(code) = outcome.exit {
            self.env.exit_code = Some(code);
        }

        self.last_status = outcome.status();
        self.last_status
    }

    /// Read-Eval-Print Loop. Returns the status the interpreter should exit with.
    pub fn repl(&mut self) -> rustyline::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;

        while !self.env.should_exit() {
            match rl.readline("$ ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.execute_line(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        info!("leaving interpreter");
        Ok(self.env.exit_code.unwrap_or(self.last_status))
    }
}

impl Default for Interpreter {
    /// An interpreter over the process environment with the standard builtins.
    fn default() -> Self {
        Self::new(Environment::new(), Engine::new(Dispatcher::default()))
    }
}
