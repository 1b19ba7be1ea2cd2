use crate::dispatch::Dispatcher;
use crate::env::ExecContext;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Streams and read-only state handed to a builtin for one invocation.
pub struct Invocation<'a> {
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
    pub ctx: &'a ExecContext,
    /// Lets builtins such as `type` ask what a name refers to.
    pub dispatcher: &'a Dispatcher,
}

/// What a builtin asks of the interpreter besides its exit status.
///
/// The engine only honours `cwd` and `exit` for single-stage commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub status: ExitCode,
    /// New working directory, set by a successful `cd`.
    pub cwd: Option<PathBuf>,
    /// Exit code requested by `exit`.
    pub exit: Option<ExitCode>,
}

impl Outcome {
    pub fn status(status: ExitCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn change_dir(cwd: PathBuf) -> Self {
        Self {
            cwd: Some(cwd),
            ..Default::default()
        }
    }

    pub fn exit(code: ExitCode) -> Self {
        Self {
            exit: Some(code),
            status: code,
            ..Default::default()
        }
    }
}

/// Object-safe trait for a builtin whose arguments are already parsed.
pub trait ExecutableCommand {
    /// Executes the command. Failures are reported on `stderr` and folded into the status.
    fn execute(self: Box<Self>, inv: &mut Invocation<'_>) -> Outcome;
}

/// Registered capability: builds a ready-to-run builtin from a resolved argv.
pub trait CommandFactory {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name(&self) -> &'static str;

    /// Parse `argv` (including `argv[0]`) into a runnable command.
    fn create(&self, argv: &[String]) -> Box<dyn ExecutableCommand>;
}
