use crate::command::{CommandFactory, ExecutableCommand, Invocation, Outcome};
use crate::dispatch::{Dispatch, Factory};
use crate::search;
use anyhow::{Context, Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the streams and context of the invocation.
    ///
    /// An error is printed on the invocation's stderr and turns into exit status 1.
    fn execute(self, inv: &mut Invocation<'_>) -> Result<Outcome>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, inv: &mut Invocation<'_>) -> Outcome {
        match T::execute(*self, inv) {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = writeln!(inv.stderr, "{e}");
                Outcome::status(1)
            }
        }
    }
}

/// Result of `--help` or of arguments argh could not parse.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, inv: &mut Invocation<'_>) -> Outcome {
        if self.is_error {
            let _ = writeln!(inv.stderr, "{}", self.output);
            Outcome::status(1)
        } else {
            let _ = writeln!(inv.stdout, "{}", self.output);
            Outcome::status(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn create(&self, argv: &[String]) -> Box<dyn ExecutableCommand> {
        let args: Vec<&str> = argv.iter().skip(1).map(String::as_str).collect();
        match T::from_args(&[T::name()], &args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, inv: &mut Invocation<'_>) -> Result<Outcome> {
        writeln!(inv.stdout, "{}", inv.ctx.cwd.display())?;
        Ok(Outcome::status(0))
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative to the current directory, or starting with ~.
    pub target: Option<String>,
}

impl Cd {
    fn destination(&self, inv: &Invocation<'_>) -> Result<PathBuf> {
        let home = || {
            inv.ctx
                .home
                .clone()
                .ok_or_else(|| anyhow!("cd: HOME not set"))
        };
        Ok(match self.target.as_deref() {
            None | Some("") | Some("~") => home()?,
            Some(t) if t.starts_with("~/") => home()?.join(&t[2..]),
            Some(t) => inv.ctx.cwd.join(t),
        })
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, inv: &mut Invocation<'_>) -> Result<Outcome> {
        let new_dir = self.destination(inv)?;
        let shown = self.target.as_deref().unwrap_or("~");

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: {shown}: No such file or directory"))?;
        if !canonical.is_dir() {
            bail!("cd: {shown}: Not a directory");
        }
        Ok(Outcome::change_dir(canonical))
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional)]
    /// exit status, taken modulo 256. Defaults to 0.
    pub code: Option<i32>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _inv: &mut Invocation<'_>) -> Result<Outcome> {
        Ok(Outcome::exit(self.code.unwrap_or(0).rem_euclid(256)))
    }
}

/// Write the arguments to standard output, separated by spaces.
///
/// Only leading `-n` words are options. Every other word, dashes included,
/// is printed as written.
pub struct Echo {
    /// Do not output the trailing newline.
    pub no_newline: bool,
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        let flags = args.iter().take_while(|a| **a == "-n").count();
        Ok(Echo {
            no_newline: flags > 0,
            args: args[flags..].iter().map(|a| a.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, inv: &mut Invocation<'_>) -> Result<Outcome> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(inv.stdout, "{}", s)?;
        } else {
            writeln!(inv.stdout, "{}", s)?;
        }
        Ok(Outcome::status(0))
    }
}

#[derive(FromArgs)]
/// tell how each name would be interpreted if used as a command.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(self, inv: &mut Invocation<'_>) -> Result<Outcome> {
        let mut status = 0;
        for name in &self.names {
            if let Dispatch::Builtin(_) = inv.dispatcher.classify(name) {
                writeln!(inv.stdout, "{name} is a shell builtin")?;
            } else if let Some(path) = search::locate(name, inv.ctx) {
                writeln!(inv.stdout, "{name} is {}", path.display())?;
            } else {
                writeln!(inv.stderr, "{name}: not found")?;
                status = 1;
            }
        }
        Ok(Outcome::status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::env::ExecContext;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::TempDir;

    struct Captured {
        outcome: Outcome,
        stdout: String,
        stderr: String,
    }

    fn run(cmd: Box<dyn ExecutableCommand>, ctx: &ExecContext) -> Captured {
        let dispatcher = Dispatcher::default();
        let mut stdin = Cursor::new(Vec::new());
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let outcome = cmd.execute(&mut Invocation {
            stdin: &mut stdin,
            stdout: &mut stdout,
            stderr: &mut stderr,
            ctx,
            dispatcher: &dispatcher,
        });
        Captured {
            outcome,
            stdout: String::from_utf8(stdout).unwrap(),
            stderr: String::from_utf8(stderr).unwrap(),
        }
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn create<T: BuiltinCommand + 'static>(items: &[&str]) -> Box<dyn ExecutableCommand> {
        Factory::<T>::default().create(&argv(items))
    }

    #[test]
    fn test_pwd_prints_context_dir() {
        let ctx = ExecContext::new("/some/where");
        let out = run(Box::new(Pwd {}), &ctx);
        assert_eq!(out.outcome, Outcome::status(0));
        assert_eq!(out.stdout, "/some/where\n");
    }

    #[test]
    fn test_echo_with_and_without_newline() {
        let ctx = ExecContext::new("/");

        let out = run(create::<Echo>(&["echo", "hello", "world"]), &ctx);
        assert_eq!(out.stdout, "hello world\n");

        let out = run(create::<Echo>(&["echo", "-n", "foo", "bar"]), &ctx);
        assert_eq!(out.stdout, "foo bar");
    }

    #[test]
    fn test_echo_keeps_empty_argument() {
        let ctx = ExecContext::new("/");
        let out = run(create::<Echo>(&["echo", "", "x"]), &ctx);
        assert_eq!(out.stdout, " x\n");
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let temp = TempDir::new().unwrap();
        let canonical = fs::canonicalize(temp.path()).unwrap();
        let ctx = ExecContext::new("/");

        let target = canonical.to_string_lossy().to_string();
        let out = run(create::<Cd>(&["cd", &target]), &ctx);

        assert_eq!(out.outcome, Outcome::change_dir(canonical));
        assert_eq!(out.stderr, "");
    }

    #[test]
    fn test_cd_relative_to_context_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let ctx = ExecContext::new(temp.path());

        let out = run(create::<Cd>(&["cd", "sub"]), &ctx);
        let expected = fs::canonicalize(temp.path().join("sub")).unwrap();
        assert_eq!(out.outcome.cwd, Some(expected));
    }

    #[test]
    fn test_cd_to_home_when_none_or_tilde() {
        let temp = TempDir::new().unwrap();
        let canonical = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(temp.path().join("docs")).unwrap();
        let ctx = ExecContext::new("/").with_home(temp.path());

        let out = run(create::<Cd>(&["cd"]), &ctx);
        assert_eq!(out.outcome.cwd, Some(canonical.clone()));

        let out = run(create::<Cd>(&["cd", "~"]), &ctx);
        assert_eq!(out.outcome.cwd, Some(canonical.clone()));

        let out = run(create::<Cd>(&["cd", "~/docs"]), &ctx);
        assert_eq!(out.outcome.cwd, Some(canonical.join("docs")));
    }

    #[test]
    fn test_cd_without_home_fails() {
        let ctx = ExecContext::new("/");
        let out = run(create::<Cd>(&["cd"]), &ctx);
        assert_eq!(out.outcome, Outcome::status(1));
        assert_eq!(out.stderr, "cd: HOME not set\n");
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let temp = TempDir::new().unwrap();
        let ctx = ExecContext::new(temp.path());

        let out = run(create::<Cd>(&["cd", "nope"]), &ctx);
        assert_eq!(out.outcome, Outcome::status(1));
        assert_eq!(out.stderr, "cd: nope: No such file or directory\n");
    }

    #[test]
    fn test_cd_to_file_errors() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("plain"), "").unwrap();
        let ctx = ExecContext::new(temp.path());

        let out = run(create::<Cd>(&["cd", "plain"]), &ctx);
        assert_eq!(out.outcome.cwd, None);
        assert_eq!(out.stderr, "cd: plain: Not a directory\n");
    }

    #[test]
    fn test_exit_codes() {
        let ctx = ExecContext::new("/");
        assert_eq!(run(create::<Exit>(&["exit"]), &ctx).outcome.exit, Some(0));
        assert_eq!(run(create::<Exit>(&["exit", "3"]), &ctx).outcome.exit, Some(3));
        assert_eq!(run(create::<Exit>(&["exit", "257"]), &ctx).outcome.exit, Some(1));
    }

    #[test]
    fn test_type_reports_builtins_programs_and_unknowns() {
        let ctx = ExecContext::new("/").with_search_path(vec![PathBuf::from("/bin")]);
        let out = run(create::<Type>(&["type", "echo", "sh", "no-such-cmd-xyz"]), &ctx);

        assert_eq!(out.outcome, Outcome::status(1));
        assert_eq!(
            out.stdout,
            format!("echo is a shell builtin\nsh is {}\n", Path::new("/bin/sh").display())
        );
        assert_eq!(out.stderr, "no-such-cmd-xyz: not found\n");
    }

    #[test]
    fn test_echo_prints_dash_words_verbatim() {
        let ctx = ExecContext::new("/");

        let out = run(create::<Echo>(&["echo", "-x", "hello"]), &ctx);
        assert_eq!(out.outcome, Outcome::status(0));
        assert_eq!(out.stdout, "-x hello\n");
        assert_eq!(out.stderr, "");

        let out = run(create::<Echo>(&["echo", "--help"]), &ctx);
        assert_eq!(out.stdout, "--help\n");

        let out = run(create::<Echo>(&["echo", "-n", "-n", "a", "-n"]), &ctx);
        assert_eq!(out.stdout, "a -n");

        let out = run(create::<Echo>(&["echo", "-nx"]), &ctx);
        assert_eq!(out.stdout, "-nx\n");
    }

    #[test]
    fn test_help_goes_to_stdout_with_success() {
        let ctx = ExecContext::new("/");
        let out = run(create::<Type>(&["type", "--help"]), &ctx);
        assert_eq!(out.outcome, Outcome::status(0));
        assert!(out.stdout.contains("Usage: type"));
    }

    #[test]
    fn test_bad_arguments_go_to_stderr_with_failure() {
        let ctx = ExecContext::new("/");
        let out = run(create::<Pwd>(&["pwd", "extra"]), &ctx);
        assert_eq!(out.outcome, Outcome::status(1));
        assert_eq!(out.stdout, "");
        assert!(!out.stderr.is_empty());
    }
}
