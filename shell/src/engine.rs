//! Running a parsed [`Pipeline`].
//!
//! Every stage is started before anything is waited on:
//!
//! 1. Stages are prepared left to right. Redirections are opened, external
//!    programs are spawned, and relay threads are started for every join
//!    between a builtin and an external program.
//! 2. Builtins then run one after another on the calling thread.
//! 3. Finally all processes are waited for and all relays joined.
//!
//! Two adjacent external stages share a plain OS pipe. A builtin writes into
//! (and reads from) an unbounded in-memory channel, so it never blocks on a
//! consumer that has not been scheduled yet.

use crate::command::{ExecutableCommand, ExitCode, Invocation, Outcome};
use crate::dispatch::{Dispatch, Dispatcher};
use crate::env::ExecContext;
use crate::error::StageError;
use crate::io_adapters::{self, ChannelReader};
use crate::lexer::Stream;
use crate::parser::{Pipeline, Stage};
use crate::redirect::Sink;
use crate::search;
use log::{debug, trace, warn};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, Scope, ScopedJoinHandle};

/// How one stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Builtin status, or the exit code of an external program.
    Exited(ExitCode),
    NotFound,
    SpawnFailed,
    /// A redirection target could not be opened, so the stage never ran.
    RedirectFailed,
}

impl StageStatus {
    pub fn code(self) -> ExitCode {
        match self {
            StageStatus::Exited(code) => code,
            StageStatus::NotFound => 127,
            StageStatus::SpawnFailed => 126,
            StageStatus::RedirectFailed => 1,
        }
    }
}

/// Result of running one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// One entry per stage, in pipeline order.
    pub stages: Vec<StageStatus>,
    /// New working directory from a single-stage `cd`.
    pub cwd: Option<PathBuf>,
    /// Exit request from a single-stage `exit`.
    pub exit: Option<ExitCode>,
}

impl PipelineOutcome {
    /// The pipeline's status is its last stage's status.
    pub fn status(&self) -> ExitCode {
        self.stages.last().map_or(0, |s| s.code())
    }
}

/// What the next stage reads from.
enum Feed {
    Closed,
    Process(ChildStdout),
    Channel(ChannelReader),
}

/// Where a stage's stdout goes.
enum Output {
    Sink(Sink),
    NextStage,
}

impl Output {
    fn stdio(&self) -> io::Result<Stdio> {
        match self {
            Output::Sink(sink) => sink.stdio(),
            Output::NextStage => Ok(Stdio::piped()),
        }
    }
}

struct BuiltinUnit {
    name: String,
    command: Box<dyn ExecutableCommand>,
    stdin: Box<dyn Read>,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

/// Running representation of one stage.
enum ExecutionUnit {
    /// Bound to its streams, waiting for its turn on the calling thread.
    Builtin(BuiltinUnit),
    Process { name: String, child: Child },
    Finished(StageStatus),
}

/// Background copy from a producer into a consumer's input.
struct Relay<'scope> {
    label: String,
    handle: ScopedJoinHandle<'scope, io::Result<u64>>,
}

/// Start a relay. The relay owns `to` and closes it exactly once, after `from` is exhausted.
fn spawn_relay<'scope, 'env, R, W>(
    scope: &'scope Scope<'scope, 'env>,
    label: String,
    mut from: R,
    mut to: W,
) -> Relay<'scope>
where
    R: Read + Send + 'scope,
    W: Write + Send + 'scope,
{
    trace!("relay {label}: started");
    let handle = scope.spawn(move || {
        let copied = io::copy(&mut from, &mut to);
        drop(to);
        copied
    });
    Relay { label, handle }
}

/// Dispose of the input of a stage that will never run.
///
/// Builtin output is drained so the builtin can still finish normally. A
/// process pipe is closed instead, so the producer stops on `SIGPIPE`.
fn drain<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    name: &str,
    input: Feed,
    relays: &mut Vec<Relay<'scope>>,
) {
    if let Feed::Channel(reader) = input {
        relays.push(spawn_relay(scope, format!("drain {name}"), reader, io::sink()));
    }
}

/// Runs pipelines of builtins and external programs.
pub struct Engine {
    dispatcher: Dispatcher,
    stdout: Sink,
    stderr: Sink,
}

impl Engine {
    /// An engine writing to the interpreter's own stdout and stderr.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            stdout: Sink::Terminal(Stream::Stdout),
            stderr: Sink::Terminal(Stream::Stderr),
        }
    }

    /// Replace the streams that unredirected output ends up in.
    pub fn with_terminal(mut self, stdout: Sink, stderr: Sink) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Where the engine reports problems that belong to no stage.
    pub fn stderr(&self) -> &Sink {
        &self.stderr
    }

    /// Run a pipeline to completion. Blocks until every stage and relay is done.
    pub fn run(&self, pipeline: &Pipeline, ctx: &ExecContext) -> PipelineOutcome {
        let stages = pipeline.stages();
        let simple = pipeline.is_simple();

        thread::scope(|scope| {
            let mut relays = Vec::new();
            let mut units = Vec::with_capacity(stages.len());
            let mut feed = Feed::Closed;
            for (index, stage) in stages.iter().enumerate() {
                let is_last = index + 1 == stages.len();
                let (unit, next) = self.start_stage(scope, stage, feed, is_last, ctx, &mut relays);
                units.push(unit);
                feed = next;
            }

            let mut outcome = PipelineOutcome {
                stages: Vec::with_capacity(units.len()),
                cwd: None,
                exit: None,
            };

            for unit in units.iter_mut() {
                let taken = std::mem::replace(unit, ExecutionUnit::Finished(StageStatus::Exited(0)));
                *unit = match taken {
                    ExecutionUnit::Builtin(builtin) => {
                        let result = self.run_builtin(builtin, ctx);
                        if simple {
                            outcome.cwd = result.cwd;
                            outcome.exit = result.exit;
                        } else if result.cwd.is_some() || result.exit.is_some() {
                            debug!("ignoring state change requested inside a pipeline");
                        }
                        ExecutionUnit::Finished(StageStatus::Exited(result.status))
                    }
                    other => other,
                };
            }

            for unit in units {
                outcome.stages.push(match unit {
                    ExecutionUnit::Process { name, mut child } => wait_process(&name, &mut child),
                    ExecutionUnit::Finished(status) => status,
                    ExecutionUnit::Builtin(builtin) => {
                        warn!("builtin {} was never run", builtin.name);
                        StageStatus::Exited(1)
                    }
                });
            }

            for relay in relays {
                match relay.handle.join() {
                    Ok(Ok(bytes)) => trace!("relay {}: forwarded {bytes} bytes", relay.label),
                    Ok(Err(e)) => debug!("relay {}: stopped early: {e}", relay.label),
                    Err(_) => warn!("relay {} panicked", relay.label),
                }
            }

            outcome
        })
    }

    fn start_stage<'scope, 'env>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        stage: &Stage,
        input: Feed,
        is_last: bool,
        ctx: &ExecContext,
        relays: &mut Vec<Relay<'scope>>,
    ) -> (ExecutionUnit, Feed) {
        let stderr = match &stage.redirection.stderr {
            Some(target) => match Sink::open(target, &ctx.cwd) {
                Ok(sink) => sink,
                Err(e) => {
                    self.stderr.report(&e);
                    drain(scope, stage.name(), input, relays);
                    return (ExecutionUnit::Finished(StageStatus::RedirectFailed), Feed::Closed);
                }
            },
            None => terminal(&self.stderr),
        };

        let output = match &stage.redirection.stdout {
            Some(target) => match Sink::open(target, &ctx.cwd) {
                Ok(sink) => Output::Sink(sink),
                Err(e) => {
                    stderr.report(&e);
                    drain(scope, stage.name(), input, relays);
                    return (ExecutionUnit::Finished(StageStatus::RedirectFailed), Feed::Closed);
                }
            },
            None if is_last => Output::Sink(terminal(&self.stdout)),
            None => Output::NextStage,
        };

        match self.dispatcher.classify(stage.name()) {
            Dispatch::Builtin(factory) => {
                debug!("stage {}: builtin", stage.name());
                let command = factory.create(&stage.argv);
                prepare_builtin(scope, stage, command, input, output, &stderr, relays)
            }
            Dispatch::External => match search::locate(stage.name(), ctx) {
                Some(program) => {
                    spawn_process(scope, stage, program, input, output, &stderr, ctx, relays)
                }
                None => {
                    debug!("stage {}: not found", stage.name());
                    stderr.report(StageError::NotFound(stage.name().to_string()));
                    drain(scope, stage.name(), input, relays);
                    (ExecutionUnit::Finished(StageStatus::NotFound), Feed::Closed)
                }
            },
        }
    }

    fn run_builtin(&self, unit: BuiltinUnit, ctx: &ExecContext) -> Outcome {
        let BuiltinUnit {
            name,
            command,
            mut stdin,
            mut stdout,
            mut stderr,
        } = unit;

        let outcome = command.execute(&mut Invocation {
            stdin: &mut *stdin,
            stdout: &mut *stdout,
            stderr: &mut *stderr,
            ctx,
            dispatcher: &self.dispatcher,
        });
        if let Err(e) = stdout.flush() {
            debug!("builtin {name}: flushing stdout failed: {e}");
        }
        let _ = stderr.flush();
        debug!("builtin {name} exited with {}", outcome.status);
        outcome
    }
}

/// A private handle on one of the engine's terminal sinks.
fn terminal(sink: &Sink) -> Sink {
    sink.try_clone().unwrap_or_else(|e| {
        warn!("cannot duplicate terminal stream: {e}");
        Sink::Discard
    })
}

fn writer_for(sink: &Sink) -> Box<dyn Write> {
    match sink.writer() {
        Ok(w) => w,
        Err(e) => {
            warn!("cannot open writer: {e}");
            Box::new(io::sink())
        }
    }
}

fn prepare_builtin<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    stage: &Stage,
    command: Box<dyn ExecutableCommand>,
    input: Feed,
    output: Output,
    stderr: &Sink,
    relays: &mut Vec<Relay<'scope>>,
) -> (ExecutionUnit, Feed) {
    let name = stage.name().to_string();

    let stdin: Box<dyn Read> = match input {
        Feed::Closed => Box::new(io::empty()),
        Feed::Channel(reader) => Box::new(reader),
        Feed::Process(upstream) => {
            let (writer, reader) = io_adapters::channel();
            relays.push(spawn_relay(scope, format!("into {name}"), upstream, writer));
            Box::new(reader)
        }
    };

    let (stdout, next): (Box<dyn Write>, Feed) = match output {
        Output::Sink(sink) => (writer_for(&sink), Feed::Closed),
        Output::NextStage => {
            let (writer, reader) = io_adapters::channel();
            (Box::new(writer), Feed::Channel(reader))
        }
    };

    let unit = BuiltinUnit {
        name,
        command,
        stdin,
        stdout,
        stderr: writer_for(stderr),
    };
    (ExecutionUnit::Builtin(unit), next)
}

#[allow(clippy::too_many_arguments)]
fn spawn_process<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    stage: &Stage,
    program: PathBuf,
    input: Feed,
    output: Output,
    stderr: &Sink,
    ctx: &ExecContext,
    relays: &mut Vec<Relay<'scope>>,
) -> (ExecutionUnit, Feed) {
    let name = stage.name();
    let mut command = Command::new(&program);
    command.args(stage.args()).current_dir(&ctx.cwd).envs(&ctx.vars);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.arg0(name);
    }

    let mut pending_input = None;
    let stdin = match input {
        Feed::Closed => Stdio::null(),
        Feed::Process(upstream) => Stdio::from(upstream),
        Feed::Channel(reader) => {
            pending_input = Some(reader);
            Stdio::piped()
        }
    };

    match spawn(&mut command, stdin, &output, stderr) {
        Ok(mut child) => {
            debug!("stage {name}: spawned {} as pid {}", program.display(), child.id());
            if let (Some(reader), Some(child_stdin)) = (pending_input, child.stdin.take()) {
                relays.push(spawn_relay(scope, format!("into {name}"), reader, child_stdin));
            }
            let next = match output {
                Output::NextStage => child.stdout.take().map_or(Feed::Closed, Feed::Process),
                Output::Sink(_) => Feed::Closed,
            };
            let unit = ExecutionUnit::Process {
                name: name.to_string(),
                child,
            };
            (unit, next)
        }
        Err(source) => {
            debug!("stage {name}: spawn failed: {source}");
            stderr.report(StageError::Spawn {
                name: name.to_string(),
                source,
            });
            if let Some(reader) = pending_input {
                drain(scope, name, Feed::Channel(reader), relays);
            }
            (ExecutionUnit::Finished(StageStatus::SpawnFailed), Feed::Closed)
        }
    }
}

fn spawn(command: &mut Command, stdin: Stdio, output: &Output, stderr: &Sink) -> io::Result<Child> {
    command
        .stdin(stdin)
        .stdout(output.stdio()?)
        .stderr(stderr.stdio()?)
        .spawn()
}

fn wait_process(name: &str, child: &mut Child) -> StageStatus {
    match child.wait() {
        Ok(status) => {
            let code = status.code().unwrap_or_else(|| terminated_by_signal(status));
            debug!("stage {name}: exited with {code}");
            StageStatus::Exited(code)
        }
        Err(e) => {
            warn!("stage {name}: wait failed: {e}");
            StageStatus::Exited(1)
        }
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}
