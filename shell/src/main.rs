use argh::FromArgs;
use lineshell::{Interpreter, logging};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(FromArgs)]
/// A line-oriented command interpreter with pipes and output redirection.
struct Args {
    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status.
    command: Option<String>,

    #[argh(option, default = "LevelFilter::Warn")]
    /// log level: off, error, warn, info, debug or trace.
    log_level: LevelFilter,

    #[argh(option)]
    /// append log records to this file instead of stderr.
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    logging::init(args.log_level, args.log_file.as_deref())?;

    let mut sh = Interpreter::default();
    let code = match args.command {
        Some(line) => {
            let status = sh.execute_line(&line);
            sh.env().exit_code.unwrap_or(status)
        }
        None => sh.repl()?,
    };
    std::process::exit(code)
}
