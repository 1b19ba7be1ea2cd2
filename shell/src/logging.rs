//! Logger setup for the `lineshell` binary. The library only emits records.

use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;
use std::path::Path;

fn config() -> Config {
    ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Debug)
        .build()
}

/// Install the global logger: appended to `file` when given, otherwise on stderr.
pub fn init(level: LevelFilter, file: Option<&Path>) -> Result<()> {
    let installed = match file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            WriteLogger::init(level, config(), file)
        }
        None => TermLogger::init(level, config(), TerminalMode::Stderr, ColorChoice::Auto),
    };
    installed.context("logger already initialised")
}
