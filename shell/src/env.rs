use crate::search;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, user-level view of the process environment owned by the interpreter.
///
/// The environment contains:
/// - `vars`: environment variables passed to every external program.
/// - `current_dir`: the one authoritative working directory between lines.
/// - `exit_code`: set once an `exit` builtin asks the interpreter to stop.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub exit_code: Option<i32>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self {
            vars,
            current_dir,
            exit_code: None,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn should_exit(&self) -> bool {
        self.exit_code.is_some()
    }

    /// Snapshot of the inputs one line is executed with.
    pub fn context(&self) -> ExecContext {
        ExecContext {
            cwd: self.current_dir.clone(),
            search_path: search::split_search_path(self.get_var("PATH").unwrap_or_default()),
            home: self.get_var("HOME").map(PathBuf::from),
            vars: self.vars.clone(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only inputs for executing one pipeline.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    /// Working directory for every stage; redirect targets are relative to it.
    pub cwd: PathBuf,
    /// Directories searched, in order, for external programs.
    pub search_path: Vec<PathBuf>,
    pub home: Option<PathBuf>,
    /// Variables set on every spawned program. [`Environment::context`] fills in the
    /// whole captured environment; values here override what the process inherited.
    pub vars: HashMap<String, String>,
}

impl ExecContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Default::default()
        }
    }

    pub fn with_search_path(mut self, search_path: Vec<PathBuf>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }
}
