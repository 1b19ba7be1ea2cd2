use crate::command::CommandFactory;
use std::collections::BTreeMap;

/// Factory allows creating instances of a builtin from its argv.
///
/// Implemented for every [`BuiltinCommand`](crate::builtin) in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// How a command name will be executed.
pub enum Dispatch<'a> {
    Builtin(&'a dyn CommandFactory),
    External,
}

/// Table of builtins by name. Anything not registered is an external program.
pub struct Dispatcher {
    builtins: BTreeMap<&'static str, Box<dyn CommandFactory>>,
}

impl Dispatcher {
    /// A dispatcher with no builtins at all.
    pub fn empty() -> Self {
        Self {
            builtins: BTreeMap::new(),
        }
    }

    /// Register a builtin, replacing any previous one with the same name.
    pub fn register(&mut self, factory: Box<dyn CommandFactory>) {
        self.builtins.insert(factory.name(), factory);
    }

    pub fn classify(&self, name: &str) -> Dispatch<'_> {
        match self.builtins.get(name) {
            Some(factory) => Dispatch::Builtin(factory.as_ref()),
            None => Dispatch::External,
        }
    }

    /// Registered builtin names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builtins.keys().copied()
    }
}

impl Default for Dispatcher {
    /// The standard builtins: `cd`, `echo`, `exit`, `pwd`, `type`.
    fn default() -> Self {
        use crate::builtin::*;
        let mut dispatcher = Self::empty();
        dispatcher.register(Box::new(Factory::<Cd>::default()));
        dispatcher.register(Box::new(Factory::<Echo>::default()));
        dispatcher.register(Box::new(Factory::<Exit>::default()));
        dispatcher.register(Box::new(Factory::<Pwd>::default()));
        dispatcher.register(Box::new(Factory::<Type>::default()));
        dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_builtins_are_registered() {
        let d = Dispatcher::default();
        assert_eq!(
            d.names().collect::<Vec<_>>(),
            vec!["cd", "echo", "exit", "pwd", "type"]
        );
        for name in ["cd", "echo", "exit", "pwd", "type"] {
            assert!(matches!(d.classify(name), Dispatch::Builtin(f) if f.name() == name));
        }
    }

    #[test]
    fn everything_else_is_external() {
        let d = Dispatcher::default();
        for name in ["ls", "cat", "/bin/echo", "ECHO", ""] {
            assert!(matches!(d.classify(name), Dispatch::External), "{name}");
        }
    }

    #[test]
    fn empty_dispatcher_sends_everything_outside() {
        let d = Dispatcher::empty();
        assert!(matches!(d.classify("echo"), Dispatch::External));
    }
}
