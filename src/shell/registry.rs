//! Command registry.
//!
//! Commands are registered explicitly with their metadata; aliases install
//! additional keys pointing at the same record, and a later registration of
//! the same upper-cased name wins. The registry is read-only for the
//! lifetime of a session.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::app::ShellApp;
use super::builtins;
use super::session::Session;
use crate::Result;

/// Future returned by a command handler.
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// A command handler: borrows the session for the duration of the call and
/// receives the tokenized parameters.
pub type CommandFn<A> = for<'a> fn(&'a mut Session<A>, Vec<String>) -> CommandFuture<'a>;

/// Builder for one command registration.
pub struct Command<A> {
    name: String,
    handler: CommandFn<A>,
    params: String,
    short: String,
    long: String,
    hidden: bool,
    aliases: Vec<String>,
}

impl<A> Command<A> {
    /// Start a registration. The name is upper-cased.
    pub fn new(name: &str, handler: CommandFn<A>) -> Self {
        Self {
            name: name.to_uppercase(),
            handler,
            params: String::new(),
            short: String::new(),
            long: String::new(),
            hidden: false,
            aliases: Vec::new(),
        }
    }

    /// One line of parameter syntax, shown by HELP (may stay empty).
    pub fn params(mut self, params: &str) -> Self {
        self.params = params.to_string();
        self
    }

    /// One-line summary, shown in the HELP overview.
    pub fn help(mut self, short: &str) -> Self {
        self.short = short.to_string();
        self
    }

    /// Long help text for `HELP <name>`; falls back to the summary.
    pub fn long_help(mut self, long: &str) -> Self {
        self.long = long.to_string();
        self
    }

    /// Additional name resolving to the same record.
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_uppercase());
        self
    }

    /// Omit this command from the HELP overview. It stays addressable by
    /// exact name.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// The record a command name and its aliases share.
pub struct CommandEntry<A> {
    /// The handler to invoke.
    pub handler: CommandFn<A>,
    /// Parameter syntax line.
    pub params: String,
    /// One-line summary.
    pub short: String,
    /// Long help text.
    pub long: String,
    /// Omitted from the HELP overview.
    pub hidden: bool,
}

/// Mapping from upper-cased command name to handler record.
pub struct CommandRegistry<A> {
    commands: HashMap<String, Arc<CommandEntry<A>>>,
}

impl<A: ShellApp> CommandRegistry<A> {
    /// An empty registry, without even the built-ins.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// A registry with HELP/?, EXIT/QUIT/BYE/LOGOUT and HISTORY installed.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register(&mut registry);
        registry
    }

    /// Install a command; the name and every alias point at one shared
    /// record. Registering an existing key replaces it.
    pub fn register(&mut self, command: Command<A>) {
        let entry = Arc::new(CommandEntry {
            handler: command.handler,
            params: command.params,
            short: command.short,
            long: command.long,
            hidden: command.hidden,
        });
        self.commands.insert(command.name, Arc::clone(&entry));
        for alias in command.aliases {
            self.commands.insert(alias, Arc::clone(&entry));
        }
    }

    /// Look up a command by upper-cased name or alias.
    pub fn get(&self, name: &str) -> Option<Arc<CommandEntry<A>>> {
        self.commands.get(name).cloned()
    }

    /// Every registry key (aliases included) with its record, in ascending
    /// order.
    pub fn iter_sorted(&self) -> Vec<(String, Arc<CommandEntry<A>>)> {
        let mut entries: Vec<_> = self
            .commands
            .iter()
            .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the registry has no keys at all.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<A: ShellApp> Default for CommandRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}
