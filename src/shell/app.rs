//! The embedding contract.

use super::registry::{CommandFuture, CommandRegistry};
use super::session::Session;
use crate::TelshellError;

/// What the shell loop should do after a command handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Keep the session running.
    Continue,
    /// Break the shell loop and end the session.
    Stop,
}

/// Application side of a shell server.
///
/// One value of the implementing type is shared by every session, so this is
/// the natural home for state that outlives a connection (counters, lookup
/// tables, back ends). All methods have defaults; a unit struct is a valid,
/// if silent, application.
pub trait ShellApp: Send + Sync + Sized + 'static {
    /// Install application commands. Called once at server construction;
    /// built-ins are already present and may be shadowed by re-registering
    /// their names.
    fn commands(_registry: &mut CommandRegistry<Self>) {}

    /// Validate credentials collected by the auth gate. Returning `false`
    /// closes the session silently.
    fn authenticate(&self, _username: Option<&str>, _password: Option<&str>) -> bool {
        true
    }

    /// Runs after a successful login, before the first prompt.
    fn session_start<'a>(&'a self, _session: &'a mut Session<Self>) -> CommandFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    /// Runs when the session ends. The socket is already shut down, so
    /// writes from here will fail quietly.
    fn session_end<'a>(&'a self, _session: &'a mut Session<Self>) -> CommandFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    /// Decorate error text before it is written to the client. The default
    /// writes it as-is; a common override wraps it in ANSI red.
    fn format_error(&self, text: &str) -> String {
        text.to_string()
    }

    /// Decide whether a failed command ends the session. The error has
    /// already been written to the client.
    fn handle_error(&self, _command: &str, _error: &TelshellError) -> ErrorAction {
        ErrorAction::Continue
    }
}
