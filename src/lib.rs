//! telshell — an embeddable Telnet command shell server framework.
//!
//! Accepts TCP connections, speaks TELNET option negotiation (RFC 854 and
//! the option RFCs), presents each client with an interactive line-oriented
//! command shell — history, cursor motion, masked entry — and dispatches
//! input to application-supplied command handlers.
//!
//! Applications implement [`ShellApp`], register commands on the
//! [`CommandRegistry`], and hand both to a [`ShellServer`]:
//!
//! ```no_run
//! use telshell::{Command, CommandFuture, CommandRegistry, Config, Session, ShellApp, ShellServer};
//!
//! struct App;
//!
//! fn echo(session: &mut Session<App>, params: Vec<String>) -> CommandFuture<'_> {
//!     Box::pin(async move { session.writeresponse(&params.join(" ")) })
//! }
//!
//! impl ShellApp for App {
//!     fn commands(registry: &mut CommandRegistry<Self>) {
//!         registry.register(
//!             Command::new("ECHO", echo)
//!                 .params("<text to echo>")
//!                 .help("Echo text back to the console."),
//!         );
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> telshell::Result<()> {
//!     ShellServer::new(Config::default(), App).run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod shell;
pub mod telnet;
pub mod term;

pub use config::{AuthConfig, Config, LoggingConfig, ServerConfig, ShellConfig};
pub use error::{Result, TelshellError};
pub use server::{ConnectionPermit, Listener, ShellServer};
pub use shell::{
    Command, CommandEntry, CommandFn, CommandFuture, CommandRegistry, ErrorAction, MessageWriter,
    Session, ShellApp, TimerHandle,
};
pub use telnet::cooker::{InputCooker, Token};
pub use telnet::options::OptionEngine;
pub use telnet::writer::WriterHandle;
pub use telnet::NegotiationState;
pub use term::{KeyCode, OutputCodes, TermInfo};
