//! Shell server: the accept loop and per-connection wiring.
//!
//! [`ShellServer`] binds the listener and, for every accepted connection,
//! assembles the session plumbing: split socket, serialized writer task,
//! option engine announcement, input cooker task, then the shell itself.

mod listener;

pub use listener::{ConnectionPermit, Listener};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::shell::{CommandRegistry, Session, ShellApp};
use crate::telnet::cooker::InputCooker;
use crate::telnet::options::OptionEngine;
use crate::telnet::{writer, NegotiationState};
use crate::term::TermInfo;
use crate::{Result, TelshellError};

/// How long to let the peer's negotiation replies settle before the shell
/// starts.
const NEGOTIATION_SETTLE: Duration = Duration::from_millis(500);

/// The framework entry point: configuration, application value and command
/// registry, shared across sessions.
pub struct ShellServer<A: ShellApp> {
    app: Arc<A>,
    registry: Arc<CommandRegistry<A>>,
    config: Arc<Config>,
}

impl<A: ShellApp> Clone for ShellServer<A> {
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
        }
    }
}

impl<A: ShellApp> ShellServer<A> {
    /// Build a server: the built-ins are registered first, then the
    /// application installs its commands over them.
    pub fn new(config: Config, app: A) -> Self {
        let mut registry = CommandRegistry::with_builtins();
        A::commands(&mut registry);
        Self {
            app: Arc::new(app),
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }

    /// The server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind per the configuration and serve until the listener fails.
    pub async fn run(&self) -> Result<()> {
        let listener = Listener::bind(&self.config.server).await?;
        self.run_on(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn run_on(&self, listener: Listener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, addr, permit)) => {
                    info!("new connection from {addr}");
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.serve_connection(stream, addr).await {
                            error!("session error for {addr}: {e}");
                        }
                        info!("connection closed: {addr}");
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!("accept error: {e}");
                    return Err(e);
                }
            }
        }
    }

    /// Run one full session on an accepted connection. Useful when the
    /// embedder owns the acceptor.
    pub async fn serve_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        let (read_half, write_half) = stream.into_split();
        let (writer_handle, write_queue) = writer::channel();
        let writer_task = writer::spawn(write_half, write_queue);

        let term = TermInfo::lookup(&self.config.shell.default_term).unwrap_or_else(|| {
            warn!(
                "unknown default terminal '{}', falling back to ansi",
                self.config.shell.default_term
            );
            TermInfo::ansi()
        });
        let state = Arc::new(NegotiationState::new(term));

        let mut engine = OptionEngine::new(writer_handle.clone(), Arc::clone(&state));
        engine.announce()?;

        let (token_tx, token_rx) = mpsc::unbounded_channel();
        let cooker = InputCooker::new(read_half, token_tx, engine, Arc::clone(&state));
        let cooker_task = tokio::spawn(cooker.run());

        tokio::time::sleep(NEGOTIATION_SETTLE).await;

        let mut session = Session::new(
            addr,
            Arc::clone(&self.app),
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
            writer_handle,
            token_rx,
            Arc::clone(&state),
        );
        let result = session.run().await;
        cooker_task.abort();
        session.finish().await;
        let _ = writer_task.await;

        match result {
            // A vanished peer is a normal way for a session to end.
            Err(TelshellError::Closed) => Ok(()),
            other => other,
        }
    }
}
