//! Per-connection shell session.
//!
//! Owns the command read loop: authentication gate, welcome banner, prompt,
//! tokenizing, dispatch and the built-in machinery around it. Input arrives
//! as cooked tokens from the input cooker; every byte of output leaves
//! through the session's serialized writer.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

use super::app::{ErrorAction, ShellApp};
use super::registry::CommandRegistry;
use crate::config::Config;
use crate::telnet::cooker::Token;
use crate::telnet::writer::WriterHandle;
use crate::telnet::NegotiationState;
use crate::term::KeyCode;
use crate::Result;

/// Prompt and visible edit buffer, as last drawn. Asynchronous writers use
/// this to repaint after an out-of-band message.
#[derive(Debug, Default)]
pub(super) struct PromptState {
    pub(super) prompt: Vec<u8>,
    pub(super) line: Vec<u8>,
}

pub(super) fn lock_prompt(state: &Mutex<PromptState>) -> MutexGuard<'_, PromptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancellable handle to a scheduled event owned by a session.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Cancel the event if it has not fired yet.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Whether the event has fired or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Cloneable, async-safe writer detached from the session borrow.
///
/// Scheduled events hold one of these. [`MessageWriter::writemessage`]
/// writes the message and then reconstructs the prompt and the visible edit
/// buffer, so the editor keeps working underneath.
#[derive(Debug, Clone)]
pub struct MessageWriter {
    writer: WriterHandle,
    prompt_state: Arc<Mutex<PromptState>>,
}

impl MessageWriter {
    /// Write cooked text.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.writer.write(data)
    }

    /// Write text followed by a line ending.
    pub fn writeline(&self, text: &str) -> Result<()> {
        let mut buf = text.as_bytes().to_vec();
        buf.push(b'\n');
        self.writer.write(&buf)
    }

    /// Write a message, then reconstruct the prompt and entered text.
    pub fn writemessage(&self, text: &str) -> Result<()> {
        let mut out = Vec::with_capacity(text.len() + 2);
        out.push(b'\n');
        out.extend_from_slice(text.as_bytes());
        out.push(b'\n');
        {
            let ps = lock_prompt(&self.prompt_state);
            out.extend_from_slice(&ps.prompt);
            out.extend_from_slice(&ps.line);
        }
        self.writer.write(&out)
    }
}

/// One interactive shell session, created per accepted connection.
pub struct Session<A> {
    id: Uuid,
    peer_addr: SocketAddr,
    app: Arc<A>,
    registry: Arc<CommandRegistry<A>>,
    config: Arc<Config>,
    writer: WriterHandle,
    pub(super) tokens: mpsc::UnboundedReceiver<Token>,
    pub(super) state: Arc<NegotiationState>,
    pub(super) prompt_state: Arc<Mutex<PromptState>>,
    pub(super) history: Vec<String>,
    username: Option<String>,
    running: bool,
    pub(super) closed: bool,
    timers: Vec<TimerHandle>,
}

impl<A: ShellApp> Session<A> {
    pub(crate) fn new(
        peer_addr: SocketAddr,
        app: Arc<A>,
        registry: Arc<CommandRegistry<A>>,
        config: Arc<Config>,
        writer: WriterHandle,
        tokens: mpsc::UnboundedReceiver<Token>,
        state: Arc<NegotiationState>,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!("created session {id} for {peer_addr}");
        Self {
            id,
            peer_addr,
            app,
            registry,
            config,
            writer,
            tokens,
            state,
            prompt_state: Arc::new(Mutex::new(PromptState::default())),
            history: Vec::new(),
            username: None,
            running: true,
            closed: false,
            timers: Vec::new(),
        }
    }

    /// Session identifier, used in log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// The shared application value.
    pub fn app(&self) -> &A {
        &self.app
    }

    /// The command registry this session dispatches against.
    pub fn registry(&self) -> Arc<CommandRegistry<A>> {
        Arc::clone(&self.registry)
    }

    /// Username collected by the auth gate, if any.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Name of the negotiated terminal type.
    pub fn term(&self) -> String {
        self.state.term_name()
    }

    /// Key escape sequences bound for the negotiated terminal.
    pub fn escape_sequences(&self) -> Vec<(Vec<u8>, KeyCode)> {
        self.state.escape_sequences()
    }

    /// Whether this side currently echoes input.
    pub fn echo_enabled(&self) -> bool {
        self.state.echo_enabled()
    }

    /// Command history of this session, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Mutable history access, e.g. to scrub a sensitive entry.
    pub fn history_mut(&mut self) -> &mut Vec<String> {
        &mut self.history
    }

    /// Clear the run flag; the shell loop ends after the current command.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Write cooked text to the client.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.writer.write(data)
    }

    /// Write text followed by a line ending.
    pub fn writeline(&self, text: &str) -> Result<()> {
        let mut buf = text.as_bytes().to_vec();
        buf.push(b'\n');
        self.writer.write(&buf)
    }

    /// Write a handler response followed by a line ending.
    pub fn writeresponse(&self, text: &str) -> Result<()> {
        self.writeline(text)
    }

    /// Write error text, decorated by the application's `format_error`.
    pub fn writeerror(&self, text: &str) -> Result<()> {
        let decorated = self.app.format_error(text);
        self.write(decorated.as_bytes())
    }

    /// Write a message, then reconstruct the prompt and entered text.
    pub fn writemessage(&self, text: &str) -> Result<()> {
        self.message_writer().writemessage(text)
    }

    /// A cloneable writer for use outside the session borrow (timers,
    /// background tasks).
    pub fn message_writer(&self) -> MessageWriter {
        MessageWriter {
            writer: self.writer.clone(),
            prompt_state: Arc::clone(&self.prompt_state),
        }
    }

    /// Run `task` after `delay`. The returned handle is also registered
    /// with the session and cancelled when the session ends.
    pub fn schedule_later<F>(&mut self, delay: Duration, task: F) -> &TimerHandle
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        let index = self.timers.len();
        self.timers.push(TimerHandle { task: handle });
        &self.timers[index]
    }

    /// Schedule `writemessage(text)` after `delay`.
    pub fn schedule_message(&mut self, delay: Duration, text: impl Into<String>) -> &TimerHandle {
        let text = text.into();
        let writer = self.message_writer();
        self.schedule_later(delay, async move {
            if let Err(e) = writer.writemessage(&text) {
                debug!("scheduled message dropped: {e}");
            }
        })
    }

    /// Scheduled events owned by this session.
    pub fn timers(&self) -> &[TimerHandle] {
        &self.timers
    }

    pub(crate) fn cancel_timers(&mut self) {
        for timer in &self.timers {
            timer.cancel();
        }
        self.timers.clear();
    }

    /// The shell: auth gate, banner, then the command read loop.
    pub(crate) async fn run(&mut self) -> Result<()> {
        debug!("session {} starting shell for {}", self.id, self.peer_addr);
        if self.config.auth.required {
            let mut username = None;
            let mut password = None;
            if self.config.auth.need_username {
                username = Some(self.readline_with(b"Username: ", None, false).await?);
            }
            if self.config.auth.need_password {
                password = Some(self.readline_with(b"Password: ", Some(false), false).await?);
                if self.echo_enabled() {
                    self.write(b"\n")?;
                }
            }
            if self.closed {
                return Ok(());
            }
            if !self.app.authenticate(username.as_deref(), password.as_deref()) {
                debug!("session {} failed authentication", self.id);
                return Ok(());
            }
            self.username = username;
        }

        if self.echo_enabled() {
            let welcome = self.config.shell.welcome.clone();
            self.writeline(&welcome)?;
        }
        let app = Arc::clone(&self.app);
        app.session_start(self).await?;

        let prompt = self.config.shell.prompt.clone().into_bytes();
        while self.running {
            let raw = self.readline_with(&prompt, None, true).await?;
            if self.closed {
                break;
            }
            let words = tokenize(raw.trim());
            let Some(name) = words.first() else {
                continue;
            };
            let name = name.to_uppercase();
            let params = words[1..].to_vec();
            match self.registry.get(&name) {
                Some(entry) => {
                    let handler = entry.handler;
                    drop(entry);
                    if let Err(e) = handler(self, params).await {
                        error!("error calling {name}: {e}");
                        self.writeerror(&format!("{e}\n"))?;
                        if self.app.handle_error(&name, &e) == ErrorAction::Stop {
                            break;
                        }
                    }
                }
                None => self.writeerror(&format!("Unknown command '{name}'\n"))?,
            }
        }
        Ok(())
    }

    /// End the session: cancel timers, shut the socket down, run the
    /// application's `session_end` hook.
    pub(crate) async fn finish(&mut self) {
        self.cancel_timers();
        self.writer.shutdown();
        let app = Arc::clone(&self.app);
        if let Err(e) = app.session_end(self).await {
            debug!("session_end hook failed: {e}");
        }
        debug!("session {} disconnected", self.id);
    }
}

/// Split on whitespace, then merge quoted runs: a word starting with `'` or
/// `"` consumes following words until the accumulated token ends with the
/// same quote, which is then stripped. An unterminated quote consumes to the
/// end of input and is kept as-is, best-effort.
pub(crate) fn tokenize(input: &str) -> Vec<String> {
    let words: Vec<&str> = input.split_whitespace().collect();
    let mut out = Vec::with_capacity(words.len());
    let mut index = 0;
    while index < words.len() {
        let word = words[index];
        match word.chars().next() {
            Some(quote @ ('\'' | '"')) => {
                let mut merged = word.to_string();
                while !(merged.len() >= 2 && merged.ends_with(quote)) && index + 1 < words.len() {
                    index += 1;
                    merged.push(' ');
                    merged.push_str(words[index]);
                }
                if merged.len() >= 2 && merged.ends_with(quote) {
                    merged = merged[1..merged.len() - 1].to_string();
                }
                out.push(merged);
            }
            _ => out.push(word.to_string()),
        }
        index += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::writer::{self, WriteOp};
    use crate::term::TermInfo;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct NullApp;
    impl ShellApp for NullApp {}

    struct DenyApp;
    impl ShellApp for DenyApp {
        fn authenticate(&self, _username: Option<&str>, _password: Option<&str>) -> bool {
            false
        }
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn drain(rx: &mut UnboundedReceiver<WriteOp>) -> String {
        let mut out = Vec::new();
        while let Ok(op) = rx.try_recv() {
            if let WriteOp::Data(buf) = op {
                out.extend(buf);
            }
        }
        out.iter().map(|&b| b as char).collect()
    }

    fn session<App: ShellApp>(
        app: App,
        config: Config,
    ) -> (
        Session<App>,
        mpsc::UnboundedSender<Token>,
        UnboundedReceiver<WriteOp>,
    ) {
        session_with_registry(app, config, CommandRegistry::with_builtins())
    }

    fn session_with_registry<App: ShellApp>(
        app: App,
        config: Config,
        registry: CommandRegistry<App>,
    ) -> (
        Session<App>,
        mpsc::UnboundedSender<Token>,
        UnboundedReceiver<WriteOp>,
    ) {
        let (writer, wq) = writer::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(NegotiationState::new(TermInfo::ansi()));
        let session = Session::new(
            addr(),
            Arc::new(app),
            Arc::new(registry),
            Arc::new(config),
            writer,
            rx,
            state,
        );
        (session, tx, wq)
    }

    fn feed(tx: &mpsc::UnboundedSender<Token>, bytes: &[u8]) {
        for &b in bytes {
            tx.send(Token::Byte(b)).unwrap();
        }
    }

    #[test]
    fn test_tokenize_plain() {
        assert_eq!(tokenize("echo hello world"), vec!["echo", "hello", "world"]);
        assert_eq!(tokenize("   spaced   out "), vec!["spaced", "out"]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_tokenize_quoted_run() {
        assert_eq!(
            tokenize("timer 5 \"hello world!\""),
            vec!["timer", "5", "hello world!"]
        );
        assert_eq!(tokenize("say 'a b c' d"), vec!["say", "a b c", "d"]);
    }

    #[test]
    fn test_tokenize_single_quoted_word() {
        assert_eq!(tokenize("echo \"hi\""), vec!["echo", "hi"]);
    }

    #[test]
    fn test_tokenize_unterminated_quote_consumes_rest() {
        assert_eq!(tokenize("echo \"a b c"), vec!["echo", "\"a b c"]);
    }

    #[test]
    fn test_tokenize_mixed_quotes() {
        assert_eq!(tokenize("a \"b 'c\" d"), vec!["a", "b 'c", "d"]);
    }

    #[tokio::test]
    async fn test_run_welcome_unknown_command_and_exit() {
        let (mut session, tx, mut wq) = session(NullApp, Config::default());
        feed(&tx, b"notacmd\nexit\n");
        session.run().await.unwrap();

        let out = drain(&mut wq);
        assert!(out.contains("You have connected to the telnet server.\r\n"));
        assert!(out.contains("Unknown command 'NOTACMD'\r\n"));
        assert!(out.contains("Goodbye\r\n"));
        assert!(!session.running);
    }

    #[tokio::test]
    async fn test_help_overview_is_sorted_and_complete() {
        let (mut session, tx, mut wq) = session(NullApp, Config::default());
        feed(&tx, b"?\nexit\n");
        session.run().await.unwrap();

        let out = drain(&mut wq);
        assert!(out.contains("Help on built in commands\r\n\r\n"));
        let positions: Vec<usize> = [
            "? [<command>] - Display help",
            "BYE - Exit the command shell",
            "EXIT - Exit the command shell",
            "HELP [<command>] - Display help",
            "HISTORY - Display the command history",
            "LOGOUT - Exit the command shell",
            "QUIT - Exit the command shell",
        ]
        .iter()
        .map(|needle| out.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_help_on_unknown_name() {
        let (mut session, tx, mut wq) = session(NullApp, Config::default());
        feed(&tx, b"help nosuch\nexit\n");
        session.run().await.unwrap();

        let out = drain(&mut wq);
        assert!(out.contains("Command 'NOSUCH' not known\r\n"));
        // The overview still follows, as in the original.
        assert!(out.contains("HISTORY - Display the command history"));
    }

    #[tokio::test]
    async fn test_history_builtin_lists_lines() {
        let (mut session, tx, mut wq) = session(NullApp, Config::default());
        feed(&tx, b"hello\nhistory\nexit\n");
        session.run().await.unwrap();

        let out = drain(&mut wq);
        assert!(out.contains("Command history\r\n\r\n"));
        assert!(out.contains("1     : hello\r\n"));
        assert!(out.contains("2     : history\r\n"));
    }

    #[tokio::test]
    async fn test_empty_lines_reprompt_and_land_in_history() {
        let (mut session, tx, mut wq) = session(NullApp, Config::default());
        feed(&tx, b"\nhistory\nexit\n");
        session.run().await.unwrap();

        let out = drain(&mut wq);
        assert!(out.contains("1     : \r\n"));
        assert_eq!(session.history()[0], "");
    }

    #[tokio::test]
    async fn test_auth_collects_username() {
        let mut config = Config::default();
        config.auth.required = true;
        config.auth.need_username = true;

        let (mut session, tx, mut wq) = session(NullApp, config);
        feed(&tx, b"alice\nexit\n");
        session.run().await.unwrap();

        assert_eq!(session.username(), Some("alice"));
        let out = drain(&mut wq);
        assert!(out.contains("Username: "));
        assert!(out.contains("You have connected to the telnet server.\r\n"));
        // Credential prompts stay out of the command history.
        assert!(session.history().is_empty() || session.history()[0] != "alice");
    }

    #[tokio::test]
    async fn test_auth_passes_password_read_without_echo() {
        struct CheckApp;
        impl ShellApp for CheckApp {
            fn authenticate(&self, username: Option<&str>, password: Option<&str>) -> bool {
                username == Some("alice") && password == Some("secret")
            }
        }

        let mut config = Config::default();
        config.auth.required = true;
        config.auth.need_username = true;
        config.auth.need_password = true;

        let (mut session, tx, mut wq) = session(CheckApp, config);
        feed(&tx, b"alice\nsecret\nexit\n");
        session.run().await.unwrap();

        let out = drain(&mut wq);
        // Credentials reached the validator, so the banner appeared.
        assert!(out.contains("Password: "));
        assert!(out.contains("You have connected to the telnet server.\r\n"));
        // The password itself was never echoed.
        assert!(!out.contains("secret"));
        assert!(session.history().is_empty() || !session.history().contains(&"secret".to_string()));
    }

    #[tokio::test]
    async fn test_failed_auth_closes_silently() {
        let mut config = Config::default();
        config.auth.required = true;
        config.auth.need_username = true;

        let (mut session, tx, mut wq) = session(DenyApp, config);
        feed(&tx, b"mallory\n");
        session.run().await.unwrap();

        let out = drain(&mut wq);
        assert!(!out.contains("You have connected"));
    }

    #[tokio::test]
    async fn test_handler_error_is_decorated_and_loop_continues() {
        use super::super::registry::{Command, CommandFuture};
        use crate::TelshellError;

        struct RedApp;
        fn boom(_session: &mut Session<RedApp>, _params: Vec<String>) -> CommandFuture<'_> {
            Box::pin(async { Err(TelshellError::Command("it broke".to_string())) })
        }
        impl ShellApp for RedApp {
            fn commands(registry: &mut CommandRegistry<Self>) {
                registry.register(Command::new("BOOM", boom).help("Always fails"));
            }
            fn format_error(&self, text: &str) -> String {
                format!("\x1b[91m{text}\x1b[0m")
            }
        }

        let mut registry = CommandRegistry::with_builtins();
        RedApp::commands(&mut registry);
        let (mut session, tx, mut wq) = session_with_registry(RedApp, Config::default(), registry);
        feed(&tx, b"boom\nexit\n");
        session.run().await.unwrap();

        let out = drain(&mut wq);
        assert!(out.contains("\x1b[91mit broke\r\n\x1b[0m"));
        // The default error policy keeps the session running.
        assert!(out.contains("Goodbye\r\n"));
    }

    #[tokio::test]
    async fn test_handle_error_stop_breaks_the_loop() {
        use super::super::registry::{Command, CommandFuture};
        use crate::TelshellError;

        struct StopApp;
        fn boom(_session: &mut Session<StopApp>, _params: Vec<String>) -> CommandFuture<'_> {
            Box::pin(async { Err(TelshellError::Command("fatal".to_string())) })
        }
        impl ShellApp for StopApp {
            fn commands(registry: &mut CommandRegistry<Self>) {
                registry.register(Command::new("BOOM", boom).help("Always fails"));
            }
            fn handle_error(&self, _command: &str, _error: &TelshellError) -> ErrorAction {
                ErrorAction::Stop
            }
        }

        let mut registry = CommandRegistry::with_builtins();
        StopApp::commands(&mut registry);
        let (mut session, tx, mut wq) = session_with_registry(StopApp, Config::default(), registry);
        feed(&tx, b"boom\nexit\n");
        session.run().await.unwrap();

        let out = drain(&mut wq);
        assert!(out.contains("fatal"));
        // The loop broke before the queued EXIT ran.
        assert!(!out.contains("Goodbye"));
    }

    #[tokio::test]
    async fn test_eof_ends_the_shell_loop() {
        let (mut session, tx, mut wq) = session(NullApp, Config::default());
        drop(tx);
        session.run().await.unwrap();
        assert!(session.closed);
        let out = drain(&mut wq);
        assert!(out.contains("You have connected"));
    }

    #[tokio::test]
    async fn test_ctrl_d_on_empty_line_quits_cleanly() {
        let (mut session, tx, mut wq) = session(NullApp, Config::default());
        tx.send(Token::Byte(0x04)).unwrap();
        session.run().await.unwrap();

        let out = drain(&mut wq);
        assert!(out.contains("^D QUIT"));
        assert!(out.contains("Goodbye\r\n"));
    }

    #[tokio::test]
    async fn test_writemessage_repaints_prompt_and_line() {
        let (session, _tx, mut wq) = session(NullApp, Config::default());
        {
            let mut ps = lock_prompt(&session.prompt_state);
            ps.prompt = b"demo> ".to_vec();
            ps.line = b"typed".to_vec();
        }
        session.writemessage("ping").unwrap();
        let out = drain(&mut wq);
        assert_eq!(out, "\r\nping\r\ndemo> typed");
    }

    #[tokio::test]
    async fn test_schedule_message_fires_and_is_cancellable() {
        let (mut session, _tx, mut wq) = session(NullApp, Config::default());
        session.schedule_message(Duration::from_millis(10), "tick");
        let cancelled = session.schedule_later(Duration::from_secs(30), async {});
        cancelled.cancel();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let out = drain(&mut wq);
        assert!(out.contains("\r\ntick\r\n"));
        assert_eq!(session.timers().len(), 2);
        session.cancel_timers();
        assert!(session.timers().is_empty());
    }
}
