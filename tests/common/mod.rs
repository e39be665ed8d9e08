//! Test helpers for the end-to-end suite.
//!
//! Provides `TestClient`, a raw Telnet test client, and a `TestApp` shell
//! application with the command set the scenarios exercise.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout_at;

use telshell::{
    Command, CommandFuture, CommandRegistry, Config, Listener, Session, ShellApp, ShellServer,
    TelshellError,
};

/// Default timeout for test reads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state the test application keeps across sessions.
#[derive(Default)]
struct ConnectionCounter {
    total: usize,
    per_user: HashMap<String, usize>,
}

/// The application under test: auth by non-empty username, a login
/// counter, and the ECHO/TIMER/TERM command set.
#[derive(Default)]
pub struct TestApp {
    counter: Mutex<ConnectionCounter>,
}

impl TestApp {
    fn new_connection(&self, username: &str) -> (usize, usize) {
        let mut counter = self.counter.lock().unwrap();
        counter.total += 1;
        let per_user = counter.per_user.entry(username.to_string()).or_insert(0);
        *per_user += 1;
        let per_user_count = *per_user;
        (counter.total, per_user_count)
    }
}

impl ShellApp for TestApp {
    fn commands(registry: &mut CommandRegistry<Self>) {
        registry.register(
            Command::new("ECHO", cmd_echo)
                .params("<text to echo>")
                .help("Echo text back to the console.")
                .alias("REPEAT"),
        );
        registry.register(
            Command::new("TIMER", cmd_timer)
                .params("<time> <message>")
                .help("In <time> seconds, display <message>.")
                .long_help(
                    "Send a message after a delay.\n\
                     <time> is in seconds.\n\
                     If <message> is more than one word, quotes are required.",
                )
                .alias("TIMEIT"),
        );
        registry.register(
            Command::new("TERM", cmd_term)
                .help("Print the current terminal type")
                .hidden(),
        );
    }

    fn authenticate(&self, username: Option<&str>, _password: Option<&str>) -> bool {
        username.is_some_and(|u| !u.is_empty())
    }

    fn session_start<'a>(&'a self, session: &'a mut Session<Self>) -> CommandFuture<'a> {
        Box::pin(async move {
            session.writeline("This server is running.")?;
            let username = session.username().unwrap_or("").to_string();
            let (total, per_user) = self.new_connection(&username);
            session.writeline(&format!("Hello {username}!"))?;
            session.writeline(&format!(
                "You are connection #{total}, you have logged in {per_user} time(s)."
            ))?;
            Ok(())
        })
    }

    fn format_error(&self, text: &str) -> String {
        format!("\x1b[91m{text}\x1b[0m")
    }
}

fn cmd_echo(session: &mut Session<TestApp>, params: Vec<String>) -> CommandFuture<'_> {
    Box::pin(async move { session.writeresponse(&params.join(" ")) })
}

fn cmd_timer(session: &mut Session<TestApp>, params: Vec<String>) -> CommandFuture<'_> {
    Box::pin(async move {
        let delay = params.first().and_then(|p| p.parse::<u64>().ok());
        let message = params.get(1).cloned();
        let (Some(delay), Some(message)) = (delay, message) else {
            return Err(TelshellError::Command(
                "Need both a time and a message".to_string(),
            ));
        };
        session.writeresponse(&format!("Waiting {delay} seconds..."))?;
        session.schedule_message(Duration::from_secs(delay), message);
        Ok(())
    })
}

fn cmd_term(session: &mut Session<TestApp>, _params: Vec<String>) -> CommandFuture<'_> {
    Box::pin(async move {
        let term = session.term();
        session.writeresponse(&term)
    })
}

/// Start a test server on an ephemeral port; returns its address.
pub async fn start_test_server() -> SocketAddr {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.shell.prompt = "TestServer> ".to_string();
    config.shell.welcome = "You have connected to the test server.".to_string();
    config.auth.required = true;
    config.auth.need_username = true;

    let server = ShellServer::new(config, TestApp::default());
    let listener = Listener::bind(&server.config().server).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run_on(listener).await;
    });
    addr
}

/// Raw Telnet client for driving scenarios byte by byte.
pub struct TestClient {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            stream,
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Send raw bytes to the server.
    pub async fn send(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Read until the accumulated output contains `needle`, then return and
    /// clear everything read so far (as Latin-1 text).
    pub async fn read_until(&mut self, needle: &str) -> String {
        let bytes: Vec<u8> = needle.chars().map(|c| c as u8).collect();
        self.read_until_bytes(&bytes).await
    }

    /// Consume the client, returning the underlying stream.
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }

    /// Byte-level variant of [`TestClient::read_until`].
    pub async fn read_until_bytes(&mut self, needle: &[u8]) -> String {
        let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
        loop {
            if contains(&self.buffer, needle) {
                let text = latin1(&self.buffer);
                self.buffer.clear();
                return text;
            }
            let mut chunk = [0u8; 1024];
            let read = timeout_at(deadline, self.stream.read(&mut chunk)).await;
            let n = match read {
                Ok(result) => result.unwrap(),
                Err(_) => panic!(
                    "timeout waiting for {:?}; buffered output: {:?}",
                    latin1(needle),
                    latin1(&self.buffer)
                ),
            };
            if n == 0 {
                panic!(
                    "connection closed waiting for {:?}; buffered output: {:?}",
                    latin1(needle),
                    latin1(&self.buffer)
                );
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Connect and log in as `test_user`; returns the client at the first
/// command prompt.
pub async fn login(addr: SocketAddr) -> TestClient {
    let mut client = TestClient::connect(addr).await;
    client.read_until("Username: ").await;
    client.send(b"test_user\r\n").await;
    client.read_until("TestServer> ").await;
    client
}

pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
