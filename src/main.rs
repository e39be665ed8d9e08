//! Demonstration shell daemon.
//!
//! Runs the framework with a handful of example commands: ECHO/REPEAT,
//! TIMER/TIMEIT, DEBUG, and the hidden TERM.

use std::time::Duration;

use tracing::{error, info};

use telshell::{
    Command, CommandFuture, CommandRegistry, Config, Session, ShellApp, ShellServer,
    TelshellError,
};

struct DemoShell;

impl ShellApp for DemoShell {
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
                     If <message> is more than one word, quotes are required.\n\
                     \n\
                     example: TIMER 5 \"hello world!\"",
                )
                .alias("TIMEIT"),
        );
        registry.register(
            Command::new("DEBUG", cmd_debug).help("Display some debugging data"),
        );
        registry.register(
            Command::new("TERM", cmd_term)
                .help("Print the current terminal type")
                .hidden(),
        );
    }

    fn format_error(&self, text: &str) -> String {
        // Render errors in ANSI red.
        format!("\x1b[91m{text}\x1b[0m")
    }
}

fn cmd_echo(session: &mut Session<DemoShell>, params: Vec<String>) -> CommandFuture<'_> {
    Box::pin(async move { session.writeresponse(&params.join(" ")) })
}

fn cmd_timer(session: &mut Session<DemoShell>, params: Vec<String>) -> CommandFuture<'_> {
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

/// Show the key escape sequences bound for the negotiated terminal.
fn cmd_debug(session: &mut Session<DemoShell>, _params: Vec<String>) -> CommandFuture<'_> {
    Box::pin(async move {
        for (sequence, key) in session.escape_sequences() {
            let mut line = format!("{:<10} : ", key.name());
            for byte in sequence {
                if !(0x20..0x7f).contains(&byte) {
                    line.push('^');
                    line.push((byte ^ 0x40) as char);
                } else {
                    line.push(byte as char);
                }
            }
            session.writeresponse(&line)?;
        }
        Ok(())
    })
}

fn cmd_term(session: &mut Session<DemoShell>, _params: Vec<String>) -> CommandFuture<'_> {
    Box::pin(async move {
        let term = session.term();
        session.writeresponse(&term)
    })
}

fn main() {
    let config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = telshell::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        telshell::logging::init_stderr(&config.logging.level);
    }

    info!("telshell demonstration server");
    info!(
        "Server starting on {}:{}",
        config.server.host, config.server.port
    );
    info!("Press Ctrl+C to stop");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    if let Err(e) = rt.block_on(async { ShellServer::new(config, DemoShell).run().await }) {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
