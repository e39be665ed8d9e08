//! Built-in shell commands: HELP/?, EXIT/QUIT/BYE/LOGOUT, HISTORY.
//!
//! Always registered; an application that registers the same upper-cased
//! name later shadows the built-in.

use super::app::ShellApp;
use super::registry::{Command, CommandFuture, CommandRegistry};
use super::session::Session;

pub(crate) fn register<A: ShellApp>(registry: &mut CommandRegistry<A>) {
    registry.register(
        Command::new("HELP", help)
            .params("[<command>]")
            .help("Display help")
            .long_help(
                "Display either brief help on all commands, or detailed\n\
                 help on a single command passed as a parameter.",
            )
            .alias("?"),
    );
    registry.register(
        Command::new("EXIT", exit)
            .help("Exit the command shell")
            .alias("QUIT")
            .alias("BYE")
            .alias("LOGOUT"),
    );
    registry.register(Command::new("HISTORY", history).help("Display the command history"));
}

/// With no argument: overview of every non-hidden key, ascending. With an
/// argument: the long help for that command, or `Command 'X' not known`
/// followed by the overview.
fn help<'a, A: ShellApp>(session: &'a mut Session<A>, params: Vec<String>) -> CommandFuture<'a> {
    Box::pin(async move {
        let registry = session.registry();
        if let Some(name) = params.first() {
            let name = name.to_uppercase();
            if let Some(entry) = registry.get(&name) {
                let long = if entry.long.trim().is_empty() {
                    entry.short.clone()
                } else {
                    entry.long.clone()
                };
                session.writeline(&format!("{} {}\n\n{}", name, entry.params, long))?;
                return Ok(());
            }
            session.writeline(&format!("Command '{name}' not known"))?;
        } else {
            session.writeline("Help on built in commands\n")?;
        }
        for (name, entry) in registry.iter_sorted() {
            if entry.hidden {
                continue;
            }
            if entry.params.is_empty() {
                session.writeline(&format!("{} - {}", name, entry.short))?;
            } else {
                session.writeline(&format!("{} {} - {}", name, entry.params, entry.short))?;
            }
        }
        Ok(())
    })
}

fn exit<'a, A: ShellApp>(session: &'a mut Session<A>, _params: Vec<String>) -> CommandFuture<'a> {
    Box::pin(async move {
        session.stop();
        session.writeline("Goodbye")
    })
}

fn history<'a, A: ShellApp>(session: &'a mut Session<A>, _params: Vec<String>) -> CommandFuture<'a> {
    Box::pin(async move {
        session.writeline("Command history\n")?;
        for (index, line) in session.history().iter().enumerate() {
            session.writeline(&format!("{:<5} : {}", index + 1, line))?;
        }
        Ok(())
    })
}
