//! Telnet option negotiation engine.
//!
//! Tracks what has been sent for each option in DO- and WILL-direction state
//! maps so that identical desires are never re-emitted (the anti-loop rule),
//! answers inbound WILL/WONT/DO/DONT from fixed reply tables, and handles
//! the TTYPE subnegotiation that drives terminal capability setup.

use std::collections::HashMap;

use tracing::debug;

use super::writer::WriterHandle;
use super::{iac, option, ttype, NegotiationState};
use crate::term::TermInfo;
use crate::Result;
use std::sync::Arc;

/// What we are prepared to do ourselves when the peer sends DO/DONT.
fn do_reply(opt: u8) -> u8 {
    match opt {
        option::ECHO => iac::WILL,
        option::SGA => iac::WILL,
        option::NEW_ENVIRON => iac::WONT,
        _ => iac::WONT,
    }
}

/// What we want the peer to do, as the reply to its WILL/WONT.
fn will_reply(opt: u8) -> u8 {
    match opt {
        option::ECHO => iac::DONT,
        option::SGA => iac::DO,
        option::NAWS => iac::DONT,
        option::TTYPE => iac::DO,
        option::LINEMODE => iac::DONT,
        option::NEW_ENVIRON => iac::DO,
        _ => iac::DONT,
    }
}

/// Per-connection option negotiation engine.
///
/// Owned by the input cooker; every inbound IAC sequence is handed here
/// synchronously. Replies go out through the session's serialized writer.
pub struct OptionEngine {
    writer: WriterHandle,
    state: Arc<NegotiationState>,
    /// Last DO (true) / DONT (false) sent per option.
    do_sent: HashMap<u8, bool>,
    /// Last WILL (true) / WONT (false) sent per option.
    will_sent: HashMap<u8, bool>,
}

impl OptionEngine {
    pub fn new(writer: WriterHandle, state: Arc<NegotiationState>) -> Self {
        Self {
            writer,
            state,
            do_sent: HashMap::new(),
            will_sent: HashMap::new(),
        }
    }

    /// Proactively announce our option policy on a fresh connection:
    /// first what we will do, then what we want the peer to do.
    pub fn announce(&mut self) -> Result<()> {
        for (cmd, opt) in [
            (iac::WILL, option::ECHO),
            (iac::WILL, option::SGA),
            (iac::WONT, option::NEW_ENVIRON),
            (iac::DONT, option::ECHO),
            (iac::DO, option::SGA),
            (iac::DONT, option::NAWS),
            (iac::DO, option::TTYPE),
            (iac::DONT, option::LINEMODE),
            (iac::DO, option::NEW_ENVIRON),
        ] {
            self.send_negotiation(cmd, opt)?;
        }
        Ok(())
    }

    /// Handle an inbound `IAC <cmd> <opt>` negotiation.
    pub fn negotiate(&mut self, cmd: u8, opt: u8) -> Result<()> {
        match cmd {
            iac::WILL | iac::WONT => {
                self.send_negotiation(will_reply(opt), opt)?;
                if cmd == iac::WILL && opt == option::TTYPE {
                    // Solicit the terminal name.
                    self.writer.write_raw(&[
                        iac::IAC,
                        iac::SB,
                        option::TTYPE,
                        ttype::SEND,
                        iac::IAC,
                        iac::SE,
                    ])?;
                }
            }
            iac::DO | iac::DONT => {
                self.send_negotiation(do_reply(opt), opt)?;
                if opt == option::ECHO {
                    self.state.set_echo(cmd == iac::DO);
                }
            }
            _ => debug!("unhandled negotiation: {cmd} {opt}"),
        }
        Ok(())
    }

    /// Handle a standalone inbound `IAC <cmd>` (no option byte).
    pub fn command(&mut self, cmd: u8) -> Result<()> {
        match cmd {
            iac::NOP => self.writer.write_raw(&[iac::IAC, iac::NOP]),
            _ => {
                debug!("unhandled command: {cmd}");
                Ok(())
            }
        }
    }

    /// Handle a completed subnegotiation payload (the bytes between
    /// `IAC SB` and `IAC SE`).
    pub fn subnegotiation(&mut self, data: &[u8]) -> Result<()> {
        if data.len() >= 2 && data[0] == option::TTYPE && data[1] == ttype::IS {
            let name: String = data[2..].iter().map(|&b| b as char).collect();
            match TermInfo::lookup(&name) {
                Some(term) => {
                    debug!("setting terminal type to {name}");
                    self.state.set_term(term);
                }
                None => debug!("terminal type not known: {name}"),
            }
        }
        Ok(())
    }

    /// Send a negotiation unless the recorded last-sent desire for this
    /// option already matches; record the desire on an actual send.
    fn send_negotiation(&mut self, cmd: u8, opt: u8) -> Result<()> {
        let (sent, desire) = match cmd {
            iac::DO => (&mut self.do_sent, true),
            iac::DONT => (&mut self.do_sent, false),
            iac::WILL => (&mut self.will_sent, true),
            iac::WONT => (&mut self.will_sent, false),
            _ => return self.writer.write_raw(&[iac::IAC, cmd]),
        };
        if sent.get(&opt) == Some(&desire) {
            return Ok(());
        }
        sent.insert(opt, desire);
        self.writer.write_raw(&[iac::IAC, cmd, opt])
    }
}
