//! Telnet protocol engine.
//!
//! Byte constants per RFC 854 and the option RFCs, the per-connection
//! negotiated state, the option negotiation engine, the raw-to-cooked input
//! pipeline and the serialized output writer.

pub mod cooker;
pub mod options;
pub mod writer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::term::{KeyCode, OutputCodes, TermInfo};

/// Telnet command bytes (IAC = Interpret As Command).
pub mod iac {
    /// IAC - Interpret As Command (255)
    pub const IAC: u8 = 255;

    /// DONT - Sender wants receiver to disable option (254)
    pub const DONT: u8 = 254;

    /// DO - Sender wants receiver to enable option (253)
    pub const DO: u8 = 253;

    /// WONT - Sender refuses to enable option (252)
    pub const WONT: u8 = 252;

    /// WILL - Sender wants to enable option (251)
    pub const WILL: u8 = 251;

    /// SB - Subnegotiation Begin (250)
    pub const SB: u8 = 250;

    /// GA - Go Ahead (249)
    pub const GA: u8 = 249;

    /// EL - Erase Line (248)
    pub const EL: u8 = 248;

    /// EC - Erase Character (247)
    pub const EC: u8 = 247;

    /// AYT - Are You There (246)
    pub const AYT: u8 = 246;

    /// AO - Abort Output (245)
    pub const AO: u8 = 245;

    /// IP - Interrupt Process (244)
    pub const IP: u8 = 244;

    /// BRK - Break (243)
    pub const BRK: u8 = 243;

    /// DM - Data Mark (242)
    pub const DM: u8 = 242;

    /// NOP - No Operation (241)
    pub const NOP: u8 = 241;

    /// SE - Subnegotiation End (240)
    pub const SE: u8 = 240;
}

/// Telnet option codes negotiated by this engine.
pub mod option {
    /// ECHO - Echo option (1)
    pub const ECHO: u8 = 1;

    /// SGA - Suppress Go Ahead (3)
    pub const SGA: u8 = 3;

    /// TTYPE - Terminal Type (24)
    pub const TTYPE: u8 = 24;

    /// NAWS - Negotiate About Window Size (31)
    pub const NAWS: u8 = 31;

    /// LINEMODE - Linemode option (34)
    pub const LINEMODE: u8 = 34;

    /// NEW_ENVIRON - New environment variables (39)
    pub const NEW_ENVIRON: u8 = 39;
}

/// Codes used inside a TTYPE subnegotiation payload.
pub mod ttype {
    /// The payload carries a terminal name.
    pub const IS: u8 = 0;

    /// Request the peer to send its terminal name.
    pub const SEND: u8 = 1;
}

/// Control characters significant to the input pipeline and line editor.
pub mod control {
    /// NUL - Null character
    pub const NUL: u8 = 0x00;

    /// ETX - End of Text (Ctrl+C)
    pub const ETX: u8 = 0x03;

    /// EOT - End of Transmission (Ctrl+D)
    pub const EOT: u8 = 0x04;

    /// BEL - Bell
    pub const BEL: u8 = 0x07;

    /// BS - Backspace
    pub const BS: u8 = 0x08;

    /// LF - Line Feed
    pub const LF: u8 = 0x0A;

    /// CR - Carriage Return
    pub const CR: u8 = 0x0D;

    /// ESC - Escape
    pub const ESC: u8 = 0x1B;

    /// DEL - Delete (also used as backspace)
    pub const DEL: u8 = 0x7F;
}

/// Per-connection negotiated state shared between the input cooker (which
/// owns the option engine) and the line editor.
///
/// The echo flag tracks whether this side performs the echoing, per the
/// peer's `DO ECHO` / `DONT ECHO`. The terminal bindings are replaced when a
/// TTYPE subnegotiation reports a known terminal name.
#[derive(Debug)]
pub struct NegotiationState {
    echo_enabled: AtomicBool,
    term: Mutex<TermInfo>,
}

impl NegotiationState {
    /// Create negotiated state with echoing on and the given terminal.
    pub fn new(term: TermInfo) -> Self {
        Self {
            echo_enabled: AtomicBool::new(true),
            term: Mutex::new(term),
        }
    }

    /// Whether this side currently performs the echoing.
    pub fn echo_enabled(&self) -> bool {
        self.echo_enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_echo(&self, enabled: bool) {
        self.echo_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Name of the currently bound terminal type.
    pub fn term_name(&self) -> String {
        self.lock_term().name.clone()
    }

    /// Output-control byte strings for the currently bound terminal.
    pub fn output_codes(&self) -> OutputCodes {
        self.lock_term().codes.clone()
    }

    /// Key escape sequences for the currently bound terminal.
    pub fn escape_sequences(&self) -> Vec<(Vec<u8>, KeyCode)> {
        self.lock_term().escseq.clone()
    }

    /// Whether `byte` can start any bound key escape sequence.
    pub(crate) fn starts_escape_sequence(&self, byte: u8) -> bool {
        self.lock_term()
            .escseq
            .iter()
            .any(|(seq, _)| seq.first() == Some(&byte))
    }

    pub(crate) fn set_term(&self, term: TermInfo) {
        *self.lock_term() = term;
    }

    fn lock_term(&self) -> std::sync::MutexGuard<'_, TermInfo> {
        self.term
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
