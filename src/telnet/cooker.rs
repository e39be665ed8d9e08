//! Input cooker: raw socket bytes to cooked tokens.
//!
//! Runs as its own task per session so option negotiation can happen at any
//! time, including mid-line, without blocking the shell. IAC sequences are
//! stripped and handed to the option engine, CR variants collapse to LF, and
//! terminal key escape sequences become semantic key codes. Everything else
//! passes through as literal bytes — or, inside a subnegotiation, into the
//! subnegotiation buffer instead of the cooked queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::options::OptionEngine;
use super::{control, iac, NegotiationState};
use crate::term::KeyCode;
use crate::{Result, TelshellError};

/// How many bytes one socket read may pull into the raw buffer.
const RAW_READ_CHUNK: usize = 20;

/// One cooked token: a literal byte or a semantic key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A literal input byte (Latin-1 octet).
    Byte(u8),
    /// A recognized terminal key.
    Key(KeyCode),
}

/// Transfers bytes from the socket's read half into the cooked token queue,
/// feeding the option engine along the way.
pub struct InputCooker<R> {
    reader: R,
    rawq: VecDeque<u8>,
    tokens: mpsc::UnboundedSender<Token>,
    engine: OptionEngine,
    state: Arc<NegotiationState>,
    in_subneg: bool,
    subneg: Vec<u8>,
}

impl<R: AsyncRead + Unpin> InputCooker<R> {
    pub fn new(
        reader: R,
        tokens: mpsc::UnboundedSender<Token>,
        engine: OptionEngine,
        state: Arc<NegotiationState>,
    ) -> Self {
        Self {
            reader,
            rawq: VecDeque::new(),
            tokens,
            engine,
            state,
            in_subneg: false,
            subneg: Vec::new(),
        }
    }

    /// Drive the cooker until the peer disconnects or the session goes away.
    ///
    /// Dropping the cooked queue's sender on return is what signals
    /// end-of-stream to the line editor.
    pub async fn run(mut self) {
        if let Err(e) = self.cook().await {
            match e {
                TelshellError::Closed => debug!("input cooker finished: connection closed"),
                e => debug!("input cooker finished: {e}"),
            }
        }
    }

    async fn cook(&mut self) -> Result<()> {
        loop {
            let b = self.getbyte().await?;
            if b == iac::IAC {
                self.cook_iac().await?;
            } else if b == control::CR && !self.in_subneg {
                // CR NUL and a bare CR collapse to LF; CR LF keeps the LF.
                match self.getbyte_now().await? {
                    Some(control::NUL) | Some(control::LF) | None => {}
                    Some(other) => self.ungetbyte(other),
                }
                self.store_byte(control::LF)?;
            } else if !self.in_subneg && self.state.starts_escape_sequence(b) {
                self.cook_keyseq(b).await?;
            } else {
                self.store_byte(b)?;
            }
        }
    }

    /// One IAC sequence, with the leading IAC already consumed.
    async fn cook_iac(&mut self) -> Result<()> {
        let cmd = self.getbyte().await?;
        match cmd {
            iac::DO | iac::DONT | iac::WILL | iac::WONT => {
                let opt = self.getbyte().await?;
                self.engine.negotiate(cmd, opt)?;
            }
            iac::IAC => self.store_byte(iac::IAC)?,
            iac::SB => {
                self.in_subneg = true;
                self.subneg.clear();
            }
            iac::SE => {
                self.in_subneg = false;
                let data = std::mem::take(&mut self.subneg);
                self.engine.subnegotiation(&data)?;
            }
            other => self.engine.command(other)?,
        }
        Ok(())
    }

    /// Accumulate bytes while the prefix still matches some key sequence;
    /// emit the key on an exact match, or push everything after the first
    /// byte back and emit that byte as a literal.
    async fn cook_keyseq(&mut self, first: u8) -> Result<()> {
        let sequences = self.state.escape_sequences();
        let mut codes = vec![first];
        loop {
            if let Some((_, key)) = sequences.iter().find(|(seq, _)| *seq == codes) {
                return self.store_key(*key);
            }
            if sequences.iter().any(|(seq, _)| seq.starts_with(&codes)) {
                codes.push(self.getbyte().await?);
            } else {
                for &b in codes[1..].iter().rev() {
                    self.ungetbyte(b);
                }
                return self.store_byte(codes[0]);
            }
        }
    }

    /// Pull one byte, refilling the raw buffer from the socket as needed.
    async fn getbyte(&mut self) -> Result<u8> {
        loop {
            if let Some(b) = self.rawq.pop_front() {
                return Ok(b);
            }
            let mut buf = [0u8; RAW_READ_CHUNK];
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                return Err(TelshellError::Closed);
            }
            self.rawq.extend(&buf[..n]);
        }
    }

    /// Pull one byte only if it is already available; never blocks. EOF
    /// reads as "nothing available" and surfaces on the next blocking read.
    async fn getbyte_now(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.rawq.pop_front() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; RAW_READ_CHUNK];
        match tokio::time::timeout(Duration::ZERO, self.reader.read(&mut buf)).await {
            Ok(Ok(0)) => Ok(None),
            Ok(Ok(n)) => {
                self.rawq.extend(&buf[..n]);
                Ok(self.rawq.pop_front())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }

    /// Push a byte back onto the head of the raw buffer.
    fn ungetbyte(&mut self, b: u8) {
        self.rawq.push_front(b);
    }

    fn store_byte(&mut self, b: u8) -> Result<()> {
        if self.in_subneg {
            self.subneg.push(b);
            Ok(())
        } else {
            self.tokens
                .send(Token::Byte(b))
                .map_err(|_| TelshellError::Closed)
        }
    }

    fn store_key(&mut self, key: KeyCode) -> Result<()> {
        self.tokens
            .send(Token::Key(key))
            .map_err(|_| TelshellError::Closed)
    }
}
