//! Line editor.
//!
//! `readline` pulls cooked tokens and maintains the edit buffer with its
//! insertion point: cursor motion, backspace/delete, history navigation,
//! abort codes and masked entry. Echo goes out per character through the
//! session writer, using the output-control strings of the negotiated
//! terminal.

use super::app::ShellApp;
use super::session::{lock_prompt, Session};
use crate::telnet::control;
use crate::telnet::cooker::Token;
use crate::term::KeyCode;
use crate::Result;

/// Bytes to Latin-1 text; every octet is one character.
pub(crate) fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Latin-1 text back to bytes.
pub(crate) fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u8).collect()
}

impl<A: ShellApp> Session<A> {
    /// Read one line with the session's default echo policy, retaining it
    /// in history when echoed.
    pub async fn readline(&mut self, prompt: &[u8]) -> Result<String> {
        self.readline_with(prompt, None, true).await
    }

    /// Read one line.
    ///
    /// `echo`: `Some(true)` always echoes, `Some(false)` never echoes (the
    /// buffer still fills invisibly, for password entry), `None` follows the
    /// negotiated session setting. `use_history`: whether the committed line
    /// is appended to the session history.
    ///
    /// End-of-stream reads as an empty line; the session is marked closed so
    /// the shell loop can tell the difference.
    pub async fn readline_with(
        &mut self,
        prompt: &[u8],
        echo: Option<bool>,
        use_history: bool,
    ) -> Result<String> {
        let mut line: Vec<u8> = Vec::new();
        let mut ins: usize = 0;
        let mut hist = self.history.len();

        {
            let mut ps = lock_prompt(&self.prompt_state);
            ps.prompt = if self.echo_enabled() {
                prompt.to_vec()
            } else {
                Vec::new()
            };
            ps.line.clear();
        }
        if self.echo_enabled() {
            self.write(prompt)?;
        }

        loop {
            let Some(token) = self.tokens.recv().await else {
                self.closed = true;
                return Ok(String::new());
            };
            let codes = self.state.output_codes();
            match token {
                Token::Byte(control::NUL) => {}
                Token::Key(KeyCode::Left) => {
                    if ins > 0 {
                        ins -= 1;
                        self.echo_if(&codes.csr_left, echo)?;
                    } else {
                        self.bell(echo)?;
                    }
                }
                Token::Key(KeyCode::Right) => {
                    if ins < line.len() {
                        ins += 1;
                        self.echo_if(&codes.csr_right, echo)?;
                    } else {
                        self.bell(echo)?;
                    }
                }
                Token::Key(key @ (KeyCode::Up | KeyCode::Down)) => {
                    if key == KeyCode::Up {
                        if hist == 0 {
                            self.bell(echo)?;
                            continue;
                        }
                        hist -= 1;
                    } else {
                        if hist >= self.history.len() {
                            self.bell(echo)?;
                            continue;
                        }
                        hist += 1;
                    }
                    let previous_ins = ins;
                    line = if hist < self.history.len() {
                        latin1_bytes(&self.history[hist])
                    } else {
                        Vec::new()
                    };
                    for _ in 0..previous_ins {
                        self.echo_if(&codes.csr_left, echo)?;
                    }
                    self.echo_if(&codes.deol, echo)?;
                    self.echo_if(&line, echo)?;
                    ins = line.len();
                    self.update_snapshot(&line, echo);
                }
                Token::Byte(control::ETX) => {
                    self.echo_if(b"\n^C ABORT\n", echo)?;
                    return Ok(String::new());
                }
                Token::Byte(control::EOT) => {
                    if !line.is_empty() {
                        self.echo_if(b"\n^D ABORT (QUIT)\n", echo)?;
                        return Ok(String::new());
                    }
                    self.echo_if(b"\n^D QUIT\n", echo)?;
                    return Ok("QUIT".to_string());
                }
                Token::Byte(control::LF) => {
                    self.echo_if(b"\n", echo)?;
                    let text = latin1_string(&line);
                    if use_history && self.resolve_echo(echo) {
                        self.history.push(text.clone());
                    }
                    return Ok(text);
                }
                Token::Byte(control::BS) | Token::Byte(control::DEL) | Token::Key(KeyCode::Backspace) => {
                    if ins > 0 {
                        let mut seq = codes.csr_left.clone();
                        seq.extend_from_slice(&codes.del);
                        self.echo_if(&seq, echo)?;
                        ins -= 1;
                        line.remove(ins);
                        self.update_snapshot(&line, echo);
                    } else {
                        self.bell(echo)?;
                    }
                }
                Token::Key(KeyCode::Delete) => {
                    if ins < line.len() {
                        self.echo_if(&codes.del, echo)?;
                        line.remove(ins);
                        self.update_snapshot(&line, echo);
                    } else {
                        self.bell(echo)?;
                    }
                }
                Token::Byte(byte) => {
                    // Control characters are spliced in caret notation, so
                    // the buffer matches what was echoed.
                    let rendered: Vec<u8> = if byte < 0x20 {
                        vec![b'^', byte + 0x40]
                    } else {
                        vec![byte]
                    };
                    self.echo_if(&rendered, echo)?;
                    line.splice(ins..ins, rendered.iter().copied());
                    ins += rendered.len();
                    self.update_snapshot(&line, echo);
                }
            }
        }
    }

    fn resolve_echo(&self, echo: Option<bool>) -> bool {
        echo.unwrap_or_else(|| self.echo_enabled())
    }

    fn echo_if(&self, data: &[u8], echo: Option<bool>) -> Result<()> {
        if self.resolve_echo(echo) {
            self.write(data)?;
        }
        Ok(())
    }

    fn bell(&self, echo: Option<bool>) -> Result<()> {
        self.echo_if(&[control::BEL], echo)
    }

    fn update_snapshot(&self, line: &[u8], echo: Option<bool>) {
        if self.resolve_echo(echo) {
            lock_prompt(&self.prompt_state).line = line.to_vec();
        }
    }
}
