//! Terminal capability tables.
//!
//! A small embedded stand-in for terminfo: for each supported terminal type
//! we carry the output-control strings the line editor needs (`el`, `dch1`,
//! `ich1`, `cub1`, `cuf1`) and the inbound key escape sequences the input
//! cooker recognizes. Terminal names outside the table are rejected and the
//! caller keeps its previous bindings.

/// Semantic key codes produced by the input cooker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Cursor up
    Up,
    /// Cursor down
    Down,
    /// Cursor left
    Left,
    /// Cursor right
    Right,
    /// Delete right
    Delete,
    /// Delete left
    Backspace,
}

impl KeyCode {
    /// Human-readable key name, as shown by diagnostic commands.
    pub fn name(&self) -> &'static str {
        match self {
            KeyCode::Up => "Up",
            KeyCode::Down => "Down",
            KeyCode::Left => "Left",
            KeyCode::Right => "Right",
            KeyCode::Delete => "Delete",
            KeyCode::Backspace => "Backspace",
        }
    }
}

/// Output-control byte strings for a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCodes {
    /// Delete to end of line (`el`).
    pub deol: Vec<u8>,
    /// Delete one character and close up (`dch1`).
    pub del: Vec<u8>,
    /// Insert one space (`ich1`).
    pub ins: Vec<u8>,
    /// Move the cursor left one column (`cub1`).
    pub csr_left: Vec<u8>,
    /// Move the cursor right one column (`cuf1`).
    pub csr_right: Vec<u8>,
}

/// Capability bindings for one terminal type.
#[derive(Debug, Clone)]
pub struct TermInfo {
    /// Terminal name as reported by the client.
    pub name: String,
    /// Inbound key escape sequences, mapped to semantic key codes.
    pub escseq: Vec<(Vec<u8>, KeyCode)>,
    /// Outbound control strings.
    pub codes: OutputCodes,
}

const CSI_ARROWS: [(&[u8], KeyCode); 4] = [
    (b"\x1b[A", KeyCode::Up),
    (b"\x1b[B", KeyCode::Down),
    (b"\x1b[D", KeyCode::Left),
    (b"\x1b[C", KeyCode::Right),
];

const SS3_ARROWS: [(&[u8], KeyCode); 4] = [
    (b"\x1bOA", KeyCode::Up),
    (b"\x1bOB", KeyCode::Down),
    (b"\x1bOD", KeyCode::Left),
    (b"\x1bOC", KeyCode::Right),
];

fn escseq(groups: &[&[(&[u8], KeyCode)]]) -> Vec<(Vec<u8>, KeyCode)> {
    groups
        .iter()
        .flat_map(|g| g.iter())
        .map(|(seq, key)| (seq.to_vec(), *key))
        .collect()
}

impl TermInfo {
    /// Bindings for the default "ansi" terminal.
    pub fn ansi() -> Self {
        Self {
            name: "ansi".to_string(),
            escseq: escseq(&[&CSI_ARROWS, &[(b"\x08" as &[u8], KeyCode::Backspace)]]),
            codes: OutputCodes {
                deol: b"\x1b[K".to_vec(),
                del: b"\x1b[P".to_vec(),
                ins: b"\x1b[@".to_vec(),
                csr_left: b"\x1b[D".to_vec(),
                csr_right: b"\x1b[C".to_vec(),
            },
        }
    }

    fn vt100(name: &str) -> Self {
        Self {
            name: name.to_string(),
            // vt100 cursor keys report in both normal (CSI) and application
            // (SS3) mode depending on smkx; accept either.
            escseq: escseq(&[
                &SS3_ARROWS,
                &CSI_ARROWS,
                &[(b"\x08" as &[u8], KeyCode::Backspace)],
            ]),
            codes: OutputCodes {
                deol: b"\x1b[K".to_vec(),
                del: b"\x1b[P".to_vec(),
                ins: b"\x1b[@".to_vec(),
                csr_left: b"\x08".to_vec(),
                csr_right: b"\x1b[C".to_vec(),
            },
        }
    }

    fn xterm(name: &str) -> Self {
        Self {
            name: name.to_string(),
            escseq: escseq(&[
                &SS3_ARROWS,
                &CSI_ARROWS,
                &[
                    (b"\x1b[3~" as &[u8], KeyCode::Delete),
                    (b"\x7f", KeyCode::Backspace),
                    (b"\x08", KeyCode::Backspace),
                ],
            ]),
            codes: OutputCodes {
                deol: b"\x1b[K".to_vec(),
                del: b"\x1b[P".to_vec(),
                ins: b"\x1b[@".to_vec(),
                csr_left: b"\x08".to_vec(),
                csr_right: b"\x1b[C".to_vec(),
            },
        }
    }

    fn linux(name: &str) -> Self {
        Self {
            name: name.to_string(),
            escseq: escseq(&[
                &CSI_ARROWS,
                &[
                    (b"\x1b[3~" as &[u8], KeyCode::Delete),
                    (b"\x7f", KeyCode::Backspace),
                ],
            ]),
            codes: OutputCodes {
                deol: b"\x1b[K".to_vec(),
                del: b"\x1b[P".to_vec(),
                ins: b"\x1b[@".to_vec(),
                csr_left: b"\x08".to_vec(),
                csr_right: b"\x1b[C".to_vec(),
            },
        }
    }

    /// Look up the capability bindings for a terminal type name.
    ///
    /// Returns `None` when the name has no table entry; the caller keeps its
    /// previous bindings in that case.
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "ansi" => Some(Self::ansi()),
            "vt100" | "vt102" | "vt220" => Some(Self::vt100(name)),
            "xterm" | "xterm-color" | "xterm-256color" | "screen" | "screen-256color" => {
                Some(Self::xterm(name))
            }
            "linux" => Some(Self::linux(name)),
            _ => None,
        }
    }
}
