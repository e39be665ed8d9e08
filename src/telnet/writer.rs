//! Serialized output path.
//!
//! Everything a session emits — editor echo, handler text, prompts, timer
//! messages and option-engine replies — funnels through one mpsc queue
//! drained by a single task owning the socket's write half. That gives the
//! total byte order the protocol requires without locking at the call sites.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{control, iac};
use crate::{Result, TelshellError};

/// One queued write operation.
#[derive(Debug)]
pub enum WriteOp {
    /// Bytes to put on the wire as-is.
    Data(Vec<u8>),
    /// Shut the write half down and stop the writer task.
    Shutdown,
}

/// Cheap, cloneable producer side of the output path.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriterHandle {
    /// Queue application text, cooking it for the wire: every literal 0xFF
    /// is doubled and every LF becomes CR LF.
    pub fn write(&self, text: &[u8]) -> Result<()> {
        self.send(WriteOp::Data(cook_output(text)))
    }

    /// Queue protocol bytes verbatim, bypassing output cooking.
    pub fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        self.send(WriteOp::Data(bytes.to_vec()))
    }

    /// Ask the writer task to shut the socket down and stop.
    pub fn shutdown(&self) {
        let _ = self.tx.send(WriteOp::Shutdown);
    }

    fn send(&self, op: WriteOp) -> Result<()> {
        self.tx.send(op).map_err(|_| TelshellError::Closed)
    }
}

/// Create the producer handle and the queue consumed by [`spawn`].
pub fn channel() -> (WriterHandle, mpsc::UnboundedReceiver<WriteOp>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (WriterHandle { tx }, rx)
}

/// Spawn the writer task draining `rx` into `sink`.
///
/// The task ends on [`WriteOp::Shutdown`], on a write error, or when every
/// [`WriterHandle`] is gone.
pub fn spawn<W>(mut sink: W, mut rx: mpsc::UnboundedReceiver<WriteOp>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(op) = rx.recv().await {
            match op {
                WriteOp::Data(buf) => {
                    if let Err(e) = sink.write_all(&buf).await {
                        debug!("socket write failed: {e}");
                        break;
                    }
                }
                WriteOp::Shutdown => {
                    let _ = sink.shutdown().await;
                    break;
                }
            }
        }
    })
}

/// Cook application text for the wire: double IAC, rewrite LF to CR LF.
pub fn cook_output(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 2);
    for &b in text {
        match b {
            iac::IAC => {
                out.push(iac::IAC);
                out.push(iac::IAC);
            }
            control::LF => {
                out.push(control::CR);
                out.push(control::LF);
            }
            _ => out.push(b),
        }
    }
    out
}
