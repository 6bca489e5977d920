//! Publisher module
//!
//! Hands completed top-of-book snapshots to readers. The whole snapshot is
//! swapped through a `watch` channel, so a reader always sees bid and ask from
//! the same completed event. Optionally forwards quote changes over a Unix
//! socket as length-prefixed MessagePack frames.

use bytes::{BufMut, Bytes, BytesMut};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::orderbook::TopOfBook;

/// Encode a snapshot as a big-endian u32 length prefix followed by MessagePack
pub fn encode_frame(top: &TopOfBook) -> Result<Bytes> {
    let data = rmp_serde::to_vec(top)?;

    let mut frame = BytesMut::with_capacity(4 + data.len());
    frame.put_u32(data.len() as u32);
    frame.put_slice(&data);
    Ok(frame.freeze())
}

async fn dial(socket_path: &str) -> Result<UnixStream> {
    if !Path::new(socket_path).exists() {
        return Err(EngineError::IpcError(format!("no socket at {socket_path}")));
    }
    UnixStream::connect(socket_path)
        .await
        .map_err(|e| EngineError::IpcError(format!("dial {socket_path}: {e}")))
}

/// Frame forwarder over a Unix socket
///
/// Forwarding is best effort. While no consumer is reachable frames are
/// dropped and counted; the socket is dialled again on the next frame.
struct FrameSink {
    socket_path: String,
    stream: Mutex<Option<UnixStream>>,
    dropped: AtomicU64,
}

impl FrameSink {
    fn new(socket_path: &str) -> Self {
        Self {
            socket_path: socket_path.to_string(),
            stream: Mutex::new(None),
            dropped: AtomicU64::new(0),
        }
    }

    async fn forward(&self, top: &TopOfBook) -> Result<()> {
        let frame = encode_frame(top)?;
        let mut slot = self.stream.lock().await;

        if slot.is_none() {
            match dial(&self.socket_path).await {
                Ok(stream) => {
                    info!(path = %self.socket_path, "IPC consumer attached");
                    *slot = Some(stream);
                }
                Err(e) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(error = %e, sequence = top.sequence, "No IPC consumer, frame dropped");
                    return Ok(());
                }
            }
        }

        if let Some(stream) = slot.as_mut() {
            if let Err(e) = stream.write_all(&frame).await {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, sequence = top.sequence, "IPC consumer went away");
                *slot = None;
            }
        }

        Ok(())
    }
}

/// Snapshot publisher
pub struct Publisher {
    tx: watch::Sender<TopOfBook>,
    ipc: Option<FrameSink>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    /// In-process publisher only
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TopOfBook::default());
        Self { tx, ipc: None }
    }

    /// Publisher that also forwards quote changes to `socket_path`
    pub async fn with_ipc(socket_path: &str) -> Self {
        let sink = FrameSink::new(socket_path);
        match dial(socket_path).await {
            Ok(stream) => {
                info!(path = %socket_path, "IPC consumer attached");
                *sink.stream.lock().await = Some(stream);
            }
            Err(e) => warn!(error = %e, "IPC consumer not up yet"),
        }

        let mut publisher = Self::new();
        publisher.ipc = Some(sink);
        publisher
    }

    /// Reader handle that always holds the latest complete snapshot
    pub fn subscribe(&self) -> watch::Receiver<TopOfBook> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> TopOfBook {
        *self.tx.borrow()
    }

    /// Frames not delivered to the IPC consumer
    pub fn dropped_frames(&self) -> u64 {
        self.ipc
            .as_ref()
            .map_or(0, |sink| sink.dropped.load(Ordering::Relaxed))
    }

    /// Replace the published snapshot
    ///
    /// IPC forwarding happens only when a quote changed.
    pub async fn publish(&self, top: TopOfBook) -> Result<()> {
        let previous = self.tx.send_replace(top);

        let quotes_changed = previous.bid != top.bid || previous.ask != top.ask;
        if let (Some(sink), true) = (&self.ipc, quotes_changed) {
            sink.forward(&top).await?;
        }

        Ok(())
    }
}
