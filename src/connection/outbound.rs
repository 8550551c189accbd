use crate::chunk::ChunkWriter;
use crate::protocol::constants::*;
use crate::protocol::Messager;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Inner {
    writer: BufWriter<BoxedWriter>,
    chunks: ChunkWriter,
    /// First write error seen; set once, everything after is dropped.
    failed: bool,
}

/// The outbound half of a connection. Every write passes through one
/// critical section guarding the chunk-writer state and the buffered
/// socket, so the chunk interleaving on the wire is always valid.
pub struct Outbound {
    inner: Mutex<Inner>,
    default_msid: u32,

    /// Window size we announced to the peer (WindowAckSize / SetPeerBandwidth).
    window_size: AtomicU32,

    /// Wire-byte counters shared with the reader for the acknowledgement law.
    r_bytes: Arc<AtomicU64>,
    last_ack: Arc<AtomicU64>,
}

impl Outbound {
    pub(crate) fn new(
        writer: BufWriter<BoxedWriter>,
        default_msid: u32,
        r_bytes: Arc<AtomicU64>,
        last_ack: Arc<AtomicU64>,
    ) -> Self {
        Outbound {
            inner: Mutex::new(Inner {
                writer,
                chunks: ChunkWriter::new(),
                failed: false,
            }),
            default_msid,
            window_size: AtomicU32::new(0),
            r_bytes,
            last_ack,
        }
    }

    /// Serialise one message onto the wire. Control messages take effect on
    /// the outbound state at write time, under the same lock as the write.
    pub async fn write_message<M>(&self, message: &M) -> Result<()>
    where
        M: Messager + ?Sized,
    {
        let payload = message.marshal()?;
        let type_id = message.type_id();
        let timestamp = message.timestamp();
        let (csid, msid) = channel_for(type_id, self.default_msid);

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if inner.failed {
            return Ok(());
        }

        let written = async {
            inner
                .chunks
                .write_message(&mut inner.writer, csid, msid, type_id, timestamp, &payload)
                .await?;
            inner.writer.flush().await?;
            Ok::<(), Error>(())
        }
        .await;

        if let Err(e) = written {
            warn!(error = %e, "outbound write failed; dropping further messages");
            inner.failed = true;
            return Err(e);
        }

        self.apply_control(inner, type_id, &payload);
        Ok(())
    }

    fn apply_control(&self, inner: &mut Inner, type_id: u8, payload: &[u8]) {
        match type_id {
            MSG_TYPE_SET_CHUNK_SIZE => {
                if payload.len() == 4 {
                    let size = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    inner.chunks.set_chunk_size(size);
                }
            }
            MSG_TYPE_ABORT => {
                if payload.len() == 4 {
                    let csid = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    inner.chunks.discard(csid);
                }
            }
            MSG_TYPE_ACK => {
                // snapshot taken at send time
                self.last_ack
                    .store(self.r_bytes.load(Ordering::Relaxed), Ordering::Relaxed);
            }
            MSG_TYPE_WINDOW_ACK | MSG_TYPE_SET_PEER_BW => {
                if payload.len() >= 4 {
                    let size = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    self.window_size.store(size, Ordering::Relaxed);
                }
            }
            _ => {}
        }
    }

    /// Window size this side has announced
    pub fn window_size(&self) -> u32 {
        self.window_size.load(Ordering::Relaxed)
    }
}

/// Capability handed to command handlers: send one typed RTMP message on
/// this connection. Cloneable; clones share the connection's serialiser and
/// its cancellation signal (used by delivery tasks a handler may spawn).
#[derive(Clone)]
pub struct MessageWriter {
    outbound: Arc<Outbound>,
    cancel: CancellationToken,
}

impl MessageWriter {
    pub(crate) fn new(outbound: Arc<Outbound>, cancel: CancellationToken) -> Self {
        MessageWriter { outbound, cancel }
    }

    pub async fn write_message<M>(&self, message: &M) -> Result<()>
    where
        M: Messager + ?Sized,
    {
        self.outbound.write_message(message).await
    }

    /// Cancelled when the connection goes away.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
