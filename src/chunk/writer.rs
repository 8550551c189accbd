use crate::protocol::constants::INITIAL_CHUNK_SIZE;
use crate::{ByteBuffer, Result};
use std::collections::HashMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Outbound header state for one chunk stream.
#[derive(Debug, Clone, Default)]
struct WriteState {
    initialized: bool,
    type_id: u8,
    length: u32,
    timestamp: u32,
    stream_id: u32,
    delta: u32,
    /// Last emitted fmt-0/1/2 header carried an extended timestamp, so
    /// every following fmt-3 header on this stream repeats it.
    extended: bool,
    ext_value: u32,
}

/// Chunk-stream multiplexer for the outbound direction. Splits messages
/// into chunks, choosing the smallest sufficient header format.
pub struct ChunkWriter {
    streams: HashMap<u32, WriteState>,
    chunk_size: u32,
}

impl ChunkWriter {
    pub fn new() -> Self {
        ChunkWriter {
            streams: HashMap::new(),
            chunk_size: INITIAL_CHUNK_SIZE,
        }
    }

    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size;
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Outbound Abort side effect: forget the header state so the next
    /// message on this chunk stream resynchronises with a full fmt-0 header.
    pub fn discard(&mut self, csid: u32) {
        self.streams.remove(&csid);
    }

    /// Write one message as a chunk sequence. Zero-length payloads produce
    /// no chunks at all.
    pub async fn write_message<W>(
        &mut self,
        writer: &mut W,
        csid: u32,
        msid: u32,
        type_id: u8,
        timestamp: u32,
        payload: &[u8],
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if payload.is_empty() {
            return Ok(());
        }

        let state = self.streams.entry(csid).or_default();
        let length = payload.len() as u32;

        let fmt = if !state.initialized || msid != state.stream_id {
            state.initialized = true;
            state.stream_id = msid;
            state.type_id = type_id;
            state.length = length;
            state.timestamp = timestamp;
            state.delta = 0;
            0
        } else if length != state.length || type_id != state.type_id {
            state.delta = timestamp.wrapping_sub(state.timestamp);
            state.type_id = type_id;
            state.length = length;
            state.timestamp = timestamp;
            1
        } else if timestamp == state.timestamp.wrapping_add(state.delta) {
            // Carrying the previous delta (possibly zero) reproduces this
            // timestamp exactly, so no header is needed at all.
            state.timestamp = timestamp;
            3
        } else {
            state.delta = timestamp.wrapping_sub(state.timestamp);
            state.timestamp = timestamp;
            2
        };

        // One buffer per message keeps the socket writes large.
        let mut out = ByteBuffer::with_capacity(payload.len() + 18);
        encode_header(&mut out, state, fmt, csid)?;

        let chunk_size = self.chunk_size as usize;
        let mut offset = payload.len().min(chunk_size);
        out.write_bytes(&payload[..offset])?;

        while offset < payload.len() {
            encode_basic_header(&mut out, 3, csid)?;
            if state.extended {
                out.write_u32_be(state.ext_value)?;
            }
            let end = (offset + chunk_size).min(payload.len());
            out.write_bytes(&payload[offset..end])?;
            offset = end;
        }

        writer.write_all(&out.into_vec()).await?;
        Ok(())
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_basic_header(out: &mut ByteBuffer, fmt: u8, csid: u32) -> Result<()> {
    if csid < 64 {
        out.write_u8(fmt << 6 | csid as u8)?;
    } else if csid < 320 {
        out.write_u8(fmt << 6)?;
        out.write_u8((csid - 64) as u8)?;
    } else {
        out.write_u8(fmt << 6 | 1)?;
        let id = (csid - 64) as u16;
        out.write_bytes(&id.to_le_bytes())?;
    }
    Ok(())
}

fn encode_header(out: &mut ByteBuffer, state: &mut WriteState, fmt: u8, csid: u32) -> Result<()> {
    encode_basic_header(out, fmt, csid)?;
    match fmt {
        0 => {
            state.extended = state.timestamp >= 0xFFFFFF;
            state.ext_value = state.timestamp;
            out.write_u24_be(state.timestamp.min(0xFFFFFF))?;
            out.write_u24_be(state.length)?;
            out.write_u8(state.type_id)?;
            // message stream id is little-endian on the wire
            out.write_bytes(&state.stream_id.to_le_bytes())?;
            if state.extended {
                out.write_u32_be(state.timestamp)?;
            }
        }
        1 => {
            state.extended = state.delta >= 0xFFFFFF;
            state.ext_value = state.delta;
            out.write_u24_be(state.delta.min(0xFFFFFF))?;
            out.write_u24_be(state.length)?;
            out.write_u8(state.type_id)?;
            if state.extended {
                out.write_u32_be(state.delta)?;
            }
        }
        2 => {
            state.extended = state.delta >= 0xFFFFFF;
            state.ext_value = state.delta;
            out.write_u24_be(state.delta.min(0xFFFFFF))?;
            if state.extended {
                out.write_u32_be(state.delta)?;
            }
        }
        3 => {
            if state.extended {
                out.write_u32_be(state.ext_value)?;
            }
        }
        _ => unreachable!("fmt is two bits"),
    }
    Ok(())
}
