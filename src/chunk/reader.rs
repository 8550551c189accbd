use crate::chunk::stream::ChunkStreamState;
use crate::protocol::constants::INITIAL_CHUNK_SIZE;
use crate::protocol::Message;
use crate::{Error, Result};
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Chunk-stream demultiplexer for one direction of a connection. Reads
/// chunks off the wire and reassembles them into complete messages.
pub struct ChunkReader {
    streams: HashMap<u32, ChunkStreamState>,
    chunk_size: u32,
}

impl ChunkReader {
    pub fn new() -> Self {
        ChunkReader {
            streams: HashMap::new(),
            chunk_size: INITIAL_CHUNK_SIZE,
        }
    }

    /// Apply a peer Set Chunk Size. Chunks already in flight were framed
    /// under the old size and have been consumed by the time this runs.
    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size;
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Apply a peer Abort: drop the partial message on that chunk stream.
    pub fn abort(&mut self, csid: u32) {
        if let Some(state) = self.streams.get_mut(&csid) {
            state.reset();
        }
    }

    /// Read chunks until one completes a message.
    pub async fn read_message<R>(&mut self, reader: &mut R) -> Result<Message>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let (fmt, csid) = read_basic_header(reader).await?;
            let state = self.streams.entry(csid).or_default();

            read_message_header(state, fmt, csid, reader).await?;
            if let Some(message) = read_payload(state, self.chunk_size, reader).await? {
                return Ok(message);
            }
        }
    }
}

impl Default for ChunkReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Basic header: fmt in the top two bits, then the 1/2/3-byte csid forms.
async fn read_basic_header<R>(reader: &mut R) -> Result<(u8, u32)>
where
    R: AsyncRead + Unpin,
{
    let first = reader.read_u8().await?;
    let fmt = first >> 6;
    let csid = match first & 0x3F {
        0 => reader.read_u8().await? as u32 + 64,
        1 => {
            let mut bs = [0u8; 2];
            reader.read_exact(&mut bs).await?;
            u16::from_le_bytes(bs) as u32 + 64
        }
        n => n as u32,
    };
    Ok((fmt, csid))
}

async fn read_message_header<R>(
    state: &mut ChunkStreamState,
    fmt: u8,
    csid: u32,
    reader: &mut R,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    // A fresh fmt-0/1/2 header while a message is mid-reassembly means the
    // peer abandoned it: the declared length can no longer be satisfied.
    if fmt < 3 && !state.done {
        return Err(Error::chunk(format!(
            "csid {}: new fmt {} header inside an unfinished message",
            csid, fmt
        )));
    }
    if fmt > 0 && !state.initialized {
        return Err(Error::chunk(format!(
            "csid {}: fmt {} chunk on uninitialised chunk stream",
            csid, fmt
        )));
    }

    match fmt {
        0 => {
            let mut bs = [0u8; 11];
            reader.read_exact(&mut bs).await?;
            let ts24 = u32::from_be_bytes([0, bs[0], bs[1], bs[2]]);
            state.length = u32::from_be_bytes([0, bs[3], bs[4], bs[5]]);
            state.type_id = bs[6];
            // message stream id is little-endian on the wire
            state.stream_id = u32::from_le_bytes([bs[7], bs[8], bs[9], bs[10]]);
            state.extended = ts24 == 0xFFFFFF;
            state.timestamp = if state.extended {
                reader.read_u32().await?
            } else {
                ts24
            };
            state.delta = 0;
            state.initialized = true;
        }
        1 => {
            let mut bs = [0u8; 7];
            reader.read_exact(&mut bs).await?;
            let delta24 = u32::from_be_bytes([0, bs[0], bs[1], bs[2]]);
            state.length = u32::from_be_bytes([0, bs[3], bs[4], bs[5]]);
            state.type_id = bs[6];
            state.extended = delta24 == 0xFFFFFF;
            state.delta = if state.extended {
                reader.read_u32().await?
            } else {
                delta24
            };
            state.timestamp = state.timestamp.wrapping_add(state.delta);
        }
        2 => {
            let mut bs = [0u8; 3];
            reader.read_exact(&mut bs).await?;
            let delta24 = u32::from_be_bytes([0, bs[0], bs[1], bs[2]]);
            state.extended = delta24 == 0xFFFFFF;
            state.delta = if state.extended {
                reader.read_u32().await?
            } else {
                delta24
            };
            state.timestamp = state.timestamp.wrapping_add(state.delta);
        }
        3 => {
            // Extended timestamp is present iff the antecedent fmt-0/1/2 on
            // this chunk stream carried one; the value repeats it.
            if state.extended {
                let _ = reader.read_u32().await?;
            }
            // A fmt-3 chunk that opens a new message re-applies the last
            // delta; mid-message continuations do not advance time.
            if state.done {
                state.timestamp = state.timestamp.wrapping_add(state.delta);
            }
        }
        _ => unreachable!("fmt is two bits"),
    }
    Ok(())
}

async fn read_payload<R>(
    state: &mut ChunkStreamState,
    chunk_size: u32,
    reader: &mut R,
) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    if state.done {
        state.payload.clear();
        state.payload.resize(state.length as usize, 0);
        state.filled = 0;
        state.done = false;
    }

    let remain = state.length as usize - state.filled;
    let take = remain.min(chunk_size as usize);
    reader
        .read_exact(&mut state.payload[state.filled..state.filled + take])
        .await?;
    state.filled += take;

    if state.filled == state.length as usize {
        state.done = true;
        let message = Message::new(
            state.type_id,
            state.timestamp,
            state.stream_id,
            std::mem::take(&mut state.payload),
        );
        state.filled = 0;
        return Ok(Some(message));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(bytes: &[u8], count: usize) -> Vec<Message> {
        let mut reader = ChunkReader::new();
        let mut input = bytes;
        let mut out = Vec::new();
        for _ in 0..count {
            out.push(reader.read_message(&mut input).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_fmt0_header_layout() {
        // fmt 0 on csid 3: ts 0x000102, len 2, type 20, msid 7 (little endian)
        let bytes = vec![
            0x03, // basic header
            0x00, 0x01, 0x02, // timestamp
            0x00, 0x00, 0x02, // length
            20,   // type id
            0x07, 0x00, 0x00, 0x00, // stream id, little endian
            0xAA, 0xBB, // payload
        ];
        let msgs = read_all(&bytes, 1).await;
        assert_eq!(msgs[0].type_id, 20);
        assert_eq!(msgs[0].timestamp, 0x0102);
        assert_eq!(msgs[0].stream_id, 7);
        assert_eq!(msgs[0].payload, vec![0xAA, 0xBB]);
    }

    #[tokio::test]
    async fn test_two_byte_and_three_byte_csid_forms() {
        let bytes = vec![
            0x00, 0x05, // csid = 69, fmt 0
            0, 0, 0, 0, 0, 0, 8, 0x01, 0, 0, 0, // zero-length message
            0x01, 0x21, 0x01, // csid = 64 + 0x0121, fmt 0
            0, 0, 0, 0, 0, 0, 8, 0x01, 0, 0, 0,
        ];
        let msgs = read_all(&bytes, 2).await;
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].payload.is_empty());
    }

    #[tokio::test]
    async fn test_fmt1_and_fmt2_inheritance() {
        let bytes = vec![
            0x04, // fmt 0, csid 4
            0, 0, 100, 0, 0, 1, 8, 0x02, 0, 0, 0, 0x11, //
            0x44, // fmt 1, csid 4: delta 50, len 2, type 9
            0, 0, 50, 0, 0, 2, 9, 0x22, 0x33, //
            0x84, // fmt 2, csid 4: delta 25
            0, 0, 25, 0x44, 0x55,
        ];
        let msgs = read_all(&bytes, 3).await;

        assert_eq!(msgs[0].timestamp, 100);
        assert_eq!(msgs[1].timestamp, 150);
        assert_eq!(msgs[1].type_id, 9);
        assert_eq!(msgs[1].stream_id, 2, "fmt 1 inherits the stream id");
        assert_eq!(msgs[2].timestamp, 175);
        assert_eq!(msgs[2].type_id, 9, "fmt 2 inherits the type id");
        assert_eq!(msgs[2].payload, vec![0x44, 0x55]);
    }

    #[tokio::test]
    async fn test_fmt3_reapplies_delta_between_messages() {
        let bytes = vec![
            0x02, 0, 0, 10, 0, 0, 1, 8, 0x01, 0, 0, 0, 0xAA, // fmt 0, ts 10
            0x82, 0, 0, 30, 0xBB, // fmt 2, delta 30 -> ts 40
            0xC2, 0xCC, // fmt 3, new message -> delta applies again, ts 70
        ];
        let msgs = read_all(&bytes, 3).await;
        assert_eq!(msgs[0].timestamp, 10);
        assert_eq!(msgs[1].timestamp, 40);
        assert_eq!(msgs[2].timestamp, 70);
    }

    #[tokio::test]
    async fn test_multi_chunk_reassembly_does_not_advance_time() {
        // 300 bytes at the default 128-byte chunk size: fmt 0 then two
        // fmt 3 continuations
        let payload: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let mut bytes = vec![0x08, 0, 0, 5, 0, 1, 44, 9, 0x01, 0, 0, 0];
        bytes.extend_from_slice(&payload[..128]);
        bytes.push(0xC8);
        bytes.extend_from_slice(&payload[128..256]);
        bytes.push(0xC8);
        bytes.extend_from_slice(&payload[256..]);

        let msgs = read_all(&bytes, 1).await;
        assert_eq!(msgs[0].timestamp, 5);
        assert_eq!(msgs[0].payload, payload);
    }

    #[tokio::test]
    async fn test_extended_timestamp_read() {
        let big_ts: u32 = 0x0100_0000;
        let mut bytes = vec![0x03, 0xFF, 0xFF, 0xFF, 0, 0, 1, 8, 0x01, 0, 0, 0];
        bytes.extend_from_slice(&big_ts.to_be_bytes());
        bytes.push(0x5A);

        let msgs = read_all(&bytes, 1).await;
        assert_eq!(msgs[0].timestamp, big_ts);
    }

    #[tokio::test]
    async fn test_fmt3_on_uninitialised_csid_is_an_error() {
        let bytes = vec![0xC5, 0x00];
        let mut reader = ChunkReader::new();
        let mut input = &bytes[..];
        let err = reader.read_message(&mut input).await;
        assert!(matches!(err, Err(Error::Chunk(_))));
    }

    #[tokio::test]
    async fn test_header_inside_unfinished_message_is_an_error() {
        // fmt 0 declaring 200 bytes but only one 128-byte chunk arrives,
        // then a fresh fmt 0 on the same csid
        let mut bytes = vec![0x04, 0, 0, 0, 0, 0, 200, 8, 0x01, 0, 0, 0];
        bytes.extend_from_slice(&[0u8; 128]);
        bytes.extend_from_slice(&[0x04, 0, 0, 0, 0, 0, 10, 8, 0x01, 0, 0, 0]);

        let mut reader = ChunkReader::new();
        let mut input = &bytes[..];
        let err = reader.read_message(&mut input).await;
        assert!(matches!(err, Err(Error::Chunk(_))));
    }

    #[tokio::test]
    async fn test_chunk_size_change_applies_to_following_chunks() {
        // after set_chunk_size(1024), a 3000-byte message arrives as
        // exactly 1024 + 1024 + 952
        let payload = vec![0x5Au8; 3000];
        let mut bytes = vec![0x08, 0, 0, 0, 0, 0x0B, 0xB8, 8, 0x01, 0, 0, 0];
        bytes.extend_from_slice(&payload[..1024]);
        bytes.push(0xC8);
        bytes.extend_from_slice(&payload[1024..2048]);
        bytes.push(0xC8);
        bytes.extend_from_slice(&payload[2048..]);

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(1024);
        let mut input = &bytes[..];
        let msg = reader.read_message(&mut input).await.unwrap();
        assert_eq!(msg.payload, payload);
        assert!(input.is_empty(), "exactly three chunks consumed");
    }

    #[tokio::test]
    async fn test_abort_resets_reassembly() {
        let mut head = vec![0x04, 0, 0, 0, 0, 0, 200, 8, 0x01, 0, 0, 0];
        head.extend_from_slice(&[1u8; 128]);

        let mut reader = ChunkReader::new();
        let mut input = &head[..];
        // runs out of bytes mid-message
        assert!(reader.read_message(&mut input).await.is_err());

        reader.abort(4);

        let fresh = vec![0x04, 0, 0, 0, 0, 0, 2, 8, 0x01, 0, 0, 0, 9, 9];
        let mut input = &fresh[..];
        let msg = reader.read_message(&mut input).await.unwrap();
        assert_eq!(msg.payload, vec![9, 9]);
    }
}
