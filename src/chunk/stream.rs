/// Per-chunk-stream decode state: the message-header fields carried forward
/// between chunks, plus the reassembly buffer for the message in flight.
#[derive(Debug, Clone)]
pub(crate) struct ChunkStreamState {
    /// A fmt-0 header has been seen; fmt 1/2/3 may inherit from it.
    pub initialized: bool,

    pub type_id: u8,
    pub length: u32,
    pub timestamp: u32,
    pub stream_id: u32,

    /// Delta carried by the last fmt-1/2 header; fmt-3 chunks that open a
    /// new message re-apply it.
    pub delta: u32,

    /// The last fmt-0/1/2 header used an extended timestamp, so fmt-3
    /// chunks on this stream carry one too.
    pub extended: bool,

    /// Message complete; the next chunk starts a new message.
    pub done: bool,

    pub filled: usize,
    pub payload: Vec<u8>,
}

impl Default for ChunkStreamState {
    fn default() -> Self {
        ChunkStreamState {
            initialized: false,
            type_id: 0,
            length: 0,
            timestamp: 0,
            stream_id: 0,
            delta: 0,
            extended: false,
            done: true,
            filled: 0,
            payload: Vec::new(),
        }
    }
}

impl ChunkStreamState {
    /// Drop the partially received message (Abort handling). Header state
    /// survives; only the reassembly restarts.
    pub fn reset(&mut self) {
        self.done = true;
        self.filled = 0;
        self.payload.clear();
    }
}
