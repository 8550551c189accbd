use crate::protocol::constants::*;
use crate::{Error, Result};

/// Server tuning knobs. `Default` matches the values real encoders expect
/// from an FMS-compatible server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen address
    pub addr: String,

    /// Chunk size announced to peers on connect
    pub chunk_size: u32,

    /// Acknowledgement window announced to peers
    pub window_ack_size: u32,

    /// Largest Set Chunk Size accepted from a peer
    pub max_chunk_size: u32,

    /// Message-stream-id handed out by createStream and used for media
    pub default_msid: u32,

    /// Ring capacity of each published stream
    pub ring_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: "0.0.0.0:1935".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            max_chunk_size: MAX_CHUNK_SIZE,
            default_msid: DEFAULT_MSID,
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.addr.is_empty() {
            return Err(Error::config("listen address is empty"));
        }
        if self.chunk_size < 128 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::config(format!(
                "announced chunk size {} outside 128..={}",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.max_chunk_size < 128 || self.max_chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::config(format!(
                "max chunk size {} outside 128..={}",
                self.max_chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.default_msid == 0 {
            return Err(Error::config("default message stream id 0 is reserved"));
        }
        if self.ring_capacity == 0 {
            return Err(Error::config("ring capacity must be positive"));
        }
        Ok(())
    }
}

pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        ServerConfigBuilder {
            config: ServerConfig::default(),
        }
    }

    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    pub fn chunk_size(mut self, size: u32) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn window_ack_size(mut self, size: u32) -> Self {
        self.config.window_ack_size = size;
        self
    }

    pub fn max_chunk_size(mut self, size: u32) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    pub fn default_msid(mut self, msid: u32) -> Self {
        self.config.default_msid = msid;
        self
    }

    pub fn ring_capacity(mut self, capacity: usize) -> Self {
        self.config.ring_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
