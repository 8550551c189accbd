use crate::protocol::constants::*;
use crate::Result;

/// A complete RTMP message, as reassembled from chunks or about to be
/// split into them.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub type_id: u8,
    pub timestamp: u32,
    pub stream_id: u32,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(type_id: u8, timestamp: u32, stream_id: u32, payload: Vec<u8>) -> Self {
        Message {
            type_id,
            timestamp,
            stream_id,
            payload,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.type_id == MSG_TYPE_AUDIO
    }

    pub fn is_video(&self) -> bool {
        self.type_id == MSG_TYPE_VIDEO
    }

    pub fn is_command(&self) -> bool {
        self.type_id == MSG_TYPE_COMMAND_AMF0 || self.type_id == MSG_TYPE_COMMAND_AMF3
    }

    pub fn is_data(&self) -> bool {
        self.type_id == MSG_TYPE_DATA_AMF0 || self.type_id == MSG_TYPE_DATA_AMF3
    }

    /// Protocol-control messages are handled inline on the reader, before
    /// anything is dispatched.
    pub fn is_protocol_control(&self) -> bool {
        matches!(
            self.type_id,
            MSG_TYPE_SET_CHUNK_SIZE
                | MSG_TYPE_ABORT
                | MSG_TYPE_ACK
                | MSG_TYPE_WINDOW_ACK
                | MSG_TYPE_SET_PEER_BW
        )
    }
}

/// Anything that can be written out as an RTMP message. The connection's
/// outbound serialiser takes care of chunking; implementations only say
/// what they are and how their payload marshals.
pub trait Messager {
    fn type_id(&self) -> u8;
    fn timestamp(&self) -> u32;
    fn marshal(&self) -> Result<Vec<u8>>;
}

impl Messager for Message {
    fn type_id(&self) -> u8 {
        self.type_id
    }

    fn timestamp(&self) -> u32 {
        self.timestamp
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_classification() {
        let msg = Message::new(MSG_TYPE_AUDIO, 1000, 7, vec![0xAF, 0x01]);
        assert!(msg.is_audio());
        assert!(!msg.is_video());
        assert!(!msg.is_protocol_control());

        let msg = Message::new(MSG_TYPE_SET_CHUNK_SIZE, 0, 0, vec![0, 0, 16, 0]);
        assert!(msg.is_protocol_control());

        let msg = Message::new(MSG_TYPE_COMMAND_AMF0, 0, 0, vec![]);
        assert!(msg.is_command());
    }
}
