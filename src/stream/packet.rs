use crate::protocol::constants::{MSG_TYPE_AUDIO, MSG_TYPE_DATA_AMF0, MSG_TYPE_VIDEO};
use crate::protocol::Message;

/// A media or metadata packet travelling through a published stream.
/// Keyframe and codec-config classification happens once, at ingest, from
/// the FLV tag nibbles.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// 8 audio, 9 video, 18 meta
    pub kind: u8,
    pub timestamp: u32,
    pub payload: Vec<u8>,
    pub is_key_frame: bool,
    pub is_config: bool,
}

impl Packet {
    pub fn audio(timestamp: u32, payload: Vec<u8>) -> Self {
        let mut packet = Packet {
            kind: MSG_TYPE_AUDIO,
            timestamp,
            payload,
            is_key_frame: false,
            is_config: false,
        };
        if packet.payload.len() >= 2 {
            let format = packet.payload[0] >> 4;
            if format == 10 {
                // AAC: a zero packet-type byte is the sequence header
                packet.is_config = packet.payload[1] == 0;
            }
        }
        packet
    }

    pub fn video(timestamp: u32, payload: Vec<u8>) -> Self {
        let mut packet = Packet {
            kind: MSG_TYPE_VIDEO,
            timestamp,
            payload,
            is_key_frame: false,
            is_config: false,
        };
        if packet.payload.len() >= 2 {
            let frame_type = packet.payload[0] >> 4;
            let codec = packet.payload[0] & 0x0F;
            packet.is_key_frame = frame_type == 1;
            if codec == 7 {
                // AVC: a zero packet-type byte is the sequence header
                packet.is_config = packet.payload[1] == 0;
            }
        }
        packet
    }

    pub fn meta(timestamp: u32, payload: Vec<u8>) -> Self {
        Packet {
            kind: MSG_TYPE_DATA_AMF0,
            timestamp,
            payload,
            is_key_frame: false,
            is_config: false,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == MSG_TYPE_AUDIO
    }

    pub fn is_video(&self) -> bool {
        self.kind == MSG_TYPE_VIDEO
    }

    pub fn is_meta(&self) -> bool {
        self.kind == MSG_TYPE_DATA_AMF0
    }

    /// The RTMP message this packet is delivered as.
    pub fn to_message(&self) -> Message {
        Message::new(self.kind, self.timestamp, 0, self.payload.clone())
    }
}
