use crate::protocol::constants::*;
use crate::protocol::message::Messager;
use crate::{ByteBuffer, Error, Result};

/// Set Chunk Size (type 1). The wire value is 31 bits; the high bit must be
/// clear and zero is not a chunk size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetChunkSize {
    pub chunk_size: u32,
}

impl Messager for SetChunkSize {
    fn type_id(&self) -> u8 {
        MSG_TYPE_SET_CHUNK_SIZE
    }

    fn timestamp(&self) -> u32 {
        0
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        if self.chunk_size == 0 {
            return Err(Error::protocol("chunk size must be at least 1"));
        }
        Ok((self.chunk_size & MAX_CHUNK_SIZE).to_be_bytes().to_vec())
    }
}

impl SetChunkSize {
    pub fn unmarshal(bs: &[u8]) -> Result<Self> {
        if bs.len() != 4 {
            return Err(Error::DataMissing);
        }
        if bs[0] & 0x80 != 0 {
            return Err(Error::protocol("chunk size high bit set"));
        }
        let chunk_size = u32::from_be_bytes([bs[0], bs[1], bs[2], bs[3]]);
        if chunk_size == 0 {
            return Err(Error::protocol("chunk size must be at least 1"));
        }
        Ok(SetChunkSize { chunk_size })
    }
}

/// Abort (type 2): drop the partially received message on a chunk stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Abort {
    pub chunk_stream_id: u32,
}

impl Messager for Abort {
    fn type_id(&self) -> u8 {
        MSG_TYPE_ABORT
    }

    fn timestamp(&self) -> u32 {
        0
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(self.chunk_stream_id.to_be_bytes().to_vec())
    }
}

impl Abort {
    pub fn unmarshal(bs: &[u8]) -> Result<Self> {
        if bs.len() != 4 {
            return Err(Error::DataMissing);
        }
        Ok(Abort {
            chunk_stream_id: u32::from_be_bytes([bs[0], bs[1], bs[2], bs[3]]),
        })
    }
}

/// Acknowledgement (type 3): bytes received so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acknowledgement {
    pub sequence_number: u32,
}

impl Messager for Acknowledgement {
    fn type_id(&self) -> u8 {
        MSG_TYPE_ACK
    }

    fn timestamp(&self) -> u32 {
        0
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(self.sequence_number.to_be_bytes().to_vec())
    }
}

impl Acknowledgement {
    pub fn unmarshal(bs: &[u8]) -> Result<Self> {
        if bs.len() != 4 {
            return Err(Error::DataMissing);
        }
        Ok(Acknowledgement {
            sequence_number: u32::from_be_bytes([bs[0], bs[1], bs[2], bs[3]]),
        })
    }
}

/// Window Acknowledgement Size (type 5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAckSize {
    pub window_size: u32,
}

impl Messager for WindowAckSize {
    fn type_id(&self) -> u8 {
        MSG_TYPE_WINDOW_ACK
    }

    fn timestamp(&self) -> u32 {
        0
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(self.window_size.to_be_bytes().to_vec())
    }
}

impl WindowAckSize {
    pub fn unmarshal(bs: &[u8]) -> Result<Self> {
        if bs.len() != 4 {
            return Err(Error::DataMissing);
        }
        Ok(WindowAckSize {
            window_size: u32::from_be_bytes([bs[0], bs[1], bs[2], bs[3]]),
        })
    }
}

/// Set Peer Bandwidth (type 6). The limit type rides along on the wire; the
/// window value lands in the same field WindowAckSize feeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPeerBandwidth {
    pub window_size: u32,
    pub limit_type: u8,
}

impl Messager for SetPeerBandwidth {
    fn type_id(&self) -> u8 {
        MSG_TYPE_SET_PEER_BW
    }

    fn timestamp(&self) -> u32 {
        0
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        let mut bs = self.window_size.to_be_bytes().to_vec();
        bs.push(self.limit_type);
        Ok(bs)
    }
}

impl SetPeerBandwidth {
    pub fn unmarshal(bs: &[u8]) -> Result<Self> {
        if bs.len() != 5 {
            return Err(Error::DataMissing);
        }
        Ok(SetPeerBandwidth {
            window_size: u32::from_be_bytes([bs[0], bs[1], bs[2], bs[3]]),
            limit_type: bs[4],
        })
    }
}

/// User Control Message (type 4): 2-byte event, 4-byte param, and a second
/// 4-byte param only for SetBufferLength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserControl {
    pub event: u16,
    pub param1: u32,
    pub param2: u32,
}

impl UserControl {
    pub fn new(event: u16, param1: u32) -> Self {
        UserControl {
            event,
            param1,
            param2: 0,
        }
    }
}

impl Messager for UserControl {
    fn type_id(&self) -> u8 {
        MSG_TYPE_USER_CONTROL
    }

    fn timestamp(&self) -> u32 {
        0
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(10);
        buffer.write_u16_be(self.event)?;
        buffer.write_u32_be(self.param1)?;
        if self.event == EVENT_SET_BUFFER_LENGTH {
            buffer.write_u32_be(self.param2)?;
        }
        Ok(buffer.into_vec())
    }
}

impl UserControl {
    pub fn unmarshal(bs: &[u8]) -> Result<Self> {
        if bs.len() < 6 {
            return Err(Error::DataMissing);
        }
        let event = u16::from_be_bytes([bs[0], bs[1]]);
        let param1 = u32::from_be_bytes([bs[2], bs[3], bs[4], bs[5]]);
        let mut param2 = 0;
        if event == EVENT_SET_BUFFER_LENGTH {
            if bs.len() != 10 {
                return Err(Error::DataMissing);
            }
            param2 = u32::from_be_bytes([bs[6], bs[7], bs[8], bs[9]]);
        }
        Ok(UserControl {
            event,
            param1,
            param2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_chunk_size_wire() {
        let bs = SetChunkSize { chunk_size: 1024 }.marshal().unwrap();
        assert_eq!(bs, vec![0x00, 0x00, 0x04, 0x00]);

        let decoded = SetChunkSize::unmarshal(&bs).unwrap();
        assert_eq!(decoded.chunk_size, 1024);
    }

    #[test]
    fn test_set_chunk_size_rejects_high_bit() {
        let bs = [0x80, 0x00, 0x10, 0x00];
        assert!(matches!(
            SetChunkSize::unmarshal(&bs),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_set_chunk_size_rejects_zero() {
        let bs = [0u8; 4];
        assert!(SetChunkSize::unmarshal(&bs).is_err());
    }

    #[test]
    fn test_short_payloads_are_data_missing() {
        assert!(matches!(SetChunkSize::unmarshal(&[0, 1]), Err(Error::DataMissing)));
        assert!(matches!(Abort::unmarshal(&[]), Err(Error::DataMissing)));
        assert!(matches!(
            Acknowledgement::unmarshal(&[1, 2, 3]),
            Err(Error::DataMissing)
        ));
        assert!(matches!(
            WindowAckSize::unmarshal(&[1, 2, 3, 4, 5]),
            Err(Error::DataMissing)
        ));
        assert!(matches!(
            SetPeerBandwidth::unmarshal(&[1, 2, 3, 4]),
            Err(Error::DataMissing)
        ));
        assert!(matches!(UserControl::unmarshal(&[0, 0]), Err(Error::DataMissing)));
    }

    #[test]
    fn test_peer_bandwidth_carries_limit_type() {
        let bs = SetPeerBandwidth {
            window_size: 2_500_000,
            limit_type: 2,
        }
        .marshal()
        .unwrap();
        assert_eq!(bs.len(), 5);
        assert_eq!(bs[4], 2);

        let decoded = SetPeerBandwidth::unmarshal(&bs).unwrap();
        assert_eq!(decoded.window_size, 2_500_000);
        assert_eq!(decoded.limit_type, 2);
    }

    #[test]
    fn test_user_control_buffer_length_has_second_param() {
        let msg = UserControl {
            event: EVENT_SET_BUFFER_LENGTH,
            param1: 7,
            param2: 3000,
        };
        let bs = msg.marshal().unwrap();
        assert_eq!(bs.len(), 10);
        assert_eq!(UserControl::unmarshal(&bs).unwrap(), msg);

        let ping = UserControl::new(EVENT_PING_REQUEST, 12345);
        let bs = ping.marshal().unwrap();
        assert_eq!(bs.len(), 6);
        assert_eq!(UserControl::unmarshal(&bs).unwrap(), ping);
    }

    #[test]
    fn test_buffer_length_requires_full_payload() {
        // SetBufferLength with only one param present
        let bs = [0x00, 0x03, 0, 0, 0, 7];
        assert!(matches!(UserControl::unmarshal(&bs), Err(Error::DataMissing)));
    }
}
