// Message type ids
pub const MSG_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_TYPE_ABORT: u8 = 2;
pub const MSG_TYPE_ACK: u8 = 3;
pub const MSG_TYPE_USER_CONTROL: u8 = 4;
pub const MSG_TYPE_WINDOW_ACK: u8 = 5;
pub const MSG_TYPE_SET_PEER_BW: u8 = 6;
pub const MSG_TYPE_AUDIO: u8 = 8;
pub const MSG_TYPE_VIDEO: u8 = 9;
pub const MSG_TYPE_DATA_AMF3: u8 = 15;
pub const MSG_TYPE_SHARED_OBJECT_AMF3: u8 = 16;
pub const MSG_TYPE_COMMAND_AMF3: u8 = 17;
pub const MSG_TYPE_DATA_AMF0: u8 = 18;
pub const MSG_TYPE_SHARED_OBJECT_AMF0: u8 = 19;
pub const MSG_TYPE_COMMAND_AMF0: u8 = 20;
pub const MSG_TYPE_AGGREGATE: u8 = 22;

// User control event types
pub const EVENT_STREAM_BEGIN: u16 = 0;
pub const EVENT_STREAM_EOF: u16 = 1;
pub const EVENT_STREAM_DRY: u16 = 2;
pub const EVENT_SET_BUFFER_LENGTH: u16 = 3;
pub const EVENT_STREAM_IS_RECORDED: u16 = 4;
pub const EVENT_PING_REQUEST: u16 = 6;
pub const EVENT_PING_RESPONSE: u16 = 7;

// Command names
pub const RSP_RESULT: &str = "_result";
pub const RSP_ERROR: &str = "_error";
pub const RSP_ON_STATUS: &str = "onStatus";
pub const CMD_CONNECT: &str = "connect";
pub const CMD_CALL: &str = "call";
pub const CMD_CLOSE: &str = "close";
pub const CMD_CREATE_STREAM: &str = "createStream";
pub const CMD_PLAY: &str = "play";
pub const CMD_PLAY2: &str = "play2";
pub const CMD_DELETE_STREAM: &str = "deleteStream";
pub const CMD_CLOSE_STREAM: &str = "closeStream";
pub const CMD_RECEIVE_AUDIO: &str = "receiveAudio";
pub const CMD_RECEIVE_VIDEO: &str = "receiveVideo";
pub const CMD_PUBLISH: &str = "publish";
pub const CMD_SEEK: &str = "seek";
pub const CMD_PAUSE: &str = "pause";
pub const CMD_FCPUBLISH: &str = "FCPublish";
pub const CMD_FCUNPUBLISH: &str = "FCUnpublish";
pub const CMD_RELEASE_STREAM: &str = "releaseStream";
pub const CMD_GET_STREAM_LENGTH: &str = "getStreamLength";

// onStatus levels
pub const LEVEL_STATUS: &str = "status";
pub const LEVEL_ERROR: &str = "error";

// Defaults
pub const INITIAL_CHUNK_SIZE: u32 = 128;
pub const MAX_CHUNK_SIZE: u32 = 0x7FFF_FFFF;
pub const DEFAULT_CHUNK_SIZE: u32 = 4096;
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;
pub const DEFAULT_MSID: u32 = 7;
pub const DEFAULT_RING_CAPACITY: usize = 3000;

/// Outbound channel assignment: which chunk-stream-id and message-stream-id
/// a message type travels on.
pub fn channel_for(type_id: u8, default_msid: u32) -> (u32, u32) {
    match type_id {
        // protocol and user control
        1..=6 => (2, 0),
        MSG_TYPE_AUDIO => (8, default_msid),
        MSG_TYPE_VIDEO => (9, default_msid),
        MSG_TYPE_DATA_AMF3 | MSG_TYPE_DATA_AMF0 => (4, default_msid),
        MSG_TYPE_SHARED_OBJECT_AMF3 | MSG_TYPE_SHARED_OBJECT_AMF0 => (5, default_msid),
        MSG_TYPE_COMMAND_AMF3 | MSG_TYPE_COMMAND_AMF0 => (3, default_msid),
        MSG_TYPE_AGGREGATE => (6, default_msid),
        _ => (7, default_msid),
    }
}
