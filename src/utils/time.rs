use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds, truncated to the 32-bit timestamps
/// RTMP carries on the wire.
pub fn current_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX epoch")
        .as_millis() as u32
}
