use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] IoError),

    /// The server is shutting down; the accept loop returns this.
    #[error("rtmp: server closed")]
    ServerClosed,

    /// A control-message payload was shorter than its fixed layout.
    #[error("rtmp: protocol data missing")]
    DataMissing,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("handshake error: {0}")]
    BadHandshake(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// AMF0 decode failure; `index` is the position of the value in the
    /// sequence at which decoding stopped.
    #[error("amf decode error at value {index}: {message}")]
    AmfDecode { index: usize, message: String },

    #[error("amf encode error: {0}")]
    AmfEncode(String),

    #[error("chunk error: {0}")]
    Chunk(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// End of a published stream, observed through an iterator.
    #[error("end of stream")]
    Eos,
}

impl Error {
    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Error::BadHandshake(msg.into())
    }

    /// Create an unsupported-feature error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an AMF decode error at the given value index
    pub fn amf_decode(index: usize, msg: impl Into<String>) -> Self {
        Error::AmfDecode {
            index,
            message: msg.into(),
        }
    }

    /// Create an AMF encode error
    pub fn amf_encode(msg: impl Into<String>) -> Self {
        Error::AmfEncode(msg.into())
    }

    /// Create a chunk error
    pub fn chunk(msg: impl Into<String>) -> Self {
        Error::Chunk(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::protocol("invalid message type");
        assert_eq!(format!("{}", err), "protocol error: invalid message type");

        let err = Error::handshake("digest mismatch");
        assert_eq!(format!("{}", err), "handshake error: digest mismatch");

        let err = Error::amf_decode(2, "short read in string");
        assert_eq!(
            format!("{}", err),
            "amf decode error at value 2: short read in string"
        );
    }

    #[test]
    fn test_io_conversion() {
        use std::io::{Error as IoError, ErrorKind};

        let io_err = IoError::new(ErrorKind::UnexpectedEof, "EOF");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
    }
}
