mod amf;
mod chunk;
mod connection;
mod handlers;
mod handshake;
mod protocol;
mod server;
mod stream;
mod utils;

pub use amf::*;
pub use chunk::*;
pub use connection::{MessageWriter, Outbound};
pub use handlers::*;
pub use handshake::*;
pub use protocol::*;
pub use stream::*;
pub use utils::*;

// Server exports
pub use server::{Server, ServerConfig, ServerConfigBuilder};
