mod connection;
mod counter;
mod outbound;

pub(crate) use connection::serve_connection;
pub use outbound::{MessageWriter, Outbound};
