mod packet;
mod registry;
mod ring;
mod stream;

pub use packet::*;
pub use registry::*;
pub use stream::*;
