mod amf0;
mod binding;
mod decoder;
mod encoder;

pub use amf0::*;
pub use binding::*;
pub use decoder::*;
pub use encoder::*;
