//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod encoder;
pub mod tts;

pub use encoder::*;
pub use tts::*;
