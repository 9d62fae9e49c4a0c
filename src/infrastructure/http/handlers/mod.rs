//! HTTP Handlers

mod cache;
mod health;
mod speech;
mod websocket;

pub use cache::*;
pub use health::*;
pub use speech::*;
pub use websocket::*;
