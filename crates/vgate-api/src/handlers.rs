//! Request handlers.

pub mod chunks;
pub mod health;
pub mod process;
pub mod videos;

pub use chunks::*;
pub use health::*;
pub use process::*;
pub use videos::*;
