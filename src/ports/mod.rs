//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the synthesis core and an
//! external system (time, filesystem, chat model). Implementations live
//! in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod llm;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use llm::{ChatClient, ChatFuture, ChatOptions, ChatRequest, ChatResponse, ChatRole};
