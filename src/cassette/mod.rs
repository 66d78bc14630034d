//! Cassette format for recording and replaying port interactions.
//!
//! Cassettes are how chat-driven components are tested: a scripted
//! cassette stands in for the model, and a recorded one reproduces a
//! real session offline.

pub mod config;
pub mod format;
pub mod recorder;
pub mod replayer;
pub mod session;
