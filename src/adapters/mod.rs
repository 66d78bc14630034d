//! Adapter implementations of the port traits.
//!
//! - `live`: real system clock, disk, and HTTP chat backends.
//! - `recording`: wrap a live adapter and capture every interaction.
//! - `replaying`: serve interactions back from a cassette.

pub mod live;
pub mod recording;
pub mod replaying;
