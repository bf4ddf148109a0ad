//! Wire protocol layer
//!
//! Constants plus the length-prefixed frame transport. Everything above
//! this module deals in [`crate::msg::Msg`] values; everything below it is
//! bytes on a socket.

pub mod constants;
pub mod frame;

pub use constants::{CHALLENGE_LEN, DEFAULT_PORT, MAX_FRAME_SIZE, PROTOCOL_VERSION};
pub use frame::{frame_bytes, read_frame, write_frame};
