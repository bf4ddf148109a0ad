//! Protocol constants

/// Default TCP port when the URL names none
pub const DEFAULT_PORT: u16 = 9982;

/// Protocol revision announced in `hello` and `login`
pub const PROTOCOL_VERSION: u32 = 1;

/// Sanity ceiling for a single frame body
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length of the challenge carried by the `hello` reply
pub const CHALLENGE_LEN: usize = 32;

/// Length of the SHA-1 digest sent with `login`
pub const DIGEST_LEN: usize = 20;

/// Length of the frame length prefix
pub const LENGTH_PREFIX_LEN: usize = 4;
