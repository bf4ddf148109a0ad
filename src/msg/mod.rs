//! Message model and binary codec
//!
//! Everything the protocol moves is a [`Msg`]: an ordered map of named
//! fields carrying strings, integers, binary blobs, doubles, nested maps
//! and lists. [`binary`] is the wire codec for it.

pub mod binary;
pub mod value;

pub use binary::{decode, encode, MsgDecoder, MsgEncoder};
pub use value::{Msg, MsgValue};
