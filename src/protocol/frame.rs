//! Length-prefixed frame transport
//!
//! Every message travels as a 4-byte big-endian length followed by that
//! many bytes of encoded body:
//!
//! ```text
//! [u32 body length][message body]
//! ```
//!
//! Oversize and malformed frames are consumed before the error is
//! returned, so the stream stays framed and the caller can keep reading.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FrameError, Result};
use crate::msg::{self, Msg};
use crate::protocol::constants::LENGTH_PREFIX_LEN;

/// Read one frame and decode its body
///
/// A frame larger than `max_frame_size` is drained from the stream and
/// reported as [`FrameError::Oversize`]; an undecodable body is reported
/// as [`FrameError::Malformed`]. Both leave the stream positioned at the
/// next frame. I/O failures are fatal and surface as [`crate::Error::Io`].
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Msg>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LENGTH_PREFIX_LEN];
    reader.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;

    if len > max_frame_size {
        // Consume the declared body so the next read starts on a frame
        // boundary
        let mut oversize = reader.take(len as u64);
        tokio::io::copy(&mut oversize, &mut tokio::io::sink()).await?;
        return Err(FrameError::Oversize {
            len,
            max: max_frame_size,
        }
        .into());
    }

    let mut body = BytesMut::new();
    body.resize(len, 0u8);
    reader.read_exact(&mut body[..]).await?;

    msg::decode(body.freeze()).map_err(|e| FrameError::Malformed(e).into())
}

/// Encode a message and write it as a single frame
///
/// The length prefix and body go out in one buffer with one write, so
/// concurrent writers serialized on the socket never interleave frames.
pub async fn write_frame<W>(writer: &mut W, msg: &Msg) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = msg::encode(msg);
    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + body.len());
    frame.put_u32(body.len() as u32);
    frame.put_slice(&body);

    writer.write_all(&frame).await?;
    Ok(())
}

/// Encode a message with its length prefix into a standalone buffer
///
/// Test servers use this to script canned replies.
pub fn frame_bytes(msg: &Msg) -> Bytes {
    let body = msg::encode(msg);
    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + body.len());
    frame.put_u32(body.len() as u32);
    frame.put_slice(&body);
    frame.freeze()
}
