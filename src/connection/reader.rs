//! Socket reader task
//!
//! Owns the read half of the socket for the life of the connection.
//! Stream packets are demultiplexed right here so they never queue
//! behind metadata; sequenced replies wake their callers; everything
//! else goes to the worker task.

use std::sync::Arc;

use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{mpsc, oneshot};

use super::Connection;
use crate::error::Error;
use crate::msg::Msg;
use crate::protocol::frame;

/// Run the read loop until shutdown or a fatal transport error
pub async fn run(
    conn: Arc<Connection>,
    mut socket: OwnedReadHalf,
    worker_tx: mpsc::UnboundedSender<Msg>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(host = %conn.host(), "Reader shut down");
                return;
            }
            result = frame::read_frame(&mut socket, conn.max_frame_size()) => {
                match result {
                    Ok(m) => dispatch(&conn, &worker_tx, m),
                    Err(e) if recoverable(&e) => {
                        tracing::warn!(error = %e, "Dropping bad frame");
                    }
                    Err(e) => {
                        tracing::error!(
                            host = %conn.host(),
                            error = %e,
                            "Disconnected from server"
                        );
                        conn.connection_lost();
                        return;
                    }
                }
            }
        }
    }
}

/// Classify one incoming message
fn dispatch(conn: &Connection, worker_tx: &mpsc::UnboundedSender<Msg>, m: Msg) {
    // Stream data first; it dwarfs everything else in volume
    if m.method() == Some("muxpkt") {
        conn.subscriptions.mux_input(&m);
        return;
    }

    if let Some(seq) = m.get_u32("seq").filter(|&s| s != 0) {
        conn.complete(seq, m);
        return;
    }

    // Unsolicited metadata is handled off the read path
    let _ = worker_tx.send(m);
}

/// Frame-level errors leave the stream aligned on the next frame
fn recoverable(e: &Error) -> bool {
    matches!(e, Error::Frame(_))
}
