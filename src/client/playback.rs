//! The playback session loop
//!
//! One call to [`play`] owns a channel subscription from subscribe to
//! unsubscribe. Stream data flows to the pipe's queues without passing
//! through here; this loop only services the player's events (track
//! switches, stop) until the session ends.

use crate::connection::ConnectionRegistry;
use crate::error::{ConnectionError, Result};
use crate::media::{MediaPipe, PlaybackStatus, PlayerEvent};

/// Why a playback session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The player asked for the stop
    Stopped,
    /// The transport went away underneath the session
    ConnectionLost,
}

/// Map a player priority to a subscription weight
///
/// Priority 0 is the on-screen player and outbids everything else;
/// higher numbers bid lower, floored at 110 so even deep background
/// sessions stay above the server's defaults.
fn prio_to_weight(priority: u32) -> u32 {
    if priority == 0 {
        150
    } else {
        140u32.saturating_sub(priority).max(110)
    }
}

/// Play one channel until the player stops it or the connection dies
pub async fn play(
    registry: &ConnectionRegistry,
    host: &str,
    port: u16,
    path: &str,
    pipe: MediaPipe,
    priority: u32,
) -> Result<PlaybackEnd> {
    let channel_id: u32 = match path.strip_prefix("/channel/").and_then(|s| s.parse().ok()) {
        Some(id) => id,
        None => return Err(ConnectionError::InvalidUrl(path.to_string()).into()),
    };

    let conn = registry.acquire(host, port).await?;

    // Seed the pipe from whatever metadata has already been pushed;
    // the subscription start fills in the rest
    if let Some(channel) = conn.meta.channel(channel_id) {
        let title = channel
            .name
            .unwrap_or_else(|| format!("Channel {}", channel_id));
        pipe.set_channel_info(&title, channel.icon.as_deref(), channel.number);
    }

    tracing::debug!(channel_id = channel_id, "Subscribing to channel");

    let sid = match conn
        .subscribe(channel_id, pipe.clone(), prio_to_weight(priority))
        .await
    {
        Ok(sid) => sid,
        Err(e) => {
            registry.release(&conn).await;
            return Err(e);
        }
    };

    let end = loop {
        match pipe.next_event().await {
            PlayerEvent::SelectAudioTrack(id) => conn.subscriptions.select_audio(sid, &id),
            PlayerEvent::SelectSubtitleTrack(id) => conn.subscriptions.select_subtitle(sid, &id),
            PlayerEvent::Stop => break PlaybackEnd::Stopped,
            PlayerEvent::ConnectionLost => break PlaybackEnd::ConnectionLost,
        }
    };

    match end {
        PlaybackEnd::Stopped => {
            if let Err(e) = conn.unsubscribe(sid).await {
                tracing::warn!(sid = sid, error = %e, "Unsubscribe failed");
            }
        }
        // The server is gone; just drop the local bookkeeping
        PlaybackEnd::ConnectionLost => {
            conn.subscriptions.remove(sid);
        }
    }

    pipe.set_status(PlaybackStatus::Stop);
    registry.release(&conn).await;
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::error::Error;
    use crate::media::PipeConfig;
    use crate::testutil::*;

    use std::sync::Arc;

    use tokio::net::TcpListener;

    #[test]
    fn test_priority_maps_to_weight() {
        assert_eq!(prio_to_weight(0), 150);
        assert_eq!(prio_to_weight(1), 139);
        assert_eq!(prio_to_weight(10), 130);
        assert_eq!(prio_to_weight(30), 110);
        assert_eq!(prio_to_weight(100), 110);
        assert_eq!(prio_to_weight(u32::MAX), 110);
    }

    #[tokio::test]
    async fn test_bad_path_fails_without_connecting() {
        let registry = ConnectionRegistry::new(ClientConfig::default());
        let (pipe, _queues) = MediaPipe::new(PipeConfig::default());

        for path in ["", "/", "/channel/", "/channel/abc", "/movie/1"] {
            let err = play(&registry, "127.0.0.1", 1, path, pipe.clone(), 0)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::Connection(ConnectionError::InvalidUrl(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_play_runs_until_stopped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut sock = accept_and_handshake(&listener).await;

            let sub = recv_req(&mut sock).await;
            assert_eq!(sub.method(), Some("subscribe"));
            assert_eq!(sub.get_u32("channelId"), Some(9));
            assert_eq!(sub.get_u32("weight"), Some(150));
            send_msg(&mut sock, &reply_to(&sub)).await;

            let unsub = recv_req(&mut sock).await;
            assert_eq!(unsub.method(), Some("unsubscribe"));
            send_msg(&mut sock, &reply_to(&unsub)).await;

            assert!(recv_eof(&mut sock).await);
        });

        let registry = Arc::new(ConnectionRegistry::new(ClientConfig::default()));
        let (pipe, _queues) = MediaPipe::new(PipeConfig::default());
        let host = addr.ip().to_string();

        let session = tokio::spawn({
            let registry = Arc::clone(&registry);
            let pipe = pipe.clone();
            async move { play(&registry, &host, addr.port(), "/channel/9", pipe, 0).await }
        });

        // The stop is queued even if the session has not subscribed yet
        pipe.post_event(PlayerEvent::Stop);

        let end = session.await.unwrap().unwrap();
        assert_eq!(end, PlaybackEnd::Stopped);
        assert_eq!(pipe.status(), PlaybackStatus::Stop);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_play_reports_lost_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut sock = accept_and_handshake(&listener).await;

            let sub = recv_req(&mut sock).await;
            send_msg(&mut sock, &reply_to(&sub)).await;
            drop(sock);
        });

        let registry = ConnectionRegistry::new(ClientConfig::default());
        let (pipe, _queues) = MediaPipe::new(PipeConfig::default());
        let host = addr.ip().to_string();

        let end = play(&registry, &host, addr.port(), "/channel/9", pipe.clone(), 0)
            .await
            .unwrap();
        assert_eq!(end, PlaybackEnd::ConnectionLost);
        assert_eq!(pipe.status(), PlaybackStatus::Stop);

        server.await.unwrap();
    }
}
