//! HTSP client implementation
//!
//! [`HtspClient`] is the embedder-facing surface:
//! - `browse` lists channels and tags as a directory tree
//! - `play_video` runs a channel subscription against a media pipe
//!
//! Both take `htsp://host[:port]/...` URLs and share pooled
//! connections, so a browse and a playback session on the same server
//! ride one socket.

pub mod config;
pub mod directory;
pub mod playback;

use crate::connection::ConnectionRegistry;
use crate::error::{ConnectionError, Result};
use crate::media::MediaPipe;
use crate::protocol::constants::DEFAULT_PORT;

pub use config::ClientConfig;
pub use directory::Listing;
pub use playback::PlaybackEnd;

/// HTSP client facade over a shared connection pool
#[derive(Debug)]
pub struct HtspClient {
    registry: ConnectionRegistry,
}

impl HtspClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(config),
        }
    }

    /// Whether a URL names this protocol
    pub fn can_handle(url: &str) -> bool {
        url.starts_with("htsp://")
    }

    /// List one directory level of a server
    ///
    /// `htsp://host[:port]` lists channels, `.../tags` lists tags,
    /// `.../tag/<id>` lists a tag's member channels.
    pub async fn browse(&self, url: &str) -> Result<Listing> {
        let (host, port, path) = split_url(url)?;
        directory::browse(&self.registry, host, port, path).await
    }

    /// Play a channel (`htsp://host[:port]/channel/<id>`) until the
    /// player stops it or the connection goes away
    ///
    /// Priority 0 marks the on-screen player; larger values yield to it.
    pub async fn play_video(
        &self,
        url: &str,
        pipe: MediaPipe,
        priority: u32,
    ) -> Result<PlaybackEnd> {
        let (host, port, path) = split_url(url)?;
        playback::play(&self.registry, host, port, path, pipe, priority).await
    }
}

impl Default for HtspClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

/// Split an `htsp://` URL into host, port and the remaining path
fn split_url(url: &str) -> Result<(&str, u16, &str)> {
    let rest = match url.strip_prefix("htsp://") {
        Some(rest) => rest,
        None => return Err(ConnectionError::InvalidUrl(url.to_string()).into()),
    };

    let (authority, path) = match rest.find('/') {
        Some(at) => rest.split_at(at),
        None => (rest, ""),
    };

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| ConnectionError::InvalidUrl(url.to_string()))?;
            (host, port)
        }
        None => (authority, DEFAULT_PORT),
    };

    if host.is_empty() {
        return Err(ConnectionError::InvalidUrl(url.to_string()).into());
    }

    Ok((host, port, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::media::{PipeConfig, PlaybackStatus, PlayerEvent};
    use crate::testutil::*;

    use tokio::net::TcpListener;

    #[test]
    fn test_can_handle() {
        assert!(HtspClient::can_handle("htsp://tv.local"));
        assert!(HtspClient::can_handle("htsp://tv.local:9982/channel/1"));
        assert!(!HtspClient::can_handle("rtmp://tv.local"));
        assert!(!HtspClient::can_handle("htsp:tv.local"));
    }

    #[test]
    fn test_split_url() {
        assert_eq!(
            split_url("htsp://tv.local").unwrap(),
            ("tv.local", DEFAULT_PORT, "")
        );
        assert_eq!(
            split_url("htsp://tv.local/").unwrap(),
            ("tv.local", DEFAULT_PORT, "/")
        );
        assert_eq!(
            split_url("htsp://tv.local:123/tags").unwrap(),
            ("tv.local", 123, "/tags")
        );
        assert_eq!(
            split_url("htsp://10.0.0.2:9982/channel/7").unwrap(),
            ("10.0.0.2", 9982, "/channel/7")
        );
    }

    #[test]
    fn test_split_url_rejects_garbage() {
        for url in [
            "http://tv.local",
            "htsp://",
            "htsp://:9982",
            "htsp://tv.local:notaport/",
            "htsp://tv.local:99999/",
        ] {
            assert!(matches!(
                split_url(url),
                Err(Error::Connection(ConnectionError::InvalidUrl(_)))
            ));
        }
    }

    #[tokio::test]
    async fn test_client_end_to_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut sock = accept_and_handshake(&listener).await;

            let sub = recv_req(&mut sock).await;
            assert_eq!(sub.method(), Some("subscribe"));
            assert_eq!(sub.get_u32("channelId"), Some(3));
            send_msg(&mut sock, &reply_to(&sub)).await;

            let unsub = recv_req(&mut sock).await;
            assert_eq!(unsub.method(), Some("unsubscribe"));
            send_msg(&mut sock, &reply_to(&unsub)).await;

            assert!(recv_eof(&mut sock).await);
        });

        let client = HtspClient::default();
        let (pipe, _queues) = MediaPipe::new(PipeConfig::default());
        let url = format!("htsp://{}:{}/channel/3", addr.ip(), addr.port());

        assert!(HtspClient::can_handle(&url));

        pipe.post_event(PlayerEvent::Stop);
        let end = client.play_video(&url, pipe.clone(), 0).await.unwrap();
        assert_eq!(end, PlaybackEnd::Stopped);
        assert_eq!(pipe.status(), PlaybackStatus::Stop);

        server.await.unwrap();
    }
}
