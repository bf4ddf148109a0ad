//! Server connection lifecycle
//!
//! ```text
//! callers --- call() / subscribe() ---> write half (serialized)
//!
//! read half --> reader task --+-- muxpkt --> SubscriptionTable
//!                             +-- seq    --> waiting caller
//!                             +-- other  --> worker task --> MetaStore
//! ```
//!
//! One connection is shared by every caller targeting the same server;
//! the [`registry::ConnectionRegistry`] hands out references and tears
//! the connection down when the last one is released. Requests are
//! correlated to replies by sequence number, so any number of callers
//! can have requests in flight at once.

pub mod registry;
pub mod state;

mod reader;
mod worker;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::auth::{self, CredentialLookup, CredentialSource};
use crate::client::ClientConfig;
use crate::error::{AuthError, ConnectionError, Error, Result};
use crate::media::MediaPipe;
use crate::msg::Msg;
use crate::protocol::constants::{CHALLENGE_LEN, PROTOCOL_VERSION};
use crate::protocol::frame;
use crate::subscription::SubscriptionTable;

pub use registry::ConnectionRegistry;
pub use state::{Channel, EpgEvent, EventRefs, MetaStore, Tag};

/// Handles to a connection's background tasks
///
/// Held by the registry; dropping the shutdown sender or awaiting the
/// join handles is how a connection is taken apart.
#[derive(Debug)]
pub struct ConnectionTasks {
    pub shutdown: oneshot::Sender<()>,
    pub reader: JoinHandle<()>,
    pub worker: JoinHandle<()>,
}

/// One authenticated connection to a server
pub struct Connection {
    host: String,
    port: u16,
    client_name: String,
    max_frame_size: usize,
    credentials: Arc<dyn CredentialSource>,
    seq: AtomicU32,
    sid: AtomicU32,
    closed: AtomicBool,
    challenge: Mutex<Option<[u8; CHALLENGE_LEN]>>,
    server_name: Mutex<Option<String>>,
    server_version: Mutex<Option<u32>>,
    pending: Mutex<HashMap<u32, oneshot::Sender<Result<Msg>>>>,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    /// Channel and tag model pushed by the server
    pub meta: MetaStore,
    /// Live subscriptions and their playback pipes
    pub subscriptions: SubscriptionTable,
}

impl Connection {
    /// Connect, authenticate and start the background tasks
    ///
    /// The handshake (hello, login, enableAsyncMetadata) runs before any
    /// task exists, reading replies straight off the socket. A refused
    /// enableAsyncMetadata is logged and tolerated; the channel listing
    /// just stays empty.
    pub async fn open(
        host: &str,
        port: u16,
        config: &ClientConfig,
    ) -> Result<(Arc<Self>, ConnectionTasks)> {
        let stream = match tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect((host, port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ConnectionError::ConnectTimeout.into()),
        };
        stream.set_nodelay(true)?;

        let (mut read_half, write_half) = stream.into_split();

        let conn = Arc::new(Self {
            host: host.to_string(),
            port,
            client_name: config.client_name.clone(),
            max_frame_size: config.max_frame_size,
            credentials: Arc::clone(&config.credentials),
            seq: AtomicU32::new(0),
            sid: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            challenge: Mutex::new(None),
            server_name: Mutex::new(None),
            server_version: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            writer: tokio::sync::Mutex::new(write_half),
            meta: MetaStore::new(),
            subscriptions: SubscriptionTable::new(),
        });

        conn.login(&mut read_half).await?;

        tracing::info!(host = %conn.host, port = conn.port, "Connected and authenticated");

        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let tasks = ConnectionTasks {
            shutdown: shutdown_tx,
            reader: tokio::spawn(reader::run(
                Arc::clone(&conn),
                read_half,
                worker_tx,
                shutdown_rx,
            )),
            worker: tokio::spawn(worker::run(Arc::clone(&conn), worker_rx)),
        };

        // Best effort: a server refusing this still serves subscriptions
        if let Err(e) = conn.call(Msg::request("enableAsyncMetadata")).await {
            tracing::warn!(error = %e, "Async metadata not enabled");
        }

        Ok((conn, tasks))
    }

    /// Hostname this connection targets
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port this connection targets
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Name the server announced in the hello reply
    pub fn server_name(&self) -> Option<String> {
        self.server_name.lock().unwrap().clone()
    }

    /// Protocol version the server announced, once authenticated
    pub fn server_version(&self) -> Option<u32> {
        *self.server_version.lock().unwrap()
    }

    /// Incoming frame size limit
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Whether the connection has been lost or shut down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for its reply
    ///
    /// The request is stamped with a sequence number and the current
    /// credentials. A `noaccess` reply re-resolves credentials with the
    /// prompt flag raised and retries under a fresh sequence number; the
    /// loop ends when the source reports `Rejected`.
    pub async fn call(&self, mut m: Msg) -> Result<Msg> {
        let mut retry = 0u32;
        loop {
            if self.is_closed() {
                return Err(ConnectionError::Closed.into());
            }

            let seq = self.prepare(&mut m, retry)?;

            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().insert(seq, tx);

            // The teardown path drains the table after raising the flag;
            // this check catches an insert that slipped in after the drain
            if self.is_closed() {
                self.pending.lock().unwrap().remove(&seq);
                return Err(ConnectionError::Closed.into());
            }

            if let Err(e) = self.write(&m).await {
                self.pending.lock().unwrap().remove(&seq);
                return Err(e);
            }

            let reply = match rx.await {
                Ok(result) => result?,
                Err(_) => return Err(ConnectionError::ConnectionLost.into()),
            };

            if reply.get_u32("noaccess").unwrap_or(0) != 0 {
                retry += 1;
                continue;
            }

            return Ok(reply);
        }
    }

    /// Start receiving a channel's streams
    ///
    /// The subscription is registered before the request goes out, so a
    /// muxpkt racing the reply still finds its pipe. A reply carrying an
    /// error withdraws the registration again.
    pub async fn subscribe(&self, channel_id: u32, pipe: MediaPipe, weight: u32) -> Result<u32> {
        let sid = self.sid.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.subscriptions.insert(sid, pipe);

        let mut m = Msg::request("subscribe");
        m.put_u32("channelId", channel_id);
        m.put_u32("subscriptionId", sid);
        m.put_u32("weight", weight);

        match self.call(m).await {
            Ok(reply) => {
                if let Some(error) = reply.error_text() {
                    self.subscriptions.remove(sid);
                    return Err(Error::Server(error.to_string()));
                }
                tracing::debug!(sid = sid, channel_id = channel_id, "Subscribed");
                Ok(sid)
            }
            Err(e) => {
                self.subscriptions.remove(sid);
                Err(e)
            }
        }
    }

    /// Stop a subscription and drop its table entry
    pub async fn unsubscribe(&self, sid: u32) -> Result<()> {
        let mut m = Msg::request("unsubscribe");
        m.put_u32("subscriptionId", sid);

        let result = self.call(m).await;
        self.subscriptions.remove(sid);
        result.map(|_| ())
    }

    /// Hand a sequenced reply to its waiting caller
    pub fn complete(&self, seq: u32, m: Msg) {
        let waiter = self.pending.lock().unwrap().remove(&seq);
        match waiter {
            Some(tx) => {
                let _ = tx.send(Ok(m));
            }
            None => tracing::warn!(seq = seq, "Reply with no waiting request"),
        }
    }

    /// Fatal transport error: fail every caller and tell every
    /// subscription the connection is gone
    pub fn connection_lost(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.fail_pending(ConnectionError::ConnectionLost);
        self.subscriptions.connection_lost();
    }

    /// Deliberate shutdown: fail every caller without alarming anyone
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.fail_pending(ConnectionError::Closed);
    }

    fn fail_pending(&self, reason: ConnectionError) {
        let drained: Vec<_> = self.pending.lock().unwrap().drain().collect();
        for (_, tx) in drained {
            let _ = tx.send(Err(reason.clone().into()));
        }
    }

    /// Authenticate on a fresh socket, reading replies directly
    async fn login(&self, socket: &mut OwnedReadHalf) -> Result<()> {
        let mut hello = Msg::request("hello");
        hello.put_str("clientname", &self.client_name);
        hello.put_u32("htspversion", PROTOCOL_VERSION);

        let reply = self.call_direct(socket, hello).await?;

        let bytes = reply
            .get_bin("challenge")
            .ok_or(AuthError::InvalidChallenge(0))?;
        let challenge: [u8; CHALLENGE_LEN] = bytes[..]
            .try_into()
            .map_err(|_| AuthError::InvalidChallenge(bytes.len()))?;
        *self.challenge.lock().unwrap() = Some(challenge);

        if let Some(name) = reply.get_str("servername") {
            *self.server_name.lock().unwrap() = Some(name.to_string());
        }
        if let Some(version) = reply.get_u32("htspversion") {
            *self.server_version.lock().unwrap() = Some(version);
        }

        let mut login = Msg::request("login");
        login.put_u32("htspversion", PROTOCOL_VERSION);
        self.call_direct(socket, login).await?;

        Ok(())
    }

    /// Request/reply with the reply read straight off the socket; only
    /// used during the handshake, before the reader task exists
    async fn call_direct(&self, socket: &mut OwnedReadHalf, mut m: Msg) -> Result<Msg> {
        let mut retry = 0u32;
        loop {
            let seq = self.prepare(&mut m, retry)?;
            self.write(&m).await?;

            let reply = loop {
                let reply = frame::read_frame(socket, self.max_frame_size).await?;
                if reply.get_u32("seq") == Some(seq) {
                    break reply;
                }
                tracing::warn!(expected = seq, "Out-of-turn frame during handshake dropped");
            };

            if reply.get_u32("noaccess").unwrap_or(0) != 0 {
                retry += 1;
                continue;
            }

            return Ok(reply);
        }
    }

    /// Stamp a fresh sequence number and the current credentials on a
    /// request; returns the sequence number
    fn prepare(&self, m: &mut Msg, retry: u32) -> Result<u32> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        m.put_u32("seq", seq);

        let identity = auth::identity(&self.host, self.port);
        match self.credentials.lookup(&identity, retry > 0) {
            CredentialLookup::Rejected => return Err(AuthError::Rejected.into()),
            CredentialLookup::NotFound => {
                m.remove("username");
                m.remove("digest");
            }
            CredentialLookup::Found(creds) => {
                m.put_str("username", &creds.username);
                let challenge = *self.challenge.lock().unwrap();
                match challenge {
                    Some(challenge) => {
                        let digest = auth::digest(&creds.password, &challenge);
                        m.put_bin("digest", Bytes::copy_from_slice(&digest));
                    }
                    // No challenge yet means this is the hello itself
                    None => m.remove("digest"),
                }
            }
        }

        Ok(seq)
    }

    async fn write(&self, m: &Msg) -> Result<()> {
        let mut writer = self.writer.lock().await;
        frame::write_frame(&mut *writer, m).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
