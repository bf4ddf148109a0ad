//! Connection sharing across players and directory listings
//!
//! Every player and every listing request targeting the same server
//! address borrows the same connection. The registry counts borrowers
//! and tears the connection down when the last one is given back; a
//! connection that died in the meantime is replaced on the next
//! acquire instead of being handed out again.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::client::ClientConfig;
use crate::error::Result;

use super::{Connection, ConnectionTasks};

struct Entry {
    conn: Arc<Connection>,
    refcount: usize,
    tasks: ConnectionTasks,
}

/// Reference-counted pool of open connections, keyed by address
pub struct ConnectionRegistry {
    config: ClientConfig,
    inner: Mutex<HashMap<String, Entry>>,
}

impl ConnectionRegistry {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Borrow the connection for an address, opening one if needed
    ///
    /// Two callers racing to open the same address both succeed; the
    /// loser's connection is folded back up on the spot and the winner's
    /// is shared.
    pub async fn acquire(&self, host: &str, port: u16) -> Result<Arc<Connection>> {
        let key = key(host, port);

        if let Some(conn) = self.try_reuse(&key) {
            tracing::debug!(host = host, port = port, "Reusing pooled connection");
            return Ok(conn);
        }

        // Opened without holding the lock; the handshake can take a while
        let (conn, tasks) = Connection::open(host, port, &self.config).await?;

        let (winner, loser) = self.adopt(key, conn, tasks);
        if let Some((conn, tasks)) = loser {
            teardown(conn, tasks).await;
        }
        Ok(winner)
    }

    /// Give back a connection handed out by [`acquire`](Self::acquire)
    ///
    /// The last release tears the connection down. A handle whose pool
    /// entry was already replaced (the connection died and the address
    /// was reopened) is simply dropped.
    pub async fn release(&self, conn: &Arc<Connection>) {
        let key = key(conn.host(), conn.port());

        let retired = {
            let mut inner = self.inner.lock().unwrap();
            let last = match inner.get_mut(&key) {
                Some(entry) if Arc::ptr_eq(&entry.conn, conn) => {
                    entry.refcount -= 1;
                    entry.refcount == 0
                }
                _ => false,
            };
            if last {
                inner.remove(&key)
            } else {
                None
            }
        };

        if let Some(entry) = retired {
            teardown(entry.conn, entry.tasks).await;
        }
    }

    fn try_reuse(&self, key: &str) -> Option<Arc<Connection>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(key) {
            Some(entry) if !entry.conn.is_closed() => {
                entry.refcount += 1;
                Some(Arc::clone(&entry.conn))
            }
            _ => None,
        }
    }

    /// File a freshly opened connection under its key, unless a live one
    /// appeared in the meantime; returns the connection to hand out and,
    /// on a lost race, our own pair to fold back up
    fn adopt(
        &self,
        key: String,
        conn: Arc<Connection>,
        tasks: ConnectionTasks,
    ) -> (
        Arc<Connection>,
        Option<(Arc<Connection>, ConnectionTasks)>,
    ) {
        let mut inner = self.inner.lock().unwrap();

        let live = inner.get(&key).map(|e| !e.conn.is_closed()).unwrap_or(false);
        if live {
            if let Some(entry) = inner.get_mut(&key) {
                entry.refcount += 1;
                return (Arc::clone(&entry.conn), Some((conn, tasks)));
            }
        }

        // A dead entry is dropped here; its tasks have already finished
        // and straggling handles release as no-ops
        inner.insert(
            key,
            Entry {
                conn: Arc::clone(&conn),
                refcount: 1,
                tasks,
            },
        );
        (conn, None)
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &inner.len())
            .finish()
    }
}

/// Shut a connection down and wait for its tasks to finish
async fn teardown(conn: Arc<Connection>, tasks: ConnectionTasks) {
    conn.close();
    let ConnectionTasks {
        shutdown,
        reader,
        worker,
    } = tasks;
    let _ = shutdown.send(());
    let _ = reader.await;
    let _ = worker.await;
    tracing::debug!(host = %conn.host(), port = conn.port(), "Connection torn down");
}

fn key(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_acquire_is_refcounted() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut sock = accept_and_handshake(&listener).await;
            // Pool teardown closes the socket once the last user is gone
            assert!(recv_eof(&mut sock).await);
        });

        let registry = ConnectionRegistry::new(ClientConfig::default());
        let host = addr.ip().to_string();

        let first = registry.acquire(&host, addr.port()).await.unwrap();
        let second = registry.acquire(&host, addr.port()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        registry.release(&second).await;
        assert!(!first.is_closed());

        registry.release(&first).await;
        assert!(first.is_closed());

        drop(second);
        drop(first);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_dead_connection_is_replaced() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // The first connection is killed right after the handshake
            let sock = accept_and_handshake(&listener).await;
            drop(sock);

            // The reopened one stays up until the pool tears it down
            let mut sock = accept_and_handshake(&listener).await;
            assert!(recv_eof(&mut sock).await);
        });

        let registry = ConnectionRegistry::new(ClientConfig::default());
        let host = addr.ip().to_string();

        let stale = registry.acquire(&host, addr.port()).await.unwrap();
        wait_until(|| stale.is_closed()).await;

        let fresh = registry.acquire(&host, addr.port()).await.unwrap();
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert!(!fresh.is_closed());

        // The stale handle no longer belongs to the pool
        registry.release(&stale).await;
        assert!(!fresh.is_closed());

        registry.release(&fresh).await;
        drop(fresh);
        drop(stale);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_open_is_not_pooled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let registry = ConnectionRegistry::new(ClientConfig::default());
        let result = registry.acquire(&addr.ip().to_string(), addr.port()).await;
        assert!(result.is_err());
        assert_eq!(
            format!("{:?}", registry),
            "ConnectionRegistry { connections: 0 }"
        );
    }
}
