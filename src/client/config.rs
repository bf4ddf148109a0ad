//! Client configuration

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialSource, NoCredentials};
use crate::protocol::constants::MAX_FRAME_SIZE;

/// Client configuration options
#[derive(Clone)]
pub struct ClientConfig {
    /// Name announced to the server in the hello exchange
    pub client_name: String,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Incoming frames larger than this are dropped
    pub max_frame_size: usize,

    /// Where usernames and passwords come from
    pub credentials: Arc<dyn CredentialSource>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: "htsp-rs".to_string(),
            connect_timeout: Duration::from_secs(3),
            max_frame_size: MAX_FRAME_SIZE,
            credentials: Arc::new(NoCredentials),
        }
    }
}

impl ClientConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name announced to the server
    pub fn client_name(mut self, name: &str) -> Self {
        self.client_name = name.to_string();
        self
    }

    /// Set the TCP connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the incoming frame size limit
    pub fn max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Set the credential source
    pub fn credentials<S: CredentialSource + 'static>(mut self, source: S) -> Self {
        self.credentials = Arc::new(source);
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_name", &self.client_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_frame_size", &self.max_frame_size)
            .finish_non_exhaustive()
    }
}
