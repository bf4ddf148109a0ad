//! Credential handling
//!
//! The server identifies a client by username plus a digest of the
//! password and the per-session challenge. Where credentials come from is
//! the embedder's business: implement [`CredentialSource`] over a keyring,
//! a prompt dialog or a config file and hand it to the client.

use sha1::{Digest, Sha1};

use crate::protocol::constants::{CHALLENGE_LEN, DIGEST_LEN};

/// A username/password pair
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Outcome of a credential lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialLookup {
    /// Credentials for the identity were found or freshly entered
    Found(Credentials),
    /// Nothing stored and nothing entered; proceed unauthenticated
    NotFound,
    /// The user declined; authentication must not be retried
    Rejected,
}

/// Source of credentials for server identities
///
/// `lookup` runs once per request attempt. The first attempt passes
/// `force_prompt = false` so a cached entry can be served; every retry
/// after an access denial passes `true`, the cue to ask the user again
/// instead of replaying what the server just refused.
pub trait CredentialSource: Send + Sync {
    fn lookup(&self, identity: &str, force_prompt: bool) -> CredentialLookup;
}

/// Source with no credentials at all; every lookup misses
#[derive(Debug, Default)]
pub struct NoCredentials;

impl CredentialSource for NoCredentials {
    fn lookup(&self, _identity: &str, _force_prompt: bool) -> CredentialLookup {
        CredentialLookup::NotFound
    }
}

/// Fixed username/password source
///
/// Serves the same pair on every plain lookup. A forced retry is
/// answered with [`CredentialLookup::Rejected`]: a fixed source has
/// nothing new to offer, and repeating a refused pair would retry
/// forever.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    /// Create a source holding one username/password pair
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            credentials: Credentials {
                username: username.to_string(),
                password: password.to_string(),
            },
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn lookup(&self, _identity: &str, force_prompt: bool) -> CredentialLookup {
        if force_prompt {
            CredentialLookup::Rejected
        } else {
            CredentialLookup::Found(self.credentials.clone())
        }
    }
}

/// Identity a server is known by in credential storage
pub fn identity(host: &str, port: u16) -> String {
    format!("htsp://{}:{}", host, port)
}

/// Digest of a password against the session challenge
pub fn digest(password: &str, challenge: &[u8; CHALLENGE_LEN]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(challenge);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[test]
    fn test_digest_known_vector() {
        let d = digest("mypass", &[0u8; CHALLENGE_LEN]);
        assert_eq!(hex(&d), "2affbc9a4274fd1006aead5975a1cc952506a3ad");
    }

    #[test]
    fn test_digest_depends_on_challenge() {
        let a = digest("mypass", &[0u8; CHALLENGE_LEN]);
        let b = digest("mypass", &[7u8; CHALLENGE_LEN]);
        assert_ne!(a, b);
        assert_eq!(hex(&b), "7acabcdbd7904b0f43a03d0a67941ab821e36a43");
    }

    #[test]
    fn test_identity_format() {
        assert_eq!(identity("tv.local", 9982), "htsp://tv.local:9982");
        assert_eq!(identity("10.0.0.2", 1234), "htsp://10.0.0.2:1234");
    }

    #[test]
    fn test_no_credentials_always_misses() {
        let source = NoCredentials;
        assert_eq!(source.lookup("htsp://a:1", false), CredentialLookup::NotFound);
        assert_eq!(source.lookup("htsp://a:1", true), CredentialLookup::NotFound);
    }

    #[test]
    fn test_static_credentials() {
        let source = StaticCredentials::new("admin", "secret");

        match source.lookup("htsp://a:1", false) {
            CredentialLookup::Found(c) => {
                assert_eq!(c.username, "admin");
                assert_eq!(c.password, "secret");
            }
            other => panic!("unexpected lookup result: {:?}", other),
        }

        // A forced retry ends the auth loop instead of repeating the pair
        assert_eq!(source.lookup("htsp://a:1", true), CredentialLookup::Rejected);
    }
}
