//! Channel and tag listings
//!
//! The directory view of a server: channels at the root, tags as
//! folders, each tag listing its member channels. Listings are
//! snapshots of the metadata the server has pushed so far; nothing
//! here sends a request of its own.

use crate::connection::{Channel, ConnectionRegistry, Tag};
use crate::error::{ConnectionError, Result};

/// One directory level
#[derive(Debug, Clone)]
pub enum Listing {
    Channels(Vec<Channel>),
    Tags(Vec<Tag>),
}

enum Level<'a> {
    Root,
    Tags,
    Tag(&'a str),
}

fn level(path: &str) -> Result<Level<'_>> {
    match path {
        "" | "/" => Ok(Level::Root),
        "/tags" => Ok(Level::Tags),
        other => other
            .strip_prefix("/tag/")
            .map(Level::Tag)
            .ok_or_else(|| ConnectionError::InvalidUrl(other.to_string()).into()),
    }
}

/// Resolve a browse path against a server's pushed metadata
pub async fn browse(
    registry: &ConnectionRegistry,
    host: &str,
    port: u16,
    path: &str,
) -> Result<Listing> {
    // Reject bad paths before paying for a connection
    let level = level(path)?;

    let conn = registry.acquire(host, port).await?;

    let listing = match level {
        Level::Root => Listing::Channels(conn.meta.channels()),
        Level::Tags => Listing::Tags(conn.meta.tags()),
        Level::Tag(id) => Listing::Channels(conn.meta.tag_channels(id)),
    };

    registry.release(&conn).await;
    Ok(listing)
}
