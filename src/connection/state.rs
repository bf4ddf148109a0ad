//! Channel and tag metadata store
//!
//! After async metadata is enabled the server pushes its whole channel
//! and tag model, then keeps it updated for the life of the connection.
//! One lock covers both maps; updates arrive serialized on the worker
//! task, so contention is limited to listing snapshots.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::msg::Msg;

/// A programme in a channel's listing
#[derive(Debug, Clone, PartialEq)]
pub struct EpgEvent {
    pub event_id: u32,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    /// Start time, seconds since the epoch
    pub start: Option<i64>,
    /// Stop time, seconds since the epoch
    pub stop: Option<i64>,
}

impl EpgEvent {
    /// Build an event from a getEvents reply entry; `eventId` is required
    pub fn from_msg(m: &Msg) -> Option<Self> {
        Some(Self {
            event_id: m.get_u32("eventId")?,
            title: m.get_str("title").map(str::to_string),
            subtitle: m.get_str("subtitle").map(str::to_string),
            description: m.get_str("description").map(str::to_string),
            start: m.get_s64("start"),
            stop: m.get_s64("stop"),
        })
    }
}

/// A TV channel announced by the server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub id: u32,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub number: Option<u32>,
    /// Programme on air right now
    pub current_event: Option<EpgEvent>,
    /// Programme following the current one
    pub next_event: Option<EpgEvent>,
}

/// A channel grouping announced by the server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: String,
    pub title: String,
    pub icon: Option<String>,
    pub titled_icon: bool,
    /// Channel ids belonging to this tag
    pub members: Vec<u32>,
}

/// Event ids a channel update wants resolved into full events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRefs {
    pub channel_id: u32,
    /// Id of the on-air event, when the channel has one
    pub current: Option<u32>,
    /// Id of the following event
    pub next: Option<u32>,
}

#[derive(Debug, Default)]
struct MetaState {
    channels: HashMap<u32, Channel>,
    tags: HashMap<String, Tag>,
}

/// Shared store for the server's channel and tag model
#[derive(Debug, Default)]
pub struct MetaStore {
    inner: Mutex<MetaState>,
}

impl MetaStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a channel add or update
    ///
    /// Absent fields keep their previous values. Returns the event ids
    /// to resolve, or `None` when the message named no channel or updated
    /// an unknown one.
    pub fn apply_channel(&self, m: &Msg, create: bool) -> Option<EventRefs> {
        let id = m.get_u32("channelId")?;

        let mut state = self.inner.lock().unwrap();
        let channel = if create {
            state.channels.entry(id).or_insert_with(|| Channel {
                id,
                ..Channel::default()
            })
        } else {
            match state.channels.get_mut(&id) {
                Some(channel) => channel,
                None => {
                    tracing::error!(channel_id = id, "Update for unknown channel");
                    return None;
                }
            }
        };

        if let Some(name) = m.get_str("channelName") {
            channel.name = Some(name.to_string());
        }
        if let Some(icon) = m.get_str("channelIcon") {
            channel.icon = Some(icon.to_string());
        }
        if let Some(number) = m.get_u32("channelNumber") {
            if number > 0 {
                channel.number = Some(number);
            }
        }

        Some(EventRefs {
            channel_id: id,
            current: m.get_u32("eventId").filter(|&e| e != 0),
            next: m.get_u32("nextEventId").filter(|&e| e != 0),
        })
    }

    /// Store the resolved current and next events for a channel
    pub fn set_channel_events(
        &self,
        channel_id: u32,
        current: Option<EpgEvent>,
        next: Option<EpgEvent>,
    ) {
        let mut state = self.inner.lock().unwrap();
        if let Some(channel) = state.channels.get_mut(&channel_id) {
            channel.current_event = current;
            channel.next_event = next;
        }
    }

    /// Remove a deleted channel
    pub fn remove_channel(&self, m: &Msg) {
        let Some(id) = m.get_u32("channelId") else {
            return;
        };
        self.inner.lock().unwrap().channels.remove(&id);
    }

    /// Apply a tag add or update
    ///
    /// Name, icon and the titled-icon flag always track the message; the
    /// member list is replaced only when the message carries one.
    pub fn apply_tag(&self, m: &Msg, create: bool) {
        let Some(id) = m.get_str("tagId") else {
            return;
        };

        let mut state = self.inner.lock().unwrap();
        let tag = if create {
            state.tags.entry(id.to_string()).or_insert_with(|| Tag {
                id: id.to_string(),
                ..Tag::default()
            })
        } else {
            match state.tags.get_mut(id) {
                Some(tag) => tag,
                None => {
                    tracing::error!(tag_id = id, "Update for unknown tag");
                    return;
                }
            }
        };

        tag.title = m.get_str("tagName").unwrap_or("").to_string();
        tag.icon = m.get_str("tagIcon").map(str::to_string);
        tag.titled_icon = m.get_u32("tagTitledIcon").unwrap_or(0) != 0;

        if let Some(members) = m.get_list("members") {
            tag.members = members
                .iter()
                .filter_map(|v| v.as_s64())
                .filter_map(|v| u32::try_from(v).ok())
                .collect();
        }
    }

    /// Remove a deleted tag
    pub fn remove_tag(&self, m: &Msg) {
        let Some(id) = m.get_str("tagId") else {
            return;
        };
        self.inner.lock().unwrap().tags.remove(id);
    }

    /// Snapshot one channel
    pub fn channel(&self, id: u32) -> Option<Channel> {
        self.inner.lock().unwrap().channels.get(&id).cloned()
    }

    /// Snapshot of all channels in listing order
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self
            .inner
            .lock()
            .unwrap()
            .channels
            .values()
            .cloned()
            .collect();
        channels.sort_by(channel_order);
        channels
    }

    /// Snapshot one tag
    pub fn tag(&self, id: &str) -> Option<Tag> {
        self.inner.lock().unwrap().tags.get(id).cloned()
    }

    /// Snapshot of all tags, sorted by title
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.inner.lock().unwrap().tags.values().cloned().collect();
        tags.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        tags
    }

    /// Channels of a tag in listing order; unknown members are skipped
    pub fn tag_channels(&self, id: &str) -> Vec<Channel> {
        let state = self.inner.lock().unwrap();
        let Some(tag) = state.tags.get(id) else {
            return Vec::new();
        };
        let mut channels: Vec<Channel> = tag
            .members
            .iter()
            .filter_map(|cid| state.channels.get(cid).cloned())
            .collect();
        channels.sort_by(channel_order);
        channels
    }
}

/// Listing order: numbered channels first in numeric order, then the
/// rest by name
fn channel_order(a: &Channel, b: &Channel) -> Ordering {
    match (a.number, b.number) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| name_of(a).cmp(name_of(b))),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => name_of(a).cmp(name_of(b)).then_with(|| a.id.cmp(&b.id)),
    }
}

fn name_of(c: &Channel) -> &str {
    c.name.as_deref().unwrap_or("")
}
