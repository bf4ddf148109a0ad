//! Async metadata worker task
//!
//! Unsolicited messages are dispatched off the read path because some of
//! them trigger follow-up requests (resolving a channel's event ids into
//! full events) and those must not stall stream input. The queue closes
//! when the reader task ends, which in turn ends this task.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::state::{EpgEvent, EventRefs};
use super::Connection;
use crate::msg::Msg;

/// Run the dispatch loop until the reader closes the queue
pub async fn run(conn: Arc<Connection>, mut queue: mpsc::UnboundedReceiver<Msg>) {
    while let Some(m) = queue.recv().await {
        dispatch(&conn, &m).await;
    }
    tracing::debug!(host = %conn.host(), "Worker shut down");
}

async fn dispatch(conn: &Arc<Connection>, m: &Msg) {
    let Some(method) = m.method() else {
        return;
    };

    match method {
        "channelAdd" => {
            if let Some(refs) = conn.meta.apply_channel(m, true) {
                update_events(conn, refs).await;
            }
        }
        "channelUpdate" => {
            if let Some(refs) = conn.meta.apply_channel(m, false) {
                update_events(conn, refs).await;
            }
        }
        "channelDelete" => conn.meta.remove_channel(m),
        "tagAdd" => conn.meta.apply_tag(m, true),
        "tagUpdate" => conn.meta.apply_tag(m, false),
        "tagDelete" => conn.meta.remove_tag(m),
        "subscriptionStart" => conn.subscriptions.service_start(m),
        "subscriptionStop" => conn.subscriptions.service_stop(m),
        "subscriptionStatus" => conn.subscriptions.service_status(m),
        "queueStatus" => conn.subscriptions.queue_status(m),
        "signalStatus" => {
            // Recognized but carries nothing we surface
        }
        "timeshiftStatus" | "initialSyncCompleted" => {
            // Nothing to do
        }
        other => {
            tracing::debug!(method = other, "Unknown async method received");
        }
    }
}

/// Resolve a channel's current and next event ids into full events
async fn update_events(conn: &Arc<Connection>, refs: EventRefs) {
    let (start, following, starts_at_current) = match (refs.current, refs.next) {
        (Some(id), _) => (id, 1u32, true),
        (None, Some(id)) => (id, 0u32, false),
        (None, None) => {
            conn.meta.set_channel_events(refs.channel_id, None, None);
            return;
        }
    };

    let mut req = Msg::request("getEvents");
    req.put_u32("eventId", start);
    req.put_u32("numFollowing", following);

    let reply = match conn.call(req).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(
                channel_id = refs.channel_id,
                error = %e,
                "Event fetch failed"
            );
            return;
        }
    };

    let mut events = reply
        .get_list("events")
        .unwrap_or(&[])
        .iter()
        .filter_map(|v| v.as_map())
        .filter_map(EpgEvent::from_msg);

    let (current, next) = if starts_at_current {
        (events.next(), events.next())
    } else {
        (None, events.next())
    };

    conn.meta.set_channel_events(refs.channel_id, current, next);
}
