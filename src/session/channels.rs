use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Serialized event fanned out to every connection in a session's channel.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    /// JSON payload, serialized once per broadcast.
    pub data: String,
}

/// Registry of per-session broadcast channels.
///
/// Each live session owns at most one `tokio::sync::broadcast` channel;
/// connections subscribe when they bind to a session and the channel is
/// dropped once the last receiver disappears. Broadcasting to a session
/// nobody listens to is a silent no-op.
pub struct ChannelRegistry {
    capacity: usize,
    channels: DashMap<Uuid, broadcast::Sender<ChannelEvent>>,
}

impl ChannelRegistry {
    /// Build a registry whose channels buffer `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a session's channel, creating the channel on first use.
    pub fn subscribe(&self, session_id: Uuid) -> broadcast::Receiver<ChannelEvent> {
        self.channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send `event` to every connection currently subscribed to the session.
    pub fn broadcast(&self, session_id: Uuid, event: ChannelEvent) {
        if let Some(sender) = self.channels.get(&session_id) {
            let _ = sender.send(event);
        }
    }

    /// Drop the session's channel if nobody is listening anymore.
    pub fn release(&self, session_id: Uuid) {
        self.channels
            .remove_if(&session_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Number of connections currently subscribed to the session.
    pub fn receiver_count(&self, session_id: Uuid) -> usize {
        self.channels
            .get(&session_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
