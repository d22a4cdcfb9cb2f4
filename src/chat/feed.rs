use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::models::messages::MessageResponse;
use crate::models::notifications;

/// A change event pushed from the persistent store to subscribed sessions.
///
/// Delivery is at-least-once from the subscriber's point of view; consumers
/// must deduplicate by row id. Ordering is only guaranteed per publisher call
/// sequence, not per conversation.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    MessageInserted(MessageResponse),
    MessageUpdated(MessageResponse),
    NotificationInserted(notifications::Model),
}

/// A handle to deliver store events to one connected session.
#[derive(Debug, Clone)]
struct SubscriberHandle {
    connection_id: Uuid,
    sender: mpsc::UnboundedSender<StoreEvent>,
}

/// Routes store change events to connected sessions, keyed by user.
///
/// Message inserts go to the receiver only (the sender already holds the row
/// from its own write). Message updates go to both parties, so an offer
/// resolution becomes visible to the original sender. Notification inserts go
/// to the recipient. A user may hold several connections at once.
pub struct ChangeFeed {
    subscribers: RwLock<HashMap<Uuid, Vec<SubscriberHandle>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection for a user. Returns the connection id (needed to
    /// unsubscribe) and the receiver the session should listen on.
    pub async fn subscribe(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<StoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();

        let handle = SubscriberHandle {
            connection_id,
            sender: tx,
        };

        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(user_id).or_insert_with(Vec::new).push(handle);

        (connection_id, rx)
    }

    /// Remove one connection for a user.
    pub async fn unsubscribe(&self, user_id: Uuid, connection_id: Uuid) {
        let mut subscribers = self.subscribers.write().await;

        if let Some(handles) = subscribers.get_mut(&user_id) {
            handles.retain(|h| h.connection_id != connection_id);
            if handles.is_empty() {
                subscribers.remove(&user_id);
            }
        }
    }

    /// Publish a freshly inserted message. Routed to the receiver.
    pub async fn publish_message_inserted(&self, message: MessageResponse) {
        self.send_to_user(message.receiver_id, StoreEvent::MessageInserted(message))
            .await;
    }

    /// Publish an updated message. Routed to both parties so the sender sees
    /// offer resolutions and read-state changes.
    pub async fn publish_message_updated(&self, message: MessageResponse) {
        self.send_to_user(
            message.sender_id,
            StoreEvent::MessageUpdated(message.clone()),
        )
        .await;
        self.send_to_user(message.receiver_id, StoreEvent::MessageUpdated(message))
            .await;
    }

    /// Publish a freshly inserted notification. Routed to the recipient.
    pub async fn publish_notification(&self, notification: notifications::Model) {
        self.send_to_user(
            notification.user_id,
            StoreEvent::NotificationInserted(notification),
        )
        .await;
    }

    async fn send_to_user(&self, user_id: Uuid, event: StoreEvent) {
        let subscribers = self.subscribers.read().await;
        if let Some(handles) = subscribers.get(&user_id) {
            for handle in handles {
                // If the send fails, the receiver has been dropped
                // (disconnected); unsubscribe() will clean it up.
                let _ = handle.sender.send(event.clone());
            }
        }
    }

    /// Check whether a user currently has at least one live connection.
    pub async fn is_user_connected(&self, user_id: Uuid) -> bool {
        let subscribers = self.subscribers.read().await;
        subscribers
            .get(&user_id)
            .map(|handles| !handles.is_empty())
            .unwrap_or(false)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
