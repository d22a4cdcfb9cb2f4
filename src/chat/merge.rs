use uuid::Uuid;

use crate::models::messages::MessageResponse;

/// In-memory state of the conversation a session currently has open.
///
/// Store events are folded in as partial, idempotent patches: a locally
/// appended message and its realtime echo may both arrive, and the transport
/// may deliver events for one conversation out of created_at order. Dedup is
/// by message id; the list is re-sorted after every application so it is
/// always ascending by (created_at, id).
#[derive(Debug, Clone)]
pub struct ConversationView {
    pub conversation_id: Uuid,
    messages: Vec<MessageResponse>,
}

impl ConversationView {
    /// Build a view from a freshly loaded history (assumed complete, any order).
    pub fn new(conversation_id: Uuid, mut messages: Vec<MessageResponse>) -> Self {
        sort_ascending(&mut messages);
        Self {
            conversation_id,
            messages,
        }
    }

    /// An empty view for a conversation with no persisted messages yet.
    pub fn empty(conversation_id: Uuid) -> Self {
        Self {
            conversation_id,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[MessageResponse] {
        &self.messages
    }

    pub fn contains(&self, message_id: Uuid) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    /// Fold in an inserted message. Returns true if the view changed.
    ///
    /// Events for other conversations and ids already present are ignored, so
    /// applying the same insert twice leaves the view unchanged.
    pub fn apply_insert(&mut self, message: MessageResponse) -> bool {
        if message.conversation_id != self.conversation_id {
            return false;
        }
        if self.contains(message.id) {
            return false;
        }

        self.messages.push(message);
        sort_ascending(&mut self.messages);
        true
    }

    /// Fold in an updated message. Returns true if the view changed.
    ///
    /// Replaces the matching row by id. An update for a row the view has not
    /// seen (delivered before — or instead of — its insert) is upserted, so
    /// at-least-once, out-of-order delivery cannot lose the row.
    pub fn apply_update(&mut self, message: MessageResponse) -> bool {
        if message.conversation_id != self.conversation_id {
            return false;
        }

        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                if *existing == message {
                    return false;
                }
                *existing = message;
            }
            None => self.messages.push(message),
        }

        sort_ascending(&mut self.messages);
        true
    }
}

fn sort_ascending(messages: &mut [MessageResponse]) {
    messages.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::messages::OfferStatus;
    use chrono::{Duration, TimeZone, Utc};

    fn msg(conversation: Uuid, offset_secs: i64) -> MessageResponse {
        MessageResponse {
            id: Uuid::new_v4(),
            conversation_id: conversation,
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            product_id: None,
            body: "hello".to_string(),
            is_read: false,
            is_offer: false,
            offer_status: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn insert_is_idempotent_by_id() {
        let conv = Uuid::new_v4();
        let mut view = ConversationView::empty(conv);
        let m = msg(conv, 0);

        assert!(view.apply_insert(m.clone()));
        assert!(!view.apply_insert(m));
        assert_eq!(view.messages().len(), 1);
    }

    #[test]
    fn out_of_order_inserts_end_up_sorted() {
        let conv = Uuid::new_v4();
        let mut view = ConversationView::empty(conv);
        let m1 = msg(conv, 0);
        let m2 = msg(conv, 60);

        // m2 arrives before m1.
        view.apply_insert(m2.clone());
        view.apply_insert(m1.clone());

        let ids: Vec<Uuid> = view.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![m1.id, m2.id]);
    }

    #[test]
    fn insert_for_other_conversation_is_ignored() {
        let mut view = ConversationView::empty(Uuid::new_v4());
        assert!(!view.apply_insert(msg(Uuid::new_v4(), 0)));
        assert!(view.messages().is_empty());
    }

    #[test]
    fn update_replaces_by_id() {
        let conv = Uuid::new_v4();
        let m = msg(conv, 0);
        let mut view = ConversationView::new(conv, vec![m.clone()]);

        let mut resolved = m.clone();
        resolved.is_offer = true;
        resolved.offer_status = Some(OfferStatus::Accepted);

        assert!(view.apply_update(resolved.clone()));
        assert_eq!(view.messages().len(), 1);
        assert_eq!(view.messages()[0].offer_status, Some(OfferStatus::Accepted));

        // Same payload again: no change.
        assert!(!view.apply_update(resolved));
    }

    #[test]
    fn update_before_insert_upserts_the_row() {
        let conv = Uuid::new_v4();
        let earlier = msg(conv, 0);
        let later = msg(conv, 30);
        let mut view = ConversationView::new(conv, vec![later.clone()]);

        assert!(view.apply_update(earlier.clone()));
        let ids: Vec<Uuid> = view.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);

        // The echo of the original insert is now a no-op.
        assert!(!view.apply_insert(earlier));
        assert_eq!(view.messages().len(), 2);
    }

    #[test]
    fn loaded_history_is_normalized_to_ascending_order() {
        let conv = Uuid::new_v4();
        let m1 = msg(conv, 0);
        let m2 = msg(conv, 10);
        let m3 = msg(conv, 20);

        let view = ConversationView::new(conv, vec![m3.clone(), m1.clone(), m2.clone()]);
        let ids: Vec<Uuid> = view.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![m1.id, m2.id, m3.id]);
    }
}
