use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::messages::{ConversationSummary, MessageResponse, OfferStatus};
use crate::models::notifications;

// ── Client -> Server messages ──

/// Messages the client sends to the server over WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a conversation: load its history into the session and mark
    /// addressed messages as read. Works for freshly started conversations
    /// with no persisted messages yet.
    OpenConversation {
        conversation_id: Uuid,
        receiver_id: Uuid,
        product_id: Option<Uuid>,
    },
    /// Stop applying merge events to the open conversation. In-flight writes
    /// are unaffected.
    CloseConversation,
    /// Send a plain chat message in the open conversation.
    SendMessage { body: String },
    /// Send a structured offer in the open conversation.
    MakeOffer { quantity: u32, unit_price: f64 },
    /// Accept or decline a pending offer addressed to this user.
    RespondOffer {
        message_id: Uuid,
        decision: OfferDecision,
    },
    /// Mark all messages addressed to this user in the open conversation read.
    MarkRead,
}

/// Terminal resolution chosen by the offer's receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferDecision {
    Accepted,
    Declined,
}

impl From<OfferDecision> for OfferStatus {
    fn from(d: OfferDecision) -> Self {
        match d {
            OfferDecision::Accepted => OfferStatus::Accepted,
            OfferDecision::Declined => OfferStatus::Declined,
        }
    }
}

// ── Server -> Client messages ──

/// Messages the server sends to the client over WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full ordered history delivered after OpenConversation.
    ConversationOpened {
        conversation_id: Uuid,
        messages: Vec<MessageResponse>,
    },
    /// A message was inserted into the open conversation (or an echo of the
    /// sender's own message, carrying the server-assigned id and timestamp).
    NewMessage { message: MessageResponse },
    /// A message in the open conversation changed (offer resolved, read flag).
    MessageUpdated { message: MessageResponse },
    /// Refreshed conversation list after a merge-relevant event.
    Conversations { conversations: Vec<ConversationSummary> },
    /// Outcome of a RespondOffer call, including side effects that could not
    /// be completed after the status change committed.
    OfferResult {
        message: MessageResponse,
        contact_revealed: bool,
        warnings: Vec<String>,
    },
    /// A notification was appended to this user's feed.
    Notification { notification: notifications::Model },
    /// An error occurred.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_decodes_from_tagged_json() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"respond_offer","message_id":"7f2c1e9a-0b2f-4a3e-9a34-6f1d2b8c9e01","decision":"accepted"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::RespondOffer { decision, .. } => {
                assert_eq!(decision, OfferDecision::Accepted);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn offer_decision_maps_to_terminal_status() {
        assert_eq!(
            OfferStatus::from(OfferDecision::Accepted),
            OfferStatus::Accepted
        );
        assert_eq!(
            OfferStatus::from(OfferDecision::Declined),
            OfferStatus::Declined
        );
    }
}
