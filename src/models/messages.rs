use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Resolution state of an offer message, stored as a lowercase string.
/// NULL in the database means the message is not an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "declined")]
    Declined,
}

/// SeaORM entity for the `chat_messages` table.
///
/// Rows are immutable after insert except for `is_read` (flipped when the
/// receiver opens the conversation) and `offer_status` (flipped once when the
/// receiver resolves an offer). Conversations are not a table of their own;
/// they are derived from messages sharing a `conversation_id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chat_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub product_id: Option<Uuid>,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub is_read: bool,
    pub is_offer: bool,
    pub offer_status: Option<OfferStatus>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profiles::Entity",
        from = "Column::SenderId",
        to = "super::profiles::Column::Id"
    )]
    Sender,
    #[sea_orm(
        belongs_to = "super::profiles::Entity",
        from = "Column::ReceiverId",
        to = "super::profiles::Column::Id"
    )]
    Receiver,
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id"
    )]
    Product,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

/// DTO for appending a message to the log (plain chat or offer).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChatMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub product_id: Option<Uuid>,
    pub body: String,
    pub is_offer: bool,
    pub offer_status: Option<OfferStatus>,
}

impl CreateChatMessage {
    /// A plain (non-offer) chat message.
    pub fn plain(
        conversation_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        product_id: Option<Uuid>,
        body: String,
    ) -> Self {
        Self {
            conversation_id,
            sender_id,
            receiver_id,
            product_id,
            body,
            is_offer: false,
            offer_status: None,
        }
    }
}

/// Message representation sent over WebSocket and REST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub product_id: Option<Uuid>,
    pub body: String,
    pub is_read: bool,
    pub is_offer: bool,
    pub offer_status: Option<OfferStatus>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Model> for MessageResponse {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            product_id: m.product_id,
            body: m.body,
            is_read: m.is_read,
            is_offer: m.is_offer,
            offer_status: m.offer_status,
            created_at: m.created_at,
        }
    }
}

/// The other party of a conversation, as shown in the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: Uuid,
    pub full_name: Option<String>,
}

/// Product context attached to a conversation, if the thread is about one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub unit: String,
    pub image_url: Option<String>,
}

/// One entry of the conversation list, derived from the message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub participant: ParticipantInfo,
    pub product: Option<ProductInfo>,
    pub last_message: Option<MessageResponse>,
    pub unread_count: u64,
}
