use sea_orm::prelude::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::messages::{self, CreateChatMessage, OfferStatus};

/// Append a message to the log.
///
/// The store performs no aggregation; it only validates that the required
/// references are present before the row is written.
pub async fn insert_message(
    db: &DatabaseConnection,
    input: CreateChatMessage,
) -> Result<messages::Model, ApiError> {
    if input.conversation_id.is_nil() {
        return Err(ApiError::validation("conversation_id is required"));
    }
    if input.sender_id.is_nil() || input.receiver_id.is_nil() {
        return Err(ApiError::validation("sender_id and receiver_id are required"));
    }
    if input.sender_id == input.receiver_id {
        return Err(ApiError::validation("sender and receiver must differ"));
    }
    if input.body.trim().is_empty() {
        return Err(ApiError::validation("message body cannot be empty"));
    }

    let new_message = messages::ActiveModel {
        id: Set(Uuid::new_v4()),
        conversation_id: Set(input.conversation_id),
        sender_id: Set(input.sender_id),
        receiver_id: Set(input.receiver_id),
        product_id: Set(input.product_id),
        body: Set(input.body),
        is_read: Set(false),
        is_offer: Set(input.is_offer),
        offer_status: Set(input.offer_status),
        created_at: Set(chrono::Utc::now()),
    };

    Ok(new_message.insert(db).await?)
}

/// Fetch the full history of one conversation, ascending by created_at.
pub async fn get_messages_by_conversation(
    db: &DatabaseConnection,
    conversation_id: Uuid,
) -> Result<Vec<messages::Model>, ApiError> {
    Ok(messages::Entity::find()
        .filter(messages::Column::ConversationId.eq(conversation_id))
        .order_by_asc(messages::Column::CreatedAt)
        .order_by_asc(messages::Column::Id)
        .all(db)
        .await?)
}

/// Fetch every message where the user is sender or receiver, descending by
/// created_at. This is the input of the conversation aggregation.
pub async fn get_messages_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<Vec<messages::Model>, ApiError> {
    Ok(messages::Entity::find()
        .filter(
            Condition::any()
                .add(messages::Column::SenderId.eq(user_id))
                .add(messages::Column::ReceiverId.eq(user_id)),
        )
        .order_by_desc(messages::Column::CreatedAt)
        .order_by_desc(messages::Column::Id)
        .all(db)
        .await?)
}

/// Fetch a single message by ID.
pub async fn get_message_by_id(
    db: &DatabaseConnection,
    message_id: Uuid,
) -> Result<Option<messages::Model>, ApiError> {
    Ok(messages::Entity::find_by_id(message_id).one(db).await?)
}

/// Mark all unread messages addressed to `receiver_id` in a conversation as
/// read. Returns the number of rows updated.
pub async fn mark_conversation_read(
    db: &DatabaseConnection,
    conversation_id: Uuid,
    receiver_id: Uuid,
) -> Result<u64, ApiError> {
    let result = messages::Entity::update_many()
        .col_expr(messages::Column::IsRead, Expr::value(true))
        .filter(messages::Column::ConversationId.eq(conversation_id))
        .filter(messages::Column::ReceiverId.eq(receiver_id))
        .filter(messages::Column::IsRead.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Resolve an offer message to `accepted` or `declined`.
///
/// The update is conditional on the row still being a pending offer, so a
/// concurrent response loses the race instead of overwriting a terminal
/// state. Zero rows affected resolves to NotFound (no such message) or
/// PreconditionFailed (already resolved / not an offer).
pub async fn update_offer_status(
    db: &DatabaseConnection,
    message_id: Uuid,
    status: OfferStatus,
) -> Result<messages::Model, ApiError> {
    let result = messages::Entity::update_many()
        .col_expr(messages::Column::OfferStatus, Expr::value(Some(status)))
        .filter(messages::Column::Id.eq(message_id))
        .filter(messages::Column::IsOffer.eq(true))
        .filter(messages::Column::OfferStatus.eq(OfferStatus::Pending))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return match get_message_by_id(db, message_id).await? {
            None => Err(ApiError::not_found(format!("Message {message_id} not found"))),
            Some(m) if !m.is_offer => {
                Err(ApiError::precondition("Message is not an offer"))
            }
            Some(_) => Err(ApiError::precondition(
                "Offer has already been resolved",
            )),
        };
    }

    get_message_by_id(db, message_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Message {message_id} not found")))
}

/// Look up an existing conversation between two users about a product, in
/// either direction. Used to make "start conversation" idempotent.
pub async fn find_existing_conversation(
    db: &DatabaseConnection,
    user_a: Uuid,
    user_b: Uuid,
    product_id: Option<Uuid>,
) -> Result<Option<Uuid>, ApiError> {
    let mut query = messages::Entity::find().filter(
        Condition::any()
            .add(
                Condition::all()
                    .add(messages::Column::SenderId.eq(user_a))
                    .add(messages::Column::ReceiverId.eq(user_b)),
            )
            .add(
                Condition::all()
                    .add(messages::Column::SenderId.eq(user_b))
                    .add(messages::Column::ReceiverId.eq(user_a)),
            ),
    );

    query = match product_id {
        Some(pid) => query.filter(messages::Column::ProductId.eq(pid)),
        None => query.filter(messages::Column::ProductId.is_null()),
    };

    Ok(query.one(db).await?.map(|m| m.conversation_id))
}
