use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{messages, products};

/// Verify the user participates in a conversation.
///
/// Conversations are derived from the message log, so membership means the
/// user appears as sender or receiver of at least one of its messages. An
/// empty conversation (freshly started, nothing persisted) is open to anyone
/// holding its id; it discloses nothing.
pub async fn verify_conversation_party(
    db: &DatabaseConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let any_message = messages::Entity::find()
        .filter(messages::Column::ConversationId.eq(conversation_id))
        .one(db)
        .await?;

    if any_message.is_none() {
        return Ok(());
    }

    let as_party = messages::Entity::find()
        .filter(messages::Column::ConversationId.eq(conversation_id))
        .filter(
            Condition::any()
                .add(messages::Column::SenderId.eq(user_id))
                .add(messages::Column::ReceiverId.eq(user_id)),
        )
        .one(db)
        .await?;

    if as_party.is_none() {
        return Err(ApiError::authorization(
            "You are not a party to this conversation",
        ));
    }

    Ok(())
}

/// Verify the user owns a product. Returns the product on success.
pub async fn verify_product_owner(
    db: &DatabaseConnection,
    product_id: Uuid,
    user_id: Uuid,
) -> Result<products::Model, ApiError> {
    let product = products::Entity::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Product {product_id} not found")))?;

    if product.farmer_id != user_id {
        return Err(ApiError::authorization("You do not own this product"));
    }

    Ok(product)
}
