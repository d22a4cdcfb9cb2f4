use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::authorization::verify_conversation_party;
use crate::auth::middleware::AuthenticatedUser;
use crate::chat::aggregator;
use crate::chat::feed::ChangeFeed;
use crate::chat::offers;
use crate::chat::protocol::OfferDecision;
use crate::db::messages as message_db;
use crate::db::products as product_db;
use crate::db::profiles as profile_db;
use crate::error::ApiError;
use crate::models::messages::{
    ConversationSummary, CreateChatMessage, MessageResponse, ParticipantInfo, ProductInfo,
};

/// GET /api/chat/conversations
///
/// Derive the conversation list from the caller's message log: one entry per
/// conversation_id with the other party, product context, last message, and
/// unread count.
pub async fn get_conversations(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let conversations = aggregator::load_conversations(db.get_ref(), user.0.id, &[]).await?;
    Ok(HttpResponse::Ok().json(conversations))
}

/// Request body for POST /api/chat/conversations.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StartConversationRequest {
    pub receiver_id: Uuid,
    pub product_id: Option<Uuid>,
}

/// Response for POST /api/chat/conversations. `existing` is true when a
/// conversation between the two parties about the same product already has
/// messages; the fresh id is otherwise not persisted until the first message
/// is sent.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StartConversationResponse {
    pub conversation_id: Uuid,
    pub existing: bool,
    pub conversation: ConversationSummary,
}

/// POST /api/chat/conversations — start (or find) a conversation with another
/// user about an optional product.
pub async fn start_conversation(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    body: web::Json<StartConversationRequest>,
) -> Result<HttpResponse, ApiError> {
    let me = user.0.id;
    let input = body.into_inner();

    if input.receiver_id.is_nil() {
        return Err(ApiError::validation("receiver_id is required"));
    }
    if input.receiver_id == me {
        return Err(ApiError::validation(
            "You cannot start a conversation with yourself",
        ));
    }

    let existing =
        message_db::find_existing_conversation(db.get_ref(), me, input.receiver_id, input.product_id)
            .await?;
    let conversation_id = existing.unwrap_or_else(Uuid::new_v4);

    let participant = match profile_db::get_profile_by_id(db.get_ref(), input.receiver_id).await? {
        Some(p) => ParticipantInfo {
            id: p.id,
            full_name: p.full_name,
        },
        None => ParticipantInfo {
            id: input.receiver_id,
            full_name: Some("Unknown User".to_string()),
        },
    };

    let product = match input.product_id {
        Some(pid) => product_db::get_product_by_id(db.get_ref(), pid)
            .await?
            .map(|p| ProductInfo {
                id: p.id,
                name: p.name,
                price: p.price,
                unit: p.unit,
                image_url: p.image_url,
            }),
        None => None,
    };

    Ok(HttpResponse::Ok().json(StartConversationResponse {
        conversation_id,
        existing: existing.is_some(),
        conversation: ConversationSummary {
            id: conversation_id,
            participant,
            product,
            last_message: None,
            unread_count: 0,
        },
    }))
}

/// GET /api/chat/{conversation_id}/messages
///
/// Full ascending history for the conversation. Participants only. Messages
/// addressed to the caller are marked read as a side effect of opening.
pub async fn get_messages(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let conversation_id = path.into_inner();
    let user_id = user.0.id;

    verify_conversation_party(db.get_ref(), conversation_id, user_id).await?;

    let history = message_db::get_messages_by_conversation(db.get_ref(), conversation_id).await?;
    message_db::mark_conversation_read(db.get_ref(), conversation_id, user_id).await?;

    let response: Vec<MessageResponse> = history.into_iter().map(MessageResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

/// Request body for POST /api/chat/{conversation_id}/messages.
///
/// `receiver_id`/`product_id` are only needed for the first message of a
/// freshly started conversation; afterwards they are derived from the log.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
    pub receiver_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

/// POST /api/chat/{conversation_id}/messages — send a plain message.
pub async fn send_message(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    feed: web::Data<Arc<ChangeFeed>>,
    path: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, ApiError> {
    let conversation_id = path.into_inner();
    let user_id = user.0.id;
    let input = body.into_inner();

    verify_conversation_party(db.get_ref(), conversation_id, user_id).await?;

    let context = conversation_context(db.get_ref(), conversation_id, user_id).await?;
    let receiver_id = context
        .map(|(receiver, _)| receiver)
        .or(input.receiver_id)
        .ok_or_else(|| ApiError::validation("receiver_id is required for a new conversation"))?;
    let product_id = context.and_then(|(_, product)| product).or(input.product_id);

    let saved = message_db::insert_message(
        db.get_ref(),
        CreateChatMessage::plain(conversation_id, user_id, receiver_id, product_id, input.body),
    )
    .await?;

    let response = MessageResponse::from(saved);
    feed.publish_message_inserted(response.clone()).await;

    Ok(HttpResponse::Created().json(response))
}

/// PUT /api/chat/{conversation_id}/read — mark all messages addressed to the
/// caller in this conversation as read.
pub async fn mark_read(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let conversation_id = path.into_inner();

    let updated =
        message_db::mark_conversation_read(db.get_ref(), conversation_id, user.0.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}

/// Request body for POST /api/chat/{conversation_id}/offers.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateOfferRequest {
    pub quantity: u32,
    pub unit_price: f64,
    /// Only needed for the first message of a freshly started conversation.
    pub receiver_id: Option<Uuid>,
    /// Only needed when the conversation has no product context yet.
    pub product_id: Option<Uuid>,
}

/// POST /api/chat/{conversation_id}/offers — send a structured offer.
pub async fn create_offer(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    feed: web::Data<Arc<ChangeFeed>>,
    path: web::Path<Uuid>,
    body: web::Json<CreateOfferRequest>,
) -> Result<HttpResponse, ApiError> {
    let conversation_id = path.into_inner();
    let user_id = user.0.id;
    let input = body.into_inner();

    verify_conversation_party(db.get_ref(), conversation_id, user_id).await?;

    let context = conversation_context(db.get_ref(), conversation_id, user_id).await?;
    let receiver_id = context
        .map(|(receiver, _)| receiver)
        .or(input.receiver_id)
        .ok_or_else(|| ApiError::validation("receiver_id is required for a new conversation"))?;
    let product_id = context
        .and_then(|(_, product)| product)
        .or(input.product_id)
        .ok_or_else(|| ApiError::validation("This conversation has no product to offer on"))?;

    let product = product_db::get_product_by_id(db.get_ref(), product_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Product {product_id} not found")))?;

    let saved = offers::create_offer(
        db.get_ref(),
        feed.get_ref(),
        user_id,
        conversation_id,
        receiver_id,
        &product,
        input.quantity,
        input.unit_price,
    )
    .await?;

    Ok(HttpResponse::Created().json(MessageResponse::from(saved)))
}

/// Request body for PUT /api/chat/offers/{message_id}.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RespondOfferRequest {
    pub decision: OfferDecision,
}

/// PUT /api/chat/offers/{message_id} — accept or decline a pending offer.
///
/// The status change commits first; disclosure and notification side effects
/// that fail afterwards come back in `warnings` rather than failing the call.
pub async fn respond_offer(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    feed: web::Data<Arc<ChangeFeed>>,
    path: web::Path<Uuid>,
    body: web::Json<RespondOfferRequest>,
) -> Result<HttpResponse, ApiError> {
    let message_id = path.into_inner();

    let outcome = offers::respond_to_offer(
        db.get_ref(),
        feed.get_ref(),
        user.0.id,
        message_id,
        body.decision,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": MessageResponse::from(outcome.message),
        "contact_revealed": outcome.contact_revealed,
        "warnings": outcome.warnings,
    })))
}

/// Resolve the other party and product context of a conversation from its
/// log. Returns None for a conversation with no persisted messages.
async fn conversation_context(
    db: &DatabaseConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<Option<(Uuid, Option<Uuid>)>, ApiError> {
    let history = message_db::get_messages_by_conversation(db, conversation_id).await?;
    let Some(first) = history.first() else {
        return Ok(None);
    };

    let receiver = if first.sender_id == user_id {
        first.receiver_id
    } else {
        first.sender_id
    };
    let product_id = history.iter().find_map(|m| m.product_id);

    Ok(Some((receiver, product_id)))
}
