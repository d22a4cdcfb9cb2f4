use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::chat::feed::ChangeFeed;
use crate::chat::protocol::OfferDecision;
use crate::db::messages as message_db;
use crate::db::notifications as notification_db;
use crate::db::products as product_db;
use crate::error::ApiError;
use crate::models::messages::{self, CreateChatMessage, MessageResponse, OfferStatus};
use crate::models::notifications::{CreateNotification, NotificationKind};
use crate::models::products;

/// Result of responding to an offer.
///
/// `warnings` carries side effects that failed after the status change
/// committed; the status itself is the source of truth and is never rolled
/// back. The acceptance commits eagerly, the disclosure and notification are
/// best-effort and surfaced for retry.
#[derive(Debug)]
pub struct OfferOutcome {
    pub message: messages::Model,
    pub contact_revealed: bool,
    pub warnings: Vec<String>,
}

/// Validate the negotiable terms of an offer.
pub fn validate_terms(quantity: u32, unit_price: f64) -> Result<(), ApiError> {
    if quantity == 0 {
        return Err(ApiError::validation("quantity must be positive"));
    }
    if unit_price <= 0.0 || !unit_price.is_finite() {
        return Err(ApiError::validation("unit price must be positive"));
    }
    Ok(())
}

/// Format the structured offer body embedded in the message text.
pub fn format_offer_body(
    product_name: &str,
    unit: &str,
    quantity: u32,
    unit_price: f64,
) -> String {
    let total = unit_price * quantity as f64;
    format!(
        "OFFER DETAILS:\n\
         Product: {product_name}\n\
         Quantity: {quantity} {unit}\n\
         Offered Price: ${unit_price:.2} per {unit}\n\
         Total: ${total:.2}\n\n\
         I'm interested in purchasing this product. Please let me know if this offer works for you."
    )
}

/// The plain confirmation message appended after an offer is resolved.
pub fn confirmation_body(decision: OfferDecision) -> &'static str {
    match decision {
        OfferDecision::Accepted => {
            "I've accepted your offer! You can now see my contact information for direct communication."
        }
        OfferDecision::Declined => {
            "I've declined your offer. Feel free to make another offer or discuss further."
        }
    }
}

/// Check that `responder` may resolve this message right now.
///
/// Raised before any state changes: the message must be an offer, the
/// responder must be its receiver, and the offer must still be pending.
pub fn ensure_can_respond(message: &messages::Model, responder: Uuid) -> Result<(), ApiError> {
    if !message.is_offer {
        return Err(ApiError::validation("Message is not an offer"));
    }
    if message.receiver_id != responder {
        return Err(ApiError::authorization(
            "Only the receiver of an offer can respond to it",
        ));
    }
    match message.offer_status {
        Some(OfferStatus::Pending) => Ok(()),
        _ => Err(ApiError::precondition("Offer has already been resolved")),
    }
}

/// Create a pending offer in a conversation and publish its insert event.
pub async fn create_offer(
    db: &DatabaseConnection,
    feed: &ChangeFeed,
    sender_id: Uuid,
    conversation_id: Uuid,
    receiver_id: Uuid,
    product: &products::Model,
    quantity: u32,
    unit_price: f64,
) -> Result<messages::Model, ApiError> {
    validate_terms(quantity, unit_price)?;

    let body = format_offer_body(&product.name, &product.unit, quantity, unit_price);
    let saved = message_db::insert_message(
        db,
        CreateChatMessage {
            conversation_id,
            sender_id,
            receiver_id,
            product_id: Some(product.id),
            body,
            is_offer: true,
            offer_status: Some(OfferStatus::Pending),
        },
    )
    .await?;

    feed.publish_message_inserted(MessageResponse::from(saved.clone()))
        .await;

    Ok(saved)
}

/// Resolve a pending offer as its receiver.
///
/// On accept: commit the status, append a confirmation message, reveal the
/// farmer's contact details on the product (guarded by ownership, so a
/// buyer-side accept can never disclose them), and notify the offer's sender.
/// On decline: commit the status and append the confirmation message only.
/// Everything after the status commit is reported through
/// `OfferOutcome::warnings` instead of failing the call.
pub async fn respond_to_offer(
    db: &DatabaseConnection,
    feed: &ChangeFeed,
    responder_id: Uuid,
    message_id: Uuid,
    decision: OfferDecision,
) -> Result<OfferOutcome, ApiError> {
    let message = message_db::get_message_by_id(db, message_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Message {message_id} not found")))?;

    ensure_can_respond(&message, responder_id)?;

    // Resolve the product before committing, purely for the notification
    // text; a missing row is not a reason to refuse the response.
    let product = match message.product_id {
        Some(pid) => product_db::get_product_by_id(db, pid).await.ok().flatten(),
        None => None,
    };

    // Commit point. The conditional update wins any concurrent response race.
    let updated = message_db::update_offer_status(db, message_id, decision.into()).await?;
    feed.publish_message_updated(MessageResponse::from(updated.clone()))
        .await;

    let mut warnings = Vec::new();
    let mut contact_revealed = false;

    // Confirmation message back to the original sender, in-conversation.
    let confirmation = CreateChatMessage::plain(
        updated.conversation_id,
        responder_id,
        updated.sender_id,
        updated.product_id,
        confirmation_body(decision).to_string(),
    );
    match message_db::insert_message(db, confirmation).await {
        Ok(saved) => {
            feed.publish_message_inserted(MessageResponse::from(saved))
                .await;
        }
        Err(e) => {
            tracing::warn!("Offer {message_id}: confirmation message failed: {e}");
            warnings.push(format!("Confirmation message could not be sent: {e}"));
        }
    }

    if decision == OfferDecision::Accepted {
        match updated.product_id {
            Some(product_id) => {
                match product_db::set_contact_visible(db, product_id, responder_id, true).await {
                    Ok(()) => contact_revealed = true,
                    Err(e) => {
                        tracing::warn!(
                            "Offer {message_id}: contact disclosure on product {product_id} failed: {e}"
                        );
                        warnings.push(format!("Contact information was not revealed: {e}"));
                    }
                }
            }
            None => {
                warnings.push("Offer has no product reference; contact not revealed".to_string());
            }
        }

        let product_name = product
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "the product".to_string());
        let notification = CreateNotification {
            user_id: updated.sender_id,
            kind: NotificationKind::OrderUpdate,
            title: "Offer Accepted!".to_string(),
            message: format!(
                "Your offer for {product_name} has been accepted. The farmer's contact information is now available in the chat."
            ),
            related_id: Some(message_id),
        };
        match notification_db::insert_notification(db, notification).await {
            Ok(saved) => feed.publish_notification(saved).await,
            Err(e) => {
                tracing::warn!("Offer {message_id}: buyer notification failed: {e}");
                warnings.push(format!("Buyer notification could not be created: {e}"));
            }
        }
    }

    Ok(OfferOutcome {
        message: updated,
        contact_revealed,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn offer_message(receiver: Uuid, status: Option<OfferStatus>) -> messages::Model {
        messages::Model {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: receiver,
            product_id: Some(Uuid::new_v4()),
            body: "OFFER DETAILS:".to_string(),
            is_read: false,
            is_offer: true,
            offer_status: status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn body_encodes_quantity_price_and_total() {
        let body = format_offer_body("Tomatoes", "kg", 3, 10.0);
        assert!(body.starts_with("OFFER DETAILS:"));
        assert!(body.contains("Product: Tomatoes"));
        assert!(body.contains("Quantity: 3 kg"));
        assert!(body.contains("Offered Price: $10.00 per kg"));
        assert!(body.contains("Total: $30.00"));
    }

    #[test]
    fn terms_must_be_positive() {
        assert!(matches!(
            validate_terms(0, 10.0),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_terms(3, 0.0),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_terms(3, -2.5),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_terms(3, f64::NAN),
            Err(ApiError::Validation(_))
        ));
        assert!(validate_terms(3, 10.0).is_ok());
    }

    #[test]
    fn only_the_receiver_may_respond() {
        let receiver = Uuid::new_v4();
        let message = offer_message(receiver, Some(OfferStatus::Pending));

        assert!(ensure_can_respond(&message, receiver).is_ok());
        assert!(matches!(
            ensure_can_respond(&message, Uuid::new_v4()),
            Err(ApiError::Authorization(_))
        ));
    }

    #[test]
    fn resolved_offers_reject_further_responses() {
        let receiver = Uuid::new_v4();

        let accepted = offer_message(receiver, Some(OfferStatus::Accepted));
        assert!(matches!(
            ensure_can_respond(&accepted, receiver),
            Err(ApiError::PreconditionFailed(_))
        ));

        let declined = offer_message(receiver, Some(OfferStatus::Declined));
        assert!(matches!(
            ensure_can_respond(&declined, receiver),
            Err(ApiError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn plain_messages_are_not_respondable() {
        let receiver = Uuid::new_v4();
        let mut message = offer_message(receiver, None);
        message.is_offer = false;

        assert!(matches!(
            ensure_can_respond(&message, receiver),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn confirmation_texts_differ_by_decision() {
        assert!(confirmation_body(OfferDecision::Accepted).contains("accepted your offer"));
        assert!(confirmation_body(OfferDecision::Declined).contains("declined your offer"));
    }
}
