//! End-to-end tests of the negotiation core over in-memory state.
//!
//! These drive the pure layers together — the offer formatting and guards,
//! the realtime merge view, and the conversation grouping — the way the
//! WebSocket session does, without a database or network.
//!
//! Run with: `cargo test --test negotiation_test`
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use farmlink_backend::chat::aggregator::group_for_user;
use farmlink_backend::chat::merge::ConversationView;
use farmlink_backend::chat::offers::{ensure_can_respond, format_offer_body, validate_terms};
use farmlink_backend::error::ApiError;
use farmlink_backend::models::messages::{MessageResponse, Model as ChatMessage, OfferStatus};

fn at(offset_secs: i64) -> chrono::DateTime<chrono::Utc> {
    Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap() + Duration::seconds(offset_secs)
}

fn plain_message(
    conversation: Uuid,
    sender: Uuid,
    receiver: Uuid,
    offset_secs: i64,
) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4(),
        conversation_id: conversation,
        sender_id: sender,
        receiver_id: receiver,
        product_id: None,
        body: "hello".to_string(),
        is_read: false,
        is_offer: false,
        offer_status: None,
        created_at: at(offset_secs),
    }
}

fn offer_message(
    conversation: Uuid,
    sender: Uuid,
    receiver: Uuid,
    product: Uuid,
    body: String,
    offset_secs: i64,
) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4(),
        conversation_id: conversation,
        sender_id: sender,
        receiver_id: receiver,
        product_id: Some(product),
        body,
        is_read: false,
        is_offer: true,
        offer_status: Some(OfferStatus::Pending),
        created_at: at(offset_secs),
    }
}

/// A buyer offers qty 3 at $10: the body encodes the computed total and the
/// message starts life pending.
#[test]
fn offer_creation_encodes_total_and_starts_pending() {
    let buyer = Uuid::new_v4();
    let farmer = Uuid::new_v4();
    let conversation = Uuid::new_v4();
    let product = Uuid::new_v4();

    assert!(validate_terms(3, 10.0).is_ok());
    let body = format_offer_body("Tomatoes", "kg", 3, 10.0);
    let offer = offer_message(conversation, buyer, farmer, product, body, 0);

    assert!(offer.body.contains("Total: $30.00"));
    assert_eq!(offer.offer_status, Some(OfferStatus::Pending));

    // The farmer (receiver) may respond; the buyer may not.
    assert!(ensure_can_respond(&offer, farmer).is_ok());
    assert!(matches!(
        ensure_can_respond(&offer, buyer),
        Err(ApiError::Authorization(_))
    ));
}

/// Once resolved, an offer is terminal in both directions.
#[test]
fn offer_resolution_is_monotonic() {
    let buyer = Uuid::new_v4();
    let farmer = Uuid::new_v4();
    let conversation = Uuid::new_v4();
    let product = Uuid::new_v4();

    let mut offer = offer_message(
        conversation,
        buyer,
        farmer,
        product,
        format_offer_body("Honey", "jar", 2, 8.5),
        0,
    );
    offer.offer_status = Some(OfferStatus::Accepted);

    // No further response is possible, not even by the receiver.
    assert!(matches!(
        ensure_can_respond(&offer, farmer),
        Err(ApiError::PreconditionFailed(_))
    ));

    offer.offer_status = Some(OfferStatus::Declined);
    assert!(matches!(
        ensure_can_respond(&offer, farmer),
        Err(ApiError::PreconditionFailed(_))
    ));
}

/// Transport delivers m2 before m1; the merged view is still ascending, and
/// a duplicate delivery of either changes nothing.
#[test]
fn out_of_order_and_duplicate_delivery_converge() {
    let buyer = Uuid::new_v4();
    let farmer = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    let m1 = MessageResponse::from(plain_message(conversation, buyer, farmer, 0));
    let m2 = MessageResponse::from(plain_message(conversation, buyer, farmer, 30));

    let mut view = ConversationView::empty(conversation);
    assert!(view.apply_insert(m2.clone()));
    assert!(view.apply_insert(m1.clone()));

    let ids: Vec<Uuid> = view.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![m1.id, m2.id]);

    // Replay both events: the view is unchanged.
    assert!(!view.apply_insert(m1));
    assert!(!view.apply_insert(m2));
    assert_eq!(view.messages().len(), 2);
}

/// A local optimistic append and its realtime echo race: the view holds one
/// copy, and the derived conversation list counts it once.
#[test]
fn optimistic_send_and_realtime_echo_deduplicate() {
    let me = Uuid::new_v4();
    let them = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    let sent = plain_message(conversation, me, them, 0);
    let echo = MessageResponse::from(sent.clone());

    let mut view = ConversationView::empty(conversation);
    assert!(view.apply_insert(MessageResponse::from(sent.clone())));
    assert!(!view.apply_insert(echo));
    assert_eq!(view.messages().len(), 1);

    // The receiver's aggregation over the same log sees exactly one unread.
    let groups = group_for_user(vec![sent], them);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].unread_count, 1);
}

/// An offer resolution arriving as an update event replaces the pending copy
/// in the sender's open view.
#[test]
fn offer_update_event_replaces_pending_copy() {
    let buyer = Uuid::new_v4();
    let farmer = Uuid::new_v4();
    let conversation = Uuid::new_v4();
    let product = Uuid::new_v4();

    let offer = offer_message(
        conversation,
        buyer,
        farmer,
        product,
        format_offer_body("Eggs", "dozen", 4, 5.0),
        0,
    );
    let mut view =
        ConversationView::new(conversation, vec![MessageResponse::from(offer.clone())]);

    let mut resolved = MessageResponse::from(offer);
    resolved.offer_status = Some(OfferStatus::Accepted);

    assert!(view.apply_update(resolved.clone()));
    assert_eq!(view.messages().len(), 1);
    assert_eq!(
        view.messages()[0].offer_status,
        Some(OfferStatus::Accepted)
    );

    // Applying the same update again is a no-op.
    assert!(!view.apply_update(resolved));
}

/// Unread badges across several conversations match the raw filter over the
/// whole log, and clearing one conversation only affects that badge.
#[test]
fn unread_counts_follow_the_log() {
    let me = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conv_alice = Uuid::new_v4();
    let conv_bob = Uuid::new_v4();

    let mut log = vec![
        plain_message(conv_alice, alice, me, 0),
        plain_message(conv_alice, alice, me, 10),
        plain_message(conv_bob, bob, me, 20),
        plain_message(conv_alice, me, alice, 30),
    ];

    let groups = group_for_user(log.clone(), me);
    let unread_of = |conv: Uuid, groups: &[farmlink_backend::chat::aggregator::ConversationGroup]| {
        groups
            .iter()
            .find(|g| g.conversation_id == conv)
            .map(|g| g.unread_count)
            .unwrap()
    };
    assert_eq!(unread_of(conv_alice, &groups), 2);
    assert_eq!(unread_of(conv_bob, &groups), 1);

    // Opening Alice's conversation flips her messages to read.
    for m in log.iter_mut() {
        if m.conversation_id == conv_alice && m.receiver_id == me {
            m.is_read = true;
        }
    }

    let groups = group_for_user(log, me);
    assert_eq!(unread_of(conv_alice, &groups), 0);
    assert_eq!(unread_of(conv_bob, &groups), 1);
}
