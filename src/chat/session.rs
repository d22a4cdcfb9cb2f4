use actix_web::{HttpRequest, HttpResponse, web};
use actix_ws::Message;
use futures_util::StreamExt;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::jwks::JwksCache;
use crate::auth::jwt;
use crate::chat::aggregator::{self, DraftConversation};
use crate::chat::feed::{ChangeFeed, StoreEvent};
use crate::chat::merge::ConversationView;
use crate::chat::offers;
use crate::chat::protocol::{ClientMessage, ServerMessage};
use crate::db::messages as message_db;
use crate::db::products as product_db;
use crate::error::ApiError;
use crate::models::messages::{CreateChatMessage, MessageResponse};
use crate::models::profiles::{CreateProfileFromAuth, Roles};

/// Client-side guard on write operations: surface a failure instead of
/// hanging on a stalled backend. The write itself may still land.
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Query params for the WebSocket handshake endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// GET /api/chat/ws?token=<jwt>
///
/// Upgrades the HTTP connection to a WebSocket. Authenticates via query param
/// token (browsers can't send Authorization headers during the WebSocket
/// handshake), resolves the profile, and subscribes the session to the
/// per-user change feed.
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    db: web::Data<DatabaseConnection>,
    jwks_cache: web::Data<Arc<JwksCache>>,
    feed: web::Data<Arc<ChangeFeed>>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = jwt::validate_token(&query.token, jwks_cache.get_ref())
        .await
        .map_err(|e| actix_web::error::ErrorUnauthorized(format!("Invalid token: {e}")))?;

    let user_id = claims
        .user_id()
        .map_err(actix_web::error::ErrorUnauthorized)?;
    let email = claims
        .user_email()
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("No email in token claims"))?;

    let profile = crate::db::profiles::find_or_create_from_auth(
        db.get_ref(),
        CreateProfileFromAuth {
            id: user_id,
            email,
            full_name: claims.display_name(),
            avatar_url: claims.avatar_url(),
            auth_provider: "google".to_string(),
            role: Roles::Buyer,
        },
    )
    .await
    .map_err(|e| actix_web::error::ErrorInternalServerError(format!("Database error: {e}")))?;

    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;

    let (connection_id, rx) = feed.subscribe(profile.id).await;

    let db_clone = db.get_ref().clone();
    let feed_clone = feed.get_ref().clone();

    actix_web::rt::spawn(run_session(
        session,
        msg_stream,
        rx,
        connection_id,
        profile.id,
        db_clone,
        feed_clone,
    ));

    Ok(response)
}

/// Per-connection chat state: the conversation the user has open (if any)
/// and the conversations they started that have no persisted messages yet.
struct SessionState {
    user_id: Uuid,
    open: Option<ConversationView>,
    drafts: Vec<DraftConversation>,
}

impl SessionState {
    fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            open: None,
            drafts: Vec::new(),
        }
    }

    /// The other party of the open conversation, from its messages or draft.
    fn open_receiver(&self) -> Option<Uuid> {
        let view = self.open.as_ref()?;
        if let Some(m) = view.messages().first() {
            return Some(if m.sender_id == self.user_id {
                m.receiver_id
            } else {
                m.sender_id
            });
        }
        self.drafts
            .iter()
            .find(|d| d.conversation_id == view.conversation_id)
            .map(|d| d.participant_id)
    }

    /// The product the open conversation is about, from its messages or draft.
    fn open_product(&self) -> Option<Uuid> {
        let view = self.open.as_ref()?;
        if let Some(pid) = view.messages().iter().find_map(|m| m.product_id) {
            return Some(pid);
        }
        self.drafts
            .iter()
            .find(|d| d.conversation_id == view.conversation_id)
            .and_then(|d| d.product_id)
    }

    /// Drop the draft once its first message is persisted.
    fn clear_draft(&mut self, conversation_id: Uuid) {
        self.drafts.retain(|d| d.conversation_id != conversation_id);
    }
}

/// Drives the WebSocket session: folds store events into the open
/// conversation, executes client commands, and cleans up on disconnect.
///
/// Events are applied strictly in arrival order. Closing a conversation only
/// drops the in-memory view; writes already issued run to completion.
async fn run_session(
    mut session: actix_ws::Session,
    mut msg_stream: actix_ws::MessageStream,
    mut rx: mpsc::UnboundedReceiver<StoreEvent>,
    connection_id: Uuid,
    user_id: Uuid,
    db: DatabaseConnection,
    feed: Arc<ChangeFeed>,
) {
    let mut state = SessionState::new(user_id);

    loop {
        tokio::select! {
            // Incoming frame from the WebSocket client.
            Some(msg) = msg_stream.next() => {
                match msg {
                    Ok(Message::Text(text)) => {
                        handle_client_message(&text, &mut session, &mut state, &db, &feed).await;
                    }
                    Ok(Message::Ping(bytes)) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        break;
                    }
                    Err(_) => {
                        break;
                    }
                    _ => {}
                }
            }
            // Store change event routed to this user.
            Some(event) = rx.recv() => {
                handle_store_event(event, &mut session, &mut state, &db).await;
            }
            // Both channels closed — exit.
            else => break,
        }
    }

    feed.unsubscribe(user_id, connection_id).await;
    let _ = session.close(None).await;
}

/// Fold one store event into session state and forward it to the client.
async fn handle_store_event(
    event: StoreEvent,
    session: &mut actix_ws::Session,
    state: &mut SessionState,
    db: &DatabaseConnection,
) {
    match event {
        StoreEvent::MessageInserted(message) => {
            state.clear_draft(message.conversation_id);

            let applied = match state.open.as_mut() {
                Some(view) => view.apply_insert(message.clone()),
                None => false,
            };

            if applied {
                // The user is looking at this conversation; mark the new
                // arrivals read right away.
                if let Err(e) =
                    message_db::mark_conversation_read(db, message.conversation_id, state.user_id)
                        .await
                {
                    tracing::warn!("Failed to mark conversation read: {e}");
                }
                let frame = ServerMessage::NewMessage { message };
                if !send_frame(session, &frame).await {
                    return;
                }
            }

            push_conversations(session, state, db).await;
        }
        StoreEvent::MessageUpdated(message) => {
            let applied = match state.open.as_mut() {
                Some(view) => view.apply_update(message.clone()),
                None => false,
            };

            if applied {
                let frame = ServerMessage::MessageUpdated { message };
                if !send_frame(session, &frame).await {
                    return;
                }
            }

            push_conversations(session, state, db).await;
        }
        StoreEvent::NotificationInserted(notification) => {
            let frame = ServerMessage::Notification { notification };
            send_frame(session, &frame).await;
        }
    }
}

/// Parse and execute an incoming client command.
async fn handle_client_message(
    text: &str,
    session: &mut actix_ws::Session,
    state: &mut SessionState,
    db: &DatabaseConnection,
    feed: &ChangeFeed,
) {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            send_error(session, format!("Invalid message format: {e}")).await;
            return;
        }
    };

    match client_msg {
        ClientMessage::OpenConversation {
            conversation_id,
            receiver_id,
            product_id,
        } => {
            let history = match message_db::get_messages_by_conversation(db, conversation_id).await
            {
                Ok(h) => h,
                Err(e) => {
                    send_error(session, format!("Failed to load conversation: {e}")).await;
                    return;
                }
            };

            if history.is_empty() {
                // A conversation the user just started: keep it as a draft so
                // the aggregation renders it until the first message lands.
                if state
                    .drafts
                    .iter()
                    .all(|d| d.conversation_id != conversation_id)
                {
                    state.drafts.insert(
                        0,
                        DraftConversation {
                            conversation_id,
                            participant_id: receiver_id,
                            product_id,
                        },
                    );
                }
                state.open = Some(ConversationView::empty(conversation_id));
            } else {
                let is_party = history
                    .iter()
                    .any(|m| m.sender_id == state.user_id || m.receiver_id == state.user_id);
                if !is_party {
                    send_error(session, "You are not a party to this conversation".into()).await;
                    return;
                }

                if let Err(e) =
                    message_db::mark_conversation_read(db, conversation_id, state.user_id).await
                {
                    tracing::warn!("Failed to mark conversation read: {e}");
                }

                let messages: Vec<MessageResponse> =
                    history.into_iter().map(MessageResponse::from).collect();
                state.open = Some(ConversationView::new(conversation_id, messages));
            }

            let messages = state
                .open
                .as_ref()
                .map(|v| v.messages().to_vec())
                .unwrap_or_default();
            let frame = ServerMessage::ConversationOpened {
                conversation_id,
                messages,
            };
            if send_frame(session, &frame).await {
                push_conversations(session, state, db).await;
            }
        }

        ClientMessage::CloseConversation => {
            state.open = None;
        }

        ClientMessage::SendMessage { body } => {
            let Some(view) = state.open.as_ref() else {
                send_error(session, "No conversation is open".into()).await;
                return;
            };
            let conversation_id = view.conversation_id;
            let Some(receiver_id) = state.open_receiver() else {
                send_error(session, "Cannot resolve the other participant".into()).await;
                return;
            };

            let input = CreateChatMessage::plain(
                conversation_id,
                state.user_id,
                receiver_id,
                state.open_product(),
                body,
            );

            let saved = tokio::time::timeout(WRITE_TIMEOUT, message_db::insert_message(db, input))
                .await
                .map_err(|_| {
                    ApiError::timeout("Send timed out; the message may still have been delivered, please verify")
                })
                .and_then(|r| r);

            match saved {
                Ok(saved) => {
                    let response = MessageResponse::from(saved);
                    feed.publish_message_inserted(response.clone()).await;
                    state.clear_draft(conversation_id);
                    if let Some(view) = state.open.as_mut() {
                        view.apply_insert(response.clone());
                    }
                    // Echo back with the server-assigned id and timestamp.
                    let frame = ServerMessage::NewMessage { message: response };
                    if send_frame(session, &frame).await {
                        push_conversations(session, state, db).await;
                    }
                }
                Err(e) => send_error(session, format!("Failed to send message: {e}")).await,
            }
        }

        ClientMessage::MakeOffer {
            quantity,
            unit_price,
        } => {
            let Some(view) = state.open.as_ref() else {
                send_error(session, "No conversation is open".into()).await;
                return;
            };
            let conversation_id = view.conversation_id;
            let Some(receiver_id) = state.open_receiver() else {
                send_error(session, "Cannot resolve the other participant".into()).await;
                return;
            };
            let Some(product_id) = state.open_product() else {
                send_error(session, "This conversation has no product to offer on".into()).await;
                return;
            };

            let product = match product_db::get_product_by_id(db, product_id).await {
                Ok(Some(p)) => p,
                Ok(None) => {
                    send_error(session, "Product no longer exists".into()).await;
                    return;
                }
                Err(e) => {
                    send_error(session, format!("Failed to load product: {e}")).await;
                    return;
                }
            };

            let created = tokio::time::timeout(
                WRITE_TIMEOUT,
                offers::create_offer(
                    db,
                    feed,
                    state.user_id,
                    conversation_id,
                    receiver_id,
                    &product,
                    quantity,
                    unit_price,
                ),
            )
            .await
            .map_err(|_| {
                ApiError::timeout("Offer timed out; it may still have been delivered, please verify")
            })
            .and_then(|r| r);

            match created {
                Ok(saved) => {
                    let response = MessageResponse::from(saved);
                    state.clear_draft(conversation_id);
                    if let Some(view) = state.open.as_mut() {
                        view.apply_insert(response.clone());
                    }
                    let frame = ServerMessage::NewMessage { message: response };
                    if send_frame(session, &frame).await {
                        push_conversations(session, state, db).await;
                    }
                }
                Err(e) => send_error(session, format!("Failed to create offer: {e}")).await,
            }
        }

        ClientMessage::RespondOffer {
            message_id,
            decision,
        } => {
            let outcome = tokio::time::timeout(
                WRITE_TIMEOUT,
                offers::respond_to_offer(db, feed, state.user_id, message_id, decision),
            )
            .await
            .map_err(|_| {
                ApiError::timeout("Response timed out; the offer state is unknown, please refresh")
            })
            .and_then(|r| r);

            match outcome {
                Ok(outcome) => {
                    let frame = ServerMessage::OfferResult {
                        message: MessageResponse::from(outcome.message.clone()),
                        contact_revealed: outcome.contact_revealed,
                        warnings: outcome.warnings,
                    };
                    if !send_frame(session, &frame).await {
                        return;
                    }

                    // Reload the open conversation so the responder sees the
                    // resolved offer and the confirmation message together.
                    if let Some(view) = state.open.as_ref() {
                        if view.conversation_id == outcome.message.conversation_id {
                            match message_db::get_messages_by_conversation(
                                db,
                                view.conversation_id,
                            )
                            .await
                            {
                                Ok(history) => {
                                    let conversation_id = view.conversation_id;
                                    let messages: Vec<MessageResponse> =
                                        history.into_iter().map(MessageResponse::from).collect();
                                    state.open = Some(ConversationView::new(
                                        conversation_id,
                                        messages.clone(),
                                    ));
                                    let frame = ServerMessage::ConversationOpened {
                                        conversation_id,
                                        messages,
                                    };
                                    if !send_frame(session, &frame).await {
                                        return;
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!("Failed to reload conversation: {e}");
                                }
                            }
                        }
                    }

                    push_conversations(session, state, db).await;
                }
                Err(e) => send_error(session, format!("Failed to respond to offer: {e}")).await,
            }
        }

        ClientMessage::MarkRead => {
            let Some(view) = state.open.as_ref() else {
                send_error(session, "No conversation is open".into()).await;
                return;
            };
            let conversation_id = view.conversation_id;

            match message_db::mark_conversation_read(db, conversation_id, state.user_id).await {
                Ok(_) => push_conversations(session, state, db).await,
                Err(e) => send_error(session, format!("Failed to mark read: {e}")).await,
            }
        }
    }
}

/// Re-run the aggregation and push the refreshed conversation list.
async fn push_conversations(
    session: &mut actix_ws::Session,
    state: &SessionState,
    db: &DatabaseConnection,
) {
    match aggregator::load_conversations(db, state.user_id, &state.drafts).await {
        Ok(conversations) => {
            let frame = ServerMessage::Conversations { conversations };
            send_frame(session, &frame).await;
        }
        Err(e) => {
            tracing::warn!("Failed to refresh conversations: {e}");
        }
    }
}

/// Serialize and send one frame. Returns false once the client is gone.
async fn send_frame(session: &mut actix_ws::Session, frame: &ServerMessage) -> bool {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(_) => return true,
    };
    session.text(json).await.is_ok()
}

async fn send_error(session: &mut actix_ws::Session, message: String) {
    let frame = ServerMessage::Error { message };
    let _ = send_frame(session, &frame).await;
}
