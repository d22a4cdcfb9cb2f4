pub mod auth;
pub mod chat;
pub mod notifications;
pub mod products;

use actix_web::web;

use crate::chat::session;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // ── Auth routes (protected by JWT via the AuthenticatedUser extractor) ──
    cfg.service(
        web::scope("/auth")
            .route("/me", web::get().to(auth::me))
            .route("/complete-profile", web::post().to(auth::complete_profile)),
    );

    // ── Profile routes ──
    cfg.service(
        web::resource("/profiles/{id}").route(web::get().to(auth::get_profile)),
    );

    // ── Product routes (all protected — require valid JWT) ──
    cfg.service(
        web::scope("/products")
            .route("", web::get().to(products::get_products))
            .route("", web::post().to(products::create_product))
            .route("/{id}", web::get().to(products::get_product))
            .route("/{id}", web::put().to(products::update_product))
            .route(
                "/{id}/contact-visibility",
                web::put().to(products::set_contact_visibility),
            )
            .route(
                "/farmer/{farmer_id}",
                web::get().to(products::get_products_by_farmer),
            ),
    );

    // ── Chat routes ──
    cfg.service(
        web::scope("/chat")
            .route("/ws", web::get().to(session::ws_connect))
            .route("/conversations", web::get().to(chat::get_conversations))
            .route("/conversations", web::post().to(chat::start_conversation))
            .route("/offers/{message_id}", web::put().to(chat::respond_offer))
            .route("/{conversation_id}/messages", web::get().to(chat::get_messages))
            .route("/{conversation_id}/messages", web::post().to(chat::send_message))
            .route("/{conversation_id}/offers", web::post().to(chat::create_offer))
            .route("/{conversation_id}/read", web::put().to(chat::mark_read)),
    );

    // ── Notification routes ──
    cfg.service(
        web::scope("/notifications")
            .route("", web::get().to(notifications::get_notifications))
            .route("/read-all", web::put().to(notifications::mark_all_read))
            .route("/{id}/read", web::put().to(notifications::mark_read)),
    );
}
