//! API routes

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AppState};
use crate::handlers::{accounts, clients, health, mailings, messages, stats, users};

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/ready", get(health::readiness));

    // Signup, activation, and session routes
    let auth_routes = Router::new()
        .route("/signup", post(accounts::signup))
        .route("/activate/:user_id/:token", get(accounts::activate))
        .route("/login", post(accounts::login))
        .route("/logout", post(accounts::logout));

    // Client routes
    let client_routes = Router::new()
        .route("/", get(clients::list_clients))
        .route("/", post(clients::create_client))
        .route("/:id", get(clients::get_client))
        .route("/:id", patch(clients::update_client))
        .route("/:id", delete(clients::delete_client));

    // Message routes
    let message_routes = Router::new()
        .route("/", get(messages::list_messages))
        .route("/", post(messages::create_message))
        .route("/:id", get(messages::get_message))
        .route("/:id", patch(messages::update_message))
        .route("/:id", delete(messages::delete_message));

    // Mailing routes
    let mailing_routes = Router::new()
        .route("/", get(mailings::list_mailings))
        .route("/", post(mailings::create_mailing))
        .route("/:id", get(mailings::get_mailing))
        .route("/:id", patch(mailings::update_mailing))
        .route("/:id", delete(mailings::delete_mailing))
        .route("/:id/send", post(mailings::send_mailing))
        .route("/:id/attempts", get(mailings::list_attempts));

    // User administration routes (manager)
    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id/block", post(users::set_blocked));

    // API v1 routes; the middleware lets the auth/ subtree through
    // without a session
    let api_v1 = Router::new()
        .nest("/auth", auth_routes)
        .nest("/clients", client_routes)
        .nest("/messages", message_routes)
        .nest("/mailings", mailing_routes)
        .nest("/users", user_routes)
        .route("/stats", get(stats::owner_stats))
        .route("/overview", get(stats::overview))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
