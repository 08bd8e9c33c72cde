mod admin;
pub mod auth;
mod chats;
mod classes;
mod error;
mod notifications;
mod users;
mod validation;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (login and register are public)
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let api_routes = Router::new()
        // Users
        .route("/users/profile", get(users::get_profile))
        .route("/users/profile", put(users::update_profile))
        .route("/users/change-password", put(users::change_password))
        .route("/users/students", get(users::list_students))
        .route("/users/teachers", get(users::list_teachers))
        .route("/users/available", get(users::list_available))
        .route("/users/:id", get(users::get_user))
        // Classes
        .route("/classes", get(classes::list_classes))
        .route("/classes", post(classes::create_class))
        .route("/classes/:id", get(classes::get_class))
        .route("/classes/:id", put(classes::update_class))
        .route("/classes/:id", delete(classes::delete_class))
        .route("/classes/:id/join", post(classes::join_class))
        // Chats
        .route("/chats", get(chats::list_chats))
        .route("/chats", post(chats::create_chat))
        .route("/chats/:id", get(chats::get_chat))
        .route("/chats/:id", delete(chats::delete_chat))
        .route("/chats/:id/messages", get(chats::get_messages))
        .route("/chats/:id/messages", post(chats::send_message))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/sync", post(notifications::sync_notifications))
        // Admin
        .route("/admin/stats", get(admin::get_stats))
        .route("/admin/users", post(admin::create_user))
        .route("/admin/users/:id/status", put(admin::update_user_status))
        .route("/admin/users/:id", delete(admin::delete_user));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
