use crate::state::AppState;
use axum::routing::post;
use axum::Router;

mod dto;
pub mod error;
pub mod handlers;
pub mod jwt;
mod password;
pub mod service;
pub mod store;
mod validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/token", post(handlers::token))
}
