use axum::Router;
use axum::routing::{delete, get, post};
use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod model;
pub mod playlist;
pub mod quality;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/convert", post(handler::convert))
        .route("/health", get(handler::health))
        .route("/{conversion_id}", delete(handler::cancel))
}
