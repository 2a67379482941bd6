use crate::state::AppState;
use axum::Router;

pub mod code;
pub mod dto;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod service;
pub mod session;
pub mod store;
pub mod validation;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
