use crate::state::AppState;
use axum::Router;

pub mod codec;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod ledger;
pub mod password;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
