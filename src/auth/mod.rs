use crate::state::AppState;
use axum::Router;

mod dto;
pub(crate) mod extractors;
pub mod flows;
pub mod handlers;
pub mod password;
pub mod session;
pub mod store;
pub mod tokens;
pub mod user;

pub fn router() -> Router<AppState> {
    handlers::router()
}
