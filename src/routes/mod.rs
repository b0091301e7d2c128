pub mod auth;
pub mod categories;
pub mod comments;
pub mod posts;
pub mod votes;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(categories::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(votes::router())
}
