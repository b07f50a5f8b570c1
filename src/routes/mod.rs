pub mod auth;
pub mod blog;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(blog::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
