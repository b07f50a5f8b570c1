use axum::routing::post;
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user_auth/register_user/", post(handlers::register))
        .route("/user_auth/login_user/", post(handlers::login))
        .route("/user_auth/logout_user/", post(handlers::logout))
        .route("/user_auth/token_refresh/", post(handlers::refresh))
}
