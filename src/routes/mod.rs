pub mod comments;
pub mod items;
pub mod uploads;

use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::handlers;
use crate::state::AppState;

/// Assemble the full application router. Route policy lives here:
/// handlers taking a `CurrentUser` form the authenticated surface,
/// everything else is public.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .merge(items::router())
        .merge(comments::router())
        .merge(uploads::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
