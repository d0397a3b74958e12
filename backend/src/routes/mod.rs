use crate::middleware::auth::auth_middleware;
use crate::state::AppState;
use axum::{http::HeaderValue, middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod graphql;
pub mod telegram;
pub mod views;

pub fn create_router(state: AppState) -> Router {
    let protected = views::protected_router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    Router::new()
        .route("/", get(root))
        .merge(views::router())
        .merge(protected)
        .merge(graphql::router())
        .merge(telegram::router())
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match state
        .config
        .web_app
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin.trim_end_matches('/')).ok())
    {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

async fn root() -> &'static str {
    "Dairy backend is running."
}
