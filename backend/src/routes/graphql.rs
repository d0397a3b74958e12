use crate::graphql::{graphql_explorer, graphql_handler};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new().route("/graphql", get(graphql_explorer).post(graphql_handler))
}
