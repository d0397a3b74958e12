use crate::commands::views;
use crate::state::AppState;
use axum::{routing::get, Router};

/// Routes reachable without a bearer token.
pub fn router() -> Router<AppState> {
    Router::new().route("/check_connection/", get(views::check_connection))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/view_tables/", get(views::view_tables))
        .route("/view_all_records/", get(views::view_all_records))
        .route("/view_record/:name/", get(views::view_record))
        .route("/view_record_by_date/:date/", get(views::view_record_by_date))
}
