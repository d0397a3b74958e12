use crate::commands::bot::telegram_webhook;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new().route("/telegram/", post(telegram_webhook))
}
