use async_graphql::http::GraphiQLSource;
use async_graphql::{Context, EmptySubscription, Schema};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::db::Permission;
use crate::error::{DairyError, DairyResult};
use crate::middleware::auth::{authorize, AuthUser};
use crate::state::AppState;

pub mod mutation;
pub mod query;

pub use mutation::MutationRoot;
pub use query::QueryRoot;

pub type DairySchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Raw `Authorization` header of the request being resolved.
pub struct BearerHeader(pub Option<String>);

pub fn build_schema() -> DairySchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription).finish()
}

pub fn app_state<'a>(ctx: &Context<'a>) -> DairyResult<&'a AppState> {
    ctx.data::<AppState>()
        .map_err(|_| DairyError::Internal("application state missing from context".to_string()))
}

/// Runs the access check for one resolver and returns the caller.
pub async fn require(ctx: &Context<'_>, needed: Permission) -> DairyResult<AuthUser> {
    let state = app_state(ctx)?;
    let header = ctx
        .data_opt::<BearerHeader>()
        .and_then(|bearer| bearer.0.as_deref());
    let user = authorize(state, header).await?;
    user.require(needed)?;
    Ok(user)
}

pub async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<async_graphql::Request>,
) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let request = request.data(state.clone()).data(BearerHeader(bearer));
    let response = state.schema.execute(request).await;

    let status = if response.is_ok() {
        StatusCode::OK
    } else {
        for error in &response.errors {
            tracing::debug!(message = %error.message, "graphql request failed");
        }
        StatusCode::BAD_REQUEST
    };
    (status, Json(response)).into_response()
}

pub async fn graphql_explorer() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}
