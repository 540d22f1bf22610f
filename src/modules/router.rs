use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use super::{bootcamp, course};
use crate::types::Context;
use std::sync::Arc;

async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "message": "Advanced results API" })),
    )
}

pub fn get_router(ctx: &Context) -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(health_check))
        .nest("/bootcamps", bootcamp::routes::get_router(ctx))
        .nest("/courses", course::routes::get_router(ctx))
}
