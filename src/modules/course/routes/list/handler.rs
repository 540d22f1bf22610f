use crate::utils::advanced_results::AdvancedResult;
use axum::{http::StatusCode, response::IntoResponse, Json};

pub async fn handler(results: AdvancedResult) -> impl IntoResponse {
    (StatusCode::OK, Json(results))
}
