use super::handler;
use crate::{
    modules::bootcamp::repository,
    types::Context,
    utils::advanced_results::{self, AdvancedResults},
};
use axum::{
    middleware,
    routing::{get, Router},
};
use std::sync::Arc;

pub fn get_router(ctx: &Context) -> Router<Arc<Context>> {
    let results = AdvancedResults::new(repository::model(&ctx.store), "courses")
        .with_settings(ctx.query.clone());

    Router::new().route(
        "/",
        get(handler::handler).route_layer(middleware::from_fn_with_state(
            results,
            advanced_results::middleware,
        )),
    )
}
