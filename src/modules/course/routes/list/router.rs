use super::handler;
use crate::{
    modules::course::repository,
    types::Context,
    utils::advanced_results::{self, AdvancedResults, Populate, Projection},
};
use axum::{
    middleware,
    routing::{get, Router},
};
use std::sync::Arc;

pub fn get_router(ctx: &Context) -> Router<Arc<Context>> {
    let bootcamp = Populate::new("bootcamp").select(Projection::include(["name", "description"]));
    let results = AdvancedResults::new(repository::model(&ctx.store), bootcamp)
        .with_settings(ctx.query.clone());

    Router::new().route(
        "/",
        get(handler::handler).route_layer(middleware::from_fn_with_state(
            results,
            advanced_results::middleware,
        )),
    )
}
