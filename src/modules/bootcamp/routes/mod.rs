mod list;

use crate::types::Context;
use axum::routing::Router;
use std::sync::Arc;

pub fn get_router(ctx: &Context) -> Router<Arc<Context>> {
    Router::new().merge(list::get_router(ctx))
}
