use crate::modules::course;
use crate::types::Store;
use crate::utils::advanced_results::{Model, Relation};
use std::sync::Arc;

pub const COLLECTION: &str = "bootcamps";

pub fn model(store: &Store) -> Arc<dyn Model> {
    store.collection(
        COLLECTION,
        &[(
            "courses",
            Relation::has_many(course::repository::COLLECTION, "bootcamp"),
        )],
    )
}
