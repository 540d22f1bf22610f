use crate::modules::bootcamp;
use crate::types::Store;
use crate::utils::advanced_results::{Model, Relation};
use std::sync::Arc;

pub const COLLECTION: &str = "courses";

pub fn model(store: &Store) -> Arc<dyn Model> {
    store.collection(
        COLLECTION,
        &[(
            "bootcamp",
            Relation::belongs_to(bootcamp::repository::COLLECTION),
        )],
    )
}
