pub mod advanced_results;
pub mod database;
pub mod error;
pub mod pagination;
