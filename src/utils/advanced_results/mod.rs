//! Query string driven list reads: filtering, sorting, projection, offset pagination and
//! relation expansion over any [`Model`].

pub mod filter;
pub mod memory;
pub mod middleware;
pub mod model;
pub mod params;
pub mod postgres;

pub use filter::{Filter, OperatorRewrite};
pub use middleware::{middleware, AdvancedResult, AdvancedResults, CountMode, Settings};
pub use model::{Model, Populate, Populations, Projection, Query, Relation, SortKey};
pub use params::QueryParameters;
