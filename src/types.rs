pub use crate::utils::database;
use crate::utils::advanced_results::{
    memory::{MemoryCollection, MemoryStore},
    postgres::PgCollection,
    CountMode, Model, OperatorRewrite, Relation, Settings, SortKey,
};
use async_trait::async_trait;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext {
    pub host: String,
    pub port: u32,
}

/// Where list endpoints read their documents from.
#[derive(Clone)]
pub enum Store {
    Postgres(database::DatabaseConnection),
    Memory(MemoryStore),
}

impl Store {
    pub fn collection(&self, name: &str, relations: &[(&str, Relation)]) -> Arc<dyn Model> {
        match self {
            Self::Postgres(db_conn) => Arc::new(relations.iter().fold(
                PgCollection::new(db_conn.pool.clone(), name),
                |collection, (path, relation)| collection.with_relation(*path, relation.clone()),
            )),
            Self::Memory(store) => Arc::new(relations.iter().fold(
                MemoryCollection::new(store.clone(), name),
                |collection, (path, relation)| collection.with_relation(*path, relation.clone()),
            )),
        }
    }
}

#[derive(Clone)]
pub struct Context {
    pub app: AppContext,
    pub store: Store,
    pub query: Settings,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u32,
}

#[derive(Clone)]
pub struct QueryConfig {
    pub default_limit: u64,
    pub max_limit: Option<u64>,
    pub default_sort: Vec<SortKey>,
    pub count_mode: CountMode,
    pub operator_rewrite: OperatorRewrite,
}

#[derive(Clone)]
pub struct Config {
    pub database: Option<DatabaseConfig>,
    pub seed_file: Option<PathBuf>,
    pub app: AppConfig,
    pub query: QueryConfig,
}

impl Default for Config {
    fn default() -> Self {
        let database_url = env::var("DATABASE_URL").ok();
        let seed_file = env::var("SEED_FILE").ok().map(PathBuf::from);
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u32>()
            .expect("Invalid PORT number");
        let default_limit = env::var("QUERY_DEFAULT_LIMIT")
            .unwrap_or_else(|_| "25".to_string())
            .parse::<u64>()
            .expect("Invalid QUERY_DEFAULT_LIMIT number");
        let max_limit = env::var("QUERY_MAX_LIMIT").ok().map(|max_limit| {
            max_limit
                .parse::<u64>()
                .expect("Invalid QUERY_MAX_LIMIT number")
        });
        let default_sort = parse_default_sort(
            &env::var("QUERY_DEFAULT_SORT").unwrap_or_else(|_| "-createdAt".to_string()),
        );
        let count_mode = env::var("QUERY_COUNT_MODE").unwrap_or_else(|_| "collection".to_string());
        let operator_rewrite =
            env::var("QUERY_OPERATOR_REWRITE").unwrap_or_else(|_| "structural".to_string());

        return Self {
            database: database_url.map(|url| DatabaseConfig { url }),
            seed_file,
            app: AppConfig { host, port },
            query: QueryConfig {
                default_limit,
                max_limit,
                default_sort,
                count_mode: CountMode::from(count_mode),
                operator_rewrite: OperatorRewrite::from(operator_rewrite),
            },
        };
    }
}

fn parse_default_sort(raw: &str) -> Vec<SortKey> {
    SortKey::parse_list(raw).expect("Invalid QUERY_DEFAULT_SORT")
}

#[async_trait]
pub trait ToContext {
    async fn to_context(self) -> Context;
}

#[async_trait]
impl ToContext for Config {
    async fn to_context(self) -> Context {
        let store = match self.database {
            Some(database) => {
                let db_conn = database::connect(database.url.as_str()).await;
                database::migrate(db_conn.clone()).await;
                tracing::info!("Reading collections from postgres");
                Store::Postgres(db_conn)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, reading collections from memory");
                let store = MemoryStore::new();
                if let Some(seed_file) = self.seed_file {
                    let inserted = store
                        .load_seed(&seed_file)
                        .await
                        .expect("Failed to load SEED_FILE");
                    tracing::info!("Seeded {} documents from {}", inserted, seed_file.display());
                }
                Store::Memory(store)
            }
        };

        Context {
            app: AppContext {
                host: self.app.host,
                port: self.app.port,
            },
            store,
            query: Settings {
                default_limit: self.query.default_limit.max(1),
                max_limit: self.query.max_limit,
                default_sort: self.query.default_sort,
                count_mode: self.query.count_mode,
                operator_rewrite: self.query.operator_rewrite,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_parse_default_sort() {
        assert_eq!(
            parse_default_sort("-createdAt,name"),
            vec![SortKey::desc("createdAt"), SortKey::asc("name")]
        );
    }

    #[test]
    #[should_panic(expected = "Invalid QUERY_DEFAULT_SORT")]
    fn should_refuse_malformed_default_sort() {
        parse_default_sort("-");
    }
}
