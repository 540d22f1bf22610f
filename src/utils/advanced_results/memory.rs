use super::filter::{Condition, Filter};
use super::model::{
    Error, Model, Populate, Query, Relation, RelationKind, SortDirection, SortKey,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use ulid::Ulid;

type Collections = HashMap<String, Vec<Value>>;

#[derive(Debug)]
pub enum SeedError {
    FailedToRead,
    FailedToParse,
    InvalidDocument,
}

/// Documents kept in process, grouped by collection name.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `document`, filling in `id` and `createdAt` when missing.
    pub async fn insert(&self, collection: &str, document: Value) -> Result<Value, Error> {
        let Value::Object(mut document) = document else {
            tracing::error!("Refusing to insert a non-object document into {}", collection);
            return Err(Error::UnexpectedError);
        };

        document
            .entry("id")
            .or_insert_with(|| Value::String(Ulid::new().to_string()));
        document
            .entry("createdAt")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

        let document = Value::Object(document);
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());

        Ok(document)
    }

    /// Loads `{"collection": [documents]}` from a JSON file and returns how many documents were
    /// stored.
    pub async fn load_seed(&self, path: &Path) -> Result<usize, SeedError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
            tracing::error!("Failed to read seed file {}: {}", path.display(), err);
            SeedError::FailedToRead
        })?;

        let seed = serde_json::from_str::<Map<String, Value>>(&raw).map_err(|err| {
            tracing::error!("Failed to parse seed file {}: {}", path.display(), err);
            SeedError::FailedToParse
        })?;

        let mut inserted = 0;
        for (collection, documents) in seed {
            let Value::Array(documents) = documents else {
                tracing::error!("Seed entry {} is not an array of documents", collection);
                return Err(SeedError::InvalidDocument);
            };

            for document in documents {
                self.insert(&collection, document)
                    .await
                    .map_err(|_| SeedError::InvalidDocument)?;
                inserted += 1;
            }
        }

        Ok(inserted)
    }
}

#[derive(Clone)]
pub struct MemoryCollection {
    store: MemoryStore,
    name: String,
    relations: HashMap<String, Relation>,
}

impl MemoryCollection {
    pub fn new(store: MemoryStore, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            relations: HashMap::new(),
        }
    }

    pub fn with_relation(mut self, path: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(path.into(), relation);
        self
    }

    fn expand(
        &self,
        collections: &Collections,
        document: &mut Value,
        populate: &Populate,
    ) -> Result<(), Error> {
        let relation = self
            .relations
            .get(&populate.path)
            .ok_or_else(|| Error::UnknownRelation(populate.path.clone()))?;
        let related = collections
            .get(&relation.collection)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let project = |related: &Value| match &populate.select {
            Some(projection) => projection.apply(related.clone()),
            None => related.clone(),
        };

        let expanded = match &relation.kind {
            RelationKind::BelongsTo => match document.get(&populate.path) {
                None => return Ok(()),
                Some(Value::Array(ids)) => Value::Array(
                    ids.iter()
                        .filter_map(|id| find_by_id(related, id))
                        .map(project)
                        .collect(),
                ),
                Some(id) => find_by_id(related, id)
                    .map(project)
                    .unwrap_or(Value::Null),
            },
            RelationKind::HasMany { foreign_field } => {
                let Some(id) = document.get("id") else {
                    return Ok(());
                };
                Value::Array(
                    related
                        .iter()
                        .filter(|candidate| lookup(candidate, foreign_field) == Some(id))
                        .map(project)
                        .collect(),
                )
            }
        };

        if let Value::Object(map) = document {
            map.insert(populate.path.clone(), expanded);
        }

        Ok(())
    }
}

#[async_trait]
impl Model for MemoryCollection {
    async fn find(&self, query: &Query) -> Result<Vec<Value>, Error> {
        let conditions = query.filter.conditions()?;
        let collections = self.store.collections.read().await;

        let mut documents = collections
            .get(&self.name)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches(document, &conditions))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        documents.sort_by(|a, b| compare_documents(a, b, &query.sort));

        let limit = query
            .limit
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);

        documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| {
                let mut document = document.clone();
                for populate in &query.populate {
                    self.expand(&collections, &mut document, populate)?;
                }

                Ok(match &query.projection {
                    Some(projection) => projection.apply(document),
                    None => document,
                })
            })
            .collect()
    }

    async fn count_documents(&self, filter: Option<&Filter>) -> Result<u64, Error> {
        let conditions = match filter {
            Some(filter) => filter.conditions()?,
            None => vec![],
        };

        let collections = self.store.collections.read().await;
        let total = collections
            .get(&self.name)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches(document, &conditions))
                    .count()
            })
            .unwrap_or_default();

        Ok(total as u64)
    }
}

fn find_by_id<'a>(documents: &'a [Value], id: &Value) -> Option<&'a Value> {
    documents
        .iter()
        .find(|document| document.get("id") == Some(id))
}

fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |value, segment| value.get(segment))
}

fn matches(document: &Value, conditions: &[(String, Condition)]) -> bool {
    conditions
        .iter()
        .all(|(path, condition)| satisfies(lookup(document, path), condition))
}

fn satisfies(field: Option<&Value>, condition: &Condition) -> bool {
    let Some(field) = field else {
        return matches!(condition, Condition::Eq(Value::Null));
    };

    // array fields match when any element does
    if let Value::Array(items) = field {
        if items.iter().any(|item| satisfies(Some(item), condition)) {
            return true;
        }
    }

    match condition {
        Condition::Eq(operand) => compare(field, operand) == Some(Ordering::Equal),
        Condition::Gt(operand) => compare(field, operand) == Some(Ordering::Greater),
        Condition::Gte(operand) => matches!(
            compare(field, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Condition::Lt(operand) => compare(field, operand) == Some(Ordering::Less),
        Condition::Lte(operand) => matches!(
            compare(field, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Condition::In(operands) => operands
            .iter()
            .any(|operand| compare(field, operand) == Some(Ordering::Equal)),
    }
}

/// Orders a stored value against a filter operand. Query string operands arrive as text, so
/// they are read as numbers, booleans or `null` when the stored value has that type.
fn compare(field: &Value, operand: &Value) -> Option<Ordering> {
    match (field, operand) {
        (Value::Number(field), Value::String(operand)) => {
            let operand = operand.trim().parse::<f64>().ok()?;
            field.as_f64()?.partial_cmp(&operand)
        }
        (Value::Number(field), Value::Number(operand)) => {
            field.as_f64()?.partial_cmp(&operand.as_f64()?)
        }
        (Value::Bool(field), Value::String(operand)) => match operand.as_str() {
            "true" => Some(field.cmp(&true)),
            "false" => Some(field.cmp(&false)),
            _ => None,
        },
        (Value::Bool(field), Value::Bool(operand)) => Some(field.cmp(operand)),
        (Value::Null, Value::String(operand)) if operand == "null" => Some(Ordering::Equal),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::String(field), Value::String(operand)) => Some(field.as_str().cmp(operand)),
        (field, operand) if field == operand => Some(Ordering::Equal),
        _ => None,
    }
}

/// Mixed types order like `jsonb`: missing, null, string, number, boolean, array, object.
fn rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::Bool(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn compare_documents(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    keys.iter()
        .map(|key| {
            let ordering = compare_values(lookup(a, &key.field), lookup(b, &key.field));
            match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}
