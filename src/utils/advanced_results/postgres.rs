use super::filter::{Condition, Filter};
use super::model::{Error, Model, Populate, Projection, Query, Relation, RelationKind};
use super::model::{SortDirection, SortKey};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::sync::OnceLock;

/// A document table: `id TEXT`, `data JSONB`, `created_at` and `updated_at`. Rows are read as
/// `data` plus `id`, `createdAt` and `updatedAt`.
#[derive(Clone)]
pub struct PgCollection {
    pool: PgPool,
    table: String,
    relations: HashMap<String, Relation>,
}

impl PgCollection {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            relations: HashMap::new(),
        }
    }

    pub fn with_relation(mut self, path: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(path.into(), relation);
        self
    }
}

#[async_trait]
impl Model for PgCollection {
    async fn find(&self, query: &Query) -> Result<Vec<Value>, Error> {
        let mut builder = find_query(&self.table, &self.relations, query)?;

        builder
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&self.pool)
            .await
            .map(|documents| {
                documents
                    .into_iter()
                    .map(|Json(document)| document)
                    .collect()
            })
            .map_err(|err| {
                tracing::error!(
                    "Error occurred while trying to fetch documents from {}: {}",
                    self.table,
                    err
                );
                Error::UnexpectedError
            })
    }

    async fn count_documents(&self, filter: Option<&Filter>) -> Result<u64, Error> {
        let mut builder = count_query(&self.table, filter)?;

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map(|total| total.max(0) as u64)
            .map_err(|err| {
                tracing::error!(
                    "Error occurred while trying to count documents in {}: {}",
                    self.table,
                    err
                );
                Error::UnexpectedError
            })
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"))
}

fn identifier(name: &str) -> Result<&str, Error> {
    if identifier_pattern().is_match(name) {
        Ok(name)
    } else {
        tracing::error!("Invalid table name: {}", name);
        Err(Error::UnexpectedError)
    }
}

fn document(alias: &str) -> String {
    format!(
        "({alias}.data || jsonb_build_object('id', {alias}.id, 'createdAt', {alias}.created_at, 'updatedAt', {alias}.updated_at))"
    )
}

fn path_segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

fn operand_text(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

fn find_query(
    table: &str,
    relations: &HashMap<String, Relation>,
    query: &Query,
) -> Result<QueryBuilder<'static, Postgres>, Error> {
    let conditions = query.filter.conditions()?;
    let mut builder = QueryBuilder::new("SELECT ");

    push_projected(&mut builder, query.projection.as_ref(), |builder| {
        builder.push("(docs.doc");
        for populate in &query.populate {
            push_population(builder, relations, populate)?;
        }
        builder.push(")");
        Ok(())
    })?;

    builder.push(" AS document FROM ");
    push_documents(&mut builder, table)?;
    push_conditions(&mut builder, &conditions);
    push_order(&mut builder, &query.sort);

    builder.push(" OFFSET ").push_bind(bigint(query.skip));
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ").push_bind(bigint(limit));
    }

    Ok(builder)
}

fn bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn count_query(table: &str, filter: Option<&Filter>) -> Result<QueryBuilder<'static, Postgres>, Error> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM ");
    push_documents(&mut builder, table)?;

    if let Some(filter) = filter {
        push_conditions(&mut builder, &filter.conditions()?);
    }

    Ok(builder)
}

fn push_documents(builder: &mut QueryBuilder<'static, Postgres>, table: &str) -> Result<(), Error> {
    let table = identifier(table)?;
    builder.push(format!("(SELECT {} AS doc FROM \"{table}\" t) AS docs", document("t")));
    Ok(())
}

fn push_projected<F>(
    builder: &mut QueryBuilder<'static, Postgres>,
    projection: Option<&Projection>,
    inner: F,
) -> Result<(), Error>
where
    F: FnOnce(&mut QueryBuilder<'static, Postgres>) -> Result<(), Error>,
{
    match projection {
        None => inner(builder),
        Some(Projection::Include(fields)) => {
            builder.push(
                "(SELECT COALESCE(jsonb_object_agg(projected.key, projected.value), '{}'::jsonb) FROM jsonb_each(",
            );
            inner(builder)?;
            builder
                .push(") AS projected WHERE projected.key = ANY(")
                .push_bind(fields.clone())
                .push("))");
            Ok(())
        }
        Some(Projection::Exclude(fields)) => {
            builder.push("(");
            inner(builder)?;
            builder.push(" - ").push_bind(fields.clone()).push("::text[])");
            Ok(())
        }
    }
}

fn push_population(
    builder: &mut QueryBuilder<'static, Postgres>,
    relations: &HashMap<String, Relation>,
    populate: &Populate,
) -> Result<(), Error> {
    let relation = relations
        .get(&populate.path)
        .ok_or_else(|| Error::UnknownRelation(populate.path.clone()))?;
    let table = identifier(&relation.collection)?;
    let related = |builder: &mut QueryBuilder<'static, Postgres>| -> Result<(), Error> {
        builder.push(document("r"));
        Ok(())
    };

    match &relation.kind {
        RelationKind::BelongsTo => {
            builder
                .push(" || CASE WHEN docs.doc ? ")
                .push_bind(populate.path.clone())
                .push(" THEN jsonb_build_object(")
                .push_bind(populate.path.clone())
                .push(", COALESCE((SELECT ");
            push_projected(builder, populate.select.as_ref(), related)?;
            builder
                .push(format!(" FROM \"{table}\" r WHERE r.id = docs.doc ->> "))
                .push_bind(populate.path.clone())
                .push(" LIMIT 1), 'null'::jsonb)) ELSE '{}'::jsonb END");
        }
        RelationKind::HasMany { foreign_field } => {
            builder
                .push(" || jsonb_build_object(")
                .push_bind(populate.path.clone())
                .push(", COALESCE((SELECT jsonb_agg(");
            push_projected(builder, populate.select.as_ref(), related)?;
            builder
                .push(format!(
                    " ORDER BY r.created_at) FROM \"{table}\" r WHERE {} #>> ",
                    document("r")
                ))
                .push_bind(path_segments(foreign_field))
                .push(" = docs.doc ->> 'id'), '[]'::jsonb))");
        }
    }

    Ok(())
}

fn push_conditions(builder: &mut QueryBuilder<'static, Postgres>, conditions: &[(String, Condition)]) {
    for (index, (path, condition)) in conditions.iter().enumerate() {
        builder.push(if index == 0 { " WHERE " } else { " AND " });
        push_condition(builder, path, condition);
    }
}

fn push_condition(builder: &mut QueryBuilder<'static, Postgres>, path: &str, condition: &Condition) {
    let segments = path_segments(path);

    match condition {
        Condition::Eq(Value::Null) => {
            builder
                .push("(docs.doc #> ")
                .push_bind(segments.clone())
                .push(" IS NULL OR docs.doc #> ")
                .push_bind(segments)
                .push(" = 'null'::jsonb)");
        }
        Condition::Eq(value @ (Value::Object(_) | Value::Array(_))) => {
            builder
                .push("docs.doc #> ")
                .push_bind(segments)
                .push(" = ")
                .push_bind(Json(value.clone()));
        }
        Condition::Eq(value) => {
            let text = operand_text(value).unwrap_or_default();
            // scalar fields compare by text, array fields by containment
            builder
                .push("(docs.doc #>> ")
                .push_bind(segments.clone())
                .push(" = ")
                .push_bind(text.clone())
                .push(" OR docs.doc #> ")
                .push_bind(segments)
                .push(" @> to_jsonb(")
                .push_bind(text)
                .push("::text))");
        }
        Condition::In(values) => {
            let texts = values.iter().filter_map(operand_text).collect::<Vec<_>>();
            builder
                .push("(docs.doc #>> ")
                .push_bind(segments.clone())
                .push(" = ANY(")
                .push_bind(texts.clone())
                .push(") OR docs.doc #> ")
                .push_bind(segments)
                .push(" ?| ")
                .push_bind(texts)
                .push(")");
        }
        Condition::Gt(operand) => push_comparison(builder, segments, ">", operand),
        Condition::Gte(operand) => push_comparison(builder, segments, ">=", operand),
        Condition::Lt(operand) => push_comparison(builder, segments, "<", operand),
        Condition::Lte(operand) => push_comparison(builder, segments, "<=", operand),
    }
}

fn push_comparison(
    builder: &mut QueryBuilder<'static, Postgres>,
    segments: Vec<String>,
    operator: &str,
    operand: &Value,
) {
    let Some(text) = operand_text(operand) else {
        builder.push("FALSE");
        return;
    };

    match text.trim().parse::<f64>() {
        Ok(number) => {
            builder
                .push("CASE WHEN jsonb_typeof(docs.doc #> ")
                .push_bind(segments.clone())
                .push(") = 'number' THEN (docs.doc #>> ")
                .push_bind(segments)
                .push(format!(")::float8 {operator} "))
                .push_bind(number)
                .push(" ELSE FALSE END");
        }
        Err(_) => {
            builder
                .push("docs.doc #>> ")
                .push_bind(segments)
                .push(format!(" {operator} "))
                .push_bind(text);
        }
    }
}

fn push_order(builder: &mut QueryBuilder<'static, Postgres>, keys: &[SortKey]) {
    for (index, key) in keys.iter().enumerate() {
        builder.push(if index == 0 { " ORDER BY " } else { ", " });
        builder
            .push("docs.doc #> ")
            .push_bind(path_segments(&key.field))
            .push(match key.direction {
                SortDirection::Asc => " ASC NULLS FIRST",
                SortDirection::Desc => " DESC NULLS LAST",
            });
    }
}
