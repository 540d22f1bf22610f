use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Comparison keywords accepted in query strings, rewritten to `$`-prefixed operators.
pub const OPERATORS: [&str; 5] = ["gt", "gte", "lt", "lte", "in"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OperatorRewrite {
    /// Renames matching object keys only.
    #[default]
    Structural,
    /// Regex over the serialized filter; also rewrites matching string values.
    Textual,
}

impl OperatorRewrite {
    pub fn from(raw: String) -> Self {
        match raw.as_ref() {
            "textual" => Self::Textual,
            _ => Self::Structural,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Error {
    InvalidFilter(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
}

/// A filter document in operator syntax, e.g. `{"age": {"$gt": "18"}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn rewrite(map: Map<String, Value>, mode: OperatorRewrite) -> Result<Self, Error> {
        match mode {
            OperatorRewrite::Structural => match rewrite_keys(Value::Object(map)) {
                Value::Object(map) => Ok(Self(map)),
                _ => unreachable!("rewriting an object yields an object"),
            },
            OperatorRewrite::Textual => rewrite_text(&map).map(Self),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattens the document into `(dotted path, condition)` pairs.
    pub fn conditions(&self) -> Result<Vec<(String, Condition)>, Error> {
        let mut conditions = vec![];
        collect("", &self.0, &mut conditions)?;
        Ok(conditions)
    }
}

fn rewrite_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let key = if OPERATORS.contains(&key.as_str()) {
                        format!("${key}")
                    } else {
                        key
                    };
                    (key, rewrite_keys(value))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(rewrite_keys).collect()),
        other => other,
    }
}

fn operator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(gt|gte|lt|lte|in)\b").expect("valid operator pattern"))
}

fn rewrite_text(map: &Map<String, Value>) -> Result<Map<String, Value>, Error> {
    let text = serde_json::to_string(map)
        .map_err(|err| Error::InvalidFilter(format!("Failed to serialize filter: {err}")))?;
    let rewritten = operator_pattern().replace_all(&text, "$$${1}");

    serde_json::from_str(&rewritten)
        .map_err(|err| Error::InvalidFilter(format!("Failed to parse rewritten filter: {err}")))
}

fn collect(
    prefix: &str,
    map: &Map<String, Value>,
    conditions: &mut Vec<(String, Condition)>,
) -> Result<(), Error> {
    for (key, value) in map {
        if key.starts_with('$') {
            if prefix.is_empty() {
                return Err(Error::InvalidFilter(format!(
                    "Unknown top-level operator: {key}"
                )));
            }
            conditions.push((prefix.to_string(), operator(key, value)?));
            continue;
        }

        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::Object(inner) if !inner.is_empty() => collect(&path, inner, conditions)?,
            value => conditions.push((path, Condition::Eq(value.clone()))),
        }
    }

    Ok(())
}

fn operator(key: &str, value: &Value) -> Result<Condition, Error> {
    if key == "$in" {
        let values = match value {
            Value::Array(items) => items.clone(),
            Value::String(list) => list
                .split(',')
                .map(|item| Value::String(item.to_string()))
                .collect(),
            scalar => vec![scalar.clone()],
        };
        return Ok(Condition::In(values));
    }

    if value.is_object() || value.is_array() {
        return Err(Error::InvalidFilter(format!(
            "Operator {key} expects a single value"
        )));
    }

    let value = value.clone();
    match key {
        "$gt" => Ok(Condition::Gt(value)),
        "$gte" => Ok(Condition::Gte(value)),
        "$lt" => Ok(Condition::Lt(value)),
        "$lte" => Ok(Condition::Lte(value)),
        "$eq" => Ok(Condition::Eq(value)),
        _ => Err(Error::InvalidFilter(format!("Unknown operator: {key}"))),
    }
}
