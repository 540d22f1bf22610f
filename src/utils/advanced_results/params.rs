use serde_json::{Map, Value};

/// Control parameters; every other key is a filter predicate.
pub const RESERVED: [&str; 4] = ["select", "sort", "page", "limit"];

#[derive(Debug)]
pub enum Error {
    NotText(String),
}

/// Query string parameters as a nested JSON map.
///
/// Bracketed keys nest (`age[gt]=18` becomes `{"age": {"gt": "18"}}`), `[]` and repeated keys
/// collect into arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters(Map<String, Value>);

impl QueryParameters {
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(raw.unwrap_or_default())
            .unwrap_or_else(|err| {
                tracing::warn!("Failed to decode query string: {}", err);
                vec![]
            });

        let mut params = Map::new();
        for (key, value) in pairs {
            if key.is_empty() {
                continue;
            }

            let (root, path) = split_key(&key);
            match params.get_mut(&root) {
                Some(existing) => merge(existing, &path, value),
                None => {
                    params.insert(root, build(&path, value));
                }
            }
        }

        Self(params)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when any value, at any depth, is `null`, `""` or `"undefined"`.
    pub fn has_empty_value(&self) -> bool {
        self.0.values().any(is_empty_value)
    }

    /// A control parameter as text. Repeated parameters are joined with commas.
    pub fn text(&self, name: &str) -> Result<Option<String>, Error> {
        match self.0.get(name) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(value) => Ok(value.as_str()),
                    _ => Err(Error::NotText(name.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|values| Some(values.join(","))),
            Some(_) => Err(Error::NotText(name.to_string())),
        }
    }

    pub fn without_reserved(&self) -> Map<String, Value> {
        let mut map = self.0.clone();
        for key in RESERVED {
            map.remove(key);
        }
        map
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(value) => value.is_empty() || value == "undefined",
        Value::Array(items) => items.iter().any(is_empty_value),
        Value::Object(map) => map.values().any(is_empty_value),
        _ => false,
    }
}

/// Splits `a[b][c]` into `("a", ["b", "c"])`. Keys that are not well formed stay flat.
fn split_key(key: &str) -> (String, Vec<String>) {
    let flat = || (key.to_string(), vec![]);

    let open = match key.find('[') {
        Some(open) if open > 0 => open,
        _ => return flat(),
    };

    let mut segments = vec![];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return flat();
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }

    if !rest.is_empty() {
        return flat();
    }

    (key[..open].to_string(), segments)
}

fn build(path: &[String], value: String) -> Value {
    match path.split_first() {
        None => Value::String(value),
        Some((segment, rest)) if segment.is_empty() => Value::Array(vec![build(rest, value)]),
        Some((segment, rest)) => {
            let mut map = Map::new();
            map.insert(segment.clone(), build(rest, value));
            Value::Object(map)
        }
    }
}

fn merge(existing: &mut Value, path: &[String], value: String) {
    match (existing, path.split_first()) {
        (Value::Object(map), Some((segment, rest))) if !segment.is_empty() => {
            match map.get_mut(segment) {
                Some(child) => merge(child, rest, value),
                None => {
                    map.insert(segment.clone(), build(rest, value));
                }
            }
        }
        (Value::Array(items), Some((segment, rest))) if segment.is_empty() => {
            items.push(build(rest, value))
        }
        (Value::Array(items), None) => items.push(Value::String(value)),
        (slot, _) => {
            // shapes disagree (`a=1&a=2`, `a=1&a[b]=2`): keep both
            let previous = slot.take();
            *slot = Value::Array(vec![previous, build(path, value)]);
        }
    }
}
