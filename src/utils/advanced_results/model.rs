use super::filter::{self, Filter};
use async_trait::async_trait;
use serde_json::{Map, Value};

#[derive(Debug, PartialEq)]
pub enum Error {
    InvalidFilter(String),
    UnknownRelation(String),
    UnexpectedError,
}

impl From<filter::Error> for Error {
    fn from(err: filter::Error) -> Self {
        match err {
            filter::Error::InvalidFilter(message) => Self::InvalidFilter(message),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ParseError {
    InvalidSelect(String),
    InvalidSort(String),
}

/// Fields kept in (or removed from) each returned document.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    pub fn include<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        Self::Include(fields.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        Self::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Parses `name,email` (inclusion) or `-password,-token` (exclusion).
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let fields = split_list(raw);
        if fields.is_empty() {
            return Err(ParseError::InvalidSelect(raw.to_string()));
        }

        let excluded = fields.iter().filter(|field| field.starts_with('-')).count();
        if excluded == 0 {
            Ok(Self::include(fields))
        } else if excluded == fields.len() {
            Ok(Self::exclude(fields.iter().map(|field| &field[1..])))
        } else {
            Err(ParseError::InvalidSelect(raw.to_string()))
        }
    }

    pub fn fields(&self) -> &[String] {
        match self {
            Self::Include(fields) | Self::Exclude(fields) => fields,
        }
    }

    pub fn apply(&self, document: Value) -> Value {
        let mut map = match document {
            Value::Object(map) => map,
            other => return other,
        };

        match self {
            Self::Include(fields) => Value::Object(
                fields
                    .iter()
                    .filter_map(|field| map.remove(field).map(|value| (field.clone(), value)))
                    .collect::<Map<String, Value>>(),
            ),
            Self::Exclude(fields) => {
                for field in fields {
                    map.remove(field);
                }
                Value::Object(map)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parses `name,-age`; a leading `-` sorts descending.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, ParseError> {
        let keys = split_list(raw)
            .into_iter()
            .map(|field| match field.strip_prefix('-') {
                Some(field) => Self::desc(field),
                None => Self::asc(field.strip_prefix('+').unwrap_or(field)),
            })
            .collect::<Vec<_>>();

        if keys.is_empty() || keys.iter().any(|key| key.field.is_empty()) {
            return Err(ParseError::InvalidSort(raw.to_string()));
        }

        Ok(keys)
    }
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect()
}

/// A relation expansion request.
#[derive(Debug, Clone, PartialEq)]
pub struct Populate {
    pub path: String,
    pub select: Option<Projection>,
}

impl Populate {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            select: None,
        }
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.select = Some(projection);
        self
    }
}

impl From<&str> for Populate {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Ordered relation expansions configured on a list endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Populations(Vec<Populate>);

impl Populations {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Populate> {
        self.0.iter()
    }
}

impl From<Populate> for Populations {
    fn from(populate: Populate) -> Self {
        Self(vec![populate])
    }
}

impl From<&str> for Populations {
    fn from(path: &str) -> Self {
        Self(vec![Populate::new(path)])
    }
}

impl<T: Into<Populate>> From<Vec<T>> for Populations {
    fn from(populations: Vec<T>) -> Self {
        Self(populations.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Populate>, const N: usize> From<[T; N]> for Populations {
    fn from(populations: [T; N]) -> Self {
        Self(populations.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Populate>> From<Option<T>> for Populations {
    fn from(populate: Option<T>) -> Self {
        Self(populate.into_iter().map(Into::into).collect())
    }
}

/// A read query, built by chaining like a query builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub projection: Option<Projection>,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
    pub populate: Vec<Populate>,
}

impl Query {
    pub fn find(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.sort = keys;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn populate(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// The field holds the id of a document in the related collection.
    BelongsTo,
    /// Documents of the related collection whose `foreign_field` holds this document's id.
    HasMany { foreign_field: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub collection: String,
    pub kind: RelationKind,
}

impl Relation {
    pub fn belongs_to(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            kind: RelationKind::BelongsTo,
        }
    }

    pub fn has_many(collection: impl Into<String>, foreign_field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            kind: RelationKind::HasMany {
                foreign_field: foreign_field.into(),
            },
        }
    }
}

/// A collection the advanced results middleware can read from.
///
/// Sorting on a field holding mixed types orders values like `jsonb`: missing, null, string,
/// number, boolean, array, object, with missing values first ascending and last descending.
#[async_trait]
pub trait Model: Send + Sync {
    async fn find(&self, query: &Query) -> Result<Vec<Value>, Error>;

    /// Counts the documents matching `filter`, or the whole collection when `None`.
    async fn count_documents(&self, filter: Option<&Filter>) -> Result<u64, Error>;
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_parse_projections() {
        assert_eq!(
            Projection::parse("name,email").unwrap(),
            Projection::include(["name", "email"])
        );
        assert_eq!(
            Projection::parse("-password, -token").unwrap(),
            Projection::exclude(["password", "token"])
        );
        assert!(Projection::parse("name,-password").is_err());
        assert!(Projection::parse(",").is_err());
    }

    #[test]
    fn should_apply_projections() {
        let document = json!({ "id": "1", "name": "Dev", "email": "a@b.c", "password": "x" });

        assert_eq!(
            Projection::include(["name", "email", "missing"]).apply(document.clone()),
            json!({ "name": "Dev", "email": "a@b.c" })
        );
        assert_eq!(
            Projection::exclude(["password"]).apply(document),
            json!({ "id": "1", "name": "Dev", "email": "a@b.c" })
        );
    }

    #[test]
    fn should_parse_sort_keys() {
        assert_eq!(
            SortKey::parse_list("-age,name,+rating").unwrap(),
            vec![SortKey::desc("age"), SortKey::asc("name"), SortKey::asc("rating")]
        );
        assert!(SortKey::parse_list("-").is_err());
        assert!(SortKey::parse_list("").is_err());
    }

    #[test]
    fn should_accept_single_or_many_populations() {
        assert_eq!(Populations::from("courses").iter().count(), 1);
        assert_eq!(Populations::from(vec!["bootcamp", "user"]).iter().count(), 2);
        assert_eq!(
            Populations::from([Populate::new("a"), Populate::new("b")])
                .iter()
                .map(|populate| populate.path.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(Populations::from(None::<Populate>), Populations::none());
    }

    #[test]
    fn should_chain_query() {
        let query = Query::find(Filter::default())
            .select(Projection::include(["name"]))
            .sort(vec![SortKey::desc("createdAt")])
            .skip(10)
            .limit(5)
            .populate("bootcamp".into());

        assert_eq!(query.skip, 10);
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.populate, vec![Populate::new("bootcamp")]);
    }
}
