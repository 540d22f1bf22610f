use super::filter::{self, Filter, OperatorRewrite};
use super::model::{self, Model, Populations, Projection, Query, SortKey};
use super::params::{self, QueryParameters};
use crate::utils::{
    error::ErrorResponse,
    pagination::{Pagination, PaginationLinks},
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Which documents `total` counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CountMode {
    /// The whole collection, whatever the filter.
    #[default]
    Collection,
    /// Only the documents matching the filter.
    Filtered,
}

impl CountMode {
    pub fn from(raw: String) -> Self {
        match raw.as_ref() {
            "filtered" => Self::Filtered,
            _ => Self::Collection,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub default_page: u64,
    pub default_limit: u64,
    pub max_limit: Option<u64>,
    pub default_sort: Vec<SortKey>,
    pub count_mode: CountMode,
    pub operator_rewrite: OperatorRewrite,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_limit: 25,
            max_limit: None,
            default_sort: vec![SortKey::desc("createdAt")],
            count_mode: CountMode::default(),
            operator_rewrite: OperatorRewrite::default(),
        }
    }
}

/// What the middleware hands to the list handler.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AdvancedResult {
    pub success: bool,
    pub count: usize,
    pub pagination: PaginationLinks,
    pub data: Vec<Value>,
}

impl From<params::Error> for ErrorResponse {
    fn from(err: params::Error) -> Self {
        match err {
            params::Error::NotText(name) => ErrorResponse::new(
                format!("Invalid {} parameter", name),
                StatusCode::BAD_REQUEST,
            ),
        }
    }
}

impl From<filter::Error> for ErrorResponse {
    fn from(err: filter::Error) -> Self {
        match err {
            filter::Error::InvalidFilter(message) => {
                ErrorResponse::new(message, StatusCode::BAD_REQUEST)
            }
        }
    }
}

impl From<model::ParseError> for ErrorResponse {
    fn from(err: model::ParseError) -> Self {
        let message = match err {
            model::ParseError::InvalidSelect(raw) => format!("Invalid select parameter: {}", raw),
            model::ParseError::InvalidSort(raw) => format!("Invalid sort parameter: {}", raw),
        };
        ErrorResponse::new(message, StatusCode::BAD_REQUEST)
    }
}

impl From<model::Error> for ErrorResponse {
    fn from(err: model::Error) -> Self {
        match err {
            model::Error::InvalidFilter(message) => {
                ErrorResponse::new(message, StatusCode::BAD_REQUEST)
            }
            model::Error::UnknownRelation(path) => {
                tracing::error!("No relation is registered for populate path {}", path);
                failed_to_fetch()
            }
            model::Error::UnexpectedError => failed_to_fetch(),
        }
    }
}

fn failed_to_fetch() -> ErrorResponse {
    ErrorResponse::new("Failed to fetch results", StatusCode::INTERNAL_SERVER_ERROR)
}

/// Filtered, sorted, paginated reads over one model, configured once per list endpoint.
#[derive(Clone)]
pub struct AdvancedResults {
    model: Arc<dyn Model>,
    populate: Populations,
    settings: Settings,
}

impl AdvancedResults {
    pub fn new(model: Arc<dyn Model>, populate: impl Into<Populations>) -> Self {
        Self {
            model,
            populate: populate.into(),
            settings: Settings::default(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn resolve(&self, params: &QueryParameters) -> Result<AdvancedResult, ErrorResponse> {
        if params.has_empty_value() {
            return Err(ErrorResponse::new(
                "One or more field is Empty, Null or Undefined",
                StatusCode::METHOD_NOT_ALLOWED,
            ));
        }

        let filter = Filter::rewrite(params.without_reserved(), self.settings.operator_rewrite)?;
        filter.conditions()?;

        let mut query = Query::find(filter);

        if let Some(select) = params.text("select")? {
            query = query.select(Projection::parse(&select)?);
        }

        query = match params.text("sort")? {
            Some(sort) => query.sort(SortKey::parse_list(&sort)?),
            None => query.sort(self.settings.default_sort.clone()),
        };

        let pagination = Pagination::from_params(
            params.text("page")?.as_deref(),
            params.text("limit")?.as_deref(),
            self.settings.default_page,
            self.settings.default_limit,
            self.settings.max_limit,
        );

        let total = match self.settings.count_mode {
            CountMode::Collection => self.model.count_documents(None).await?,
            CountMode::Filtered => self.model.count_documents(Some(&query.filter)).await?,
        };

        query = query.skip(pagination.start_index).limit(pagination.limit);

        for populate in self.populate.iter() {
            query = query.populate(populate.clone());
        }

        let data = self.model.find(&query).await?;

        tracing::debug!(
            "Resolved page {} (limit {}) with {} of {} documents",
            pagination.page,
            pagination.limit,
            data.len(),
            total
        );

        Ok(AdvancedResult {
            success: true,
            count: data.len(),
            pagination: pagination.links(total),
            data,
        })
    }
}

/// For `axum::middleware::from_fn_with_state`. Resolves the request query and hands the
/// result to the next handler through the request extensions.
pub async fn middleware(
    State(results): State<AdvancedResults>,
    mut request: Request,
    next: Next,
) -> Result<Response, ErrorResponse> {
    let params = QueryParameters::parse(request.uri().query());
    let resolved = results.resolve(&params).await?;

    request.extensions_mut().insert(resolved);

    Ok(next.run(request).await)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdvancedResult {
    type Rejection = ErrorResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.remove::<AdvancedResult>().ok_or_else(|| {
            tracing::error!("Advanced results requested on a route without the middleware");
            failed_to_fetch()
        })
    }
}
