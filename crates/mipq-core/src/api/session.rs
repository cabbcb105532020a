//! The caller-facing query session.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::backend::{Backend, validate_query};
use crate::encoding::json::expr_from_json;
use crate::error::{FilterError, Result};
use crate::types::Record;

use super::decompose::{Decomposer, Routing};
use super::filter::Expr;
use super::predicate::{CompileContext, compile_all};
use super::query::Query;
use super::stream::FilteredStream;

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Deepest residual expression the compiler accepts; `None` accepts any
    /// depth.
    pub max_expression_depth: Option<usize>,
    /// Skip records whose residual comparison hits an absent or null value.
    /// When `false` those comparisons surface as errors.
    pub skip_null_comparisons: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_expression_depth: None,
            skip_null_comparisons: true,
        }
    }
}

/// What a session starts from: a bare model or a pre-built base query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTarget {
    Model(String),
    Query(Query),
}

impl From<&str> for QueryTarget {
    fn from(model: &str) -> Self {
        QueryTarget::Model(model.to_string())
    }
}

impl From<String> for QueryTarget {
    fn from(model: String) -> Self {
        QueryTarget::Model(model)
    }
}

impl From<Query> for QueryTarget {
    fn from(query: Query) -> Self {
        QueryTarget::Query(query)
    }
}

/// How a session splits its filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub model: String,
    pub inequality_property: Option<String>,
    pub pushed: Vec<Expr>,
    pub residual: Vec<Expr>,
}

/// A query that accepts inequality filters on any number of properties.
///
/// Filters are pushed to the backend while they respect its
/// one-inequality-property rule; the rest are evaluated against each record
/// the backend returns. Each [`iter`](Self::iter) executes the backend query
/// again.
///
/// ```no_run
/// use mipq_core::api::{Expr, MipQuery};
/// use mipq_core::backend::MemoryBackend;
///
/// let backend = MemoryBackend::new();
/// let query = MipQuery::new(&backend, "Employee")
///     .filter(Expr::gt("salary", 50000))
///     .filter(Expr::lt("age", 30));
/// for record in query.iter().unwrap() {
///     println!("{:?}", record.unwrap());
/// }
/// ```
pub struct MipQuery<'a, B: Backend> {
    backend: &'a B,
    query: Query,
    decomposer: Decomposer,
    config: QueryConfig,
}

impl<'a, B: Backend> MipQuery<'a, B> {
    pub fn new(backend: &'a B, target: impl Into<QueryTarget>) -> Self {
        let query = match target.into() {
            QueryTarget::Model(model) => Query::new(model),
            QueryTarget::Query(query) => query,
        };
        if let Err(e) = validate_query(&query) {
            warn!(model = %query.model, error = %e, "base query will be rejected by the backend");
        }
        let decomposer = Decomposer::initialize(&query.filters);
        Self {
            backend,
            query,
            decomposer,
            config: QueryConfig::default(),
        }
    }

    /// Build a session from JSON: a string names a model, an object
    /// `{"model": ..., "filters": [...]}` is a base query.
    pub fn from_json(backend: &'a B, target: &JsonValue) -> Result<Self> {
        match target {
            JsonValue::String(model) => Ok(Self::new(backend, model.as_str())),
            JsonValue::Object(obj) => {
                let model = obj.get("model").and_then(JsonValue::as_str).ok_or_else(|| {
                    FilterError::InvalidFilterType(
                        "query object requires a string \"model\"".to_string(),
                    )
                })?;
                let mut query = Query::new(model);
                match obj.get("filters") {
                    None | Some(JsonValue::Null) => {}
                    Some(JsonValue::Array(filters)) => {
                        for f in filters {
                            query.push_filter(expr_from_json(f, model, backend.schema())?);
                        }
                    }
                    Some(other) => {
                        return Err(FilterError::InvalidFilterType(format!(
                            "query \"filters\" must be an array, got {other}"
                        ))
                        .into());
                    }
                }
                Ok(Self::new(backend, query))
            }
            other => Err(FilterError::InvalidFilterType(format!(
                "expected a model name or a query, got {other}"
            ))
            .into()),
        }
    }

    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a filter, pushing it to the backend when possible.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.route(expr);
        self
    }

    /// Add zero or more filters, each routed independently.
    pub fn filters(mut self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        for expr in exprs {
            self.route(expr);
        }
        self
    }

    /// Add filters given as JSON expression trees.
    ///
    /// Fails with `InvalidFilterType` if any value is not an expression node;
    /// filters before the bad one have already been added.
    pub fn filter_json(mut self, exprs: &[JsonValue]) -> Result<Self> {
        for json in exprs {
            let expr = expr_from_json(json, &self.query.model, self.backend.schema())?;
            self.route(expr);
        }
        Ok(self)
    }

    fn route(&mut self, expr: Expr) {
        if let Routing::Accepted(expr) = self.decomposer.submit(expr) {
            self.query.push_filter(expr);
        }
    }

    /// Execute the push-down query and stream the records that also pass
    /// every residual filter.
    pub fn iter(&self) -> Result<FilteredStream<B::Stream>> {
        let ctx = CompileContext::new(&self.query.model, self.backend.schema())
            .max_depth(self.config.max_expression_depth);
        let predicate = compile_all(self.decomposer.residual(), &ctx)?;

        debug!(
            model = %self.query.model,
            pushed = self.query.filters.len(),
            residual = self.decomposer.residual().len(),
            pass_through = predicate.is_trivial(),
            "executing query"
        );
        let stream = self.backend.execute(&self.query)?;
        Ok(FilteredStream::new(stream, predicate)
            .skip_null_comparisons(self.config.skip_null_comparisons))
    }

    /// Run the query and collect every matching record.
    pub fn collect_records(&self) -> Result<Vec<Record>> {
        self.iter()?.collect()
    }

    /// The push-down query as it will be sent to the backend.
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn inequality_property(&self) -> Option<&str> {
        self.decomposer.inequality_property()
    }

    pub fn residual_filters(&self) -> &[Expr] {
        self.decomposer.residual()
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn plan(&self) -> QueryPlan {
        QueryPlan {
            model: self.query.model.clone(),
            inequality_property: self.inequality_property().map(str::to_string),
            pushed: self.query.filters.clone(),
            residual: self.decomposer.residual().to_vec(),
        }
    }
}
