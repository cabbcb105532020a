use serde::{Deserialize, Serialize};

use super::filter::Expr;

/// A push-down query: a model plus filters the backend evaluates itself.
///
/// Filters are implicitly ANDed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub model: String,
    #[serde(default)]
    pub filters: Vec<Expr>,
}

impl Query {
    /// An unfiltered query over every record of `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            filters: Vec::new(),
        }
    }

    /// Attach a filter.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filters.push(expr);
        self
    }

    pub(crate) fn push_filter(&mut self, expr: Expr) {
        self.filters.push(expr);
    }
}
