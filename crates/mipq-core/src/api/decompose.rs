//! Routing of filters between the backend and residual evaluation.
//!
//! Backends allow inequality comparisons on a single property per query. The
//! [`Decomposer`] greedily treats the first inequality property it sees as the
//! one the backend carries, and holds back every filter that contains an
//! inequality on any other property. Equality comparisons never force a
//! filter back; backends accept any number of them.
//!
//! The first-seen property is not necessarily the most selective one. Callers
//! who know their data should supply the most selective inequality first.

use tracing::debug;

use super::filter::{Expr, first_inequality};

/// Where a submitted filter went.
#[derive(Debug, Clone, PartialEq)]
pub enum Routing {
    /// Safe to push down; the filter is handed back for the caller to attach
    /// to the backend query.
    Accepted(Expr),
    /// Kept for residual evaluation.
    Deferred,
}

impl Routing {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Routing::Deferred)
    }
}

/// Per-query routing state: the chosen inequality property and the residual
/// filters.
#[derive(Debug, Clone, Default)]
pub struct Decomposer {
    inequality_property: Option<String>,
    residual: Vec<Expr>,
}

impl Decomposer {
    /// A decomposer for a query with no filters yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A decomposer for a base query already carrying `base_filters`. The
    /// chosen property is the first inequality among them, if any.
    pub fn initialize(base_filters: &[Expr]) -> Self {
        Self {
            inequality_property: first_inequality(base_filters).map(|c| c.property.clone()),
            residual: Vec::new(),
        }
    }

    /// Route one filter.
    ///
    /// Inequalities are scanned in order. The first one fixes the chosen
    /// property if it is still unset; the first one on a different property
    /// defers the whole filter. A filter can fix the property and still be
    /// deferred by a later inequality of its own.
    pub fn submit(&mut self, expr: Expr) -> Routing {
        let mut conflict = None;
        for ineq in expr.inequalities() {
            let chosen = self.inequality_property.get_or_insert_with(|| {
                debug!(property = %ineq.property, "chose backend inequality property");
                ineq.property.clone()
            });
            if *chosen != ineq.property {
                conflict = Some(ineq.property.clone());
                break;
            }
        }

        match conflict {
            Some(property) => {
                debug!(
                    %property,
                    chosen = self.inequality_property.as_deref().unwrap_or_default(),
                    filter = %expr,
                    "deferring filter to residual evaluation"
                );
                self.residual.push(expr);
                Routing::Deferred
            }
            None => Routing::Accepted(expr),
        }
    }

    /// The single property allowed to carry inequalities at the backend.
    pub fn inequality_property(&self) -> Option<&str> {
        self.inequality_property.as_deref()
    }

    /// Filters held back for residual evaluation, in submission order.
    pub fn residual(&self) -> &[Expr] {
        &self.residual
    }
}
