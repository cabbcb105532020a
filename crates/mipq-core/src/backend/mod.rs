//! Contracts with the backend query engine and its schema registry.
//!
//! A backend executes a push-down [`Query`] and returns a lazy, forward-only
//! stream of records. Backends reject queries that carry inequality filters
//! on more than one property; [`validate_query`] implements that rule so
//! every backend applies it the same way.

pub mod memory;

use crate::api::query::Query;
use crate::error::{QueryError, Result};
use crate::types::{ModelSchema, PropertyType, Record};

pub use memory::{MemoryBackend, MemoryStream};

/// Reports the declared type of a model property.
pub trait SchemaRegistry {
    /// `None` when the model or property is not declared.
    fn property_type(&self, model: &str, property: &str) -> Option<PropertyType>;
}

impl SchemaRegistry for ModelSchema {
    fn property_type(&self, model: &str, property: &str) -> Option<PropertyType> {
        if model == self.name {
            ModelSchema::property_type(self, property)
        } else {
            None
        }
    }
}

/// A backend query engine.
pub trait Backend {
    /// The record stream produced by one execution. Re-iterating a query means
    /// executing it again.
    type Stream: Iterator<Item = Result<Record>>;

    /// Execute a push-down query.
    fn execute(&self, query: &Query) -> Result<Self::Stream>;

    /// The schema registry describing this backend's models.
    fn schema(&self) -> &dyn SchemaRegistry;
}

/// Reject a query whose filters carry inequality comparisons on more than one
/// property.
pub fn validate_query(query: &Query) -> Result<()> {
    let mut first: Option<&str> = None;
    for filter in &query.filters {
        for ineq in filter.inequalities() {
            match first {
                None => first = Some(ineq.property.as_str()),
                Some(name) if name != ineq.property => {
                    return Err(QueryError::MultipleInequalityProperties {
                        first: name.to_string(),
                        second: ineq.property.clone(),
                    }
                    .into());
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}
