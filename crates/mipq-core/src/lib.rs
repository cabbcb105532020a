//! # mipq
//!
//! Multi-property inequality queries over backends that only allow
//! inequality filters on a single property.
//!
//! A [`MipQuery`](api::MipQuery) routes each filter either to the backend
//! query or to a residual predicate evaluated in memory against every record
//! the backend returns. Callers write filters as if the restriction did not
//! exist.
//!
//! ## Quick Start
//!
//! ```
//! use mipq_core::api::{Expr, MipQuery};
//! use mipq_core::backend::MemoryBackend;
//! use mipq_core::types::{ModelSchema, PropertyType, Record};
//!
//! let backend = MemoryBackend::new();
//! backend
//!     .create_model(
//!         ModelSchema::new("Employee")
//!             .property("salary", PropertyType::Integer)
//!             .property("age", PropertyType::Integer),
//!     )
//!     .unwrap();
//! backend
//!     .put("Employee", Record::new().with("salary", 60000).with("age", 25))
//!     .unwrap();
//! backend
//!     .put("Employee", Record::new().with("salary", 70000).with("age", 41))
//!     .unwrap();
//!
//! // `salary` goes to the backend, `age` is evaluated in memory.
//! let query = MipQuery::new(&backend, "Employee")
//!     .filter(Expr::gt("salary", 50000))
//!     .filter(Expr::lt("age", 30));
//! assert_eq!(query.inequality_property(), Some("salary"));
//!
//! let records = query.collect_records().unwrap();
//! assert_eq!(records.len(), 1);
//! ```

pub mod api;
pub mod backend;
pub mod encoding;
pub mod error;
pub mod types;
