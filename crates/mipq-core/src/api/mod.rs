//! Public API: filter expressions, decomposition, residual evaluation and the query session.

pub mod decompose;
pub mod filter;
pub mod predicate;
pub mod query;
pub mod session;
pub mod stream;

pub use decompose::{Decomposer, Routing};
pub use filter::{Comparison, Expr, Operator};
pub use predicate::{CompileContext, Predicate};
pub use query::Query;
pub use session::{MipQuery, QueryConfig, QueryPlan, QueryTarget};
pub use stream::FilteredStream;
