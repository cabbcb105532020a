//! Residual filtering over a live backend stream.

use tracing::trace;

use crate::error::{Error, FilterError, Result};
use crate::types::Record;

use super::predicate::Predicate;

/// Lazily applies a residual [`Predicate`] to a backend record stream.
///
/// A record whose evaluation hits an absent or null property is skipped and
/// iteration continues. Backend errors are passed through unchanged; any
/// other evaluation error is yielded once and ends the stream.
pub struct FilteredStream<S> {
    inner: S,
    predicate: Predicate,
    skip_null_comparisons: bool,
    examined: usize,
    skipped: usize,
    done: bool,
}

impl<S> FilteredStream<S>
where
    S: Iterator<Item = Result<Record>>,
{
    pub fn new(inner: S, predicate: Predicate) -> Self {
        Self {
            inner,
            predicate,
            skip_null_comparisons: true,
            examined: 0,
            skipped: 0,
            done: false,
        }
    }

    /// When `false`, null comparisons are yielded as errors instead of
    /// skipping the record.
    pub fn skip_null_comparisons(mut self, skip: bool) -> Self {
        self.skip_null_comparisons = skip;
        self
    }

    /// Records pulled from the backend so far.
    pub fn examined(&self) -> usize {
        self.examined
    }

    /// Records dropped because of a null comparison.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn fail(&mut self, err: Error) -> Option<Result<Record>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<S> Iterator for FilteredStream<S>
where
    S: Iterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let record = match self.inner.next()? {
                Ok(record) => record,
                Err(e) => return self.fail(e),
            };
            self.examined += 1;

            match self.predicate.eval(&record) {
                Ok(true) => return Some(Ok(record)),
                Ok(false) => continue,
                Err(FilterError::NullComparison { property }) if self.skip_null_comparisons => {
                    trace!(%property, "skipping record: null comparison");
                    self.skipped += 1;
                }
                Err(e) => return self.fail(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::filter::Expr;
    use crate::api::predicate::{CompileContext, compile_all};
    use crate::error::StorageError;
    use crate::types::{ModelSchema, Value};

    fn predicate(filters: &[Expr]) -> Predicate {
        let schema = ModelSchema::new("Employee");
        compile_all(filters, &CompileContext::new("Employee", &schema)).unwrap()
    }

    fn rec(age: impl Into<Value>) -> Result<Record> {
        Ok(Record::new().with("age", age))
    }

    #[test]
    fn test_yields_only_matches() {
        let rows = vec![rec(25), rec(40), rec(29)];
        let out: Vec<_> = FilteredStream::new(rows.into_iter(), predicate(&[Expr::lt("age", 30)]))
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec![Record::new().with("age", 25), Record::new().with("age", 29)]);
    }

    #[test]
    fn test_null_and_absent_skipped_without_aborting() {
        let rows = vec![
            rec(25),
            Ok(Record::new().with("name", "no age")),
            rec(Value::Null),
            rec(29),
        ];
        let mut stream = FilteredStream::new(rows.into_iter(), predicate(&[Expr::lt("age", 30)]));
        let out: Vec<_> = stream.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(stream.examined(), 4);
        assert_eq!(stream.skipped(), 2);
    }

    #[test]
    fn test_strict_mode_surfaces_null_comparison() {
        let rows = vec![rec(Value::Null), rec(25)];
        let mut stream = FilteredStream::new(rows.into_iter(), predicate(&[Expr::lt("age", 30)]))
            .skip_null_comparisons(false);
        let err = stream.next().unwrap().unwrap_err();
        assert!(err.is_null_comparison());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_type_mismatch_propagates_and_fuses() {
        let rows = vec![rec(25), rec("thirty"), rec(29)];
        let mut stream = FilteredStream::new(rows.into_iter(), predicate(&[Expr::lt("age", 30)]));
        assert!(stream.next().unwrap().is_ok());
        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, Error::Filter(FilterError::TypeMismatch { .. })));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_backend_error_passes_through() {
        let rows = vec![
            rec(25),
            Err(StorageError::CorruptedRecord("bad row".to_string()).into()),
            rec(29),
        ];
        let mut stream = FilteredStream::new(rows.into_iter(), predicate(&[]));
        assert!(stream.next().unwrap().is_ok());
        assert!(matches!(
            stream.next().unwrap(),
            Err(Error::Storage(StorageError::CorruptedRecord(_)))
        ));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_lazy_over_unbounded_stream() {
        let rows = (0i64..).map(|n| Ok(Record::new().with("age", n)));
        let first: Vec<_> = FilteredStream::new(rows, predicate(&[Expr::ge("age", 10)]))
            .take(3)
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(first[0].get("age"), Some(&Value::Int(10)));
        assert_eq!(first[2].get("age"), Some(&Value::Int(12)));
    }
}
