//! Compiles filter expressions into predicates evaluated against records.
//!
//! Compilation binds each comparison to its (temporally normalized) literal
//! once; the resulting [`Predicate`] mirrors the boolean structure of the
//! source tree and is reused for every record of a stream.

use std::cmp::Ordering;

use crate::backend::SchemaRegistry;
use crate::error::FilterError;
use crate::types::{Record, Value};

use super::filter::{Comparison, Expr, Operator};

/// What the compiler needs to know besides the expression itself.
pub struct CompileContext<'a> {
    /// Model the records belong to.
    pub model: &'a str,
    /// Declared property types, used for temporal normalization.
    pub schema: &'a dyn SchemaRegistry,
    /// Deepest tree accepted; `None` accepts any depth.
    pub max_depth: Option<usize>,
}

impl<'a> CompileContext<'a> {
    pub fn new(model: &'a str, schema: &'a dyn SchemaRegistry) -> Self {
        Self {
            model,
            schema,
            max_depth: None,
        }
    }

    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }
}

/// A compiled filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare(Comparison),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

/// Compile a single expression.
pub fn compile(expr: &Expr, ctx: &CompileContext<'_>) -> Result<Predicate, FilterError> {
    compile_inner(expr, ctx, 1)
}

/// Compile a list of filters as one implicit AND.
pub fn compile_all(exprs: &[Expr], ctx: &CompileContext<'_>) -> Result<Predicate, FilterError> {
    exprs
        .iter()
        .map(|e| compile_inner(e, ctx, 1))
        .collect::<Result<Vec<_>, _>>()
        .map(Predicate::And)
}

fn compile_inner(
    expr: &Expr,
    ctx: &CompileContext<'_>,
    depth: usize,
) -> Result<Predicate, FilterError> {
    if let Some(max) = ctx.max_depth
        && depth > max
    {
        return Err(FilterError::InvalidExpression(format!(
            "expression depth exceeds maximum of {max}"
        )));
    }

    match expr {
        Expr::Comparison(c) => {
            let declared = ctx.schema.property_type(ctx.model, &c.property);
            Ok(Predicate::Compare(Comparison {
                property: c.property.clone(),
                op: c.op,
                value: c.value.clone().normalize_for(declared),
            }))
        }
        Expr::And(children) => children
            .iter()
            .map(|c| compile_inner(c, ctx, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Predicate::And),
        Expr::Or(children) => children
            .iter()
            .map(|c| compile_inner(c, ctx, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Predicate::Or),
    }
}

impl Predicate {
    /// `true` for an empty AND, which accepts every record.
    pub fn is_trivial(&self) -> bool {
        matches!(self, Predicate::And(children) if children.is_empty())
    }

    /// Evaluate against a record.
    ///
    /// AND stops at the first false child and OR at the first true one, so an
    /// error in a later child is only raised if that child is reached.
    pub fn eval(&self, record: &Record) -> Result<bool, FilterError> {
        match self {
            Predicate::Compare(c) => eval_comparison(c, record),
            Predicate::And(children) => {
                for child in children {
                    if !child.eval(record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(children) => {
                for child in children {
                    if child.eval(record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

fn eval_comparison(c: &Comparison, record: &Record) -> Result<bool, FilterError> {
    let Some(actual) = record.get(&c.property) else {
        return Err(FilterError::NullComparison {
            property: c.property.clone(),
        });
    };

    if c.op.is_ordering() {
        if actual.is_null() || c.value.is_null() {
            return Err(FilterError::NullComparison {
                property: c.property.clone(),
            });
        }
        if actual.family() != c.value.family() {
            return Err(FilterError::TypeMismatch {
                property: c.property.clone(),
                expected: c.value.type_name(),
                actual: actual.type_name(),
            });
        }
    }

    let ord = compare_values(actual, &c.value);
    Ok(match c.op {
        Operator::Eq => ord == Some(Ordering::Equal),
        Operator::Ne => ord != Some(Ordering::Equal),
        Operator::Lt => ord == Some(Ordering::Less),
        Operator::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        Operator::Gt => ord == Some(Ordering::Greater),
        Operator::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
    })
}

/// Compare two values, returning an ordering if they are comparable.
///
/// Equality is `Some(Equal)`: null equals only null, and values of different
/// families are unequal rather than an error.
///
/// - Numbers: exactly, including mixed integer/float beyond 2^53
/// - Strings: lexicographically
/// - Booleans: false < true
/// - Dates, times, date-times: chronologically
/// - Null == Null
/// - Different families or NaN: `None`
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => compare_int_float(*a, *b),
        (Value::Float(a), Value::Int(b)) => compare_int_float(*b, *a).map(Ordering::reverse),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Exact ordering of an integer against a float.
fn compare_int_float(i: i64, f: f64) -> Option<Ordering> {
    // 2^63, exactly representable.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return None;
    }
    if f >= BOUND {
        return Some(Ordering::Less);
    }
    if f < -BOUND {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(f - whole)),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModelSchema, PropertyType};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    fn schema() -> ModelSchema {
        ModelSchema::new("Employee")
            .property("salary", PropertyType::Integer)
            .property("age", PropertyType::Integer)
            .property("name", PropertyType::String)
            .property("shift_start", PropertyType::Time)
            .property("hired", PropertyType::Date)
            .property("updated", PropertyType::DateTime)
    }

    fn sample() -> Record {
        Record::new()
            .with("name", "Alice")
            .with("salary", 60000)
            .with("age", 25)
            .with("rating", 4.5)
            .with("active", true)
            .with("manager", Value::Null)
            .with("shift_start", NaiveTime::from_hms_opt(9, 0, 0).unwrap())
            .with("hired", NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())
    }

    fn eval(expr: Expr, record: &Record) -> Result<bool, FilterError> {
        let s = schema();
        let ctx = CompileContext::new("Employee", &s);
        compile(&expr, &ctx).unwrap().eval(record)
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    #[test]
    fn test_eval_each_operator() {
        let r = sample();
        assert!(eval(Expr::eq("age", 25), &r).unwrap());
        assert!(!eval(Expr::eq("age", 26), &r).unwrap());
        assert!(eval(Expr::ne("age", 26), &r).unwrap());
        assert!(eval(Expr::lt("age", 30), &r).unwrap());
        assert!(!eval(Expr::lt("age", 25), &r).unwrap());
        assert!(eval(Expr::le("age", 25), &r).unwrap());
        assert!(eval(Expr::gt("salary", 50000), &r).unwrap());
        assert!(!eval(Expr::gt("salary", 60000), &r).unwrap());
        assert!(eval(Expr::ge("salary", 60000), &r).unwrap());
    }

    #[test]
    fn test_eval_mixed_numeric() {
        let r = sample();
        assert!(eval(Expr::gt("rating", 4), &r).unwrap());
        assert!(eval(Expr::eq("age", 25.0), &r).unwrap());
    }

    #[test]
    fn test_eval_strings_lexicographic() {
        let r = sample();
        assert!(eval(Expr::lt("name", "Bob"), &r).unwrap());
        assert!(!eval(Expr::gt("name", "Bob"), &r).unwrap());
    }

    // -----------------------------------------------------------------------
    // Boolean structure
    // -----------------------------------------------------------------------

    #[test]
    fn test_and_or_empty() {
        let r = sample();
        assert!(eval(Expr::and(vec![]), &r).unwrap());
        assert!(!eval(Expr::or(vec![]), &r).unwrap());
    }

    #[test]
    fn test_and_matches_leafwise_conjunction() {
        let leaves = vec![
            Expr::gt("salary", 50000),
            Expr::lt("age", 30),
            Expr::ne("name", "Bob"),
            Expr::ge("rating", 5),
        ];
        let records = vec![
            sample(),
            sample().with("rating", 5),
            sample().with("age", 40),
            sample().with("name", "Bob").with("rating", 9),
        ];
        for r in &records {
            let expected = leaves.iter().all(|l| eval(l.clone(), r).unwrap());
            assert_eq!(eval(Expr::and(leaves.clone()), r).unwrap(), expected);
        }
    }

    #[test]
    fn test_and_short_circuits_before_error() {
        let r = sample();
        // The second child would fail on the absent property.
        let f = Expr::and(vec![Expr::eq("name", "Bob"), Expr::lt("missing", 1)]);
        assert!(!eval(f, &r).unwrap());
    }

    #[test]
    fn test_or_short_circuits_before_error() {
        let r = sample();
        let f = Expr::or(vec![Expr::eq("name", "Alice"), Expr::lt("missing", 1)]);
        assert!(eval(f, &r).unwrap());
    }

    #[test]
    fn test_error_propagates_through_or() {
        let r = sample();
        let f = Expr::or(vec![Expr::lt("missing", 1), Expr::eq("name", "Alice")]);
        assert!(matches!(eval(f, &r), Err(FilterError::NullComparison { .. })));
    }

    #[test]
    fn test_compile_all_is_implicit_and() {
        let s = schema();
        let ctx = CompileContext::new("Employee", &s);
        let p = compile_all(&[Expr::gt("salary", 50000), Expr::lt("age", 30)], &ctx).unwrap();
        assert!(p.eval(&sample()).unwrap());
        assert!(!p.eval(&sample().with("age", 31)).unwrap());
        assert!(compile_all(&[], &ctx).unwrap().is_trivial());
    }

    // -----------------------------------------------------------------------
    // Null and absent values
    // -----------------------------------------------------------------------

    #[test]
    fn test_absent_property_is_null_comparison_for_every_operator() {
        let r = sample();
        for f in [Expr::eq("missing", 1), Expr::ne("missing", 1), Expr::gt("missing", 1)] {
            assert_eq!(
                eval(f, &r),
                Err(FilterError::NullComparison {
                    property: "missing".to_string()
                })
            );
        }
    }

    #[test]
    fn test_null_equality_is_defined() {
        let r = sample();
        assert!(eval(Expr::eq("manager", Value::Null), &r).unwrap());
        assert!(!eval(Expr::eq("manager", "Carol"), &r).unwrap());
        assert!(eval(Expr::ne("manager", "Carol"), &r).unwrap());
        assert!(!eval(Expr::eq("age", Value::Null), &r).unwrap());
    }

    #[test]
    fn test_null_ordering_is_null_comparison() {
        let r = sample();
        assert!(matches!(
            eval(Expr::lt("manager", "Carol"), &r),
            Err(FilterError::NullComparison { .. })
        ));
        assert!(matches!(
            eval(Expr::ge("age", Value::Null), &r),
            Err(FilterError::NullComparison { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Type mismatches
    // -----------------------------------------------------------------------

    #[test]
    fn test_ordering_type_mismatch_is_an_error() {
        let r = sample();
        let err = eval(Expr::gt("name", 42), &r).unwrap_err();
        assert_eq!(
            err,
            FilterError::TypeMismatch {
                property: "name".to_string(),
                expected: "integer",
                actual: "string",
            }
        );
    }

    #[test]
    fn test_equality_type_mismatch_is_unequal() {
        let r = sample();
        assert!(!eval(Expr::eq("name", 42), &r).unwrap());
        assert!(eval(Expr::ne("active", "yes"), &r).unwrap());
    }

    #[test]
    fn test_nan_never_orders() {
        let r = sample().with("rating", f64::NAN);
        assert!(!eval(Expr::gt("rating", 1.0), &r).unwrap());
        assert!(!eval(Expr::le("rating", 1.0), &r).unwrap());
        assert!(!eval(Expr::eq("rating", f64::NAN), &r).unwrap());
    }

    // -----------------------------------------------------------------------
    // Temporal normalization
    // -----------------------------------------------------------------------

    #[test]
    fn test_time_property_compares_against_time_of_day() {
        let r = sample();
        // Backends canonicalize a time literal to a date-time on the epoch.
        let f = Expr::lt("shift_start", dt("1970-01-01 10:00:00"));
        assert!(eval(f, &r).unwrap());
        let f = Expr::gt("shift_start", dt("1970-01-01 10:00:00"));
        assert!(!eval(f, &r).unwrap());
    }

    #[test]
    fn test_date_property_compares_against_calendar_date() {
        let r = sample();
        let f = Expr::ge("hired", dt("2021-06-01 00:00:00"));
        assert!(eval(f, &r).unwrap());
        let f = Expr::eq("hired", dt("2021-06-01 00:00:00"));
        assert!(eval(f, &r).unwrap());
    }

    #[test]
    fn test_datetime_property_not_normalized() {
        let s = schema();
        let ctx = CompileContext::new("Employee", &s);
        let p = compile(&Expr::gt("updated", dt("2024-01-01 12:00:00")), &ctx).unwrap();
        match p {
            Predicate::Compare(c) => {
                assert_eq!(c.value, Value::DateTime(dt("2024-01-01 12:00:00")))
            }
            other => panic!("unexpected predicate: {other:?}"),
        }
    }

    #[test]
    fn test_undeclared_property_not_normalized() {
        let r = sample().with("badge_time", NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        // Without a declared Time type the date-time literal stays a date-time.
        let f = Expr::lt("badge_time", dt("1970-01-01 10:00:00"));
        assert!(matches!(eval(f, &r), Err(FilterError::TypeMismatch { .. })));
    }

    // -----------------------------------------------------------------------
    // Depth limit
    // -----------------------------------------------------------------------

    #[test]
    fn test_depth_limit() {
        let s = schema();
        let mut expr = Expr::eq("age", 25);
        for _ in 0..5 {
            expr = Expr::and(vec![expr]);
        }
        assert_eq!(expr.depth(), 6);

        let ctx = CompileContext::new("Employee", &s).max_depth(Some(6));
        assert!(compile(&expr, &ctx).is_ok());

        let ctx = CompileContext::new("Employee", &s).max_depth(Some(5));
        assert!(matches!(
            compile(&expr, &ctx),
            Err(FilterError::InvalidExpression(_))
        ));
    }

    #[test]
    fn test_no_depth_limit_by_default() {
        let s = schema();
        let mut expr = Expr::lt("age", 30);
        for _ in 0..200 {
            expr = Expr::or(vec![expr]);
        }
        let p = compile(&expr, &CompileContext::new("Employee", &s)).unwrap();
        assert!(p.eval(&sample()).unwrap());
    }

    // -----------------------------------------------------------------------
    // compare_values
    // -----------------------------------------------------------------------

    #[test]
    fn test_compare_values_mixed_types() {
        assert_eq!(compare_values(&Value::from("a"), &Value::Int(1)), None);
        assert_eq!(compare_values(&Value::Bool(true), &Value::Int(1)), None);
        assert_eq!(compare_values(&Value::Null, &Value::Int(1)), None);
        assert_eq!(
            compare_values(&Value::Null, &Value::Null),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_compare_values_large_integers_exact() {
        let a = Value::Int(i64::MAX);
        let b = Value::Int(i64::MAX - 1);
        assert_eq!(compare_values(&a, &b), Some(Ordering::Greater));
    }

    #[test]
    fn test_compare_values_int_float_exact() {
        let big = Value::Int(9_007_199_254_740_993);
        let near = Value::Float(9_007_199_254_740_992.0);
        assert_eq!(compare_values(&big, &near), Some(Ordering::Greater));
        assert_eq!(compare_values(&near, &big), Some(Ordering::Less));

        assert_eq!(compare_values(&Value::Int(3), &Value::Float(3.5)), Some(Ordering::Less));
        assert_eq!(compare_values(&Value::Int(-3), &Value::Float(-3.5)), Some(Ordering::Greater));
        assert_eq!(compare_values(&Value::Int(25), &Value::Float(25.0)), Some(Ordering::Equal));
        assert_eq!(
            compare_values(&Value::Int(i64::MAX), &Value::Float(9.3e18)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::Int(i64::MIN), &Value::Float(f64::NEG_INFINITY)),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_values(&Value::Int(1), &Value::Float(f64::NAN)), None);
    }

    #[test]
    fn test_eq_int_float_beyond_f64_precision() {
        let r = Record::new().with("id", 9_007_199_254_740_993i64);
        assert!(!eval(Expr::eq("id", 9_007_199_254_740_992.0), &r).unwrap());
        assert!(eval(Expr::gt("id", 9_007_199_254_740_992.0), &r).unwrap());
    }
}
