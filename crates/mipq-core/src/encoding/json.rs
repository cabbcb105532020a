//! JSON encoding of expressions, records and values.
//!
//! JSON has no temporal types, so strings are parsed according to the
//! declared type of the property they belong to. A date-time string given for
//! a `Date` or `Time` property is kept as a date-time in expressions (the
//! predicate compiler narrows it) and narrowed immediately in records.
//!
//! Expression form:
//!
//! ```json
//! {"and": [
//!     {"property": "department", "op": "=", "value": "eng"},
//!     {"or": [
//!         {"property": "age", "op": "<", "value": 30},
//!         {"property": "hired", "op": ">=", "value": "2020-01-01"}
//!     ]}
//! ]}
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Number, Value as JsonValue};

use crate::api::filter::{Comparison, Expr, Operator};
use crate::backend::SchemaRegistry;
use crate::error::{EncodingError, Error, FilterError};
use crate::types::{PropertyType, Record, Value};

/// Date-time formats accepted for temporal literals, most specific first.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Parse a JSON expression tree. Comparison values are coerced against the
/// declared property types of `model`.
///
/// Fails with `InvalidFilterType` for anything that is not an expression
/// node and with `UnsupportedOperator` for an unknown operator symbol.
pub fn expr_from_json(
    json: &JsonValue,
    model: &str,
    schema: &dyn SchemaRegistry,
) -> Result<Expr, Error> {
    let obj = json.as_object().ok_or_else(|| {
        FilterError::InvalidFilterType(format!("expected an expression object, got {json}"))
    })?;

    if obj.len() == 1 {
        if let Some(children) = obj.get("and") {
            return Ok(Expr::And(children_from_json(children, "and", model, schema)?));
        }
        if let Some(children) = obj.get("or") {
            return Ok(Expr::Or(children_from_json(children, "or", model, schema)?));
        }
    }

    let property = obj.get("property").and_then(JsonValue::as_str);
    let op = obj.get("op").and_then(JsonValue::as_str);
    let (Some(property), Some(op)) = (property, op) else {
        return Err(FilterError::InvalidFilterType(format!(
            "expected {{\"and\"}}, {{\"or\"}} or a comparison with \"property\" and \"op\", got {json}"
        ))
        .into());
    };
    if let Some(extra) = obj.keys().find(|k| !matches!(k.as_str(), "property" | "op" | "value")) {
        return Err(
            FilterError::InvalidFilterType(format!("unknown comparison field \"{extra}\"")).into(),
        );
    }

    let op = Operator::from_symbol(op)?;
    let declared = schema.property_type(model, property);
    let value = value_from_json(
        obj.get("value").unwrap_or(&JsonValue::Null),
        property,
        declared,
    )?;

    Ok(Expr::Comparison(Comparison {
        property: property.to_string(),
        op,
        value,
    }))
}

fn children_from_json(
    json: &JsonValue,
    key: &str,
    model: &str,
    schema: &dyn SchemaRegistry,
) -> Result<Vec<Expr>, Error> {
    let items = json.as_array().ok_or_else(|| {
        FilterError::InvalidFilterType(format!("\"{key}\" must be an array, got {json}"))
    })?;
    items
        .iter()
        .map(|item| expr_from_json(item, model, schema))
        .collect()
}

/// Render an expression in the form [`expr_from_json`] accepts.
pub fn expr_to_json(expr: &Expr) -> JsonValue {
    match expr {
        Expr::Comparison(c) => {
            let mut obj = Map::new();
            obj.insert("property".to_string(), JsonValue::from(c.property.clone()));
            obj.insert("op".to_string(), JsonValue::from(c.op.symbol()));
            obj.insert("value".to_string(), value_to_json(&c.value));
            JsonValue::Object(obj)
        }
        Expr::And(children) => group_to_json("and", children),
        Expr::Or(children) => group_to_json("or", children),
    }
}

fn group_to_json(key: &str, children: &[Expr]) -> JsonValue {
    let mut obj = Map::new();
    obj.insert(
        key.to_string(),
        JsonValue::Array(children.iter().map(expr_to_json).collect()),
    );
    JsonValue::Object(obj)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Convert a JSON object into a record of `model`.
///
/// Values are coerced against the declared property types and date-time
/// values of `Date`/`Time` properties are narrowed to their native form.
pub fn record_from_json(
    json: &JsonValue,
    model: &str,
    schema: &dyn SchemaRegistry,
) -> Result<Record, Error> {
    let obj = json
        .as_object()
        .ok_or_else(|| EncodingError::NotAnObject(json_kind(json).to_string()))?;

    let mut record = Record::new();
    for (name, raw) in obj {
        let declared = schema.property_type(model, name);
        let value = value_from_json(raw, name, declared)?.normalize_for(declared);
        record.set(name.clone(), value);
    }
    Ok(record)
}

/// Convert a record to a JSON object. Temporal values become ISO 8601
/// strings.
pub fn record_to_json(record: &Record) -> JsonValue {
    JsonValue::Object(
        record
            .iter()
            .map(|(k, v)| (k.to_string(), value_to_json(v)))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Convert a JSON scalar to a [`Value`] given the declared type of
/// `property`, if any.
pub fn value_from_json(
    json: &JsonValue,
    property: &str,
    declared: Option<PropertyType>,
) -> Result<Value, EncodingError> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(b) => Ok(Value::Bool(*b)),
        JsonValue::Number(n) => number_from_json(n, property, declared),
        JsonValue::String(s) => string_from_json(s, property, declared),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(EncodingError::UnsupportedValue {
            property: property.to_string(),
            found: json_kind(json).to_string(),
        }),
    }
}

fn number_from_json(
    n: &Number,
    property: &str,
    declared: Option<PropertyType>,
) -> Result<Value, EncodingError> {
    if declared != Some(PropertyType::Float)
        && let Some(i) = n.as_i64()
    {
        return Ok(Value::Int(i));
    }
    n.as_f64()
        .map(Value::Float)
        .ok_or_else(|| EncodingError::UnsupportedValue {
            property: property.to_string(),
            found: format!("number {n}"),
        })
}

fn string_from_json(
    s: &str,
    property: &str,
    declared: Option<PropertyType>,
) -> Result<Value, EncodingError> {
    let parsed = match declared {
        Some(PropertyType::DateTime) => parse_datetime(s)
            .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
            .map(Value::DateTime),
        Some(PropertyType::Date) => parse_date(s)
            .map(Value::Date)
            .or_else(|| parse_datetime(s).map(Value::DateTime)),
        Some(PropertyType::Time) => parse_time(s)
            .map(Value::Time)
            .or_else(|| parse_datetime(s).map(Value::DateTime)),
        _ => return Ok(Value::String(s.to_string())),
    };
    parsed.ok_or_else(|| EncodingError::InvalidTemporal {
        property: property.to_string(),
        // Only temporal types reach this point.
        expected: declared.unwrap_or(PropertyType::DateTime),
        value: s.to_string(),
    })
}

/// Convert a [`Value`] to JSON. NaN floats become `null`.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(n) => JsonValue::from(*n),
        Value::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => JsonValue::String(t.format("%H:%M:%S%.f").to_string()),
        Value::DateTime(dt) => JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    }
}

/// Parse a date-time literal. RFC 3339 strings with an offset are converted
/// to UTC.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(s, f).ok())
}

fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
