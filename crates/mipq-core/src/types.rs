//! Core types: typed property values, records, and model schemas.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A typed scalar property value.
///
/// Values order within a family: numbers (`Int` and `Float` compare with each
/// other), strings, booleans, dates, times and date-times. Values from
/// different families are incomparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Combined date and time, no zone.
    DateTime(NaiveDateTime),
}

/// Comparison family of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Null,
    Bool,
    Number,
    String,
    Date,
    Time,
    DateTime,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
        }
    }

    pub(crate) fn family(&self) -> Family {
        match self {
            Value::Null => Family::Null,
            Value::Bool(_) => Family::Bool,
            Value::Int(_) | Value::Float(_) => Family::Number,
            Value::String(_) => Family::String,
            Value::Date(_) => Family::Date,
            Value::Time(_) => Family::Time,
            Value::DateTime(_) => Family::DateTime,
        }
    }

    /// Whether this value may be stored in a property declared as `ty`.
    ///
    /// Null is accepted for every type. Integers are accepted for `Float`
    /// properties.
    pub fn conforms_to(&self, ty: PropertyType) -> bool {
        matches!(
            (self, ty),
            (Value::Null, _)
                | (Value::Bool(_), PropertyType::Boolean)
                | (Value::Int(_), PropertyType::Integer | PropertyType::Float)
                | (Value::Float(_), PropertyType::Float)
                | (Value::String(_), PropertyType::String)
                | (Value::Date(_), PropertyType::Date)
                | (Value::Time(_), PropertyType::Time)
                | (Value::DateTime(_), PropertyType::DateTime)
        )
    }

    /// Convert a combined date-time back to the native representation of a
    /// `Time` or `Date` property. Backends canonicalize pure times and dates
    /// to a date-time when building filters; residual comparisons must run
    /// against what the record actually stores.
    pub fn normalize_for(self, declared: Option<PropertyType>) -> Value {
        match (self, declared) {
            (Value::DateTime(dt), Some(PropertyType::Time)) => Value::Time(dt.time()),
            (Value::DateTime(dt), Some(PropertyType::Date)) => Value::Date(dt.date()),
            (other, _) => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A record returned by a backend: property name to value.
///
/// Records are heterogeneous: a property can be absent entirely, which is
/// distinct from being present with [`Value::Null`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    properties: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

/// The declared semantic type of a model property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Time,
    DateTime,
}

/// A property definition within a model schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub property_type: PropertyType,
}

/// Schema for a model (a kind of record).
///
/// Records may carry properties the schema does not declare; those are
/// stored and compared as-is, without temporal normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Declare a property. A later declaration of the same name replaces the
    /// earlier one.
    pub fn property(mut self, name: impl Into<String>, property_type: PropertyType) -> Self {
        let name = name.into();
        self.properties.retain(|p| p.name != name);
        self.properties.push(PropertyDef {
            name,
            property_type,
        });
        self
    }

    pub fn property_type(&self, name: &str) -> Option<PropertyType> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.property_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn test_normalize_datetime_for_time_property() {
        let v = Value::DateTime(dt("1970-01-01T09:30:00"));
        assert_eq!(
            v.normalize_for(Some(PropertyType::Time)),
            Value::Time(NaiveTime::from_hms_opt(9, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_normalize_datetime_for_date_property() {
        let v = Value::DateTime(dt("2024-03-15T00:00:00"));
        assert_eq!(
            v.normalize_for(Some(PropertyType::Date)),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
    }

    #[test]
    fn test_normalize_leaves_other_values_alone() {
        let v = Value::DateTime(dt("2024-03-15T10:00:00"));
        assert_eq!(v.clone().normalize_for(Some(PropertyType::DateTime)), v);
        assert_eq!(v.clone().normalize_for(None), v);
        assert_eq!(
            Value::from("09:30").normalize_for(Some(PropertyType::Time)),
            Value::from("09:30")
        );
    }

    #[test]
    fn test_conforms_to() {
        assert!(Value::Int(3).conforms_to(PropertyType::Float));
        assert!(!Value::Float(3.0).conforms_to(PropertyType::Integer));
        assert!(Value::Null.conforms_to(PropertyType::Date));
        assert!(!Value::from("x").conforms_to(PropertyType::Boolean));
    }

    #[test]
    fn test_record_absent_vs_null() {
        let r = Record::new().with("a", Value::Null);
        assert_eq!(r.get("a"), Some(&Value::Null));
        assert_eq!(r.get("b"), None);
        assert!(r.contains("a"));
        assert!(!r.contains("b"));
    }

    #[test]
    fn test_record_from_iter() {
        let r: Record = [("salary", 60000), ("age", 25)].into_iter().collect();
        assert_eq!(r.len(), 2);
        assert_eq!(r.get("age"), Some(&Value::Int(25)));
    }

    #[test]
    fn test_schema_redeclare_replaces() {
        let s = ModelSchema::new("Employee")
            .property("hired", PropertyType::DateTime)
            .property("hired", PropertyType::Date);
        assert_eq!(s.properties.len(), 1);
        assert_eq!(s.property_type("hired"), Some(PropertyType::Date));
        assert_eq!(s.property_type("missing"), None);
    }
}
