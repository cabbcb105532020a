//! An in-memory backend with datastore query semantics.
//!
//! Rows are stored MessagePack-encoded per model and decoded lazily as a
//! stream is pulled. A stream holds a snapshot of its model's rows, so writes
//! made while it is being consumed are not visible to it and never block on
//! it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::api::predicate::{CompileContext, Predicate, compile_all};
use crate::api::query::Query;
use crate::error::{Error, Result, SchemaError, StorageError};
use crate::types::{ModelSchema, PropertyType, Record};

use super::{Backend, SchemaRegistry, validate_query};

struct ModelEntry {
    schema: ModelSchema,
    rows: Arc<Vec<Vec<u8>>>,
}

struct BackendInner {
    models: RwLock<BTreeMap<String, ModelEntry>>,
    executions: AtomicUsize,
}

/// In-memory backend.
///
/// Cheaply clonable (`Arc`-based) and `Send + Sync`. Queries carrying
/// inequality filters on more than one property are rejected, and a record
/// whose filtered property is absent, null or of another type simply does
/// not match.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<BackendInner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BackendInner {
                models: RwLock::new(BTreeMap::new()),
                executions: AtomicUsize::new(0),
            }),
        }
    }

    /// Register a model.
    pub fn create_model(&self, schema: ModelSchema) -> Result<()> {
        let mut models = self.inner.models.write();
        if models.contains_key(&schema.name) {
            return Err(SchemaError::ModelAlreadyExists(schema.name).into());
        }
        debug!(model = %schema.name, properties = schema.properties.len(), "created model");
        models.insert(
            schema.name.clone(),
            ModelEntry {
                schema,
                rows: Arc::new(Vec::new()),
            },
        );
        Ok(())
    }

    /// Remove a model and all of its records.
    pub fn drop_model(&self, name: &str) -> Result<()> {
        self.inner
            .models
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SchemaError::ModelNotFound(name.to_string()).into())
    }

    pub fn list_models(&self) -> Vec<String> {
        self.inner.models.read().keys().cloned().collect()
    }

    /// Store a record.
    ///
    /// Declared properties must hold a value of their declared type (or
    /// null); a date-time stored in a `Date` or `Time` property is narrowed.
    /// Undeclared properties are stored as given.
    pub fn put(&self, model: &str, mut record: Record) -> Result<()> {
        let mut models = self.inner.models.write();
        let entry = models
            .get_mut(model)
            .ok_or_else(|| SchemaError::ModelNotFound(model.to_string()))?;

        for def in &entry.schema.properties {
            let Some(value) = record.remove(&def.name) else {
                continue;
            };
            let value = value.normalize_for(Some(def.property_type));
            if !value.conforms_to(def.property_type) {
                return Err(type_mismatch(model, &def.name, def.property_type, value.type_name()));
            }
            record.set(def.name.clone(), value);
        }

        let bytes = rmp_serde::to_vec(&record)
            .map_err(|e| StorageError::Serialization(format!("MessagePack encoding error: {e}")))?;
        Arc::make_mut(&mut entry.rows).push(bytes);
        Ok(())
    }

    /// Number of records stored for `model`.
    pub fn len(&self, model: &str) -> Result<usize> {
        self.inner
            .models
            .read()
            .get(model)
            .map(|e| e.rows.len())
            .ok_or_else(|| SchemaError::ModelNotFound(model.to_string()).into())
    }

    /// Queries executed so far.
    pub fn execution_count(&self) -> usize {
        self.inner.executions.load(Ordering::Relaxed)
    }
}

fn type_mismatch(
    model: &str,
    property: &str,
    expected: PropertyType,
    actual: &'static str,
) -> Error {
    SchemaError::PropertyTypeMismatch {
        model: model.to_string(),
        property: property.to_string(),
        expected,
        actual,
    }
    .into()
}

impl SchemaRegistry for MemoryBackend {
    fn property_type(&self, model: &str, property: &str) -> Option<PropertyType> {
        self.inner
            .models
            .read()
            .get(model)
            .and_then(|e| e.schema.property_type(property))
    }
}

impl Backend for MemoryBackend {
    type Stream = MemoryStream;

    fn execute(&self, query: &Query) -> Result<MemoryStream> {
        validate_query(query)?;

        let (schema, rows) = {
            let models = self.inner.models.read();
            let entry = models
                .get(&query.model)
                .ok_or_else(|| SchemaError::ModelNotFound(query.model.clone()))?;
            (entry.schema.clone(), Arc::clone(&entry.rows))
        };

        let filter = compile_all(&query.filters, &CompileContext::new(&query.model, &schema))?;
        self.inner.executions.fetch_add(1, Ordering::Relaxed);
        debug!(
            model = %query.model,
            filters = query.filters.len(),
            rows = rows.len(),
            "memory backend executing query"
        );

        Ok(MemoryStream {
            rows,
            pos: 0,
            filter,
        })
    }

    fn schema(&self) -> &dyn SchemaRegistry {
        self
    }
}

/// Forward-only stream over a snapshot of one model's rows.
pub struct MemoryStream {
    rows: Arc<Vec<Vec<u8>>>,
    pos: usize,
    filter: Predicate,
}

impl Iterator for MemoryStream {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(bytes) = self.rows.get(self.pos) {
            self.pos += 1;
            let record: Record = match rmp_serde::from_slice(bytes) {
                Ok(record) => record,
                Err(e) => {
                    return Some(Err(StorageError::CorruptedRecord(format!(
                        "failed to deserialize record {}: {e}",
                        self.pos - 1
                    ))
                    .into()));
                }
            };
            if matches!(self.filter.eval(&record), Ok(true)) {
                return Some(Ok(record));
            }
        }
        None
    }
}
