//! Loads model schemas and JSON Lines data files into a memory backend.

use std::error::Error;
use std::fs;
use std::path::Path;

use mipq_core::backend::MemoryBackend;
use mipq_core::encoding::json::record_from_json;
use mipq_core::types::ModelSchema;
use serde_json::Value;

/// Read model schemas from a JSON file holding one schema object or an array
/// of them.
pub fn load_schemas(path: &Path) -> Result<Vec<ModelSchema>, Box<dyn Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read schema file {}: {e}", path.display()))?;
    let json: Value = serde_json::from_str(&text)
        .map_err(|e| format!("invalid JSON in schema file {}: {e}", path.display()))?;
    let schemas = match json {
        Value::Array(_) => serde_json::from_value(json)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(schemas)
}

/// Read a JSON Lines file of records into `model`. Blank lines and lines
/// starting with `#` are ignored. Returns the number of records stored.
pub fn load_records(
    backend: &MemoryBackend,
    model: &str,
    path: &Path,
) -> Result<usize, Box<dyn Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read data file {}: {e}", path.display()))?;

    let mut count = 0;
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let json: Value = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: invalid JSON: {e}", path.display(), i + 1))?;
        let record = record_from_json(&json, model, backend)
            .map_err(|e| format!("{}:{}: {e}", path.display(), i + 1))?;
        backend
            .put(model, record)
            .map_err(|e| format!("{}:{}: {e}", path.display(), i + 1))?;
        count += 1;
    }
    Ok(count)
}

/// Build a backend from a schema file and a data file for `model`.
pub fn load_backend(
    schema_path: &Path,
    data_path: &Path,
    model: &str,
) -> Result<MemoryBackend, Box<dyn Error>> {
    let backend = MemoryBackend::new();
    for schema in load_schemas(schema_path)? {
        backend.create_model(schema)?;
    }
    let count = load_records(&backend, model, data_path)?;
    tracing::debug!(model, count, "loaded records");
    Ok(backend)
}
