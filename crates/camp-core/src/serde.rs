use std::collections::BTreeMap;
use std::fs;
use std::iter::FromIterator;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CampError, ErrorInfo};

fn serde_error(code: &str, err: impl ToString) -> CampError {
    CampError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CampError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json_serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer_pretty(&mut bytes, &canonical)
        .map_err(|err| serde_error("json_write", err))?;
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, CampError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json_deserialize", err))
}

/// Serializes a value into YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, CampError> {
    serde_yaml::to_string(value).map_err(|err| serde_error("yaml_serialize", err))
}

/// Deserializes a YAML payload into the requested type.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, CampError> {
    serde_yaml::from_slice(data).map_err(|err| serde_error("yaml_deserialize", err))
}

/// Writes canonical JSON to `path`, creating parent directories as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CampError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| CampError::io("io.create_dir", parent, err))?;
    }
    let bytes = to_canonical_json_bytes(value)?;
    fs::write(path, bytes).map_err(|err| CampError::io("io.write", path, err))
}

/// Reads and deserializes a JSON artifact.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CampError> {
    let bytes = fs::read(path).map_err(|err| CampError::io("io.read", path, err))?;
    from_json_slice(&bytes).map_err(|err| match err {
        CampError::Serde(info) => {
            CampError::Serde(info.with_context("path", path.display().to_string()))
        }
        other => other,
    })
}

/// Reads a YAML or JSON document, picking the decoder from the extension.
pub fn read_structured<T: DeserializeOwned>(path: &Path) -> Result<T, CampError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => read_json(path),
        _ => {
            let bytes = fs::read(path).map_err(|err| CampError::io("io.read", path, err))?;
            from_yaml_slice(&bytes).map_err(|err| match err {
                CampError::Serde(info) => {
                    CampError::Serde(info.with_context("path", path.display().to_string()))
                }
                other => other,
            })
        }
    }
}
