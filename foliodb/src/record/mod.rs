// Record I/O - one pretty-printed JSON object per file

use crate::error::{FolioDbError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

pub const ID_KEY: &str = "id";
pub const METADATA_KEY: &str = "_metadata";

/// Engine-managed timestamps carried by every record under `_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub created_at: String,
    pub updated_at: String,
}

/// A loaded record: filename-derived id, implicit metadata, declared fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub metadata: RecordMetadata,
    pub fields: Map<String, Value>,
}

impl Record {
    /// Build a fresh record, stamping both metadata timestamps with the
    /// current time.
    pub fn new(id: &str, fields: Map<String, Value>) -> Self {
        let now = timestamp();
        Record {
            id: id.to_string(),
            metadata: RecordMetadata {
                created_at: now.clone(),
                updated_at: now,
            },
            fields,
        }
    }

    /// Flatten into the on-disk object: `id`, `_metadata`, then the fields.
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// The flattened object form used by the query pipeline.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut obj = Map::new();
        obj.insert(ID_KEY.into(), Value::String(self.id.clone()));
        obj.insert(
            METADATA_KEY.into(),
            serde_json::json!({
                "created_at": self.metadata.created_at,
                "updated_at": self.metadata.updated_at,
            }),
        );
        for (key, value) in &self.fields {
            obj.insert(key.clone(), value.clone());
        }
        obj
    }

    /// Rebuild from an on-disk object. The embedded `id` must agree with the
    /// filename stem `expected_id`; a disagreement means the file was renamed
    /// or edited by hand.
    pub fn from_value(value: Value, expected_id: &str, origin: &Path) -> Result<Record> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(corrupt(
                    origin,
                    format!("expected an object, got {}", crate::schema::value_type_name(&other)),
                ))
            }
        };

        let id = match obj.remove(ID_KEY) {
            Some(Value::String(id)) => id,
            _ => return Err(corrupt(origin, "missing or non-string 'id'".into())),
        };
        if id != expected_id {
            return Err(FolioDbError::RecordIdMismatch {
                expected: expected_id.to_string(),
                actual: id,
            });
        }

        let metadata = match obj.remove(METADATA_KEY) {
            Some(meta) => serde_json::from_value::<RecordMetadata>(meta)
                .map_err(|e| corrupt(origin, format!("bad '_metadata': {e}")))?,
            None => return Err(corrupt(origin, "missing '_metadata'".into())),
        };

        Ok(Record {
            id,
            metadata,
            fields: obj,
        })
    }
}

/// The current time in the fixed `YYYY-MM-DD HH:MM:SS` form used on disk.
pub fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Read and decode a single record file.
pub fn read_record(path: &Path, expected_id: &str) -> Result<Record> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value =
        serde_json::from_str(&raw).map_err(|e| corrupt(path, e.to_string()))?;
    Record::from_value(value, expected_id, path)
}

/// Write a record file in full, pretty-printed.
pub fn write_record(path: &Path, record: &Record) -> Result<()> {
    let json = serde_json::to_string_pretty(&record.to_value())?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn delete_record(path: &Path) -> Result<()> {
    std::fs::remove_file(path)?;
    Ok(())
}

fn corrupt(path: &Path, reason: String) -> FolioDbError {
    FolioDbError::CorruptData {
        path: path.display().to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp();
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(ts.len(), 19);
        assert_eq!(ts.as_bytes()[4], b'-');
        assert_eq!(ts.as_bytes()[10], b' ');
        assert_eq!(ts.as_bytes()[13], b':');
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("7.json");

        let record = Record::new("7", fields(&[("name", json!("Alice")), ("age", json!(30))]));
        write_record(&path, &record).unwrap();

        let loaded = read_record(&path, "7").unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_file_is_pretty_printed_with_implicit_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("1.json");

        let record = Record::new("1", fields(&[("name", json!("Bob"))]));
        write_record(&path, &record).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains('\n'));
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["id"], json!("1"));
        assert!(value["_metadata"]["created_at"].is_string());
        assert!(value["_metadata"]["updated_at"].is_string());
        assert_eq!(value["name"], json!("Bob"));
    }

    #[test]
    fn test_id_mismatch_detected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2.json");

        let record = Record::new("9", fields(&[]));
        write_record(&path, &record).unwrap();

        let err = read_record(&path, "2").unwrap_err();
        assert!(matches!(
            err,
            FolioDbError::RecordIdMismatch { ref expected, ref actual }
                if expected == "2" && actual == "9"
        ));
    }

    #[test]
    fn test_unparseable_file_is_corrupt_data() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("3.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_record(&path, "3").unwrap_err();
        assert!(matches!(err, FolioDbError::CorruptData { .. }));
    }

    #[test]
    fn test_missing_metadata_is_corrupt_data() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("4.json");
        std::fs::write(&path, r#"{"id": "4", "name": "x"}"#).unwrap();

        let err = read_record(&path, "4").unwrap_err();
        assert!(matches!(err, FolioDbError::CorruptData { .. }));
    }
}
