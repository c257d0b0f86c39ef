// Whole-database export/import as one JSON document.

use crate::control::ControlDocument;
use crate::error::{FolioDbError, Result};
use crate::record::{Record, ID_KEY};
use crate::store::Database;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The dump format: every table's control document and full record set,
/// plus the database's own base path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseDump {
    pub tables: BTreeMap<String, TableDump>,
    pub base_directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDump {
    pub control: ControlDocument,
    pub records: Vec<Value>,
}

impl Database {
    /// Serialize every table's control data and records to one pretty JSON
    /// document at `path`.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut tables = BTreeMap::new();
        for name in self.list_tables()? {
            let table = self.table(&name)?;
            let control = table.control_document()?;
            let records = table.scan()?.into_iter().map(Value::Object).collect();
            tables.insert(name, TableDump { control, records });
        }

        let dump = DatabaseDump {
            tables,
            base_directory: self.root().display().to_string(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&dump)?)?;
        Ok(())
    }

    /// Restore a dump. An absent or unparseable source degrades to
    /// `Ok(false)`. When `adopt_base_directory` is set, the dump's recorded
    /// base path replaces this database's root before restoring.
    ///
    /// Each table's control document is restored verbatim except
    /// `records_count`, which is derived solely from the inserts actually
    /// applied during replay. Records go through the normal insert path:
    /// the same structure validation, the same silent skip of occupied ids.
    pub fn import(
        &mut self,
        path: impl AsRef<Path>,
        adopt_base_directory: bool,
    ) -> Result<bool> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("import skipped, cannot read {}: {e}", path.display());
                return Ok(false);
            }
        };
        let dump: DatabaseDump = match serde_json::from_str(&raw) {
            Ok(dump) => dump,
            Err(e) => {
                log::warn!("import skipped, cannot parse {}: {e}", path.display());
                return Ok(false);
            }
        };

        if adopt_base_directory {
            let root = PathBuf::from(&dump.base_directory);
            if !root.exists() {
                std::fs::create_dir_all(&root).map_err(|e| FolioDbError::DirectoryCreation {
                    path: root.display().to_string(),
                    source: e,
                })?;
            }
            self.set_root(root);
        }

        for (name, table_dump) in dump.tables {
            let dir = self.root().join(&name);
            if !dir.exists() {
                std::fs::create_dir(&dir).map_err(|e| FolioDbError::DirectoryCreation {
                    path: dir.display().to_string(),
                    source: e,
                })?;
            }

            let table = self.handle(&name);
            let mut control = table_dump.control;
            control.records_count = 0;
            table.control_file().write(&control)?;

            for value in table_dump.records {
                let id = match value.get(ID_KEY).and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => {
                        return Err(FolioDbError::CorruptData {
                            path: path.display().to_string(),
                            reason: format!("record without a string id in table '{name}'"),
                        })
                    }
                };
                let record = Record::from_value(value, &id, path)?;
                table.write_new_record(record)?;
            }
        }

        Ok(true)
    }
}
