// Per-table control document: schema, id sequence, record count.
// Stored as `<base>/<table>.control.json`, sibling to the table directory.

use crate::error::{FolioDbError, Result};
use crate::record::timestamp;
use crate::schema::TableStructure;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The sole source of truth for a table's schema and id sequencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDocument {
    pub auto_increment: u64,
    pub records_count: u64,
    pub structure: TableStructure,
    pub created_at: String,
    pub updated_at: String,
}

impl ControlDocument {
    /// The document written when a table is created.
    pub fn initial(structure: TableStructure) -> Self {
        let now = timestamp();
        ControlDocument {
            auto_increment: 1,
            records_count: 0,
            structure,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A partial control document for merge writes. `None` fields are left as
/// read from disk.
#[derive(Debug, Clone, Default)]
pub struct ControlPatch {
    pub auto_increment: Option<u64>,
    pub records_count: Option<u64>,
    pub structure: Option<TableStructure>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ControlPatch {
    pub fn new() -> Self {
        ControlPatch::default()
    }

    pub fn auto_increment(mut self, value: u64) -> Self {
        self.auto_increment = Some(value);
        self
    }

    pub fn records_count(mut self, value: u64) -> Self {
        self.records_count = Some(value);
        self
    }

    pub fn structure(mut self, value: TableStructure) -> Self {
        self.structure = Some(value);
        self
    }

    fn apply(self, doc: &mut ControlDocument) {
        if let Some(v) = self.auto_increment {
            doc.auto_increment = v;
        }
        if let Some(v) = self.records_count {
            doc.records_count = v;
        }
        if let Some(v) = self.structure {
            doc.structure = v;
        }
        if let Some(v) = self.created_at {
            doc.created_at = v;
        }
        if let Some(v) = self.updated_at {
            doc.updated_at = v;
        }
    }
}

/// Handle on one table's control file.
#[derive(Debug)]
pub struct ControlFile {
    path: PathBuf,
}

impl ControlFile {
    pub fn new(path: PathBuf) -> Self {
        ControlFile { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the control document. A missing file yields the synthesized
    /// default (`auto_increment=1, records_count=0`, empty structure), which
    /// is not persisted until the next write. A present but unparseable file
    /// is `CorruptData`.
    pub fn read(&self) -> Result<ControlDocument> {
        if !self.path.exists() {
            return Ok(ControlDocument::initial(TableStructure::new()));
        }
        let raw = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| FolioDbError::CorruptData {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Overwrite the control file in full. Not atomic: a crash mid-write can
    /// truncate the file.
    pub fn write(&self, doc: &ControlDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Read, shallow-merge the patch on top, write the full result back.
    /// Every counter/structure mutation routes through here, so the file is
    /// always a complete document after any successful call. Assumes a
    /// single writer; concurrent merges lose updates.
    pub fn merge(&self, patch: ControlPatch) -> Result<ControlDocument> {
        let mut doc = self.read()?;
        patch.apply(&mut doc);
        self.write(&doc)?;
        Ok(doc)
    }

    pub fn remove(&self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}
