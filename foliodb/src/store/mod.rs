use crate::control::{ControlDocument, ControlFile, ControlPatch};
use crate::error::{FolioDbError, Result};
use crate::query::Query;
use crate::record::{self, Record};
use crate::schema::TableStructure;
use crate::validation::{self, ValidationMode};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

/// The main entry point for FolioDB.
/// Owns a base directory whose subdirectories are tables; each table's
/// metadata lives in a sibling `<table>.control.json` file.
pub struct Database {
    root: PathBuf,
}

impl Database {
    /// Open a database at the given base directory, creating it on first
    /// use.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| FolioDbError::DirectoryCreation {
                path: root.display().to_string(),
                source: e,
            })?;
        }
        Ok(Database { root })
    }

    /// The base directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn set_root(&mut self, root: PathBuf) {
        self.root = root;
    }

    /// Every directory entry of the base that is itself a directory, in
    /// filesystem enumeration order. Callers must treat the order as
    /// unspecified.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut tables = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                tables.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(tables)
    }

    /// Path existence only; does not check for a well-formed control file.
    pub fn table_exists(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    /// Select a table. Fails if the directory is absent.
    pub fn table(&self, name: &str) -> Result<Table> {
        if !self.root.join(name).exists() {
            return Err(FolioDbError::TableNotFound(name.to_string()));
        }
        Ok(self.handle(name))
    }

    /// Create a table directory and its initial control document
    /// (`auto_increment=1, records_count=0`, the given structure). Returns
    /// the selected handle.
    pub fn create_table(&self, name: &str, structure: TableStructure) -> Result<Table> {
        let dir = self.root.join(name);
        if dir.exists() {
            return Err(FolioDbError::TableAlreadyExists(name.to_string()));
        }
        std::fs::create_dir(&dir).map_err(|e| FolioDbError::DirectoryCreation {
            path: dir.display().to_string(),
            source: e,
        })?;

        let table = self.handle(name);
        table.control.write(&ControlDocument::initial(structure))?;
        log::debug!("created table '{name}'");
        Ok(table)
    }

    /// Delete every record file, then the table directory, then the control
    /// file. Returns `Ok(false)` when the table does not exist, for
    /// idempotent cleanup callers. A single file-deletion failure aborts
    /// without removing the directory, leaving a partially-cleaned table.
    pub fn drop_table(&self, name: &str) -> Result<bool> {
        let dir = self.root.join(name);
        if !dir.exists() {
            return Ok(false);
        }

        let table = self.handle(name);
        for path in table.record_files()? {
            record::delete_record(&path)?;
        }
        std::fs::remove_dir(&dir)?;
        if table.control.exists() {
            table.control.remove()?;
        }
        log::debug!("dropped table '{name}'");
        Ok(true)
    }

    /// Per-table counters as one JSON report, read from the control
    /// documents.
    pub fn status(&self) -> Result<Value> {
        let mut tables = Map::new();
        for name in self.list_tables()? {
            let doc = self.handle(&name).control.read()?;
            tables.insert(
                name,
                json!({
                    "records_count": doc.records_count,
                    "auto_increment": doc.auto_increment,
                }),
            );
        }
        Ok(json!({
            "base_directory": self.root.display().to_string(),
            "tables": tables,
        }))
    }

    pub(crate) fn handle(&self, name: &str) -> Table {
        Table {
            name: name.to_string(),
            dir: self.root.join(name),
            control: ControlFile::new(self.root.join(format!("{name}.control.json"))),
        }
    }
}

/// A handle to one table: record mutations, lookups, and the query cursor.
#[derive(Debug)]
pub struct Table {
    name: String,
    dir: PathBuf,
    control: ControlFile,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table's control document (synthesized default when the file is
    /// missing).
    pub fn control_document(&self) -> Result<ControlDocument> {
        self.control.read()
    }

    pub(crate) fn control_file(&self) -> &ControlFile {
        &self.control
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!("{}/*.json", self.dir.display());
        let files = glob::glob(&pattern)
            .map_err(|e| FolioDbError::Other(format!("Glob error: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(files)
    }

    /// Insert a record under an explicit id. Returns `Ok(false)` without
    /// touching anything when a file already exists at that id.
    pub fn insert(&self, id: &str, data: &Map<String, Value>) -> Result<bool> {
        self.write_new_record(Record::new(id, data.clone()))
    }

    /// Insert under the next `auto_increment` id. The id is reserved by a
    /// read-then-increment-then-persist on the control document, which is
    /// not guarded against concurrent callers. Returns the assigned id, or
    /// `None` when the slot was already occupied on disk.
    pub fn insert_auto(&self, data: &Map<String, Value>) -> Result<Option<String>> {
        let control = self.control.read()?;
        let id = control.auto_increment;
        self.control
            .merge(ControlPatch::new().auto_increment(id + 1))?;

        let id = id.to_string();
        Ok(self.insert(&id, data)?.then_some(id))
    }

    /// Shared write path for `insert` and import replay: validate, refuse to
    /// overwrite, write the file, bump `records_count`.
    pub(crate) fn write_new_record(&self, record: Record) -> Result<bool> {
        let control = self.control.read()?;
        validation::validate(&control.structure, &record.fields, ValidationMode::Insert)?;

        let path = self.record_path(&record.id);
        if path.exists() {
            return Ok(false);
        }

        record::write_record(&path, &record)?;
        self.control
            .merge(ControlPatch::new().records_count(control.records_count + 1))?;
        Ok(true)
    }

    /// Merge new top-level fields over an existing record (arrays and
    /// objects are replaced wholesale). Preserves `created_at`, refreshes
    /// `updated_at`.
    pub fn update_by_id(&self, id: &str, data: &Map<String, Value>) -> Result<()> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(FolioDbError::RecordNotFound {
                table: self.name.clone(),
                id: id.to_string(),
            });
        }

        let control = self.control.read()?;
        validation::validate(&control.structure, data, ValidationMode::Update)?;

        let mut existing = record::read_record(&path, id)?;
        for (key, value) in data {
            existing.fields.insert(key.clone(), value.clone());
        }
        existing.metadata.updated_at = record::timestamp();
        record::write_record(&path, &existing)
    }

    /// Remove the record file if present and decrement `records_count`
    /// (floored at 0). `Ok(false)` when the id does not exist.
    pub fn delete_by_id(&self, id: &str) -> Result<bool> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(false);
        }

        record::delete_record(&path)?;
        let control = self.control.read()?;
        self.control
            .merge(ControlPatch::new().records_count(control.records_count.saturating_sub(1)))?;
        Ok(true)
    }

    /// Load one record. `Ok(None)` when absent; `RecordIdMismatch` when the
    /// embedded id disagrees with the filename.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Record>> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        record::read_record(&path, id).map(Some)
    }

    pub fn exists_by_id(&self, id: &str) -> bool {
        self.record_path(id).exists()
    }

    /// Delete every record file and reset `auto_increment`/`records_count`.
    /// The structure and creation timestamp survive. A deletion failure
    /// aborts midway with prior deletions committed.
    pub fn truncate(&self) -> Result<()> {
        for path in self.record_files()? {
            record::delete_record(&path)?;
        }
        self.control
            .merge(ControlPatch::new().auto_increment(1).records_count(0))?;
        log::debug!("truncated table '{}'", self.name);
        Ok(())
    }

    /// A fresh query cursor over this table.
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Load the complete record set from storage, flattened to plain
    /// objects. Every query starts from here; the pipeline never caches
    /// across calls.
    pub fn scan(&self) -> Result<Vec<Map<String, Value>>> {
        let mut records = Vec::new();
        for path in self.record_files()? {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let record = record::read_record(&path, &stem)?;
            records.push(record.to_map());
        }
        Ok(records)
    }
}
