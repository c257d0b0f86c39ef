pub mod schema;
pub mod record;
pub mod control;
pub mod validation;
pub mod query;
pub mod store;
pub mod backup;
pub mod error;

pub use backup::{DatabaseDump, TableDump};
pub use error::{FolioDbError, Result};
pub use schema::TableStructure;
pub use record::Record;
pub use control::ControlDocument;
pub use query::{Aggregate, Criterion, Operator, Query, RecordGroup};
pub use store::{Database, Table};
