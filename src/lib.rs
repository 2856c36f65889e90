//! rowkeeper - metadata-driven row mapping with per-column change history
//!
//! rowkeeper maps plain Rust structs onto relational tables through an
//! explicit mapping table, generates parameterized SQL for them, and keeps an
//! audit trail of every changed column.
//!
//! # Architecture
//!
//! - **Mapping**: Each entity lists its persisted properties in an [`EntityMap`]
//! - **Generation**: [`SqlGenerator`] renders SELECT, paginated SELECT, COUNT,
//!   INSERT, UPDATE and DELETE statements from the mapping and [`Criterion`] trees
//! - **Execution**: Statements run on any [`DatabaseBackend`]; a failing
//!   operation rolls back the caller's transaction
//! - **Control**: [`DataController`] saves, loads, counts and deletes entities,
//!   stamping audit fields and honouring soft delete
//! - **History**: Updates carrying a [`History`] store one row per changed
//!   auditable column, and unchanged saves are skipped entirely
//!
//! # Dialects
//!
//! SQL is generated for SQL Server (`@name` parameters, `TOP (n)`,
//! `SCOPE_IDENTITY()`) or SQLite (`?N` parameters, `LIMIT n`). The backend
//! reports which one it speaks.
//!
//! # Example
//!
//! ```rust,no_run
//! use rowkeeper::prelude::*;
//!
//! #[derive(Debug, Clone)]
//! struct Note {
//!     id: i64,
//!     text: String,
//! }
//!
//! impl Default for Note {
//!     fn default() -> Self {
//!         Self { id: NEW_ID, text: String::new() }
//!     }
//! }
//!
//! impl HasId for Note {
//!     fn id(&self) -> i64 {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: i64) {
//!         self.id = id;
//!     }
//! }
//!
//! impl Entity for Note {
//!     fn mapping() -> EntityMap<Self> {
//!         EntityMap::new("Note")
//!             .property(Property::field("Id", PropertyKind::Integer, |n: &Note| &n.id, |n| &mut n.id))
//!             .property(Property::field("Text", PropertyKind::Text, |n: &Note| &n.text, |n| &mut n.text))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     #[cfg(feature = "sqlite")]
//!     {
//!         let mut db = SqliteBackend::memory().await?;
//!         let notes = DataController::<Note>::new();
//!
//!         let mut schema = SchemaGenerator::new(db.dialect());
//!         schema.register_controller(&notes)?;
//!         schema.apply(&mut db).await?;
//!
//!         let mut note = Note { text: "hello".to_string(), ..Note::default() };
//!         let id = notes.save(&mut db, &mut note, None).await?;
//!
//!         let found = notes.get_by_criteria(&mut db, vec![Criterion::new("Text", "hello")]).await?;
//!         println!("Saved {} and found {:?}", id, found);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backend Support
//!
//! The SQLite backend is enabled by default:
//!
//! ```toml
//! [dependencies]
//! rowkeeper = { version = "0.1", features = ["sqlite"] }
//! ```

pub mod backend;
pub mod config;
pub mod controller;
pub mod convert;
pub mod criteria;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod generator;
pub mod history;
pub mod metadata;
pub mod operator;
pub mod schema;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{DatabaseBackend, QueryResult, QueryRow, Transaction};
pub use config::{ControllerConfig, ProcedureKind};
pub use controller::{DataController, Page, ReadOptions, SaveOutcome};
pub use criteria::{Criterion, Join, JoinType, LogicalOp, Parameter, SearchType};
pub use dialect::Dialect;
pub use entity::{Auditable, Controllable, Entity, HasId, SoftDeletable, NEW_ID};
pub use error::{OrmError, Result};
pub use generator::{OrderBy, SortDirection, SqlGenerator, Statement};
pub use history::{ChangeType, History, HistoryColumn, HistoryStore};
pub use metadata::{ColumnSet, Direction, EntityMap, Property, PropertyDescriptor, PropertyKind};
pub use schema::{ColumnDef, IndexDef, SchemaGenerator, TableSchema};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

/// Prelude for common imports
pub mod prelude {
    pub use crate::backend::{DatabaseBackend, QueryResult, QueryRow, Transaction};
    pub use crate::controller::{DataController, Page, ReadOptions, SaveOutcome};
    pub use crate::criteria::{Criterion, Join, SearchType};
    pub use crate::entity::{Auditable, Controllable, Entity, HasId, SoftDeletable, NEW_ID};
    pub use crate::error::{OrmError, Result};
    pub use crate::generator::OrderBy;
    pub use crate::history::{ChangeType, History};
    pub use crate::metadata::{EntityMap, Property, PropertyKind};
    pub use crate::schema::SchemaGenerator;

    #[cfg(feature = "sqlite")]
    pub use crate::sqlite::SqliteBackend;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _schema = SchemaGenerator::new(Dialect::Sqlite);
        let _kind = PropertyKind::Text;
        let _search = SearchType::Contains;
        let _op = LogicalOp::And;
        let _config = ControllerConfig::default();
    }
}
