//! Change history records.
//!
//! Saving an audited entity with a [`History`] attached stores one history row
//! in `<table>_History` plus one [`HistoryColumn`] row per changed column in
//! `<table>_History_Column`. Only auditable, writable properties are tracked.

use crate::backend::DatabaseBackend;
use crate::convert;
use crate::criteria::{Criterion, Join};
use crate::entity::{Entity, HasId, NEW_ID};
use crate::error::Result;
use crate::generator::{OrderBy, SqlGenerator};
use crate::metadata::{EntityMap, Property, PropertyKind};
use crate::operator;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of change a history row describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChangeType {
    #[default]
    NotSet,
    Insert,
    Update,
    Delete,
}

const CHANGE_TYPES: &[&str] = &["NotSet", "Insert", "Update", "Delete"];

/// One change to a record
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub id: i64,
    pub record_id: i64,
    pub change_type: ChangeType,
    /// Author of the change
    pub created_by: String,
    /// When the change happened; the minimum date means "now"
    pub created_on: NaiveDateTime,
    pub comment: String,
    pub committed: bool,
    pub published: bool,
    /// Changed columns; stored in their own table
    pub columns: Vec<HistoryColumn>,
}

impl Default for History {
    fn default() -> Self {
        Self {
            id: NEW_ID,
            record_id: NEW_ID,
            change_type: ChangeType::NotSet,
            created_by: String::new(),
            created_on: convert::min_date(),
            comment: String::new(),
            committed: false,
            published: false,
            columns: Vec::new(),
        }
    }
}

impl History {
    /// History authored by `author`, timestamped when saved
    pub fn by(author: impl Into<String>) -> Self {
        Self {
            created_by: author.into(),
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn at(mut self, on: NaiveDateTime) -> Self {
        self.created_on = on;
        self
    }

    /// Fresh copy used to record the deletion of one record
    pub fn for_delete(&self) -> Self {
        Self {
            id: NEW_ID,
            record_id: NEW_ID,
            change_type: ChangeType::Delete,
            columns: Vec::new(),
            ..self.clone()
        }
    }

    /// Whether no timestamp was supplied
    pub fn is_unstamped(&self) -> bool {
        self.created_on <= convert::min_date()
    }
}

impl HasId for History {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Entity for History {
    fn mapping() -> EntityMap<Self> {
        EntityMap::new("History")
            .property(Property::field("Id", PropertyKind::Integer, |h: &History| &h.id, |h| &mut h.id))
            .property(Property::field("RecordId", PropertyKind::Integer, |h: &History| &h.record_id, |h| &mut h.record_id))
            .property(Property::field("CreatedBy", PropertyKind::Text, |h: &History| &h.created_by, |h| &mut h.created_by))
            .property(Property::field("CreatedOn", PropertyKind::DateTime, |h: &History| &h.created_on, |h| &mut h.created_on))
            .property(Property::field("Comment", PropertyKind::Text, |h: &History| &h.comment, |h| &mut h.comment))
            .property(Property::field("Committed", PropertyKind::Boolean, |h: &History| &h.committed, |h| &mut h.committed))
            .property(
                Property::field("ChangeType", PropertyKind::Text, |h: &History| &h.change_type, |h| &mut h.change_type)
                    .column("Type")
                    .enumeration(CHANGE_TYPES),
            )
            .property(Property::field("Published", PropertyKind::Boolean, |h: &History| &h.published, |h| &mut h.published))
    }
}

/// Old and new value of one changed column
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryColumn {
    pub id: i64,
    pub history_id: i64,
    pub column: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl Default for HistoryColumn {
    fn default() -> Self {
        Self {
            id: NEW_ID,
            history_id: NEW_ID,
            column: String::new(),
            old_value: None,
            new_value: None,
        }
    }
}

impl HasId for HistoryColumn {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Entity for HistoryColumn {
    fn mapping() -> EntityMap<Self> {
        EntityMap::new("HistoryColumn")
            .property(Property::field("Id", PropertyKind::Integer, |c: &HistoryColumn| &c.id, |c| &mut c.id))
            .property(Property::field("HistoryId", PropertyKind::Integer, |c: &HistoryColumn| &c.history_id, |c| &mut c.history_id))
            .property(Property::field("Column", PropertyKind::Text, |c: &HistoryColumn| &c.column, |c| &mut c.column))
            .property(Property::field("OldValue", PropertyKind::Text, |c: &HistoryColumn| &c.old_value, |c| &mut c.old_value))
            .property(Property::field("NewValue", PropertyKind::Text, |c: &HistoryColumn| &c.new_value, |c| &mut c.new_value))
    }
}

fn tracked<T>(property: &Property<T>) -> bool {
    let d = property.descriptor();
    d.auditable && d.write
}

/// Column records for every tracked property whose value differs
pub fn changed_columns<T>(map: &EntityMap<T>, old: &T, new: &T) -> Vec<HistoryColumn> {
    map.properties()
        .iter()
        .filter(|p| tracked(p))
        .filter_map(|p| {
            let before = p.write_value(old);
            let after = p.write_value(new);
            (before != after).then(|| HistoryColumn {
                column: p.descriptor().column().to_string(),
                old_value: convert::to_text(&before),
                new_value: convert::to_text(&after),
                ..HistoryColumn::default()
            })
        })
        .collect()
}

/// Column records for a newly inserted entity: every tracked property, no old value
pub fn inserted_columns<T>(map: &EntityMap<T>, entity: &T) -> Vec<HistoryColumn> {
    map.properties()
        .iter()
        .filter(|p| tracked(p))
        .map(|p| HistoryColumn {
            column: p.descriptor().column().to_string(),
            old_value: None,
            new_value: convert::to_text(&p.write_value(entity)),
            ..HistoryColumn::default()
        })
        .collect()
}

/// Reads and writes the history tables of one entity table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStore {
    history_table: String,
    column_table: String,
}

impl HistoryStore {
    pub fn new(history_table: impl Into<String>, column_table: impl Into<String>) -> Self {
        Self {
            history_table: history_table.into(),
            column_table: column_table.into(),
        }
    }

    pub fn history_table(&self) -> &str {
        &self.history_table
    }

    pub fn column_table(&self) -> &str {
        &self.column_table
    }

    /// Store a history and its columns, assigning their identifiers
    pub async fn persist<B: DatabaseBackend>(&self, db: &mut B, history: &mut History) -> Result<i64> {
        let dialect = db.dialect();

        let map = History::mapping();
        let statement = SqlGenerator::new(&map, dialect)
            .table(self.history_table.as_str())
            .generate_insert(history, false)?;
        history.id = operator::insert(db, &statement).await?;

        let column_map = HistoryColumn::mapping();
        for column in history.columns.iter_mut() {
            column.history_id = history.id;
            let statement = SqlGenerator::new(&column_map, dialect)
                .table(self.column_table.as_str())
                .generate_insert(column, false)?;
            column.id = operator::insert(db, &statement).await?;
        }

        debug!(
            "Recorded {:?} history {} for record {} ({} columns)",
            history.change_type,
            history.id,
            history.record_id,
            history.columns.len()
        );
        Ok(history.id)
    }

    /// Most recent history of `record_id` that changed `column`, with its columns
    pub async fn latest<B: DatabaseBackend>(
        &self,
        db: &mut B,
        record_id: i64,
        column: &str,
    ) -> Result<Option<History>> {
        let map = History::mapping();
        let statement = SqlGenerator::new(&map, db.dialect())
            .table(self.history_table.as_str())
            .join(Join::inner(self.history_table.as_str(), self.column_table.as_str()).on("Id", "HistoryId"))
            .criterion(Criterion::new("Column", column).table(self.column_table.as_str()))
            .criterion(Criterion::new("RecordId", record_id))
            .order_by(OrderBy::desc("CreatedOn"))
            .order_by(OrderBy::desc("Id"))
            .generate_select_top(1)?;

        let rows = operator::query(db, &statement).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let mut history = map.from_row(row)?;
        history.columns = self.columns_of(db, history.id).await?;
        Ok(Some(history))
    }

    /// Column records of one history, in insertion order
    pub async fn columns_of<B: DatabaseBackend>(&self, db: &mut B, history_id: i64) -> Result<Vec<HistoryColumn>> {
        let map = HistoryColumn::mapping();
        let statement = SqlGenerator::new(&map, db.dialect())
            .table(self.column_table.as_str())
            .criterion(Criterion::new("HistoryId", history_id))
            .order_by(OrderBy::asc("Id"))
            .generate_select()?;

        operator::query(db, &statement)
            .await?
            .iter()
            .map(|row| map.from_row(row))
            .collect()
    }

    /// All histories of a record, newest first, without their columns
    pub async fn for_record<B: DatabaseBackend>(&self, db: &mut B, record_id: i64) -> Result<Vec<History>> {
        let map = History::mapping();
        let statement = SqlGenerator::new(&map, db.dialect())
            .table(self.history_table.as_str())
            .criterion(Criterion::new("RecordId", record_id))
            .order_by(OrderBy::desc("CreatedOn"))
            .order_by(OrderBy::desc("Id"))
            .generate_select()?;

        operator::query(db, &statement)
            .await?
            .iter()
            .map(|row| map.from_row(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QueryRow;
    use crate::testing::{Customer, MockBackend};
    use serde_json::json;

    #[test]
    fn test_changed_columns_skip_untracked() {
        let map = Customer::mapping();
        let old = Customer::default();
        let mut new = old.clone();
        new.city = "York".to_string();
        new.edited_by = "someone".to_string();
        new.tags = vec!["a".to_string(), "b".to_string()];

        let columns = changed_columns(&map, &old, &new);
        let names: Vec<_> = columns.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(names, vec!["City", "Tags"]);
        assert_eq!(columns[0].old_value, Some(String::new()));
        assert_eq!(columns[0].new_value, Some("York".to_string()));
        assert_eq!(columns[1].new_value, Some("a;b".to_string()));
    }

    #[test]
    fn test_inserted_columns() {
        let map = Customer::mapping();
        let mut customer = Customer::default();
        customer.post_code = "YO1 7HH".to_string();

        let columns = inserted_columns(&map, &customer);
        assert!(columns.iter().all(|c| c.old_value.is_none()));
        assert!(!columns.iter().any(|c| c.column == "Frequent" || c.column == "EditedOn"));
        let post_code = columns.iter().find(|c| c.column == "PostalCode").unwrap();
        assert_eq!(post_code.new_value, Some("YO1 7HH".to_string()));
    }

    #[test]
    fn test_for_delete_resets_identity() {
        let mut history = History::by("auditor").with_comment("closing account");
        history.id = 4;
        history.columns.push(HistoryColumn::default());

        let delete = history.for_delete();
        assert_eq!(delete.id, NEW_ID);
        assert_eq!(delete.change_type, ChangeType::Delete);
        assert_eq!(delete.created_by, "auditor");
        assert!(delete.columns.is_empty());
        assert!(delete.is_unstamped());
    }

    #[tokio::test]
    async fn test_persist_assigns_ids() {
        let mut db = MockBackend::new();
        db.push_insert_id(40);
        db.push_insert_id(41);
        db.push_insert_id(42);

        let mut history = History::by("auditor");
        history.record_id = 7;
        history.change_type = ChangeType::Update;
        history.columns = vec![
            HistoryColumn {
                column: "City".to_string(),
                ..HistoryColumn::default()
            },
            HistoryColumn {
                column: "Status".to_string(),
                ..HistoryColumn::default()
            },
        ];

        let store = HistoryStore::new("Customer_History", "Customer_History_Column");
        let id = store.persist(&mut db, &mut history).await.unwrap();

        assert_eq!(id, 40);
        assert_eq!(history.columns[0].history_id, 40);
        assert_eq!(history.columns[1].id, 42);
        assert!(db.executed[0].starts_with("INSERT INTO [Customer_History] ([RecordId], "));
        assert!(db.executed[1].starts_with("INSERT INTO [Customer_History_Column] ([HistoryId], "));
    }

    #[tokio::test]
    async fn test_latest_query_shape() {
        let mut db = MockBackend::new();
        let mut row = QueryRow::new();
        row.insert("Id".to_string(), json!(9));
        row.insert("RecordId".to_string(), json!(7));
        row.insert("Type".to_string(), json!("update"));
        row.insert("CreatedBy".to_string(), json!("auditor"));
        db.push_result(vec![row]);

        let store = HistoryStore::new("Customer_History", "Customer_History_Column");
        let history = store.latest(&mut db, 7, "City").await.unwrap().unwrap();

        assert_eq!(history.id, 9);
        assert_eq!(history.change_type, ChangeType::Update);
        assert!(history.columns.is_empty());
        assert_eq!(
            db.executed[0],
            "SELECT TOP (1) [Customer_History].[Id], [Customer_History].[RecordId], [Customer_History].[CreatedBy], \
             [Customer_History].[CreatedOn], [Customer_History].[Comment], [Customer_History].[Committed], \
             [Customer_History].[Type], [Customer_History].[Published] FROM [Customer_History] \
             INNER JOIN [Customer_History_Column] ON [Customer_History].[Id] = [Customer_History_Column].[HistoryId] \
             WHERE [Customer_History_Column].[Column] = @Column AND [Customer_History].[RecordId] = @RecordId \
             ORDER BY [Customer_History].[CreatedOn] DESC, [Customer_History].[Id] DESC"
        );
    }
}
