//! Shared fixtures for unit tests: a fully featured entity and a recording backend.

use crate::backend::{DatabaseBackend, QueryResult};
use crate::convert;
use crate::criteria::Parameter;
use crate::dialect::Dialect;
use crate::entity::{Auditable, Controllable, Entity, HasId, SoftDeletable, NEW_ID};
use crate::error::{OrmError, Result};
use crate::generator::Statement;
use crate::metadata::{EntityMap, Property, PropertyKind};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CustomerStatus {
    #[default]
    Active,
    Suspended,
    Closed,
}

impl CustomerStatus {
    pub const VARIANTS: &'static [&'static str] = &["Active", "Suspended", "Closed"];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub company_name: String,
    pub post_code: String,
    pub city: String,
    pub status: CustomerStatus,
    pub tags: Vec<String>,
    pub last_order: NaiveDateTime,
    pub nickname: String,
    pub order_count: i64,
    pub frequent: bool,
    pub created_by: String,
    pub created_on: NaiveDateTime,
    pub edited_by: String,
    pub edited_on: NaiveDateTime,
    pub deleted: bool,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            id: NEW_ID,
            company_name: String::new(),
            post_code: String::new(),
            city: String::new(),
            status: CustomerStatus::default(),
            tags: Vec::new(),
            last_order: convert::min_date(),
            nickname: String::new(),
            order_count: 0,
            frequent: false,
            created_by: String::new(),
            created_on: convert::min_date(),
            edited_by: String::new(),
            edited_on: convert::min_date(),
            deleted: false,
        }
    }
}

impl HasId for Customer {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Controllable for Customer {
    fn created_by(&self) -> &str {
        &self.created_by
    }

    fn set_created_by(&mut self, author: String) {
        self.created_by = author;
    }

    fn created_on(&self) -> NaiveDateTime {
        self.created_on
    }

    fn set_created_on(&mut self, on: NaiveDateTime) {
        self.created_on = on;
    }
}

impl Auditable for Customer {
    fn edited_by(&self) -> &str {
        &self.edited_by
    }

    fn set_edited_by(&mut self, author: String) {
        self.edited_by = author;
    }

    fn edited_on(&self) -> NaiveDateTime {
        self.edited_on
    }

    fn set_edited_on(&mut self, on: NaiveDateTime) {
        self.edited_on = on;
    }
}

impl SoftDeletable for Customer {
    fn deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}

impl Entity for Customer {
    fn mapping() -> EntityMap<Self> {
        EntityMap::new("Customer")
            .soft_delete("Deleted")
            .property(Property::field("Id", PropertyKind::Integer, |c: &Customer| &c.id, |c| &mut c.id))
            .property(
                Property::field("CompanyName", PropertyKind::Text, |c: &Customer| &c.company_name, |c| &mut c.company_name)
                    .sql_type("NVARCHAR(100)"),
            )
            .property(
                Property::field("PostCode", PropertyKind::Text, |c: &Customer| &c.post_code, |c| &mut c.post_code)
                    .column("PostalCode"),
            )
            .property(Property::field("City", PropertyKind::Text, |c: &Customer| &c.city, |c| &mut c.city))
            .property(
                Property::field("Status", PropertyKind::Text, |c: &Customer| &c.status, |c| &mut c.status)
                    .enumeration(CustomerStatus::VARIANTS),
            )
            .property(
                Property::field("Tags", PropertyKind::Text, |c: &Customer| &c.tags, |c| &mut c.tags).delimiter(';'),
            )
            .property(Property::field("LastOrder", PropertyKind::DateTime, |c: &Customer| &c.last_order, |c| &mut c.last_order))
            .property(
                Property::field("Nickname", PropertyKind::Text, |c: &Customer| &c.nickname, |c| &mut c.nickname)
                    .coalesce("'none'"),
            )
            .property(Property::field("OrderCount", PropertyKind::Integer, |c: &Customer| &c.order_count, |c| &mut c.order_count))
            .property(
                Property::field("Frequent", PropertyKind::Boolean, |c: &Customer| &c.frequent, |c| &mut c.frequent)
                    .create_bool("OrderCount", "> 10"),
            )
            .property(
                Property::field("CreatedBy", PropertyKind::Text, |c: &Customer| &c.created_by, |c| &mut c.created_by)
                    .auditable(false),
            )
            .property(
                Property::field("CreatedOn", PropertyKind::DateTime, |c: &Customer| &c.created_on, |c| &mut c.created_on)
                    .auditable(false),
            )
            .property(
                Property::field("EditedBy", PropertyKind::Text, |c: &Customer| &c.edited_by, |c| &mut c.edited_by)
                    .auditable(false),
            )
            .property(
                Property::field("EditedOn", PropertyKind::DateTime, |c: &Customer| &c.edited_on, |c| &mut c.edited_on)
                    .auditable(false),
            )
            .property(Property::field("Deleted", PropertyKind::Boolean, |c: &Customer| &c.deleted, |c| &mut c.deleted))
    }

    fn as_controllable_mut(&mut self) -> Option<&mut dyn Controllable> {
        Some(self)
    }

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        Some(self)
    }

    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        Some(self)
    }

    fn as_soft_deletable_mut(&mut self) -> Option<&mut dyn SoftDeletable> {
        Some(self)
    }
}

/// Backend that records every statement and answers from queued results
#[derive(Debug, Default)]
pub struct MockBackend {
    pub executed: Vec<String>,
    pub params: Vec<Vec<Parameter>>,
    pub commits: usize,
    pub rollbacks: usize,
    in_transaction: bool,
    results: VecDeque<QueryResult>,
    insert_ids: VecDeque<i64>,
    next_id: i64,
    fail_on: Option<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement whose SQL contains `fragment`
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    /// Queue the rows returned by the next query
    pub fn push_result(&mut self, rows: QueryResult) {
        self.results.push_back(rows);
    }

    /// Queue the key returned by the next insert
    pub fn push_insert_id(&mut self, id: i64) {
        self.insert_ids.push_back(id);
    }

    fn record(&mut self, statement: &Statement) -> Result<()> {
        self.executed.push(statement.sql.clone());
        self.params.push(statement.params.clone());
        match &self.fail_on {
            Some(fragment) if statement.sql.contains(fragment.as_str()) => {
                Err(OrmError::Database(format!("mock failure on {}", fragment)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DatabaseBackend for MockBackend {
    async fn connect(_url: &str) -> Result<Self> {
        Ok(Self::new())
    }

    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        self.record(statement)?;
        Ok(1)
    }

    async fn query(&mut self, statement: &Statement) -> Result<QueryResult> {
        self.record(statement)?;
        Ok(self.results.pop_front().unwrap_or_default())
    }

    async fn insert(&mut self, statement: &Statement) -> Result<i64> {
        self.record(statement)?;
        Ok(match self.insert_ids.pop_front() {
            Some(id) => id,
            None => {
                self.next_id += 1;
                self.next_id
            }
        })
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(OrmError::Transaction("Already in transaction".to_string()));
        }
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.in_transaction = false;
        self.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.in_transaction = false;
        self.rollbacks += 1;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}
