//! The data controller: save, load, delete and count entities of one type.
//!
//! Every operation takes the backend as `&mut B`. When the caller has begun a
//! transaction on it, a failing operation rolls that transaction back before
//! returning its error.
//!
//! # Save
//!
//! An entity whose identifier is the unsaved sentinel is inserted, any other
//! is updated. Auditable entities get their edit stamp from the supplied
//! [`History`] or from the clock and the configured default author. An update
//! that carries a history is diffed against the stored row: the changed
//! auditable columns are recorded, only the changed columns are written, and
//! when nothing auditable changed no write happens at all.

use crate::backend::{DatabaseBackend, QueryResult};
use crate::config::ControllerConfig;
use crate::convert;
use crate::criteria::Criterion;
use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::generator::{OrderBy, SqlGenerator};
use crate::history::{self, ChangeType, History, HistoryStore};
use crate::metadata::{ColumnSet, EntityMap};
use crate::operator;
use serde_json::Value;
use tracing::{debug, warn};

/// How reads filter and order rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Order by the sort column
    pub sorted: bool,
    /// Return soft-deleted rows too
    pub include_deleted: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            sorted: true,
            include_deleted: false,
        }
    }
}

/// One page of a paginated read
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the criteria across all pages
    pub total: i64,
}

/// Result of [`DataController::try_save`]
#[derive(Debug)]
pub enum SaveOutcome {
    Saved(i64),
    /// The save failed; the error is kept instead of propagated
    Failed(OrmError),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            SaveOutcome::Saved(id) => Some(*id),
            SaveOutcome::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> Result<i64> {
        match self {
            SaveOutcome::Saved(id) => Ok(id),
            SaveOutcome::Failed(err) => Err(err),
        }
    }
}

/// Persistence operations for entities of type `T`
pub struct DataController<T: Entity> {
    map: EntityMap<T>,
    config: ControllerConfig,
}

impl<T: Entity> Default for DataController<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> DataController<T> {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        Self {
            map: T::mapping(),
            config,
        }
    }

    pub fn mapping(&self) -> &EntityMap<T> {
        &self.map
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Table written to
    pub fn table(&self) -> &str {
        self.config.table.as_deref().unwrap_or(self.map.table())
    }

    /// `EditedOn` for auditable types that map it, else the identifier
    pub fn sort_column(&self) -> &'static str {
        if T::is_auditable() {
            if let Ok(column) = self.map.resolve_column("EditedOn") {
                return column;
            }
        }
        self.map.identifier_column()
    }

    pub fn history_store(&self) -> HistoryStore {
        HistoryStore::new(
            self.config.history_table(self.table()),
            self.config.history_column_table(self.table()),
        )
    }

    fn is_soft_deletable(&self) -> bool {
        let mut sample = T::default();
        self.map.soft_delete_column().is_some() && sample.as_soft_deletable_mut().is_some()
    }

    fn id_criterion(&self, id: i64) -> Criterion {
        Criterion::new(self.map.identifier_column(), id)
    }

    fn generator(&self, dialect: Dialect) -> SqlGenerator<'_, T> {
        let generator = SqlGenerator::new(&self.map, dialect)
            .table(self.table())
            .joins(self.config.joins.iter().cloned());
        match &self.config.select_view {
            Some(view) => generator.select_from(view.as_str()),
            None => generator,
        }
    }

    fn reader(&self, dialect: Dialect, options: ReadOptions) -> SqlGenerator<'_, T> {
        let mut generator = self.generator(dialect);
        if options.include_deleted {
            generator = generator.ignoring_deleted();
        }
        if options.sorted {
            generator = generator.order_by(OrderBy::asc(self.sort_column()));
        }
        generator
    }

    fn map_rows(&self, rows: &QueryResult) -> Result<Vec<T>> {
        rows.iter().map(|row| self.map.from_row(row)).collect()
    }

    /// Entity with identifier `id`, unless missing or soft-deleted
    pub async fn get<B: DatabaseBackend>(&self, db: &mut B, id: i64) -> Result<Option<T>> {
        self.get_with(db, id, ReadOptions::default()).await
    }

    pub async fn get_with<B: DatabaseBackend>(&self, db: &mut B, id: i64, options: ReadOptions) -> Result<Option<T>> {
        let options = ReadOptions { sorted: false, ..options };
        Ok(self
            .get_by_criteria_with(db, vec![self.id_criterion(id)], options)
            .await?
            .into_iter()
            .next())
    }

    /// Entity with identifier `id`, soft-deleted or not
    pub async fn get_deleted<B: DatabaseBackend>(&self, db: &mut B, id: i64) -> Result<Option<T>> {
        self.get_with(
            db,
            id,
            ReadOptions {
                sorted: false,
                include_deleted: true,
            },
        )
        .await
    }

    pub async fn get_all<B: DatabaseBackend>(&self, db: &mut B) -> Result<Vec<T>> {
        self.get_by_criteria(db, Vec::new()).await
    }

    /// Entities whose `column` (property or column name) equals `value`
    pub async fn get_for_column<B: DatabaseBackend>(
        &self,
        db: &mut B,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<T>> {
        let column = self.map.resolve_column(column)?;
        self.get_by_criteria(db, vec![Criterion::new(column, value)]).await
    }

    /// Entities sharing `entity`'s value of `property`
    pub async fn get_common<B: DatabaseBackend>(&self, db: &mut B, entity: &T, property: &str) -> Result<Vec<T>> {
        let property = self
            .map
            .get(property)
            .filter(|p| p.descriptor().read)
            .ok_or_else(|| OrmError::UnknownColumn(property.to_string()))?;

        let criterion = Criterion::new(property.descriptor().column(), property.write_value(entity));
        self.get_by_criteria(db, vec![criterion]).await
    }

    pub async fn get_by_criteria<B: DatabaseBackend>(&self, db: &mut B, criteria: Vec<Criterion>) -> Result<Vec<T>> {
        self.get_by_criteria_with(db, criteria, ReadOptions::default()).await
    }

    pub async fn get_by_criteria_with<B: DatabaseBackend>(
        &self,
        db: &mut B,
        criteria: Vec<Criterion>,
        options: ReadOptions,
    ) -> Result<Vec<T>> {
        let statement = self.reader(db.dialect(), options).criteria(criteria).generate_select()?;
        let rows = operator::query(db, &statement).await?;
        self.map_rows(&rows)
    }

    /// Whether a live row with identifier `id` is stored
    pub async fn exists<B: DatabaseBackend>(&self, db: &mut B, id: i64) -> Result<bool> {
        self.exists_with(db, id, false).await
    }

    /// Like [`exists`](Self::exists), optionally counting soft-deleted rows
    pub async fn exists_with<B: DatabaseBackend>(&self, db: &mut B, id: i64, include_deleted: bool) -> Result<bool> {
        let mut generator = self.generator(db.dialect());
        if include_deleted {
            generator = generator.ignoring_deleted();
        }
        let statement = generator
            .criterion(self.id_criterion(id))
            .generate_select_columns(Some(1), Some(&[self.map.identifier_column()]))?;
        Ok(!operator::query(db, &statement).await?.is_empty())
    }

    pub async fn exists_for_column<B: DatabaseBackend>(
        &self,
        db: &mut B,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<bool> {
        let column = self.map.resolve_column(column)?;
        self.exists_for_criteria(db, vec![Criterion::new(column, value)]).await
    }

    pub async fn exists_for_criteria<B: DatabaseBackend>(&self, db: &mut B, criteria: Vec<Criterion>) -> Result<bool> {
        let statement = self
            .generator(db.dialect())
            .criteria(criteria)
            .generate_select_columns(Some(1), Some(&[self.map.identifier_column()]))?;
        Ok(!operator::query(db, &statement).await?.is_empty())
    }

    pub async fn count<B: DatabaseBackend>(&self, db: &mut B, criteria: Vec<Criterion>) -> Result<i64> {
        let statement = self.generator(db.dialect()).criteria(criteria).generate_count(None)?;
        operator::scalar(db, &statement).await
    }

    /// Page `page` (1-based) of `page_size` rows; a zero size returns every row
    pub async fn paginate<B: DatabaseBackend>(
        &self,
        db: &mut B,
        criteria: Vec<Criterion>,
        order: Vec<OrderBy>,
        page: u32,
        page_size: u32,
    ) -> Result<Page<T>> {
        let mut generator = self.generator(db.dialect()).criteria(criteria.clone());
        if order.is_empty() {
            generator = generator.order_by(OrderBy::asc(self.sort_column()));
        }
        for o in order {
            generator = generator.order_by(o);
        }

        let first_row = (u64::from(page.max(1)) - 1) * u64::from(page_size) + 1;
        let Ok(first_row) = u32::try_from(first_row) else {
            // no table holds this many rows
            let total = self.count(db, criteria).await?;
            return Ok(Page { items: Vec::new(), total });
        };
        let statement = generator.generate_paginated(first_row, page_size)?;
        let rows = operator::query(db, &statement).await?;

        let total = match rows.first().and_then(|row| row.columns.get("totalResults")) {
            Some(value) => convert::as_i64(value).unwrap_or_default(),
            // past the last page: the window is empty but the total isn't
            None => self.count(db, criteria).await?,
        };

        Ok(Page {
            items: self.map_rows(&rows)?,
            total,
        })
    }

    /// Insert or update `entity` and return its identifier.
    ///
    /// A supplied history is filled in (type, record id, columns, identifier)
    /// when it gets stored.
    pub async fn save<B: DatabaseBackend>(
        &self,
        db: &mut B,
        entity: &mut T,
        history: Option<&mut History>,
    ) -> Result<i64> {
        match self.save_entity(db, entity, history).await {
            Ok(id) => Ok(id),
            Err(err) => Err(operator::abort(db, err).await),
        }
    }

    /// [`save`](Self::save) that reports failure as [`SaveOutcome::Failed`]
    pub async fn try_save<B: DatabaseBackend>(
        &self,
        db: &mut B,
        entity: &mut T,
        history: Option<&mut History>,
    ) -> SaveOutcome {
        match self.save(db, entity, history).await {
            Ok(id) => SaveOutcome::Saved(id),
            Err(err) => {
                warn!("Save to {} failed: {}", self.table(), err);
                SaveOutcome::Failed(err)
            }
        }
    }

    /// Save, then reload the stored entity
    pub async fn save_get<B: DatabaseBackend>(
        &self,
        db: &mut B,
        entity: &mut T,
        history: Option<&mut History>,
    ) -> Result<Option<T>> {
        let id = self.save(db, entity, history).await?;
        self.get_deleted(db, id).await
    }

    async fn save_entity<B: DatabaseBackend>(
        &self,
        db: &mut B,
        entity: &mut T,
        mut history: Option<&mut History>,
    ) -> Result<i64> {
        self.stamp_edit(entity, history.as_deref_mut());

        let inserting_id = self.config.insert_id && !entity.is_new() && !self.exists_with(db, entity.id(), true).await?;
        let dialect = db.dialect();

        if !entity.is_new() && !inserting_id {
            let mut columns = ColumnSet::All;

            if let Some(history) = history.filter(|_| T::is_auditable()) {
                if history.change_type != ChangeType::Delete && history.change_type != ChangeType::Insert {
                    history.change_type = ChangeType::Update;
                }
                history.record_id = entity.id();

                let changed = self.record_update(db, entity, history).await?;
                if changed.is_empty() {
                    debug!("No audited change to {} {}, skipping write", self.table(), entity.id());
                    return Ok(entity.id());
                }
                columns = ColumnSet::Only(changed);
            }

            let statement = self.generator(dialect).generate_update(entity, &columns)?;
            operator::execute(db, &statement).await?;
            return Ok(entity.id());
        }

        self.stamp_creation(entity, history.as_deref());

        let statement = self.generator(dialect).generate_insert(entity, inserting_id)?;
        let generated = operator::insert(db, &statement).await?;
        let id = if inserting_id { entity.id() } else { generated };
        entity.set_id(id);

        if let Some(history) = history.filter(|_| T::is_auditable()) {
            history.change_type = ChangeType::Insert;
            history.record_id = id;
            history.columns = history::inserted_columns(&self.map, entity);
            if !history.columns.is_empty() {
                self.history_store().persist(db, history).await?;
            }
        }

        Ok(id)
    }

    fn stamp_edit(&self, entity: &mut T, history: Option<&mut History>) {
        let Some(audit) = entity.as_auditable_mut() else {
            return;
        };

        match history {
            Some(history) => {
                if history.is_unstamped() {
                    history.created_on = convert::now();
                }
                if history.created_by.is_empty() {
                    history.created_by = self.config.default_author.clone();
                }
                if history.created_on > audit.edited_on() {
                    audit.set_edited_on(history.created_on);
                    audit.set_edited_by(history.created_by.clone());
                }
            }
            None => {
                audit.set_edited_on(convert::now());
                audit.set_edited_by(self.config.default_author.clone());
            }
        }
    }

    fn stamp_creation(&self, entity: &mut T, history: Option<&History>) {
        let on = match history {
            Some(history) if !history.is_unstamped() => history.created_on,
            _ => convert::now(),
        };
        let editor = entity
            .as_auditable()
            .map(|a| a.edited_by().to_string())
            .unwrap_or_else(|| self.config.default_author.clone());

        if let Some(created) = entity.as_controllable_mut() {
            created.set_created_on(on);
            if created.created_by().is_empty() {
                created.set_created_by(editor);
            }
        }
    }

    /// Diff against the stored row and store the history of the audited changes.
    ///
    /// Returns the names of every changed property, or nothing when no
    /// audited column changed.
    async fn record_update<B: DatabaseBackend>(
        &self,
        db: &mut B,
        entity: &mut T,
        history: &mut History,
    ) -> Result<Vec<String>> {
        let stored = self
            .get_deleted(db, entity.id())
            .await?
            .ok_or_else(|| OrmError::RecordNotFound {
                table: self.table().to_string(),
                id: entity.id(),
            })?;

        // creation stamp never changes after insert
        if let Some(original) = stored.as_auditable() {
            let (by, on) = (original.created_by().to_string(), original.created_on());
            if let Some(created) = entity.as_controllable_mut() {
                created.set_created_by(by);
                created.set_created_on(on);
            }
        }

        let columns = history::changed_columns(&self.map, &stored, entity);
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        history.columns = columns;
        self.history_store().persist(db, history).await?;

        Ok(self
            .map
            .changed_properties(&stored, entity)
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// Delete the entity with identifier `id`
    pub async fn delete<B: DatabaseBackend>(&self, db: &mut B, id: i64, history: Option<&History>) -> Result<bool> {
        self.delete_by_criteria(db, vec![self.id_criterion(id)], history).await
    }

    pub async fn delete_by_column<B: DatabaseBackend>(
        &self,
        db: &mut B,
        column: &str,
        value: impl Into<Value>,
        history: Option<&History>,
    ) -> Result<bool> {
        let column = self.map.resolve_column(column)?;
        self.delete_by_criteria(db, vec![Criterion::new(column, value)], history)
            .await
    }

    /// Delete every entity matching `criteria` and report whether any was.
    ///
    /// Soft-deletable entities are flagged and saved, each with its own copy
    /// of `history`; others are removed. No criteria deletes nothing.
    pub async fn delete_by_criteria<B: DatabaseBackend>(
        &self,
        db: &mut B,
        criteria: Vec<Criterion>,
        history: Option<&History>,
    ) -> Result<bool> {
        match self.delete_matching(db, criteria, history).await {
            Ok(deleted) => Ok(deleted),
            Err(err) => Err(operator::abort(db, err).await),
        }
    }

    async fn delete_matching<B: DatabaseBackend>(
        &self,
        db: &mut B,
        criteria: Vec<Criterion>,
        history: Option<&History>,
    ) -> Result<bool> {
        if criteria.is_empty() {
            debug!("Delete from {} without criteria skipped", self.table());
            return Ok(false);
        }

        if self.is_soft_deletable() {
            let targets = self
                .get_by_criteria_with(
                    db,
                    criteria,
                    ReadOptions {
                        sorted: false,
                        include_deleted: false,
                    },
                )
                .await?;

            let deleted = !targets.is_empty();
            for mut target in targets {
                if let Some(flag) = target.as_soft_deletable_mut() {
                    flag.set_deleted(true);
                }
                let mut record = history.map(History::for_delete);
                self.save_entity(db, &mut target, record.as_mut()).await?;
            }
            return Ok(deleted);
        }

        let statement = self.generator(db.dialect()).criteria(criteria).generate_delete()?;
        if statement.is_empty() {
            return Ok(false);
        }
        Ok(operator::execute(db, &statement).await? > 0)
    }

    /// Latest history of record `id` that changed `column`
    pub async fn latest_history<B: DatabaseBackend>(
        &self,
        db: &mut B,
        id: i64,
        column: &str,
    ) -> Result<Option<History>> {
        let column = self.map.resolve_column(column)?;
        self.history_store().latest(db, id, column).await
    }
}
