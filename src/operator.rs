//! Statement execution with rollback on failure.
//!
//! Every statement the controller runs goes through these functions. When a
//! statement fails while the backend has an open transaction, the transaction
//! is rolled back before the original error is returned.

use crate::backend::{DatabaseBackend, QueryResult};
use crate::convert;
use crate::error::{OrmError, Result};
use crate::generator::Statement;
use tracing::{debug, warn};

/// Execute a statement and return the affected row count.
///
/// An empty statement is skipped and reports zero rows.
pub async fn execute<B: DatabaseBackend>(db: &mut B, statement: &Statement) -> Result<u64> {
    if statement.is_empty() {
        debug!("Skipping empty statement");
        return Ok(0);
    }

    debug!("Executing {} ({} params)", statement.sql, statement.params.len());
    match db.execute(statement).await {
        Ok(rows) => Ok(rows),
        Err(err) => Err(abort(db, err).await),
    }
}

/// Run a query and return its rows
pub async fn query<B: DatabaseBackend>(db: &mut B, statement: &Statement) -> Result<QueryResult> {
    debug!("Querying {} ({} params)", statement.sql, statement.params.len());
    match db.query(statement).await {
        Ok(rows) => Ok(rows),
        Err(err) => Err(abort(db, err).await),
    }
}

/// Run an INSERT and return the generated key
pub async fn insert<B: DatabaseBackend>(db: &mut B, statement: &Statement) -> Result<i64> {
    debug!("Inserting {} ({} params)", statement.sql, statement.params.len());
    match db.insert(statement).await {
        Ok(id) => Ok(id),
        Err(err) => Err(abort(db, err).await),
    }
}

/// First column of the first row as an integer, zero when there is no row
pub async fn scalar<B: DatabaseBackend>(db: &mut B, statement: &Statement) -> Result<i64> {
    let rows = query(db, statement).await?;
    let Some(row) = rows.first() else {
        return Ok(0);
    };

    match row.scalar() {
        Some(value) if value.is_null() => Ok(0),
        Some(value) => convert::as_i64(value)
            .ok_or_else(|| OrmError::Mapping(format!("expected an integer scalar, got {}", value))),
        None => Err(OrmError::Mapping(format!(
            "expected a single column, got {}",
            row.columns.len()
        ))),
    }
}

/// Roll back an open transaction and hand back the error that caused it.
///
/// A failing rollback is logged; the original error still wins.
pub async fn abort<B: DatabaseBackend>(db: &mut B, err: OrmError) -> OrmError {
    if db.in_transaction() {
        debug!("Rolling back after error: {}", err);
        if let Err(rollback_err) = db.rollback().await {
            warn!("Rollback after failed operation also failed: {}", rollback_err);
        }
    }
    err
}
