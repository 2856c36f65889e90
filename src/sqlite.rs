use crate::backend::{DatabaseBackend, QueryResult, QueryRow};
use crate::dialect::Dialect;
use crate::error::{OrmError, Result};
use crate::generator::Statement;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};
use std::str::FromStr;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite backend.
///
/// The pool holds exactly one long-lived connection: explicit transactions
/// are plain `BEGIN`/`COMMIT` statements and must all reach the same
/// connection, and an in-memory database lives only as long as its connection.
pub struct SqliteBackend {
    pool: SqlitePool,
    in_transaction: bool,
}

impl SqliteBackend {
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            in_transaction: false,
        })
    }

    /// Create an in-memory SQLite database
    pub async fn memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Create a file-based SQLite database
    pub async fn file(path: &str) -> Result<Self> {
        Self::new(&format!("sqlite://{}", path)).await
    }

    fn bind<'q>(statement: &'q Statement) -> SqliteQuery<'q> {
        statement
            .params
            .iter()
            .fold(sqlx::query(&statement.sql), |query, param| bind_value(query, &param.value))
    }

    /// Convert SQLite row to QueryRow
    fn convert_row(row: &SqliteRow) -> QueryRow {
        let mut query_row = QueryRow::new();

        for column in row.columns() {
            let name = column.name();
            let ordinal = column.ordinal();

            // Storage class decides which decode succeeds; NULL falls through
            let value = if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(ordinal) {
                Value::Number(v.into())
            } else if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(ordinal) {
                serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
            } else if let Ok(Some(v)) = row.try_get::<Option<String>, _>(ordinal) {
                Value::String(v)
            } else if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(ordinal) {
                Value::String(String::from_utf8_lossy(&v).into_owned())
            } else {
                Value::Null
            };

            query_row.insert(name.to_string(), value);
        }

        query_row
    }

    /// Get list of all tables
    pub async fn list_tables(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &'q Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
    async fn connect(url: &str) -> Result<Self> {
        Self::new(url).await
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let result = Self::bind(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, statement: &Statement) -> Result<QueryResult> {
        let rows = Self::bind(statement).fetch_all(&self.pool).await?;

        let result = rows.iter().map(Self::convert_row).collect();

        Ok(result)
    }

    async fn insert(&mut self, statement: &Statement) -> Result<i64> {
        let result = Self::bind(statement).execute(&self.pool).await?;
        Ok(result.last_insert_rowid())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(OrmError::Transaction("Already in transaction".to_string()));
        }

        self.execute_sql("BEGIN TRANSACTION").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(OrmError::Transaction("Not in transaction".to_string()));
        }

        self.execute_sql("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(OrmError::Transaction("Not in transaction".to_string()));
        }

        self.in_transaction = false;
        self.execute_sql("ROLLBACK").await?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
