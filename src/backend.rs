use crate::dialect::Dialect;
use crate::error::Result;
use crate::generator::Statement;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Row from a query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub columns: HashMap<String, Value>,
}

impl QueryRow {
    pub fn new() -> Self {
        Self {
            columns: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.columns.insert(key, value);
    }

    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.columns
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.columns
            .get(key)
            .and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.columns.get(key).and_then(|v| v.as_i64())
    }

    /// Value of a single-column row, such as a `COUNT` result
    pub fn scalar(&self) -> Option<&Value> {
        if self.columns.len() == 1 {
            self.columns.values().next()
        } else {
            None
        }
    }
}

impl Default for QueryRow {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a query
pub type QueryResult = Vec<QueryRow>;

/// Database backend trait
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Connect to the database
    async fn connect(url: &str) -> Result<Self>
    where
        Self: Sized;

    /// SQL flavour statements must be generated in
    fn dialect(&self) -> Dialect;

    /// Execute a statement and return the affected row count
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;

    /// Query and return results
    async fn query(&mut self, statement: &Statement) -> Result<QueryResult>;

    /// Execute an INSERT and return the generated key
    async fn insert(&mut self, statement: &Statement) -> Result<i64>;

    /// Execute raw SQL without parameters
    async fn execute_sql(&mut self, sql: &str) -> Result<u64> {
        self.execute(&Statement::new(sql)).await
    }

    /// Begin a transaction
    async fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the current transaction
    async fn commit(&mut self) -> Result<()>;

    /// Rollback the current transaction
    async fn rollback(&mut self) -> Result<()>;

    /// Whether a transaction begun on this backend is still open
    fn in_transaction(&self) -> bool;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn close(self) -> Result<()>;
}

/// Transaction scope over a backend.
///
/// Operations run through [`Transaction::backend`] take part in the
/// transaction; a failing controller operation rolls it back before returning
/// its error.
pub struct Transaction<'a, B: DatabaseBackend> {
    backend: &'a mut B,
    finished: bool,
}

impl<'a, B: DatabaseBackend> Transaction<'a, B> {
    pub async fn new(backend: &'a mut B) -> Result<Self> {
        backend.begin_transaction().await?;
        Ok(Self {
            backend,
            finished: false,
        })
    }

    /// Backend to pass to controller operations
    pub fn backend(&mut self) -> &mut B {
        &mut *self.backend
    }

    /// Whether the transaction is still open on the backend
    pub fn is_active(&self) -> bool {
        self.backend.in_transaction()
    }

    pub async fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.backend.commit().await
    }

    /// Roll back unless a failed operation already did
    pub async fn rollback(mut self) -> Result<()> {
        self.finished = true;
        if self.backend.in_transaction() {
            self.backend.rollback().await?;
        }
        Ok(())
    }

    pub async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        self.backend.execute(statement).await
    }

    pub async fn query(&mut self, statement: &Statement) -> Result<QueryResult> {
        self.backend.query(statement).await
    }
}

impl<'a, B: DatabaseBackend> Drop for Transaction<'a, B> {
    fn drop(&mut self) {
        // Can't roll back from drop; the backend keeps the transaction open
        if !self.finished && self.backend.in_transaction() {
            warn!("transaction dropped without commit or rollback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use serde_json::json;

    #[test]
    fn test_query_row_accessors() {
        let mut row = QueryRow::new();
        row.insert("Name".to_string(), json!("Acme"));
        assert_eq!(row.get_string("Name"), Some("Acme".to_string()));
        assert_eq!(row.scalar(), Some(&json!("Acme")));

        row.insert("Count".to_string(), json!(3));
        assert_eq!(row.get_i64("Count"), Some(3));
        assert_eq!(row.get::<i64>("Count"), Some(3));
        assert_eq!(row.scalar(), None);
    }

    #[tokio::test]
    async fn test_transaction_commit() {
        let mut backend = MockBackend::new();
        let mut tx = Transaction::new(&mut backend).await.unwrap();
        assert!(tx.is_active());
        tx.execute(&Statement::new("DELETE FROM [Customer]")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!backend.in_transaction());
        assert_eq!(backend.executed, vec!["DELETE FROM [Customer]".to_string()]);
        assert_eq!(backend.commits, 1);
    }

    #[tokio::test]
    async fn test_rollback_skipped_when_already_rolled_back() {
        let mut backend = MockBackend::new();
        let tx = Transaction::new(&mut backend).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(backend.rollbacks, 1);

        let mut tx = Transaction::new(&mut backend).await.unwrap();
        tx.backend().rollback().await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(backend.rollbacks, 2);
    }
}
