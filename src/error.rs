use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrmError>;

#[derive(Debug, Error)]
pub enum OrmError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Invalid value '{value}' for enum property {property}")]
    InvalidEnumValue { property: String, value: String },

    #[error("Getting id criteria failed: no property maps to column {column} on {table}")]
    MissingIdentifier { table: String, column: String },

    #[error("Invalid column {0}")]
    UnknownColumn(String),

    #[error("Parameter {0} already exists in this statement")]
    ParameterExists(String),

    #[error("No {table} record with id {id}")]
    RecordNotFound { table: String, id: i64 },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
