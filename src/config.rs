use crate::criteria::Join;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation a stored procedure performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureKind::Select => write!(f, "Select"),
            ProcedureKind::Insert => write!(f, "Insert"),
            ProcedureKind::Update => write!(f, "Update"),
            ProcedureKind::Delete => write!(f, "Delete"),
        }
    }
}

/// Configuration for a data controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Table written to; the mapping's table when unset
    pub table: Option<String>,
    /// View read from; the table when unset
    pub select_view: Option<String>,
    /// Write caller-chosen identifiers instead of letting the store generate them
    pub insert_id: bool,
    /// Appended to the table name to name the history table
    pub history_table_suffix: String,
    /// Appended to the history table name to name the history column table
    pub history_column_table_suffix: String,
    /// Prefix of stored procedure names
    pub procedure_prefix: String,
    /// Author stamped on audited saves that carry no history
    pub default_author: String,
    /// Joins applied to every read
    pub joins: Vec<Join>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            table: None,
            select_view: None,
            insert_id: false,
            history_table_suffix: "_History".to_string(),
            history_column_table_suffix: "_Column".to_string(),
            procedure_prefix: "usp_".to_string(),
            default_author: default_author(),
            joins: Vec::new(),
        }
    }
}

/// Login name of the current user
fn default_author() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "system".to_string())
}

impl ControllerConfig {
    /// Load from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn history_table(&self, table: &str) -> String {
        format!("{}{}", table, self.history_table_suffix)
    }

    pub fn history_column_table(&self, table: &str) -> String {
        format!("{}{}", self.history_table(table), self.history_column_table_suffix)
    }

    /// `<prefix><table><Select|Insert|Update|Delete>`
    pub fn procedure_name(&self, table: &str, kind: ProcedureKind) -> String {
        format!("{}{}{}", self.procedure_prefix, table, kind)
    }
}
