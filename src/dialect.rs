use std::fmt;

/// SQL flavour spoken by a backend.
///
/// Both dialects accept bracket-quoted identifiers, so generated text only
/// differs in parameter placeholders, row limiting, identity handling and
/// boolean literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    SqlServer,
    Sqlite,
}

impl Dialect {
    /// Quote an identifier: `Customer` becomes `[Customer]`
    pub fn quote(&self, ident: &str) -> String {
        if ident.starts_with('[') && ident.ends_with(']') {
            ident.to_string()
        } else {
            format!("[{}]", ident.replace(']', "]]"))
        }
    }

    /// Quote a `table.column` pair
    pub fn qualify(&self, table: &str, column: &str) -> String {
        format!("{}.{}", self.quote(table), self.quote(column))
    }

    /// Placeholder text for a parameter.
    ///
    /// `position` is the 1-based index of the parameter in the statement's
    /// parameter list.
    pub fn placeholder(&self, name: &str, position: usize) -> String {
        match self {
            Dialect::SqlServer => format!("@{}", name.trim_start_matches('@')),
            Dialect::Sqlite => format!("?{}", position),
        }
    }

    /// Prefix placed right after `SELECT` to limit the row count
    pub fn top_prefix(&self, top: Option<u32>) -> String {
        match (self, top) {
            (Dialect::SqlServer, Some(n)) if n > 0 => format!("TOP ({}) ", n),
            _ => String::new(),
        }
    }

    /// Suffix appended to a SELECT to limit the row count
    pub fn limit_suffix(&self, top: Option<u32>) -> String {
        match (self, top) {
            (Dialect::Sqlite, Some(n)) if n > 0 => format!(" LIMIT {}", n),
            _ => String::new(),
        }
    }

    /// Statement run in the same batch as an INSERT to read back the generated key.
    ///
    /// SQLite reports the rowid through the driver instead.
    pub fn last_insert_id_sql(&self) -> Option<&'static str> {
        match self {
            Dialect::SqlServer => Some("SELECT SCOPE_IDENTITY()"),
            Dialect::Sqlite => None,
        }
    }

    /// Wrap an INSERT so a caller-supplied identity value is accepted.
    ///
    /// Toggling happens inside one batch, so a failed insert never leaves the
    /// override switched on.
    pub fn identity_insert(&self, table: &str, insert: &str) -> String {
        match self {
            Dialect::SqlServer => format!(
                "SET IDENTITY_INSERT {table} ON; {insert}; SET IDENTITY_INSERT {table} OFF;",
                table = self.quote(table),
                insert = insert
            ),
            // rowid tables take explicit keys without any toggle
            Dialect::Sqlite => insert.to_string(),
        }
    }

    pub fn bool_literal(&self, value: bool) -> &'static str {
        match (self, value) {
            (Dialect::SqlServer, true) => "CAST(1 AS bit)",
            (Dialect::SqlServer, false) => "CAST(0 AS bit)",
            (Dialect::Sqlite, true) => "1",
            (Dialect::Sqlite, false) => "0",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::SqlServer => write!(f, "sqlserver"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}
