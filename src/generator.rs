//! Parameterized statement generation from entity metadata.
//!
//! [`SqlGenerator`] combines an [`EntityMap`] with criteria, joins and
//! ordering to produce a [`Statement`]: SQL text plus the ordered parameter
//! values to bind.
//!
//! ```rust,ignore
//! let statement = SqlGenerator::new(&map, Dialect::SqlServer)
//!     .criterion(Criterion::new("City", "Leeds"))
//!     .order_by(OrderBy::asc("CompanyName"))
//!     .generate_select_top(10)?;
//! ```

use crate::criteria::{self, Criterion, Join, Parameter, ParameterList};
use crate::dialect::Dialect;
use crate::error::{OrmError, Result};
use crate::metadata::{ColumnSet, Direction, EntityMap};
use std::fmt;

/// SQL text and its bound parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Parameter>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Statement that callers skip instead of executing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    fn with_params(sql: String, params: ParameterList) -> Self {
        Self {
            sql,
            params: params.into_vec(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// ORDER BY entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub table: Option<String>,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            table: None,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            table: None,
            direction: SortDirection::Desc,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn to_sql(&self, default_table: &str, dialect: Dialect) -> String {
        let table = self.table.as_deref().unwrap_or(default_table);
        format!("{} {}", dialect.qualify(table, &self.column), self.direction)
    }
}

/// Statement generator for one entity type
pub struct SqlGenerator<'m, T> {
    map: &'m EntityMap<T>,
    dialect: Dialect,
    table: String,
    source: String,
    criteria: Vec<Criterion>,
    joins: Vec<Join>,
    order_by: Vec<OrderBy>,
    group_by: Vec<String>,
    ignore_deleted: bool,
}

impl<'m, T> SqlGenerator<'m, T> {
    pub fn new(map: &'m EntityMap<T>, dialect: Dialect) -> Self {
        Self {
            map,
            dialect,
            table: map.table().to_string(),
            source: map.table().to_string(),
            criteria: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            ignore_deleted: false,
        }
    }

    /// Table written by INSERT/UPDATE/DELETE and read by SELECT
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self.source = self.table.clone();
        self
    }

    /// Read from a view instead of the table
    pub fn select_from(mut self, view: impl Into<String>) -> Self {
        self.source = view.into();
        self
    }

    pub fn criterion(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn criteria(mut self, criteria: impl IntoIterator<Item = Criterion>) -> Self {
        self.criteria.extend(criteria);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn joins(mut self, joins: impl IntoIterator<Item = Join>) -> Self {
        self.joins.extend(joins);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Group SELECT rows by a property or column
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    /// Leave soft-deleted rows visible to SELECT and COUNT
    pub fn ignoring_deleted(mut self) -> Self {
        self.ignore_deleted = true;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Criteria as bound: soft-delete filter first, names assigned once
    fn read_criteria(&self) -> Result<Vec<Criterion>> {
        let mut requested = self.criteria.clone();
        self.resolve_columns(&mut requested)?;

        let mut criteria = Vec::with_capacity(requested.len() + 1);
        if let Some(column) = self.map.soft_delete_column().filter(|_| !self.ignore_deleted) {
            criteria.push(Criterion::new(column, false).table(self.source.clone()));
        }
        criteria.extend(requested);
        criteria::assign_parameter_names(&mut criteria);
        Ok(criteria)
    }

    /// Rewrite criteria on the mapped table to registered column names.
    ///
    /// Criteria naming another table pass through untouched.
    fn resolve_columns(&self, criteria: &mut [Criterion]) -> Result<()> {
        for criterion in criteria.iter_mut() {
            let own = criterion
                .table
                .as_deref()
                .map_or(true, |t| t == self.source || t == self.table);
            if own {
                criterion.column = self.map.resolve_column(&criterion.column)?.to_string();
            }
            self.resolve_columns(&mut criterion.children)?;
        }
        Ok(())
    }

    fn group_sql(&self) -> Result<String> {
        let columns = self
            .group_by
            .iter()
            .map(|c| Ok(self.dialect.qualify(&self.source, self.map.resolve_column(c)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(columns.join(", "))
    }

    fn join_sql(&self, criteria: &[Criterion]) -> String {
        criteria::collect_joins(&self.joins, criteria)
            .iter()
            .map(|j| format!(" {}", j.to_sql(self.dialect)))
            .collect()
    }

    fn order_sql(&self) -> String {
        self.order_by
            .iter()
            .map(|o| o.to_sql(&self.source, self.dialect))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Readable columns, optionally restricted to the named ones
    fn select_list(&self, only: Option<&[&str]>) -> Result<String> {
        let wanted = match only {
            Some(names) => Some(
                names
                    .iter()
                    .map(|n| self.map.resolve_column(n))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };

        let columns: Vec<String> = self
            .map
            .projection(Direction::Read, true)
            .iter()
            .filter(|b| wanted.as_ref().map_or(true, |w| w.contains(&b.column)))
            .map(|b| {
                let d = b.property.descriptor();
                let table = d.table_name.unwrap_or(self.source.as_str());
                if let Some((source, condition)) = d.create_bool {
                    format!(
                        "CASE WHEN ({} {}) THEN {} ELSE {} END AS {}",
                        self.dialect.qualify(table, source),
                        condition,
                        self.dialect.bool_literal(true),
                        self.dialect.bool_literal(false),
                        self.dialect.quote(b.column)
                    )
                } else if let Some(replacement) = d.coalesce {
                    format!(
                        "COALESCE({}, {}) AS {}",
                        self.dialect.qualify(table, b.column),
                        replacement,
                        self.dialect.quote(b.column)
                    )
                } else {
                    self.dialect.qualify(table, b.column)
                }
            })
            .collect();

        if columns.is_empty() {
            return Err(OrmError::Query(format!("no readable columns selected from {}", self.source)));
        }
        Ok(columns.join(", "))
    }

    /// `SELECT` over every readable column
    pub fn generate_select(&self) -> Result<Statement> {
        self.generate_select_columns(None, None)
    }

    /// `SELECT` limited to the first `top` rows
    pub fn generate_select_top(&self, top: u32) -> Result<Statement> {
        self.generate_select_columns(Some(top), None)
    }

    /// `SELECT` with an optional row limit and column restriction.
    ///
    /// Column names may be property or column names; an unknown one fails
    /// with [`OrmError::UnknownColumn`].
    pub fn generate_select_columns(&self, top: Option<u32>, columns: Option<&[&str]>) -> Result<Statement> {
        let criteria = self.read_criteria()?;
        let mut params = ParameterList::new();

        let mut sql = format!(
            "SELECT {}{} FROM {}",
            self.dialect.top_prefix(top),
            self.select_list(columns)?,
            self.dialect.quote(&self.source)
        );
        sql.push_str(&self.join_sql(&criteria));
        sql.push_str(&criteria::where_clause(&criteria, &self.source, self.dialect, &mut params)?);

        let group = self.group_sql()?;
        if !group.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&group);
        }

        let order = self.order_sql();
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        sql.push_str(&self.dialect.limit_suffix(top));

        Ok(Statement::with_params(sql, params))
    }

    /// Windowed SELECT returning rows `first_row ..= first_row + page_size - 1`
    /// in the current order, each carrying `totalResults`.
    ///
    /// A zero `page_size` returns every row. Without any ORDER BY the rows are
    /// numbered by the identifier column.
    pub fn generate_paginated(&self, first_row: u32, page_size: u32) -> Result<Statement> {
        let criteria = self.read_criteria()?;
        let mut params = ParameterList::new();

        let mut order = self.order_sql();
        if order.is_empty() {
            order = OrderBy::asc(self.map.identifier_column()).to_sql(&self.source, self.dialect);
        }

        let cte = self.dialect.quote("pagination");
        let row_no = self.dialect.quote("rowNo");

        let mut inner = format!(
            "SELECT ROW_NUMBER() OVER (ORDER BY {}) AS {}, {} FROM {}",
            order,
            row_no,
            self.select_list(None)?,
            self.dialect.quote(&self.source)
        );
        inner.push_str(&self.join_sql(&criteria));
        inner.push_str(&criteria::where_clause(&criteria, &self.source, self.dialect, &mut params)?);

        let mut sql = format!(
            "WITH {cte} AS ({inner}) SELECT *, (SELECT COUNT({row_no}) FROM {cte}) AS {total} FROM {cte}",
            cte = cte,
            inner = inner,
            row_no = row_no,
            total = self.dialect.quote("totalResults")
        );
        if page_size > 0 {
            let first = u64::from(first_row.max(1));
            sql.push_str(&format!(
                " WHERE {} BETWEEN {} AND {}",
                row_no,
                first,
                first + u64::from(page_size) - 1
            ));
        }
        sql.push_str(&format!(" ORDER BY {}", row_no));

        Ok(Statement::with_params(sql, params))
    }

    /// `SELECT COUNT(column)`; the identifier column by default
    pub fn generate_count(&self, column: Option<&str>) -> Result<Statement> {
        let criteria = self.read_criteria()?;
        let mut params = ParameterList::new();

        let column = match column {
            Some(name) => self.map.resolve_column(name)?,
            None => self.map.identifier_column(),
        };

        let mut sql = format!(
            "SELECT COUNT({}) FROM {}",
            self.dialect.qualify(&self.source, column),
            self.dialect.quote(&self.source)
        );
        sql.push_str(&self.join_sql(&criteria));
        sql.push_str(&criteria::where_clause(&criteria, &self.source, self.dialect, &mut params)?);

        Ok(Statement::with_params(sql, params))
    }

    /// `INSERT INTO ... SELECT` binding every writable property of `entity`.
    ///
    /// With `insert_id` the identifier is written too and the statement is
    /// wrapped in the dialect's identity override; otherwise the generated
    /// key is read back in the same batch where the dialect needs it.
    pub fn generate_insert(&self, entity: &T, insert_id: bool) -> Result<Statement> {
        let bindings = self.map.projection(Direction::Write, insert_id);
        let mut params = ParameterList::new();

        let mut sql = if bindings.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.dialect.quote(&self.table))
        } else {
            let mut columns = Vec::with_capacity(bindings.len());
            let mut values = Vec::with_capacity(bindings.len());
            for binding in &bindings {
                let position = params.push(binding.parameter, binding.property.write_value(entity))?;
                columns.push(self.dialect.quote(binding.column));
                values.push(self.dialect.placeholder(binding.parameter, position));
            }
            format!(
                "INSERT INTO {} ({}) SELECT {}",
                self.dialect.quote(&self.table),
                columns.join(", "),
                values.join(", ")
            )
        };

        if insert_id {
            sql = self.dialect.identity_insert(&self.table, &sql);
        } else if let Some(last_id) = self.dialect.last_insert_id_sql() {
            sql = format!("{}; {}", sql, last_id);
        }

        Ok(Statement::with_params(sql, params))
    }

    /// `UPDATE ... WHERE <id> = @id` over `columns`.
    ///
    /// Fails with [`OrmError::MissingIdentifier`] when no property maps to the
    /// identifier column, and with [`OrmError::Query`] when the column set
    /// leaves nothing to write.
    pub fn generate_update(&self, entity: &T, columns: &ColumnSet) -> Result<Statement> {
        let id = self.map.id_property().ok_or_else(|| OrmError::MissingIdentifier {
            table: self.table.clone(),
            column: self.map.identifier_column().to_string(),
        })?;

        let bindings = self.map.bindings(Direction::Write, false, columns);
        if bindings.is_empty() {
            return Err(OrmError::Query(format!("UPDATE of {} has no columns to set", self.table)));
        }

        let mut params = ParameterList::new();
        let mut sets = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            let position = params.push(binding.parameter, binding.property.write_value(entity))?;
            sets.push(format!(
                "{} = {}",
                self.dialect.quote(binding.column),
                self.dialect.placeholder(binding.parameter, position)
            ));
        }

        let mut criteria = vec![Criterion::new(id.descriptor().column(), id.value(entity))];
        criteria::assign_parameter_names(&mut criteria);

        let mut sql = format!("UPDATE {} SET {}", self.dialect.quote(&self.table), sets.join(", "));
        sql.push_str(&criteria::where_clause(&criteria, &self.table, self.dialect, &mut params)?);

        Ok(Statement::with_params(sql, params))
    }

    /// `DELETE` over the current criteria; empty when there are none
    pub fn generate_delete(&self) -> Result<Statement> {
        if self.criteria.is_empty() {
            return Ok(Statement::empty());
        }

        let mut criteria = self.criteria.clone();
        self.resolve_columns(&mut criteria)?;
        criteria::assign_parameter_names(&mut criteria);

        let mut params = ParameterList::new();
        let mut sql = format!("DELETE FROM {}", self.dialect.quote(&self.table));
        sql.push_str(&criteria::where_clause(&criteria, &self.table, self.dialect, &mut params)?);

        Ok(Statement::with_params(sql, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::SearchType;
    use crate::entity::Entity;
    use crate::testing::Customer;
    use serde_json::json;

    fn customer() -> Customer {
        Customer {
            id: 12,
            company_name: "Acme".to_string(),
            post_code: "LS1 4AP".to_string(),
            city: "Leeds".to_string(),
            tags: vec!["trade".to_string(), "north".to_string()],
            ..Customer::default()
        }
    }

    #[test]
    fn test_select_projection_and_soft_delete() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::SqlServer).generate_select().unwrap();

        assert!(statement.sql.starts_with("SELECT [Customer].[Id], [Customer].[CompanyName], [Customer].[PostalCode]"));
        assert!(statement
            .sql
            .contains("COALESCE([Customer].[Nickname], 'none') AS [Nickname]"));
        assert!(statement.sql.contains(
            "CASE WHEN ([Customer].[OrderCount] > 10) THEN CAST(1 AS bit) ELSE CAST(0 AS bit) END AS [Frequent]"
        ));
        assert!(statement.sql.ends_with(" FROM [Customer] WHERE [Customer].[Deleted] = @Deleted"));
        assert_eq!(statement.params[0].value, json!(false));
    }

    #[test]
    fn test_ignoring_deleted_drops_filter() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .ignoring_deleted()
            .generate_count(None)
            .unwrap();

        assert_eq!(statement.sql, "SELECT COUNT([Customer].[Id]) FROM [Customer]");
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_select_top_per_dialect() {
        let map = Customer::mapping();
        let criterion = Criterion::new("City", "Leeds");

        let mssql = SqlGenerator::new(&map, Dialect::SqlServer)
            .criterion(criterion.clone())
            .order_by(OrderBy::desc("EditedOn"))
            .generate_select_columns(Some(1), Some(&["Id"]))
            .unwrap();
        assert_eq!(
            mssql.sql,
            "SELECT TOP (1) [Customer].[Id] FROM [Customer] WHERE [Customer].[Deleted] = @Deleted AND [Customer].[City] = @City ORDER BY [Customer].[EditedOn] DESC"
        );

        let sqlite = SqlGenerator::new(&map, Dialect::Sqlite)
            .criterion(criterion)
            .generate_select_columns(Some(1), Some(&["Id"]))
            .unwrap();
        assert_eq!(
            sqlite.sql,
            "SELECT [Customer].[Id] FROM [Customer] WHERE [Customer].[Deleted] = ?1 AND [Customer].[City] = ?2 LIMIT 1"
        );
    }

    #[test]
    fn test_select_unknown_column() {
        let map = Customer::mapping();
        let result = SqlGenerator::new(&map, Dialect::SqlServer).generate_select_columns(None, Some(&["Missing"]));
        assert!(matches!(result, Err(OrmError::UnknownColumn(_))));
    }

    #[test]
    fn test_repeated_column_criteria() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .ignoring_deleted()
            .criterion(Criterion::new("Status", "Active"))
            .criterion(Criterion::new("Status", "Suspended").or())
            .criterion(Criterion::new("Status", "Closed").or())
            .generate_count(None)
            .unwrap();

        let names: Vec<_> = statement.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Status", "Status1", "Status2"]);
        assert!(statement.sql.ends_with("OR [Customer].[Status] = @Status2"));
    }

    #[test]
    fn test_insert_sql_server() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .generate_insert(&customer(), false)
            .unwrap();

        assert!(statement.sql.starts_with("INSERT INTO [Customer] ([CompanyName], [PostalCode]"));
        assert!(statement.sql.contains(" SELECT @CompanyName, @PostalCode"));
        assert!(statement.sql.ends_with("; SELECT SCOPE_IDENTITY()"));
        assert!(!statement.params.iter().any(|p| p.name == "Id"));
        assert!(!statement.params.iter().any(|p| p.name == "Frequent"));

        let tags = statement.params.iter().find(|p| p.name == "Tags").unwrap();
        assert_eq!(tags.value, json!("trade;north"));
    }

    #[test]
    fn test_insert_with_identity() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .generate_insert(&customer(), true)
            .unwrap();

        assert!(statement.sql.starts_with("SET IDENTITY_INSERT [Customer] ON; INSERT INTO [Customer] ([Id], "));
        assert!(statement.sql.ends_with("; SET IDENTITY_INSERT [Customer] OFF;"));
        assert_eq!(statement.params[0].value, json!(12));
    }

    #[test]
    fn test_insert_sqlite_positions() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::Sqlite)
            .generate_insert(&customer(), false)
            .unwrap();

        assert!(statement.sql.contains(" SELECT ?1, ?2, ?3"));
        assert!(!statement.sql.contains("SCOPE_IDENTITY"));
    }

    #[test]
    fn test_update_all_and_restricted() {
        let map = Customer::mapping();
        let generator = SqlGenerator::new(&map, Dialect::SqlServer);

        let full = generator.generate_update(&customer(), &ColumnSet::All).unwrap();
        assert!(full.sql.starts_with("UPDATE [Customer] SET [CompanyName] = @CompanyName, "));
        assert!(full.sql.ends_with(" WHERE [Customer].[Id] = @Id"));
        assert_eq!(full.params.last().unwrap().value, json!(12));

        let partial = generator
            .generate_update(&customer(), &ColumnSet::Only(vec!["City".to_string()]))
            .unwrap();
        assert_eq!(
            partial.sql,
            "UPDATE [Customer] SET [City] = @City WHERE [Customer].[Id] = @Id"
        );
    }

    #[test]
    fn test_update_rejects_empty_column_set() {
        let map = Customer::mapping();
        let result = SqlGenerator::new(&map, Dialect::SqlServer).generate_update(&customer(), &ColumnSet::Only(Vec::new()));
        assert!(matches!(result, Err(OrmError::Query(_))));
    }

    #[test]
    fn test_update_requires_identifier() {
        let map = Customer::mapping().id_column("CustomerId");
        let result = SqlGenerator::new(&map, Dialect::SqlServer).generate_update(&customer(), &ColumnSet::All);
        assert!(matches!(result, Err(OrmError::MissingIdentifier { .. })));
    }

    #[test]
    fn test_delete() {
        let map = Customer::mapping();
        let empty = SqlGenerator::new(&map, Dialect::SqlServer).generate_delete().unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.sql, "");

        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .criterion(Criterion::new("Id", json!([1, 2])).search_type(SearchType::In))
            .generate_delete()
            .unwrap();
        assert_eq!(statement.sql, "DELETE FROM [Customer] WHERE [Customer].[Id] IN (@Id_0, @Id_1)");
    }

    #[test]
    fn test_delete_with_empty_in_list() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .criterion(Criterion::new("Id", json!([])).search_type(SearchType::In))
            .generate_delete()
            .unwrap();
        assert_eq!(statement.sql, "DELETE FROM [Customer] WHERE 1 = 0");
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_paginated() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .ignoring_deleted()
            .order_by(OrderBy::asc("CompanyName"))
            .generate_paginated(11, 10)
            .unwrap();

        assert!(statement.sql.starts_with(
            "WITH [pagination] AS (SELECT ROW_NUMBER() OVER (ORDER BY [Customer].[CompanyName] ASC) AS [rowNo], [Customer].[Id]"
        ));
        assert!(statement.sql.ends_with(
            "SELECT *, (SELECT COUNT([rowNo]) FROM [pagination]) AS [totalResults] FROM [pagination] WHERE [rowNo] BETWEEN 11 AND 20 ORDER BY [rowNo]"
        ));

        let unbounded = SqlGenerator::new(&map, Dialect::SqlServer).generate_paginated(1, 0).unwrap();
        assert!(!unbounded.sql.contains("BETWEEN"));
        assert!(unbounded.sql.contains("OVER (ORDER BY [Customer].[Id] ASC)"));
    }

    #[test]
    fn test_paginated_last_row_past_u32() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .ignoring_deleted()
            .generate_paginated(u32::MAX, 10)
            .unwrap();
        assert!(statement.sql.contains("BETWEEN 4294967295 AND 4294967304"));
    }

    #[test]
    fn test_criteria_resolve_property_names() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .ignoring_deleted()
            .criterion(Criterion::new("PostCode", "LS1 4AP"))
            .generate_count(None)
            .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT COUNT([Customer].[Id]) FROM [Customer] WHERE [Customer].[PostalCode] = @PostalCode"
        );

        let unknown = SqlGenerator::new(&map, Dialect::SqlServer)
            .criterion(Criterion::new("City", "Leeds").child(Criterion::new("Planet", "Mars").or()))
            .generate_select();
        assert!(matches!(unknown, Err(OrmError::UnknownColumn(c)) if c == "Planet"));

        let delete = SqlGenerator::new(&map, Dialect::SqlServer)
            .criterion(Criterion::new("Planet", "Mars"))
            .generate_delete();
        assert!(matches!(delete, Err(OrmError::UnknownColumn(_))));
    }

    #[test]
    fn test_group_by() {
        let map = Customer::mapping();
        let statement = SqlGenerator::new(&map, Dialect::Sqlite)
            .ignoring_deleted()
            .group_by("City")
            .order_by(OrderBy::asc("City"))
            .generate_select_columns(None, Some(&["City"]))
            .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT [Customer].[City] FROM [Customer] GROUP BY [Customer].[City] ORDER BY [Customer].[City] ASC"
        );

        let unknown = SqlGenerator::new(&map, Dialect::Sqlite).group_by("Planet").generate_select();
        assert!(matches!(unknown, Err(OrmError::UnknownColumn(_))));
    }

    #[test]
    fn test_criteria_joins_are_deduplicated() {
        let map = Customer::mapping();
        let join = Join::inner("Customer", "Address").on("AddressId", "Id");
        let statement = SqlGenerator::new(&map, Dialect::SqlServer)
            .ignoring_deleted()
            .join(join.clone())
            .criterion(Criterion::new("Country", "UK").table("Address").join(join))
            .generate_count(None)
            .unwrap();

        assert_eq!(
            statement.sql,
            "SELECT COUNT([Customer].[Id]) FROM [Customer] INNER JOIN [Address] ON [Customer].[AddressId] = [Address].[Id] WHERE [Address].[Country] = @Country"
        );
    }
}
