use crate::backend::DatabaseBackend;
use crate::controller::DataController;
use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::generator::Statement;
use crate::history::{History, HistoryColumn};
use crate::metadata::{EntityMap, PropertyDescriptor, PropertyKind};
use crate::operator;

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    /// Store-generated primary key
    pub identity: bool,
}

/// Index definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Table schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
}

/// Builds CREATE TABLE statements from entity mappings
pub struct SchemaGenerator {
    dialect: Dialect,
    tables: Vec<TableSchema>,
}

impl SchemaGenerator {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: Vec::new(),
        }
    }

    /// Column type for a property: its override, else the dialect's type for its kind
    pub fn column_type(&self, descriptor: &PropertyDescriptor) -> String {
        if let Some(sql_type) = descriptor.sql_type {
            return sql_type.to_string();
        }

        let sql_type = match (self.dialect, descriptor.kind) {
            (Dialect::Sqlite, PropertyKind::Integer) => "INTEGER",
            (Dialect::Sqlite, PropertyKind::Real) => "REAL",
            (Dialect::Sqlite, PropertyKind::Text) => "TEXT",
            (Dialect::Sqlite, PropertyKind::Boolean) => "BOOLEAN",
            (Dialect::Sqlite, PropertyKind::DateTime) => "DATETIME",
            (Dialect::SqlServer, PropertyKind::Integer) => "BIGINT",
            (Dialect::SqlServer, PropertyKind::Real) => "FLOAT",
            (Dialect::SqlServer, PropertyKind::Text) => "NVARCHAR(MAX)",
            (Dialect::SqlServer, PropertyKind::Boolean) => "BIT",
            (Dialect::SqlServer, PropertyKind::DateTime) => "DATETIME",
        };
        sql_type.to_string()
    }

    /// Table schema holding every stored property of `map`.
    ///
    /// Derived properties are computed on read and get no column.
    pub fn table_schema<T>(&self, table: &str, map: &EntityMap<T>) -> TableSchema {
        let id_column = map.identifier_column();

        let mut columns = vec![ColumnDef {
            name: id_column.to_string(),
            sql_type: self.column_type(&PropertyDescriptor::new(id_column, PropertyKind::Integer)),
            nullable: false,
            identity: true,
        }];

        for property in map.properties() {
            let d = property.descriptor();
            if !d.write || d.is_derived() || d.column().eq_ignore_ascii_case(id_column) {
                continue;
            }
            columns.push(ColumnDef {
                name: d.column().to_string(),
                sql_type: self.column_type(d),
                nullable: true,
                identity: false,
            });
        }

        TableSchema {
            name: table.to_string(),
            columns,
            indexes: Vec::new(),
        }
    }

    /// Register a table built from `map`
    pub fn register<T>(&mut self, table: &str, map: &EntityMap<T>) -> Result<&mut TableSchema> {
        if self.get_schema(table).is_some() {
            return Err(OrmError::Schema(format!("Table {} already registered", table)));
        }

        let schema = self.table_schema(table, map);
        self.tables.push(schema);
        let last = self.tables.len() - 1;
        Ok(&mut self.tables[last])
    }

    /// Register the tables a controller reads and writes: its own table, plus
    /// the history tables when the entity is auditable
    pub fn register_controller<T: Entity>(&mut self, controller: &DataController<T>) -> Result<()> {
        self.register(controller.table(), controller.mapping())?;

        if T::is_auditable() {
            let store = controller.history_store();

            let history = self.register(store.history_table(), &History::mapping())?;
            let index = format!("IX_{}_RecordId", history.name);
            history.indexes.push(IndexDef {
                name: index,
                columns: vec!["RecordId".to_string()],
                unique: false,
            });

            let columns = self.register(store.column_table(), &HistoryColumn::mapping())?;
            let index = format!("IX_{}_HistoryId", columns.name);
            columns.indexes.push(IndexDef {
                name: index,
                columns: vec!["HistoryId".to_string()],
                unique: false,
            });
        }

        Ok(())
    }

    pub fn get_schema(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// CREATE TABLE and CREATE INDEX statements for every registered table
    pub fn generate_ddl(&self) -> Vec<String> {
        let mut statements = Vec::new();
        for schema in &self.tables {
            statements.push(self.generate_table_ddl(schema));
            for index in &schema.indexes {
                statements.push(self.generate_index_ddl(&schema.name, index));
            }
        }
        statements
    }

    /// Generate CREATE TABLE SQL for a single table
    pub fn generate_table_ddl(&self, schema: &TableSchema) -> String {
        let column_defs: Vec<String> = schema
            .columns
            .iter()
            .map(|col| {
                let mut def = format!("{} {}", self.dialect.quote(&col.name), col.sql_type);
                if col.identity {
                    def.push_str(match self.dialect {
                        Dialect::Sqlite => " PRIMARY KEY AUTOINCREMENT",
                        Dialect::SqlServer => " IDENTITY(1,1) PRIMARY KEY",
                    });
                } else if !col.nullable {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();

        let table = self.dialect.quote(&schema.name);
        match self.dialect {
            Dialect::Sqlite => format!("CREATE TABLE IF NOT EXISTS {} ({})", table, column_defs.join(", ")),
            Dialect::SqlServer => format!(
                "IF OBJECT_ID(N'{}', N'U') IS NULL CREATE TABLE {} ({})",
                table,
                table,
                column_defs.join(", ")
            ),
        }
    }

    /// Generate CREATE INDEX SQL
    pub fn generate_index_ddl(&self, table_name: &str, index: &IndexDef) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let columns = index
            .columns
            .iter()
            .map(|c| self.dialect.quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        let exists = match self.dialect {
            Dialect::Sqlite => "IF NOT EXISTS ",
            Dialect::SqlServer => "",
        };
        format!(
            "CREATE {}INDEX {}{} ON {} ({})",
            unique,
            exists,
            self.dialect.quote(&index.name),
            self.dialect.quote(table_name),
            columns
        )
    }

    /// Run the generated DDL
    pub async fn apply<B: DatabaseBackend>(&self, db: &mut B) -> Result<()> {
        for sql in self.generate_ddl() {
            operator::execute(db, &Statement::new(sql)).await?;
        }
        Ok(())
    }
}
