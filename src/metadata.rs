//! Property descriptors and the per-entity mapping table.
//!
//! An [`EntityMap`] lists every persisted property of an entity type together
//! with a [`PropertyDescriptor`] and a pair of accessors. The generator reads
//! column and parameter projections from it, the controller uses it to bind
//! parameters on save and to map rows back into entities on load.

use crate::backend::QueryRow;
use crate::convert;
use crate::error::{OrmError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Storage kind of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Integer,
    Real,
    Text,
    Boolean,
    DateTime,
}

/// Which way values flow through a projection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Loading rows into entities
    Read,
    /// Saving entities into rows
    Write,
}

/// Columns an UPDATE should touch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSet {
    All,
    /// Property names
    Only(Vec<String>),
}

impl ColumnSet {
    fn includes(&self, property: &str) -> bool {
        match self {
            ColumnSet::All => true,
            ColumnSet::Only(names) => names.iter().any(|n| n == property),
        }
    }
}

/// Per-property persistence settings
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
    /// Include when loading
    pub read: bool,
    /// Include when saving
    pub write: bool,
    pub column_name: Option<&'static str>,
    /// Table the column is read from when it differs from the selected table
    pub table_name: Option<&'static str>,
    pub parameter_name: Option<&'static str>,
    /// Multi-value text column separator
    pub split_delimiter: Option<char>,
    /// Variant names of an enum-typed property
    pub enum_variants: Option<&'static [&'static str]>,
    /// SQL expression substituted for NULL on read
    pub coalesce: Option<&'static str>,
    /// Derived boolean: (source column, condition expression)
    pub create_bool: Option<(&'static str, &'static str)>,
    pub auditable: bool,
    /// Column type override used when generating DDL
    pub sql_type: Option<&'static str>,
}

impl PropertyDescriptor {
    pub fn new(name: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            kind,
            read: true,
            write: true,
            column_name: None,
            table_name: None,
            parameter_name: None,
            split_delimiter: None,
            enum_variants: None,
            coalesce: None,
            create_bool: None,
            auditable: true,
            sql_type: None,
        }
    }

    /// Column name, falling back to the property name
    pub fn column(&self) -> &'static str {
        self.column_name.unwrap_or(self.name)
    }

    /// Parameter name, falling back to the column name
    pub fn parameter(&self) -> &'static str {
        self.parameter_name.unwrap_or_else(|| self.column())
    }

    /// Whether the value is computed by the select rather than stored
    pub fn is_derived(&self) -> bool {
        self.create_bool.is_some()
    }
}

type Getter<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// A descriptor plus the accessors that move values in and out of `T`
pub struct Property<T> {
    descriptor: PropertyDescriptor,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T: 'static> Property<T> {
    /// Build a property from explicit accessor functions
    pub fn new<G, S>(name: &'static str, kind: PropertyKind, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            descriptor: PropertyDescriptor::new(name, kind),
            get: Box::new(get),
            set: Box::new(set),
        }
    }

    /// Build a property over a struct field that serde can convert
    pub fn field<F>(
        name: &'static str,
        kind: PropertyKind,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self
    where
        F: Serialize + DeserializeOwned + 'static,
    {
        Self::new(
            name,
            kind,
            move |entity| serde_json::to_value(get(entity)).unwrap_or(Value::Null),
            move |entity, value| {
                *get_mut(entity) = serde_json::from_value(value)?;
                Ok(())
            },
        )
    }

    pub fn column(mut self, column: &'static str) -> Self {
        self.descriptor.column_name = Some(column);
        self
    }

    pub fn on_table(mut self, table: &'static str) -> Self {
        self.descriptor.table_name = Some(table);
        self
    }

    pub fn parameter(mut self, parameter: &'static str) -> Self {
        self.descriptor.parameter_name = Some(parameter.trim_start_matches('@'));
        self
    }

    pub fn read(mut self, read: bool) -> Self {
        self.descriptor.read = read;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.descriptor.write = write;
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.descriptor.split_delimiter = Some(delimiter);
        self
    }

    pub fn enumeration(mut self, variants: &'static [&'static str]) -> Self {
        self.descriptor.enum_variants = Some(variants);
        self
    }

    pub fn coalesce(mut self, replacement: &'static str) -> Self {
        self.descriptor.coalesce = Some(replacement);
        self
    }

    /// Read the property as `CASE WHEN (<column> <condition>)`; implies write(false)
    pub fn create_bool(mut self, column: &'static str, condition: &'static str) -> Self {
        self.descriptor.create_bool = Some((column, condition));
        self.descriptor.write = false;
        self
    }

    pub fn auditable(mut self, auditable: bool) -> Self {
        self.descriptor.auditable = auditable;
        self
    }

    pub fn sql_type(mut self, sql_type: &'static str) -> Self {
        self.descriptor.sql_type = Some(sql_type);
        self
    }
}

impl<T> Property<T> {
    pub fn descriptor(&self) -> &PropertyDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Raw accessor value
    pub fn value(&self, entity: &T) -> Value {
        (self.get)(entity)
    }

    /// Value as bound to a parameter on save
    pub fn write_value(&self, entity: &T) -> Value {
        let value = self.value(entity);
        match self.descriptor.split_delimiter {
            Some(delimiter) => convert::join_delimited(value, delimiter),
            None => value,
        }
    }

    /// Coerce a column value into the shape the setter expects.
    ///
    /// An enum name that matches no declared variant is a hard failure.
    pub fn read_value(&self, raw: Value) -> Result<Value> {
        let d = &self.descriptor;

        let mut value = match raw {
            Value::Null if d.kind == PropertyKind::DateTime => convert::date_value(convert::min_date()),
            other => other,
        };

        if let Some(delimiter) = d.split_delimiter {
            value = convert::split_delimited(value, delimiter);
        }

        if let (Some(variants), Value::String(name)) = (d.enum_variants, &value) {
            let variant = convert::enum_variant(name, variants).ok_or_else(|| OrmError::InvalidEnumValue {
                property: d.name.to_string(),
                value: name.clone(),
            })?;
            value = Value::String(variant.to_string());
        }

        if d.kind == PropertyKind::Boolean {
            if let Some(n) = convert::as_i64(&value).filter(|_| !value.is_boolean()) {
                value = Value::Bool(n != 0);
            }
        }

        Ok(value)
    }

    /// Coerce and store a column value.
    ///
    /// A setter that rejects the value is skipped: mapping is best effort, and
    /// the property keeps its default.
    pub fn apply(&self, entity: &mut T, raw: Value) -> Result<()> {
        let value = self.read_value(raw)?;
        if let Err(err) = (self.set)(entity, value) {
            debug!(property = self.descriptor.name, error = %err, "skipping property the setter rejected");
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property").field("descriptor", &self.descriptor).finish()
    }
}

/// One entry of a column projection
#[derive(Debug)]
pub struct Binding<'a, T> {
    pub column: &'static str,
    pub parameter: &'static str,
    pub property: &'a Property<T>,
}

/// The mapping table of an entity type
pub struct EntityMap<T> {
    table: &'static str,
    id_column: &'static str,
    soft_delete_column: Option<&'static str>,
    properties: Vec<Property<T>>,
}

impl<T: 'static> EntityMap<T> {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            id_column: "Id",
            soft_delete_column: None,
            properties: Vec::new(),
        }
    }

    pub fn id_column(mut self, column: &'static str) -> Self {
        self.id_column = column;
        self
    }

    /// Declare the flag column excluded from reads by default
    pub fn soft_delete(mut self, column: &'static str) -> Self {
        self.soft_delete_column = Some(column);
        self
    }

    pub fn property(mut self, property: Property<T>) -> Self {
        self.properties.push(property);
        self
    }
}

impl<T> EntityMap<T> {
    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn identifier_column(&self) -> &'static str {
        self.id_column
    }

    pub fn soft_delete_column(&self) -> Option<&'static str> {
        self.soft_delete_column
    }

    pub fn properties(&self) -> &[Property<T>] {
        &self.properties
    }

    pub fn get(&self, name: &str) -> Option<&Property<T>> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Find a property by its column name, ignoring case
    pub fn by_column(&self, column: &str) -> Option<&Property<T>> {
        self.properties
            .iter()
            .find(|p| p.descriptor().column().eq_ignore_ascii_case(column))
    }

    /// Resolve a property or column name to the registered column name
    pub fn resolve_column(&self, name: &str) -> Result<&'static str> {
        self.get(name)
            .or_else(|| self.by_column(name))
            .map(|p| p.descriptor().column())
            .ok_or_else(|| OrmError::UnknownColumn(name.to_string()))
    }

    pub fn id_property(&self) -> Option<&Property<T>> {
        self.by_column(self.id_column)
    }

    fn is_id(&self, property: &Property<T>) -> bool {
        property.descriptor().column().eq_ignore_ascii_case(self.id_column)
    }

    /// Ordered (column, parameter, property) projection.
    ///
    /// The identifier is left out of write projections unless `include_id`.
    pub fn projection(&self, direction: Direction, include_id: bool) -> Vec<Binding<'_, T>> {
        self.bindings(direction, include_id, &ColumnSet::All)
    }

    /// Write projection restricted to a column set
    pub fn bindings(&self, direction: Direction, include_id: bool, columns: &ColumnSet) -> Vec<Binding<'_, T>> {
        self.properties
            .iter()
            .filter(|p| {
                let d = p.descriptor();
                match direction {
                    Direction::Read => d.read,
                    Direction::Write => {
                        d.write && (include_id || !self.is_id(p)) && columns.includes(d.name)
                    }
                }
            })
            .map(|p| Binding {
                column: p.descriptor().column(),
                parameter: p.descriptor().parameter(),
                property: p,
            })
            .collect()
    }

    /// Map a row into a fresh entity
    pub fn from_row(&self, row: &QueryRow) -> Result<T>
    where
        T: Default,
    {
        let mut entity = T::default();
        for property in self.properties.iter().filter(|p| p.descriptor().read) {
            if let Some(raw) = row.columns.get(property.descriptor().column()) {
                property.apply(&mut entity, raw.clone())?;
            }
        }
        Ok(entity)
    }

    /// Names of the properties whose values differ between two instances
    pub fn changed_properties(&self, old: &T, new: &T) -> Vec<&'static str> {
        self.properties
            .iter()
            .filter(|p| p.value(old) != p.value(new))
            .map(|p| p.name())
            .collect()
    }
}

impl<T> fmt::Debug for EntityMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMap")
            .field("table", &self.table)
            .field("id_column", &self.id_column)
            .field("soft_delete_column", &self.soft_delete_column)
            .field("properties", &self.properties)
            .finish()
    }
}
