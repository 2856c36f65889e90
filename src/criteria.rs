use crate::dialect::Dialect;
use crate::error::{OrmError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Comparison applied by a criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
    NotLike,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    In,
    NotIn,
}

impl SearchType {
    fn binds_value(&self) -> bool {
        !matches!(self, SearchType::IsNull | SearchType::IsNotNull)
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchType::Equals => write!(f, "="),
            SearchType::NotEquals => write!(f, "<>"),
            SearchType::LessThan => write!(f, "<"),
            SearchType::LessThanOrEqual => write!(f, "<="),
            SearchType::GreaterThan => write!(f, ">"),
            SearchType::GreaterThanOrEqual => write!(f, ">="),
            SearchType::Like | SearchType::Contains | SearchType::StartsWith | SearchType::EndsWith => {
                write!(f, "LIKE")
            }
            SearchType::NotLike => write!(f, "NOT LIKE"),
            SearchType::IsNull => write!(f, "IS NULL"),
            SearchType::IsNotNull => write!(f, "IS NOT NULL"),
            SearchType::In => write!(f, "IN"),
            SearchType::NotIn => write!(f, "NOT IN"),
        }
    }
}

/// Connector placed before a criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "AND"),
            LogicalOp::Or => write!(f, "OR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
            JoinType::Right => write!(f, "RIGHT JOIN"),
            JoinType::Full => write!(f, "FULL JOIN"),
        }
    }
}

/// Column pair matched by a join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumn {
    pub first: String,
    pub second: String,
}

/// JOIN clause between two tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub join_type: JoinType,
    pub first_table: String,
    pub second_table: String,
    pub columns: Vec<JoinColumn>,
}

impl Join {
    pub fn new(join_type: JoinType, first_table: impl Into<String>, second_table: impl Into<String>) -> Self {
        Self {
            join_type,
            first_table: first_table.into(),
            second_table: second_table.into(),
            columns: Vec::new(),
        }
    }

    pub fn inner(first_table: impl Into<String>, second_table: impl Into<String>) -> Self {
        Self::new(JoinType::Inner, first_table, second_table)
    }

    pub fn left(first_table: impl Into<String>, second_table: impl Into<String>) -> Self {
        Self::new(JoinType::Left, first_table, second_table)
    }

    /// Match `first_table.first` against `second_table.second`
    pub fn on(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.columns.push(JoinColumn {
            first: first.into(),
            second: second.into(),
        });
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let conditions = self
            .columns
            .iter()
            .map(|c| {
                format!(
                    "{} = {}",
                    dialect.qualify(&self.first_table, &c.first),
                    dialect.qualify(&self.second_table, &c.second)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");

        format!("{} {} ON {}", self.join_type, dialect.quote(&self.second_table), conditions)
    }
}

/// Named value bound to a statement
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

/// Ordered parameters of one statement; names are unique
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterList {
    params: Vec<Parameter>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter and return its 1-based position
    pub fn push(&mut self, name: impl Into<String>, value: Value) -> Result<usize> {
        let name = name.into();
        if self.params.iter().any(|p| p.name == name) {
            return Err(OrmError::ParameterExists(name));
        }
        self.params.push(Parameter { name, value });
        Ok(self.params.len())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn into_vec(self) -> Vec<Parameter> {
        self.params
    }
}

/// A predicate in a WHERE clause.
///
/// Children render as a parenthesized group joined by their own connectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub column: String,
    pub search_type: SearchType,
    pub value: Value,
    pub table: Option<String>,
    pub connector: LogicalOp,
    pub children: Vec<Criterion>,
    pub joins: Vec<Join>,
    parameter_name: Option<String>,
    /// Per-element names of an IN list
    element_names: Vec<String>,
}

impl Criterion {
    /// Equality criterion on `column`
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            search_type: SearchType::Equals,
            value: value.into(),
            table: None,
            connector: LogicalOp::And,
            children: Vec::new(),
            joins: Vec::new(),
            parameter_name: None,
            element_names: Vec::new(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, Value::Null).search_type(SearchType::IsNull)
    }

    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Connect to the preceding criterion with OR
    pub fn or(mut self) -> Self {
        self.connector = LogicalOp::Or;
        self
    }

    pub fn child(mut self, child: Criterion) -> Self {
        self.children.push(child);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Parameter name assigned by [`assign_parameter_names`], else the column
    pub fn parameter_name(&self) -> &str {
        self.parameter_name.as_deref().unwrap_or(&self.column)
    }

    /// Value as bound to the statement, with LIKE wildcards applied
    pub fn parameter_value(&self) -> Value {
        let wrap = |prefix: &str, suffix: &str| match &self.value {
            Value::String(s) => Value::String(format!("{}{}{}", prefix, s, suffix)),
            other => other.clone(),
        };

        match self.search_type {
            SearchType::Contains => wrap("%", "%"),
            SearchType::StartsWith => wrap("", "%"),
            SearchType::EndsWith => wrap("%", ""),
            _ => self.value.clone(),
        }
    }

    /// Render this criterion and its children, registering bound values.
    ///
    /// `needs_operator` prefixes the connector; `table` qualifies the column
    /// when the criterion names no table of its own.
    pub fn to_sql(
        &self,
        needs_operator: bool,
        table: &str,
        dialect: Dialect,
        params: &mut ParameterList,
    ) -> Result<String> {
        let mut sql = String::new();
        if needs_operator {
            sql.push_str(&format!(" {} ", self.connector));
        }

        let own = self.predicate(table, dialect, params)?;
        if self.children.is_empty() {
            sql.push_str(&own);
            return Ok(sql);
        }

        sql.push('(');
        sql.push_str(&own);
        for child in &self.children {
            sql.push_str(&child.to_sql(true, table, dialect, params)?);
        }
        sql.push(')');
        Ok(sql)
    }

    fn predicate(&self, table: &str, dialect: Dialect, params: &mut ParameterList) -> Result<String> {
        let column = dialect.qualify(self.table.as_deref().unwrap_or(table), &self.column);

        if !self.search_type.binds_value() {
            return Ok(format!("{} {}", column, self.search_type));
        }

        if matches!(self.search_type, SearchType::In | SearchType::NotIn) {
            let items = match &self.value {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            if items.is_empty() {
                // matches nothing, or everything when negated
                let constant = match self.search_type {
                    SearchType::NotIn => "1 = 1",
                    _ => "1 = 0",
                };
                return Ok(constant.to_string());
            }

            let mut placeholders = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let name = self
                    .element_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("{}_{}", self.parameter_name(), i));
                let position = params.push(name.clone(), item)?;
                placeholders.push(dialect.placeholder(&name, position));
            }
            return Ok(format!("{} {} ({})", column, self.search_type, placeholders.join(", ")));
        }

        let position = params.push(self.parameter_name(), self.parameter_value())?;
        Ok(format!(
            "{} {} {}",
            column,
            self.search_type,
            dialect.placeholder(self.parameter_name(), position)
        ))
    }
}

/// Give every criterion in the tree a statement-unique parameter name.
///
/// The first criterion on a column keeps the column name, later ones get
/// `column1`, `column2` and so on, children included. IN list elements are
/// named `name_0`, `name_1` from the same pool, so they never collide with a
/// column that happens to carry such a name.
pub fn assign_parameter_names(criteria: &mut [Criterion]) {
    let mut taken: HashMap<String, usize> = HashMap::new();
    assign_with(&mut taken, criteria);
}

fn assign_with(taken: &mut HashMap<String, usize>, criteria: &mut [Criterion]) {
    for criterion in criteria.iter_mut() {
        let name = claim(taken, &criterion.column);

        criterion.element_names = match (&criterion.search_type, &criterion.value) {
            (SearchType::In | SearchType::NotIn, Value::Array(items)) => (0..items.len())
                .map(|i| claim(taken, &format!("{}_{}", name, i)))
                .collect(),
            (SearchType::In | SearchType::NotIn, _) => vec![claim(taken, &format!("{}_0", name))],
            _ => Vec::new(),
        };
        criterion.parameter_name = Some(name);

        if !criterion.children.is_empty() {
            assign_with(taken, &mut criterion.children);
        }
    }
}

/// `base` if unused, else `base` followed by the next free counter
fn claim(taken: &mut HashMap<String, usize>, base: &str) -> String {
    let Some(&last) = taken.get(base) else {
        taken.insert(base.to_string(), 0);
        return base.to_string();
    };

    let mut count = last;
    loop {
        count += 1;
        let candidate = format!("{}{}", base, count);
        if !taken.contains_key(&candidate) {
            taken.insert(base.to_string(), count);
            taken.insert(candidate.clone(), 0);
            return candidate;
        }
    }
}

/// Render ` WHERE ...`, or nothing when there are no criteria
pub fn where_clause(
    criteria: &[Criterion],
    table: &str,
    dialect: Dialect,
    params: &mut ParameterList,
) -> Result<String> {
    if criteria.is_empty() {
        return Ok(String::new());
    }

    let mut sql = String::from(" WHERE ");
    for (i, criterion) in criteria.iter().enumerate() {
        sql.push_str(&criterion.to_sql(i > 0, table, dialect, params)?);
    }
    Ok(sql)
}

/// Joins declared on criteria (children included) merged after `base`,
/// dropping duplicates
pub fn collect_joins(base: &[Join], criteria: &[Criterion]) -> Vec<Join> {
    let mut joins = Vec::new();
    for join in base {
        push_unique(&mut joins, join);
    }
    collect_into(&mut joins, criteria);
    joins
}

fn collect_into(joins: &mut Vec<Join>, criteria: &[Criterion]) {
    for criterion in criteria {
        for join in &criterion.joins {
            push_unique(joins, join);
        }
        collect_into(joins, &criterion.children);
    }
}

fn push_unique(joins: &mut Vec<Join>, join: &Join) {
    if !joins.contains(join) {
        joins.push(join.clone());
    }
}
