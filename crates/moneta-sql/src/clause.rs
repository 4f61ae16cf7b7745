//! Clause builders composed from expression nodes.
//!
//! Each clause renders against its own [`KeyManager`] and yields a
//! `(text, params)` fragment; the owning statement merges the fragment
//! through its manager so nested builders contribute parameters without
//! key clashes.

use moneta_core::dialect::Dialect;
use moneta_core::error::{Error, Result};
use moneta_core::flags::ColumnFlags;
use moneta_core::params::SqlParams;
use moneta_core::types::{AttrExtra, AttrType};
use moneta_core::value::Value;

use crate::expr::Expr;
use crate::keys::KeyManager;

/// A rendered clause fragment: parameterized text plus its bindings.
pub type Fragment = (String, SqlParams);

/// SQL join operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinOperator {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `FULL OUTER JOIN`
    #[default]
    Full,
}

impl JoinOperator {
    fn sql(self) -> &'static str {
        match self {
            JoinOperator::Inner => "INNER JOIN",
            JoinOperator::Left => "LEFT JOIN",
            JoinOperator::Right => "RIGHT JOIN",
            JoinOperator::Full => "FULL OUTER JOIN",
        }
    }
}

/// The FROM clause, with chained joins.
#[derive(Debug, Clone)]
pub struct From {
    table: String,
    joins: Vec<(JoinOperator, String, Option<Expr>)>,
}

impl From {
    /// FROM the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            joins: Vec::new(),
        }
    }

    /// Add a join to another table, optionally constrained by a predicate.
    pub fn join(&mut self, table: impl Into<String>, constraint: Option<Expr>, op: JoinOperator) {
        self.joins.push((op, table.into(), constraint));
    }

    /// Render the clause.
    pub fn clause_sql(&self) -> Result<Fragment> {
        let mut km = KeyManager::new();
        let mut sql = format!(" FROM {}", self.table);
        for (op, table, constraint) in &self.joins {
            sql.push_str(&format!(" {} {}", op.sql(), table));
            if let Some(predicate) = constraint {
                sql.push_str(&format!(" ON {}", predicate.render(&mut km)?));
            }
        }
        Ok((sql, km.into_params()))
    }
}

/// The WHERE clause.
#[derive(Debug, Clone)]
pub struct Where {
    condition: Expr,
}

impl Where {
    /// WHERE the given condition holds.
    pub fn new(condition: Expr) -> Self {
        Self { condition }
    }

    /// Render the clause.
    pub fn clause_sql(&self) -> Result<Fragment> {
        let mut km = KeyManager::new();
        let text = format!(" WHERE {}", self.condition.render(&mut km)?);
        Ok((text, km.into_params()))
    }
}

/// The GROUP BY clause.
#[derive(Debug, Clone)]
pub struct GroupBy {
    columns: Vec<String>,
}

impl GroupBy {
    /// GROUP BY the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Render the clause.
    pub fn clause_sql(&self) -> Result<Fragment> {
        if self.columns.is_empty() {
            return Err(Error::invalid_statement(
                "GROUP BY clause requires at least one column",
            ));
        }
        Ok((
            format!(" GROUP BY {}", self.columns.join(", ")),
            SqlParams::new(),
        ))
    }
}

/// The HAVING clause.
#[derive(Debug, Clone)]
pub struct Having {
    condition: Expr,
}

impl Having {
    /// HAVING the given condition holds.
    pub fn new(condition: Expr) -> Self {
        Self { condition }
    }

    /// Render the clause.
    pub fn clause_sql(&self) -> Result<Fragment> {
        let mut km = KeyManager::new();
        let text = format!(" HAVING {}", self.condition.render(&mut km)?);
        Ok((text, km.into_params()))
    }
}

/// The VALUES clause of an INSERT.
///
/// The first row's value names define the statement's column list; every
/// subsequent row must supply the same columns.
#[derive(Debug, Clone, Default)]
pub struct Values {
    rows: Vec<Vec<(String, Value)>>,
}

impl Values {
    /// Empty VALUES clause.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one row of (column, value) pairs.
    pub fn row(&mut self, row: Vec<(String, Value)>) {
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no row was added.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The parenthesized column-name list taken from the first row.
    pub fn names(&self) -> String {
        match self.rows.first() {
            Some(row) => format!(
                "({})",
                row.iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            None => String::new(),
        }
    }

    /// Render the clause.
    pub fn clause_sql(&self) -> Result<Fragment> {
        let mut km = KeyManager::new();
        let first_names: Vec<&str> = self
            .rows
            .first()
            .map(|row| row.iter().map(|(n, _)| n.as_str()).collect())
            .unwrap_or_default();

        let mut rendered_rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let names: Vec<&str> = row.iter().map(|(n, _)| n.as_str()).collect();
            if names != first_names {
                return Err(Error::invalid_statement(format!(
                    "INSERT row columns ({}) do not match the first row ({})",
                    names.join(", "),
                    first_names.join(", ")
                )));
            }
            let placeholders: Vec<String> = row
                .iter()
                .map(|(name, value)| format!(":{}", km.register(name, value)))
                .collect();
            rendered_rows.push(format!("({})", placeholders.join(", ")));
        }
        Ok((
            format!("VALUES {}", rendered_rows.join(", ")),
            km.into_params(),
        ))
    }
}

/// One assignment of the SET clause of an UPDATE.
#[derive(Debug, Clone)]
pub struct Assignment {
    columns: Vec<String>,
    value: Value,
}

impl Assignment {
    /// Assign `value` to the given column(s).
    pub fn new(columns: Vec<String>, value: Value) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::invalid_statement(
                "an assignment requires at least one column",
            ));
        }
        Ok(Self { columns, value })
    }

    /// Render the assignment.
    pub fn clause_sql(&self) -> Result<Fragment> {
        let mut km = KeyManager::new();
        let key = km.register(&self.columns[0], &self.value);
        let text = if self.columns.len() == 1 {
            format!("{} = :{}", self.columns[0], key)
        } else {
            format!("({}) = (:{})", self.columns.join(","), key)
        };
        Ok((text, km.into_params()))
    }
}

/// The definition of one column in a CREATE TABLE statement.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    name: String,
    attr_type: AttrType,
    flags: ColumnFlags,
    extra: AttrExtra,
}

impl ColumnDef {
    /// Describe a column.
    pub fn new(
        name: impl Into<String>,
        attr_type: AttrType,
        flags: ColumnFlags,
        extra: AttrExtra,
    ) -> Self {
        Self {
            name: name.into(),
            attr_type,
            flags,
            extra,
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the definition in the given dialect.
    pub fn render(&self, dialect: &dyn Dialect) -> Result<String> {
        let native_type = dialect.column_type(self.attr_type, &self.extra)?;
        let constraint = dialect.constraint_sql(self.flags, &self.extra)?;
        if constraint.is_empty() {
            Ok(format!("{} {}", self.name, native_type))
        } else {
            Ok(format!("{} {} {}", self.name, native_type, constraint))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_with_join() {
        let mut from = From::new("txns");
        from.join(
            "accounts",
            Some(Expr::col("txns.account_id").eq_expr(Expr::col("accounts.id"))),
            JoinOperator::Inner,
        );
        let (sql, params) = from.clause_sql().unwrap();
        assert_eq!(
            sql,
            " FROM txns INNER JOIN accounts ON (txns.account_id = accounts.id)"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_join_without_predicate() {
        let mut from = From::new("a");
        from.join("b", None, JoinOperator::Left);
        let (sql, _) = from.clause_sql().unwrap();
        assert_eq!(sql, " FROM a LEFT JOIN b");
    }

    #[test]
    fn test_where_carries_parameters() {
        let clause = Where::new(Expr::col("amount").gt(100));
        let (sql, params) = clause.clause_sql().unwrap();
        assert_eq!(sql, " WHERE (amount > :param)");
        assert_eq!(params.get("param"), Some(&Value::Int(100)));
    }

    #[test]
    fn test_group_by_requires_columns() {
        let err = GroupBy::new(vec![]).clause_sql().unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
        let (sql, _) = GroupBy::new(vec!["category".to_string()])
            .clause_sql()
            .unwrap();
        assert_eq!(sql, " GROUP BY category");
    }

    #[test]
    fn test_values_first_row_names_columns() {
        let mut values = Values::new();
        values.row(vec![
            ("name".to_string(), Value::Text("A".into())),
            ("age".to_string(), Value::Int(1)),
        ]);
        values.row(vec![
            ("name".to_string(), Value::Text("B".into())),
            ("age".to_string(), Value::Int(2)),
        ]);
        assert_eq!(values.names(), "(name, age)");
        let (sql, params) = values.clause_sql().unwrap();
        assert_eq!(sql, "VALUES (:name, :age), (:name1, :age2)");
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_values_rejects_mismatched_rows() {
        let mut values = Values::new();
        values.row(vec![("name".to_string(), Value::Text("A".into()))]);
        values.row(vec![("label".to_string(), Value::Text("B".into()))]);
        let err = values.clause_sql().unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
    }

    #[test]
    fn test_assignment_single_column() {
        let assignment = Assignment::new(vec!["amount".to_string()], Value::Int(12)).unwrap();
        let (sql, params) = assignment.clause_sql().unwrap();
        assert_eq!(sql, "amount = :amount");
        assert_eq!(params.get("amount"), Some(&Value::Int(12)));
    }

    #[test]
    fn test_assignment_requires_columns() {
        assert!(Assignment::new(vec![], Value::Null).is_err());
    }
}
