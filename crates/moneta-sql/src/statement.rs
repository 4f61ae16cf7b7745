//! Top-level statement builders.
//!
//! Statements assemble their clauses in a fixed, dialect-independent order
//! and produce a final [`Statement`]: parameterized query text plus its
//! named bindings. The dialect strategy of the active backend is threaded
//! through the [`Sql`] entry point; requesting a builder from it yields the
//! backend-flavored rendition without call-site branching.

use moneta_core::dialect::{Dialect, SqlTemplate};
use moneta_core::error::{Error, Result};
use moneta_core::flags::ColumnFlags;
use moneta_core::params::SqlParams;
use moneta_core::types::{AttrExtra, AttrType};
use moneta_core::value::Value;

use crate::clause::{Assignment, ColumnDef, From, GroupBy, Having, JoinOperator, Values, Where};
use crate::keys::KeyManager;

/// A fully built statement: `{query, params}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Parameterized query text (`:name` placeholders).
    pub query: String,
    /// Named parameter bindings.
    pub params: SqlParams,
}

/// Entry point binding the statement builders to one dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sql {
    dialect: &'static dyn Dialect,
}

impl Sql {
    /// Builders for the given dialect.
    pub fn new(dialect: &'static dyn Dialect) -> Self {
        Self { dialect }
    }

    /// The bound dialect.
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    /// Start a SELECT statement.
    pub fn select(&self) -> Select {
        Select::new(self.dialect)
    }

    /// Start an INSERT statement into `table`.
    pub fn insert(&self, table: impl Into<String>) -> Insert {
        Insert::new(self.dialect, table)
    }

    /// Start an UPDATE statement on `table`.
    pub fn update(&self, table: impl Into<String>) -> Update {
        Update::new(self.dialect, table)
    }

    /// Start a CREATE TABLE statement for `table`.
    pub fn create_table(&self, table: impl Into<String>) -> CreateTable {
        CreateTable::new(self.dialect, table)
    }

    /// Start a CREATE VIEW statement for `view`.
    pub fn create_view(&self, view: impl Into<String>) -> CreateView {
        CreateView::new(self.dialect, view)
    }

    /// A verbatim script with named parameters.
    pub fn script(&self, text: impl Into<String>, params: SqlParams) -> Script {
        Script::from_text(text, params)
    }

    /// A script built from one of the dialect's structural templates.
    pub fn script_template(&self, template: SqlTemplate, params: SqlParams) -> Result<Script> {
        let text = self.dialect.template(template).ok_or_else(|| {
            Error::invalid_statement(format!(
                "dialect '{}' has no {template:?} template",
                self.dialect.name()
            ))
        })?;
        Ok(Script::from_text(text, params))
    }
}

/// A SQL statement that executes a script verbatim.
///
/// Template text is whitespace-normalized; the supplied parameters are
/// merged through the key manager, so `:name` placeholders in the script
/// receive collision-free final keys.
#[derive(Debug, Clone)]
pub struct Script {
    query: String,
    params: SqlParams,
}

impl Script {
    fn from_text(text: impl Into<String>, params: SqlParams) -> Self {
        let normalized = text
            .into()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let mut km = KeyManager::new();
        let query = km.merge_params(&normalized, &params);
        Self {
            query,
            params: km.into_params(),
        }
    }

    /// Finish the statement.
    pub fn build(&self) -> Result<Statement> {
        Ok(Statement {
            query: self.query.clone(),
            params: self.params.clone(),
        })
    }
}

/// A SELECT statement.
#[derive(Debug, Clone)]
pub struct Select {
    dialect: &'static dyn Dialect,
    columns: Vec<String>,
    distinct: bool,
    from: Option<From>,
    where_clause: Option<Where>,
    group_by: Option<GroupBy>,
    having: Option<Having>,
}

impl Select {
    fn new(dialect: &'static dyn Dialect) -> Self {
        Self {
            dialect,
            columns: Vec::new(),
            distinct: false,
            from: None,
            where_clause: None,
            group_by: None,
            having: None,
        }
    }

    /// Select DISTINCT rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Remove the DISTINCT flag.
    pub fn all(mut self) -> Self {
        self.distinct = false;
        self
    }

    /// Set the column list. The default is `*`; any existing list is
    /// discarded.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Set the FROM clause. The statement will not build without one.
    pub fn from_(mut self, table: impl Into<String>) -> Self {
        self.from = Some(From::new(table));
        self
    }

    /// Add a join; the FROM clause must already be set.
    pub fn join(
        mut self,
        table: impl Into<String>,
        constraint: Option<crate::expr::Expr>,
        operator: JoinOperator,
    ) -> Result<Self> {
        match self.from.as_mut() {
            Some(from) => {
                from.join(table, constraint, operator);
                Ok(self)
            }
            None => Err(Error::invalid_statement(
                "SELECT statement must have a FROM clause before joining",
            )),
        }
    }

    /// Set the WHERE clause.
    pub fn where_(mut self, condition: crate::expr::Expr) -> Self {
        self.where_clause = Some(Where::new(condition));
        self
    }

    /// Set the GROUP BY clause.
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by = Some(GroupBy::new(
            columns.iter().map(|c| (*c).to_string()).collect(),
        ));
        self
    }

    /// Set the HAVING clause.
    pub fn having(mut self, condition: crate::expr::Expr) -> Self {
        self.having = Some(Having::new(condition));
        self
    }

    /// The dialect this builder renders for.
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    /// Finish the statement.
    pub fn build(&self) -> Result<Statement> {
        let mut km = KeyManager::new();
        let query = self.render(&mut km)?;
        Ok(Statement {
            query,
            params: km.into_params(),
        })
    }

    /// Render into an enclosing statement's key manager (used by
    /// CREATE TABLE AS SELECT and CREATE VIEW).
    fn render(&self, km: &mut KeyManager) -> Result<String> {
        let from = self.from.as_ref().ok_or_else(|| {
            Error::invalid_statement("SELECT statement must have a FROM clause")
        })?;

        let column_list = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut query = format!(
            "SELECT {}{}",
            if self.distinct { "DISTINCT " } else { "" },
            column_list
        );

        let (text, params) = from.clause_sql()?;
        query.push_str(&km.merge_params(&text, &params));
        if let Some(where_clause) = &self.where_clause {
            let (text, params) = where_clause.clause_sql()?;
            query.push_str(&km.merge_params(&text, &params));
        }
        if let Some(group_by) = &self.group_by {
            let (text, _) = group_by.clause_sql()?;
            query.push_str(&text);
        }
        if let Some(having) = &self.having {
            let (text, params) = having.clause_sql()?;
            query.push_str(&km.merge_params(&text, &params));
        }
        Ok(query)
    }
}

/// An INSERT statement.
///
/// Multiple rows may be inserted; the first row's column names become the
/// statement's column list and every subsequent row must supply the same
/// columns.
#[derive(Debug, Clone)]
pub struct Insert {
    dialect: &'static dyn Dialect,
    table: String,
    values: Values,
    returning: Option<String>,
}

impl Insert {
    fn new(dialect: &'static dyn Dialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            values: Values::new(),
            returning: None,
        }
    }

    /// Append one row of (column, value) pairs.
    pub fn row(mut self, row: Vec<(String, Value)>) -> Self {
        self.values.row(row);
        self
    }

    /// Append many rows.
    pub fn rows(mut self, rows: Vec<Vec<(String, Value)>>) -> Self {
        for row in rows {
            self.values.row(row);
        }
        self
    }

    /// Return `column` from the inserted row(s).
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning = Some(column.into());
        self
    }

    /// Finish the statement.
    pub fn build(&self) -> Result<Statement> {
        if self.values.is_empty() {
            return Err(Error::invalid_statement(
                "INSERT statement must have at least one row of values",
            ));
        }
        let returning = self.render_returning()?;

        let mut km = KeyManager::new();
        let (text, params) = self.values.clause_sql()?;
        let query = format!(
            "INSERT INTO {} {} {}{}",
            self.table,
            self.values.names(),
            km.merge_params(&text, &params),
            returning
        );
        Ok(Statement {
            query,
            params: km.into_params(),
        })
    }

    fn render_returning(&self) -> Result<String> {
        match &self.returning {
            None => Ok(String::new()),
            Some(column) => {
                if !self.dialect.supports_returning() {
                    return Err(Error::invalid_statement(format!(
                        "dialect '{}' does not support RETURNING",
                        self.dialect.name()
                    )));
                }
                Ok(format!(" RETURNING {column}"))
            }
        }
    }
}

/// An UPDATE statement.
#[derive(Debug, Clone)]
pub struct Update {
    dialect: &'static dyn Dialect,
    table: String,
    assignments: Vec<Assignment>,
    where_clause: Option<Where>,
    returning: Option<String>,
}

impl Update {
    fn new(dialect: &'static dyn Dialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            assignments: Vec::new(),
            where_clause: None,
            returning: None,
        }
    }

    /// Add an assignment to the SET clause.
    pub fn assignment(mut self, columns: &[&str], value: Value) -> Result<Self> {
        self.assignments.push(Assignment::new(
            columns.iter().map(|c| (*c).to_string()).collect(),
            value,
        )?);
        Ok(self)
    }

    /// Set the WHERE clause.
    pub fn where_(mut self, condition: crate::expr::Expr) -> Self {
        self.where_clause = Some(Where::new(condition));
        self
    }

    /// Return `column` from the updated row(s).
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning = Some(column.into());
        self
    }

    /// Number of assignments added so far.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Finish the statement.
    pub fn build(&self) -> Result<Statement> {
        if self.assignments.is_empty() {
            return Err(Error::invalid_statement(
                "UPDATE statement must have at least one assignment",
            ));
        }
        let returning = match &self.returning {
            None => String::new(),
            Some(column) => {
                if !self.dialect.supports_returning() {
                    return Err(Error::invalid_statement(format!(
                        "dialect '{}' does not support RETURNING",
                        self.dialect.name()
                    )));
                }
                format!(" RETURNING {column}")
            }
        };

        let mut km = KeyManager::new();
        let mut sets = Vec::with_capacity(self.assignments.len());
        for assignment in &self.assignments {
            let (text, params) = assignment.clause_sql()?;
            sets.push(km.merge_params(&text, &params));
        }
        let mut query = format!("UPDATE {} SET {}", self.table, sets.join(", "));
        if let Some(where_clause) = &self.where_clause {
            let (text, params) = where_clause.clause_sql()?;
            query.push_str(&km.merge_params(&text, &params));
        }
        query.push_str(&returning);
        Ok(Statement {
            query,
            params: km.into_params(),
        })
    }
}

/// A CREATE TABLE statement with explicit column definitions.
#[derive(Debug, Clone)]
pub struct CreateTable {
    dialect: &'static dyn Dialect,
    table: String,
    columns: Vec<ColumnDef>,
    temporary: bool,
}

impl CreateTable {
    fn new(dialect: &'static dyn Dialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            columns: Vec::new(),
            temporary: false,
        }
    }

    /// Create a TEMPORARY table.
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    /// Append a column definition.
    pub fn column(
        mut self,
        name: impl Into<String>,
        attr_type: AttrType,
        flags: ColumnFlags,
        extra: AttrExtra,
    ) -> Self {
        self.columns.push(ColumnDef::new(name, attr_type, flags, extra));
        self
    }

    /// Switch to a CREATE TABLE ... AS SELECT statement.
    ///
    /// Fails when column definitions were already added: a table is created
    /// either from columns or from a source query, never both.
    pub fn as_select(self, select: Select) -> Result<CreateTableAsSelect> {
        if !self.columns.is_empty() {
            return Err(Error::invalid_statement(
                "cannot add AS SELECT to a CREATE TABLE statement with columns",
            ));
        }
        Ok(CreateTableAsSelect {
            table: self.table,
            temporary: self.temporary,
            select,
        })
    }

    /// Finish the statement.
    pub fn build(&self) -> Result<Statement> {
        if self.table.is_empty() {
            return Err(Error::invalid_statement(
                "CREATE TABLE statement must have a table name",
            ));
        }
        if self.columns.is_empty() {
            return Err(Error::invalid_statement(
                "CREATE TABLE statement must have at least one column or 'AS SELECT' clause",
            ));
        }
        let rendered: Result<Vec<String>> = self
            .columns
            .iter()
            .map(|c| c.render(self.dialect))
            .collect();
        let query = format!(
            "CREATE {}TABLE {} ({})",
            if self.temporary { "TEMPORARY " } else { "" },
            self.table,
            rendered?.join(", ")
        );
        Ok(Statement {
            query,
            params: SqlParams::new(),
        })
    }
}

/// A CREATE TABLE ... AS SELECT statement.
#[derive(Debug, Clone)]
pub struct CreateTableAsSelect {
    table: String,
    temporary: bool,
    select: Select,
}

impl CreateTableAsSelect {
    /// Finish the statement.
    pub fn build(&self) -> Result<Statement> {
        if self.table.is_empty() {
            return Err(Error::invalid_statement(
                "CREATE TABLE statement must have a table name",
            ));
        }
        let mut km = KeyManager::new();
        let select_query = self.select.render(&mut km)?;
        let query = format!(
            "CREATE {}TABLE {} AS {}",
            if self.temporary { "TEMPORARY " } else { "" },
            self.table,
            select_query
        );
        Ok(Statement {
            query,
            params: km.into_params(),
        })
    }
}

/// A CREATE VIEW statement.
#[derive(Debug, Clone)]
pub struct CreateView {
    view: String,
    view_columns: Vec<String>,
    temporary: bool,
    select: Option<Select>,
    dialect: &'static dyn Dialect,
}

impl CreateView {
    fn new(dialect: &'static dyn Dialect, view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            view_columns: Vec::new(),
            temporary: false,
            select: None,
            dialect,
        }
    }

    /// Name the view's columns (optional).
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.view_columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Create a TEMPORARY view.
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    /// The SELECT statement the view wraps.
    pub fn as_select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }

    /// Start the wrapped SELECT with this view's dialect.
    pub fn select(&self) -> Select {
        Select::new(self.dialect)
    }

    /// Finish the statement.
    pub fn build(&self) -> Result<Statement> {
        if self.view.is_empty() {
            return Err(Error::invalid_statement(
                "CREATE VIEW statement must have a view name",
            ));
        }
        let select = self.select.as_ref().ok_or_else(|| {
            Error::invalid_statement("CREATE VIEW statement must have a SELECT source")
        })?;
        let mut km = KeyManager::new();
        let select_query = select.render(&mut km)?;
        let columns = if self.view_columns.is_empty() {
            "AS".to_string()
        } else {
            format!("( {} ) AS", self.view_columns.join(", "))
        };
        let query = format!(
            "CREATE {} IF NOT EXISTS {} {} {}",
            if self.temporary {
                "TEMPORARY VIEW"
            } else {
                "VIEW"
            },
            self.view,
            columns,
            select_query
        );
        Ok(Statement {
            query,
            params: km.into_params(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use moneta_core::dialect::SqlTemplate;

    // A minimal dialect for builder tests.
    #[derive(Debug)]
    struct TestDialect {
        returning: bool,
    }

    impl Dialect for TestDialect {
        fn name(&self) -> &'static str {
            "test"
        }

        fn column_type(&self, ty: AttrType, extra: &AttrExtra) -> Result<String> {
            Ok(match ty {
                AttrType::Int | AttrType::Relation => "INTEGER".to_string(),
                AttrType::Str => "TEXT".to_string(),
                AttrType::Date | AttrType::DateTime => "TEXT".to_string(),
                AttrType::Dict | AttrType::List => "JSON".to_string(),
                AttrType::Flag => format!("FLAG({})", extra.flag_members.len()),
            })
        }

        fn constraint_sql(&self, flags: ColumnFlags, extra: &AttrExtra) -> Result<String> {
            let mut parts = Vec::new();
            if flags.contains(ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT) {
                parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
            } else if flags.contains(ColumnFlags::PRIMARY_KEY) {
                parts.push("PRIMARY KEY".to_string());
            }
            if flags.contains(ColumnFlags::NOT_NULL) {
                parts.push("NOT NULL".to_string());
            }
            if flags.contains(ColumnFlags::FOREIGN_KEY) {
                let target = extra.relation.as_deref().unwrap_or("?");
                parts.push(format!("REFERENCES {target}"));
            }
            Ok(parts.join(" "))
        }

        fn template(&self, template: SqlTemplate) -> Option<&'static str> {
            match template {
                SqlTemplate::TableList => Some("SELECT name FROM tables"),
                _ => None,
            }
        }

        fn supports_returning(&self) -> bool {
            self.returning
        }
    }

    static DIALECT: TestDialect = TestDialect { returning: true };
    static NO_RETURNING: TestDialect = TestDialect { returning: false };

    fn sql() -> Sql {
        Sql::new(&DIALECT)
    }

    #[test]
    fn test_select_requires_from() {
        let err = sql().select().build().unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
    }

    #[test]
    fn test_select_defaults_to_star() {
        let stmt = sql().select().from_("accounts").build().unwrap();
        assert_eq!(stmt.query, "SELECT * FROM accounts");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_distinct_where() {
        let stmt = sql()
            .select()
            .distinct()
            .columns(&["id", "name"])
            .from_("accounts")
            .where_(Expr::col("id").eq(3))
            .build()
            .unwrap();
        assert_eq!(
            stmt.query,
            "SELECT DISTINCT id, name FROM accounts WHERE (id = :param)"
        );
        assert_eq!(stmt.params.get("param"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_select_join_requires_from() {
        let err = sql()
            .select()
            .join("accounts", None, JoinOperator::Inner)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
    }

    #[test]
    fn test_select_group_by_having() {
        let stmt = sql()
            .select()
            .columns(&["category", "count(*) as n"])
            .from_("txns")
            .group_by(&["category"])
            .having(Expr::raw("count(*)").gt(10))
            .build()
            .unwrap();
        assert_eq!(
            stmt.query,
            "SELECT category, count(*) as n FROM txns GROUP BY category HAVING (count(*) > :param)"
        );
    }

    #[test]
    fn test_insert_two_rows_share_column_order() {
        let stmt = sql()
            .insert("people")
            .rows(vec![
                vec![
                    ("name".to_string(), Value::Text("A".into())),
                    ("age".to_string(), Value::Int(1)),
                ],
                vec![
                    ("name".to_string(), Value::Text("B".into())),
                    ("age".to_string(), Value::Int(2)),
                ],
            ])
            .build()
            .unwrap();
        assert_eq!(
            stmt.query,
            "INSERT INTO people (name, age) VALUES (:name, :age), (:name1, :age2)"
        );
        assert_eq!(stmt.params.len(), 4);
    }

    #[test]
    fn test_insert_requires_rows() {
        let err = sql().insert("people").build().unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
    }

    #[test]
    fn test_insert_returning() {
        let stmt = sql()
            .insert("people")
            .row(vec![("name".to_string(), Value::Text("A".into()))])
            .returning("id")
            .build()
            .unwrap();
        assert!(stmt.query.ends_with(" RETURNING id"));
    }

    #[test]
    fn test_insert_returning_rejected_without_support() {
        let err = Sql::new(&NO_RETURNING)
            .insert("people")
            .row(vec![("name".to_string(), Value::Text("A".into()))])
            .returning("id")
            .build()
            .unwrap_err();
        assert!(err.message().contains("RETURNING"));
    }

    #[test]
    fn test_update_requires_assignment() {
        let err = sql().update("accounts").build().unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
    }

    #[test]
    fn test_update_with_where() {
        let stmt = sql()
            .update("accounts")
            .assignment(&["name"], Value::Text("checking".into()))
            .unwrap()
            .where_(Expr::col("id").eq(5))
            .build()
            .unwrap();
        assert_eq!(
            stmt.query,
            "UPDATE accounts SET name = :name WHERE (id = :param)"
        );
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_create_table_renders_columns() {
        let stmt = sql()
            .create_table("accounts")
            .column(
                "id",
                AttrType::Int,
                ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT,
                AttrExtra::none(),
            )
            .column("name", AttrType::Str, ColumnFlags::NOT_NULL, AttrExtra::none())
            .build()
            .unwrap();
        assert_eq!(
            stmt.query,
            "CREATE TABLE accounts (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)"
        );
    }

    #[test]
    fn test_create_table_requires_columns_or_select() {
        let err = sql().create_table("accounts").build().unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
    }

    #[test]
    fn test_create_table_as_select_after_columns_fails() {
        let create = sql().create_table("t").column(
            "id",
            AttrType::Int,
            ColumnFlags::NONE,
            AttrExtra::none(),
        );
        let err = create.as_select(sql().select().from_("s")).unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
    }

    #[test]
    fn test_create_table_as_select() {
        let stmt = sql()
            .create_table("summary")
            .temporary()
            .as_select(
                sql()
                    .select()
                    .columns(&["category", "sum(amount) as total"])
                    .from_("txns"),
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            stmt.query,
            "CREATE TEMPORARY TABLE summary AS SELECT category, sum(amount) as total FROM txns"
        );
    }

    #[test]
    fn test_create_view() {
        let stmt = sql()
            .create_view("balances")
            .columns(&["account", "balance"])
            .as_select(
                sql()
                    .select()
                    .columns(&["account_id", "sum(amount)"])
                    .from_("txns")
                    .group_by(&["account_id"]),
            )
            .build()
            .unwrap();
        assert_eq!(
            stmt.query,
            "CREATE VIEW IF NOT EXISTS balances ( account, balance ) AS \
             SELECT account_id, sum(amount) FROM txns GROUP BY account_id"
        );
    }

    #[test]
    fn test_script_template_merges_params() {
        let script = sql()
            .script_template(
                SqlTemplate::TableList,
                SqlParams::new(),
            )
            .unwrap();
        assert_eq!(script.build().unwrap().query, "SELECT name FROM tables");

        let err = sql()
            .script_template(SqlTemplate::DbVersion, SqlParams::new())
            .unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
    }

    #[test]
    fn test_script_normalizes_whitespace_and_binds() {
        let params: SqlParams =
            std::iter::once(("table".to_string(), Value::Text("accounts".into()))).collect();
        let script = sql().script(
            "SELECT sql   FROM sqlite_master\n  WHERE name = :table",
            params,
        );
        let stmt = script.build().unwrap();
        assert_eq!(
            stmt.query,
            "SELECT sql FROM sqlite_master WHERE name = :table"
        );
        assert_eq!(
            stmt.params.get("table"),
            Some(&Value::Text("accounts".to_string()))
        );
    }
}
