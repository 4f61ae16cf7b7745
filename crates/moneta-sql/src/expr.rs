//! Composable SQL expressions.
//!
//! Expressions are immutable trees; [`Expr::render`] produces parameterized
//! text against a [`KeyManager`]. Bound values never appear literally in
//! the rendered text — a [`Expr::Value`] node registers itself with the key
//! manager and renders as `:final_key`.

use moneta_core::error::{Error, Result};
use moneta_core::value::Value;

use crate::keys::KeyManager;

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `IS`
    Is,
}

impl BinaryOp {
    fn sql(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Is => "IS",
        }
    }
}

/// One node of an SQL expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Verbatim SQL text (use for subqueries and expressions the builder
    /// does not model).
    Raw(String),
    /// SQL NULL.
    Null,
    /// A column reference, rendered unquoted.
    Col(String),
    /// A bound value with its proposed parameter name.
    Value {
        /// Proposed parameter name; disambiguated by the key manager.
        name: String,
        /// The bound value.
        value: Value,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// `IS NULL` test.
    IsNull(Box<Expr>),
    /// Binary comparison.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Ternary `BETWEEN low AND high`.
    Between {
        /// The probed expression.
        probe: Box<Expr>,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
    },
    /// `AND` of all arguments.
    All(Vec<Expr>),
    /// `OR` of any argument.
    Any(Vec<Expr>),
}

impl Expr {
    /// A column reference.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Col(name.into())
    }

    /// A bound value with the default proposed name.
    pub fn val(value: impl Into<Value>) -> Self {
        Expr::Value {
            name: "param".to_string(),
            value: value.into(),
        }
    }

    /// A bound value with an explicit proposed name.
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::Value {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Verbatim SQL text.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// `AND` of all arguments.
    pub fn all(args: Vec<Expr>) -> Self {
        Expr::All(args)
    }

    /// `OR` of any argument.
    pub fn any(args: Vec<Expr>) -> Self {
        Expr::Any(args)
    }

    /// A filter condition matching all entries of a column → value map:
    /// `=` per pair, `IS NULL` for absent values.
    pub fn filter<I, S>(conditions: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Value>)>,
        S: Into<String>,
    {
        let parts = conditions
            .into_iter()
            .map(|(column, value)| {
                let column = column.into();
                match value {
                    Some(v) => Expr::col(column.clone()).eq_expr(Expr::named(column, v)),
                    None => Expr::col(column).is_null(),
                }
            })
            .collect();
        Expr::All(parts)
    }

    /// `self = value`.
    pub fn eq(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Eq, Expr::val(value))
    }

    /// `self = other` for an expression operand.
    pub fn eq_expr(self, other: Expr) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// `self <> value`.
    pub fn ne(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Ne, Expr::val(value))
    }

    /// `self < value`.
    pub fn lt(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Lt, Expr::val(value))
    }

    /// `self <= value`.
    pub fn le(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Le, Expr::val(value))
    }

    /// `self > value`.
    pub fn gt(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Gt, Expr::val(value))
    }

    /// `self >= value`.
    pub fn ge(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Ge, Expr::val(value))
    }

    /// `self IS other`.
    pub fn is(self, other: Expr) -> Self {
        self.binary(BinaryOp::Is, other)
    }

    /// `self AND other`.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::All(mut args) => {
                args.push(other);
                Expr::All(args)
            }
            first => Expr::All(vec![first, other]),
        }
    }

    /// `self OR other`.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Any(mut args) => {
                args.push(other);
                Expr::Any(args)
            }
            first => Expr::Any(vec![first, other]),
        }
    }

    /// `NOT self`.
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// `self IS NULL`.
    pub fn is_null(self) -> Self {
        Expr::IsNull(Box::new(self))
    }

    /// `self BETWEEN low AND high`.
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Expr::Between {
            probe: Box::new(self),
            low: Box::new(Expr::val(low)),
            high: Box::new(Expr::val(high)),
        }
    }

    fn binary(self, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    /// Render to parameterized text, registering bound values with `km`.
    pub fn render(&self, km: &mut KeyManager) -> Result<String> {
        match self {
            Expr::Raw(sql) => {
                if sql.is_empty() {
                    Ok("NULL".to_string())
                } else {
                    Ok(sql.clone())
                }
            }
            Expr::Null => Ok("NULL".to_string()),
            Expr::Col(name) => Ok(name.clone()),
            Expr::Value { name, value } => Ok(format!(":{}", km.register(name, value))),
            Expr::Not(inner) => Ok(format!("(NOT {})", inner.render(km)?)),
            Expr::IsNull(inner) => Ok(format!("({} IS NULL)", inner.render(km)?)),
            Expr::Binary { op, left, right } => Ok(format!(
                "({} {} {})",
                left.render(km)?,
                op.sql(),
                right.render(km)?
            )),
            Expr::Between { probe, low, high } => Ok(format!(
                "({} BETWEEN {} AND {})",
                probe.render(km)?,
                low.render(km)?,
                high.render(km)?
            )),
            Expr::All(args) => Self::render_joined(args, "AND", km),
            Expr::Any(args) => Self::render_joined(args, "OR", km),
        }
    }

    fn render_joined(args: &[Expr], operator: &str, km: &mut KeyManager) -> Result<String> {
        if args.is_empty() {
            return Err(Error::validation(format!(
                "{operator} combinator must have at least one argument"
            )));
        }
        let rendered: Result<Vec<String>> = args.iter().map(|a| a.render(km)).collect();
        Ok(format!("({})", rendered?.join(&format!(" {operator} "))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(expr: &Expr) -> (String, moneta_core::SqlParams) {
        let mut km = KeyManager::new();
        let text = expr.render(&mut km).unwrap();
        (text, km.into_params())
    }

    #[test]
    fn test_value_renders_as_placeholder_only() {
        let (text, params) = render(&Expr::col("amount").eq(1250));
        assert_eq!(text, "(amount = :param)");
        assert!(!text.contains("1250"));
        assert_eq!(params.get("param"), Some(&Value::Int(1250)));
    }

    #[test]
    fn test_named_value_keeps_proposed_name() {
        let (text, params) = render(&Expr::col("name").eq_expr(Expr::named("name", "rent")));
        assert_eq!(text, "(name = :name)");
        assert_eq!(params.get("name"), Some(&Value::Text("rent".to_string())));
    }

    #[test]
    fn test_and_or_combinators() {
        let expr = Expr::col("a")
            .eq(1)
            .and(Expr::col("b").eq(2))
            .or(Expr::col("c").is_null());
        let (text, params) = render(&expr);
        assert_eq!(text, "(((a = :param) AND (b = :param1)) OR (c IS NULL))");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_empty_combinator_is_a_validation_error() {
        let mut km = KeyManager::new();
        let err = Expr::All(vec![]).render(&mut km).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_between_renders_two_parameters() {
        let (text, params) = render(&Expr::col("booked_at").between("2026-01-01", "2026-01-31"));
        assert_eq!(text, "(booked_at BETWEEN :param AND :param1)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_filter_mixes_eq_and_is_null() {
        let expr = Expr::filter(vec![
            ("category", Some(Value::Text("food".into()))),
            ("closed_at", None),
        ]);
        let (text, params) = render(&expr);
        assert!(text.contains("(category = :category)"));
        assert!(text.contains("(closed_at IS NULL)"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_not_wraps_in_parentheses() {
        let (text, _) = render(&Expr::col("archived").eq(true).not());
        assert_eq!(text, "(NOT (archived = :param))");
    }

    #[test]
    fn test_equal_values_share_one_parameter() {
        let expr = Expr::col("a").eq(7).and(Expr::col("b").eq(7));
        let (text, params) = render(&expr);
        assert_eq!(text, "((a = :param) AND (b = :param))");
        assert_eq!(params.len(), 1);
    }
}
