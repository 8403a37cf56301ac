//! Expression tree IR.
//!
//! A small tagged union that query front ends build and the
//! [`ExpressionBuilder`](crate::builder::ExpressionBuilder) translates. It is
//! deliberately independent of any host-language expression API: the typed
//! query objects in `graphmodel` build it through the fluent methods below.
//!
//! ```rust,ignore
//! // p => p.Age < 35 && p.HomeAddress.City == "Seattle"
//! let predicate = Lambda::new("p", |p| {
//!     p.field("Age").lt(35).and(p.field("HomeAddress").field("City").eq("Seattle"))
//! });
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use graphmodel_core::{GraphDuration, GraphValue, Point};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Cypher operator token, `None` for function-style operators
    pub fn token(self) -> Option<&'static str> {
        Some(match self {
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Coalesce => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// One node of an expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a lambda parameter
    Parameter(String),
    Member {
        target: Box<Expr>,
        member: String,
    },
    Constant(GraphValue),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Instance method when `target` is set, static otherwise
    MethodCall {
        target: Option<Box<Expr>>,
        method: String,
        arguments: Vec<Expr>,
    },
    Lambda(Lambda),
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// Anonymous object construction, used by projections and group keys
    New(Vec<(String, Expr)>),
}

/// Lambda abstraction over named parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub parameters: Vec<String>,
    pub body: Box<Expr>,
}

impl Lambda {
    /// Single-parameter lambda built from a closure over the parameter
    pub fn new(parameter: &str, body: impl FnOnce(Expr) -> Expr) -> Self {
        Self {
            parameters: vec![parameter.to_string()],
            body: Box::new(body(Expr::param(parameter))),
        }
    }

    pub fn from_parts(parameters: Vec<String>, body: Expr) -> Self {
        Self {
            parameters,
            body: Box::new(body),
        }
    }

    pub fn parameter(&self) -> Option<&str> {
        self.parameters.first().map(String::as_str)
    }

    /// `true` when the body is just the parameter itself (`p => p`)
    pub fn is_identity(&self) -> bool {
        matches!(self.body.as_ref(), Expr::Parameter(name) if Some(name.as_str()) == self.parameter())
    }
}

/// Conversion into an expression operand.
///
/// Literal values become [`Expr::Constant`] and are always bound as query
/// parameters when rendered.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl IntoExpr for GraphValue {
    fn into_expr(self) -> Expr {
        Expr::Constant(self)
    }
}

macro_rules! constant_into_expr {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::Constant(GraphValue::from(self))
                }
            }
        )+
    };
}

constant_into_expr!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    String,
    &str,
    &String,
    NaiveDate,
    NaiveDateTime,
    NaiveTime,
    DateTime<FixedOffset>,
    DateTime<Utc>,
    GraphDuration,
    Point,
    uuid::Uuid,
);

impl<T: Into<GraphValue>> IntoExpr for Vec<T> {
    fn into_expr(self) -> Expr {
        Expr::Constant(self.into())
    }
}

impl<T: Into<GraphValue>> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        Expr::Constant(self.into())
    }
}

impl Expr {
    pub fn param(name: &str) -> Self {
        Expr::Parameter(name.to_string())
    }

    pub fn constant(value: impl Into<GraphValue>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn null() -> Self {
        Expr::Constant(GraphValue::Null)
    }

    /// Member access (`p.FirstName`)
    pub fn field(&self, member: &str) -> Self {
        Expr::Member {
            target: Box::new(self.clone()),
            member: member.to_string(),
        }
    }

    fn binary(self, op: BinaryOp, other: impl IntoExpr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other.into_expr()),
        }
    }

    /// Instance method call
    pub fn call(&self, method: &str, arguments: Vec<Expr>) -> Self {
        Expr::MethodCall {
            target: Some(Box::new(self.clone())),
            method: method.to_string(),
            arguments,
        }
    }

    /// Static method call (`DateTime.Now`, `String.IsNullOrEmpty(x)`)
    pub fn call_static(method: &str, arguments: Vec<Expr>) -> Self {
        Expr::MethodCall {
            target: None,
            method: method.to_string(),
            arguments,
        }
    }

    pub fn eq(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Equal, other)
    }

    pub fn ne(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::NotEqual, other)
    }

    pub fn lt(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::LessThan, other)
    }

    pub fn le(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::LessThanOrEqual, other)
    }

    pub fn gt(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::GreaterThan, other)
    }

    pub fn ge(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::GreaterThanOrEqual, other)
    }

    pub fn and(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn neg(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(self),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Subtract, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Multiply, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Divide, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn rem(self, other: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Modulo, other)
    }

    /// `coalesce(self, fallback)`
    pub fn or_else(self, fallback: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Coalesce, fallback)
    }

    /// `CASE WHEN test THEN if_true ELSE if_false END`
    pub fn condition(test: Expr, if_true: impl IntoExpr, if_false: impl IntoExpr) -> Self {
        Expr::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true.into_expr()),
            if_false: Box::new(if_false.into_expr()),
        }
    }

    /// Anonymous object with named members
    pub fn object<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<String>,
    {
        Expr::New(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    // String methods

    /// String containment, or membership for collection properties
    pub fn contains(self, value: impl IntoExpr) -> Self {
        self.call("Contains", vec![value.into_expr()])
    }

    pub fn starts_with(self, value: impl IntoExpr) -> Self {
        self.call("StartsWith", vec![value.into_expr()])
    }

    pub fn ends_with(self, value: impl IntoExpr) -> Self {
        self.call("EndsWith", vec![value.into_expr()])
    }

    pub fn to_upper(self) -> Self {
        self.call("ToUpper", Vec::new())
    }

    pub fn to_lower(self) -> Self {
        self.call("ToLower", Vec::new())
    }

    pub fn trim(self) -> Self {
        self.call("Trim", Vec::new())
    }

    pub fn substring(self, start: impl IntoExpr, length: Option<i64>) -> Self {
        let mut arguments = vec![start.into_expr()];
        if let Some(length) = length {
            arguments.push(Expr::constant(length));
        }
        self.call("Substring", arguments)
    }

    pub fn replace(self, from: impl IntoExpr, to: impl IntoExpr) -> Self {
        self.call("Replace", vec![from.into_expr(), to.into_expr()])
    }

    pub fn length(self) -> Self {
        self.field("Length")
    }

    pub fn is_null_or_empty(value: Expr) -> Self {
        Expr::call_static("IsNullOrEmpty", vec![value])
    }

    // Date and time

    pub fn now() -> Self {
        Expr::call_static("Now", Vec::new())
    }

    pub fn utc_now() -> Self {
        Expr::call_static("UtcNow", Vec::new())
    }

    pub fn today() -> Self {
        Expr::call_static("Today", Vec::new())
    }

    pub fn add_years(self, amount: impl IntoExpr) -> Self {
        self.call("AddYears", vec![amount.into_expr()])
    }

    pub fn add_months(self, amount: impl IntoExpr) -> Self {
        self.call("AddMonths", vec![amount.into_expr()])
    }

    pub fn add_days(self, amount: impl IntoExpr) -> Self {
        self.call("AddDays", vec![amount.into_expr()])
    }

    pub fn add_hours(self, amount: impl IntoExpr) -> Self {
        self.call("AddHours", vec![amount.into_expr()])
    }

    pub fn add_minutes(self, amount: impl IntoExpr) -> Self {
        self.call("AddMinutes", vec![amount.into_expr()])
    }

    pub fn add_seconds(self, amount: impl IntoExpr) -> Self {
        self.call("AddSeconds", vec![amount.into_expr()])
    }

    pub fn add_milliseconds(self, amount: impl IntoExpr) -> Self {
        self.call("AddMilliseconds", vec![amount.into_expr()])
    }

    // Collections

    /// `true` when any element satisfies the predicate
    pub fn any(self, predicate: impl FnOnce(Expr) -> Expr) -> Self {
        self.call("Any", vec![Expr::Lambda(Lambda::new("item", predicate))])
    }

    /// `true` when the collection has at least one element
    pub fn any_item(self) -> Self {
        self.call("Any", Vec::new())
    }

    pub fn all(self, predicate: impl FnOnce(Expr) -> Expr) -> Self {
        self.call("All", vec![Expr::Lambda(Lambda::new("item", predicate))])
    }

    pub fn count(self) -> Self {
        self.call("Count", Vec::new())
    }

    // Group aggregates

    /// Grouping key of a group parameter
    pub fn key(&self) -> Self {
        self.field("Key")
    }

    pub fn sum(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call("Sum", vec![Expr::Lambda(Lambda::new("item", selector))])
    }

    pub fn average(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call("Average", vec![Expr::Lambda(Lambda::new("item", selector))])
    }

    pub fn min(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call("Min", vec![Expr::Lambda(Lambda::new("item", selector))])
    }

    pub fn max(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call("Max", vec![Expr::Lambda(Lambda::new("item", selector))])
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter(name) => f.write_str(name),
            Expr::Member { target, member } => write!(f, "{target}.{member}"),
            Expr::Constant(value) => write!(f, "<{}>", value.type_name()),
            Expr::Binary { op, left, right } => match op.token() {
                Some(token) => write!(f, "({left} {token} {right})"),
                None => write!(f, "coalesce({left}, {right})"),
            },
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!{operand}"),
                UnaryOp::Negate => write!(f, "-{operand}"),
            },
            Expr::MethodCall {
                target,
                method,
                arguments,
            } => {
                if let Some(target) = target {
                    write!(f, "{target}.")?;
                }
                write!(f, "{method}(")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
            Expr::Lambda(lambda) => write!(f, "{} => {}", lambda.parameters.join(", "), lambda.body),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "({test} ? {if_true} : {if_false})"),
            Expr::New(members) => {
                f.write_str("new { ")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name} = {value}")?;
                }
                f.write_str(" }")
            }
        }
    }
}
