//! Query expression AST.
//!
//! An `Expr` describes a query declaratively; `compile` turns it into a live
//! operation graph. The query operators are a closed `QueryMethod` set so the
//! whole dispatch is one exhaustive match; anything outside it fails at
//! construction with an unsupported-expression error.
//!
//! The builder helpers at the bottom are the thin fluent surface used by
//! callers and tests; they only build AST, never evaluate anything.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::Value;

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// The supported query operators, dispatched by name shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryMethod {
    Where,
    Select,
    SelectMany,
    OrderBy,
    OrderByDescending,
    GroupBy,
    Concat,
    Intersect,
    Distinct,
    Cast,
    DefaultIfEmpty,
    Take,
    Skip,
    Count,
    Sum,
    Average,
    Min,
    Max,
    Any,
    All,
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
}

impl QueryMethod {
    /// Returns the operator's display name.
    pub fn name(&self) -> &'static str {
        match self {
            QueryMethod::Where => "Where",
            QueryMethod::Select => "Select",
            QueryMethod::SelectMany => "SelectMany",
            QueryMethod::OrderBy => "OrderBy",
            QueryMethod::OrderByDescending => "OrderByDescending",
            QueryMethod::GroupBy => "GroupBy",
            QueryMethod::Concat => "Concat",
            QueryMethod::Intersect => "Intersect",
            QueryMethod::Distinct => "Distinct",
            QueryMethod::Cast => "Cast",
            QueryMethod::DefaultIfEmpty => "DefaultIfEmpty",
            QueryMethod::Take => "Take",
            QueryMethod::Skip => "Skip",
            QueryMethod::Count => "Count",
            QueryMethod::Sum => "Sum",
            QueryMethod::Average => "Average",
            QueryMethod::Min => "Min",
            QueryMethod::Max => "Max",
            QueryMethod::Any => "Any",
            QueryMethod::All => "All",
            QueryMethod::First => "First",
            QueryMethod::FirstOrDefault => "FirstOrDefault",
            QueryMethod::Single => "Single",
            QueryMethod::SingleOrDefault => "SingleOrDefault",
        }
    }
}

/// Expression AST node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Literal value.
    Constant(Value),
    /// Reference to a context-bound variable.
    Variable(String),
    /// Member access on a record-valued target.
    Member { target: Box<Expr>, name: String },
    /// Indexer on a sequence, record or string target.
    Index { target: Box<Expr>, index: Box<Expr> },
    /// Binary operation.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation.
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// Conditional (cond ? then : otherwise).
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Single-parameter lambda; only valid as a query operator argument.
    Lambda { param: String, body: Box<Expr> },
    /// Object construction with member initialization.
    Record { fields: Vec<(String, Expr)> },
    /// Query operator call.
    Call {
        method: QueryMethod,
        source: Box<Expr>,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Creates a constant expression.
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    /// Creates a variable reference.
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    /// Creates a member access on this expression.
    pub fn member(self, name: impl Into<String>) -> Self {
        Expr::Member {
            target: Box::new(self),
            name: name.into(),
        }
    }

    /// Creates an indexer on this expression.
    pub fn index(self, index: Expr) -> Self {
        Expr::Index {
            target: Box::new(self),
            index: Box::new(index),
        }
    }

    /// Creates a binary operation.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates a unary operation.
    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    /// Creates a conditional expression.
    pub fn conditional(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Creates a single-parameter lambda.
    pub fn lambda(param: impl Into<String>, body: Expr) -> Self {
        Expr::Lambda {
            param: param.into(),
            body: Box::new(body),
        }
    }

    /// Creates an object-construction expression.
    pub fn record(fields: Vec<(String, Expr)>) -> Self {
        Expr::Record { fields }
    }

    /// Creates a query operator call.
    pub fn call(method: QueryMethod, source: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            method,
            source: Box::new(source),
            args,
        }
    }

    /// Short name for this expression's shape, used in dispatch errors.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "constant",
            Expr::Variable(_) => "variable",
            Expr::Member { .. } => "member access",
            Expr::Index { .. } => "indexer",
            Expr::Binary { .. } => "binary operator",
            Expr::Unary { .. } => "unary operator",
            Expr::Conditional { .. } => "conditional",
            Expr::Lambda { .. } => "lambda",
            Expr::Record { .. } => "object construction",
            Expr::Call { .. } => "operator call",
        }
    }

    // Comparison / arithmetic shorthand

    pub fn eq(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Eq, self, other)
    }

    pub fn ne(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Ne, self, other)
    }

    pub fn lt(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Lt, self, other)
    }

    pub fn le(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Le, self, other)
    }

    pub fn gt(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Gt, self, other)
    }

    pub fn ge(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Ge, self, other)
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::And, self, other)
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Or, self, other)
    }

    pub fn add(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Add, self, other)
    }

    pub fn sub(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Sub, self, other)
    }

    pub fn mul(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Mul, self, other)
    }

    pub fn not(self) -> Self {
        Expr::unary(UnaryOp::Not, self)
    }

    // Query operator shorthand

    pub fn where_(self, param: impl Into<String>, body: Expr) -> Self {
        Expr::call(QueryMethod::Where, self, alloc::vec![Expr::lambda(param, body)])
    }

    pub fn select(self, param: impl Into<String>, body: Expr) -> Self {
        Expr::call(QueryMethod::Select, self, alloc::vec![Expr::lambda(param, body)])
    }

    pub fn select_many(self, param: impl Into<String>, body: Expr) -> Self {
        Expr::call(
            QueryMethod::SelectMany,
            self,
            alloc::vec![Expr::lambda(param, body)],
        )
    }

    pub fn order_by(self, param: impl Into<String>, key: Expr) -> Self {
        Expr::call(QueryMethod::OrderBy, self, alloc::vec![Expr::lambda(param, key)])
    }

    pub fn order_by_descending(self, param: impl Into<String>, key: Expr) -> Self {
        Expr::call(
            QueryMethod::OrderByDescending,
            self,
            alloc::vec![Expr::lambda(param, key)],
        )
    }

    pub fn group_by(self, param: impl Into<String>, key: Expr) -> Self {
        Expr::call(QueryMethod::GroupBy, self, alloc::vec![Expr::lambda(param, key)])
    }

    pub fn concat(self, other: Expr) -> Self {
        Expr::call(QueryMethod::Concat, self, alloc::vec![other])
    }

    pub fn intersect(self, other: Expr) -> Self {
        Expr::call(QueryMethod::Intersect, self, alloc::vec![other])
    }

    pub fn distinct(self) -> Self {
        Expr::call(QueryMethod::Distinct, self, Vec::new())
    }

    pub fn cast(self, type_name: impl Into<String>) -> Self {
        Expr::call(
            QueryMethod::Cast,
            self,
            alloc::vec![Expr::Constant(Value::String(type_name.into()))],
        )
    }

    pub fn default_if_empty(self, default: Option<Expr>) -> Self {
        let args = match default {
            Some(d) => alloc::vec![d],
            None => Vec::new(),
        };
        Expr::call(QueryMethod::DefaultIfEmpty, self, args)
    }

    pub fn take(self, count: Expr) -> Self {
        Expr::call(QueryMethod::Take, self, alloc::vec![count])
    }

    pub fn skip(self, count: Expr) -> Self {
        Expr::call(QueryMethod::Skip, self, alloc::vec![count])
    }

    pub fn count(self) -> Self {
        Expr::call(QueryMethod::Count, self, Vec::new())
    }

    pub fn count_where(self, param: impl Into<String>, body: Expr) -> Self {
        Expr::call(QueryMethod::Count, self, alloc::vec![Expr::lambda(param, body)])
    }

    pub fn sum(self) -> Self {
        Expr::call(QueryMethod::Sum, self, Vec::new())
    }

    pub fn sum_of(self, param: impl Into<String>, selector: Expr) -> Self {
        Expr::call(QueryMethod::Sum, self, alloc::vec![Expr::lambda(param, selector)])
    }

    pub fn average(self) -> Self {
        Expr::call(QueryMethod::Average, self, Vec::new())
    }

    pub fn average_of(self, param: impl Into<String>, selector: Expr) -> Self {
        Expr::call(
            QueryMethod::Average,
            self,
            alloc::vec![Expr::lambda(param, selector)],
        )
    }

    pub fn min(self) -> Self {
        Expr::call(QueryMethod::Min, self, Vec::new())
    }

    pub fn min_of(self, param: impl Into<String>, selector: Expr) -> Self {
        Expr::call(QueryMethod::Min, self, alloc::vec![Expr::lambda(param, selector)])
    }

    pub fn max(self) -> Self {
        Expr::call(QueryMethod::Max, self, Vec::new())
    }

    pub fn max_of(self, param: impl Into<String>, selector: Expr) -> Self {
        Expr::call(QueryMethod::Max, self, alloc::vec![Expr::lambda(param, selector)])
    }

    pub fn any(self) -> Self {
        Expr::call(QueryMethod::Any, self, Vec::new())
    }

    pub fn any_where(self, param: impl Into<String>, body: Expr) -> Self {
        Expr::call(QueryMethod::Any, self, alloc::vec![Expr::lambda(param, body)])
    }

    pub fn all_where(self, param: impl Into<String>, body: Expr) -> Self {
        Expr::call(QueryMethod::All, self, alloc::vec![Expr::lambda(param, body)])
    }

    pub fn first(self) -> Self {
        Expr::call(QueryMethod::First, self, Vec::new())
    }

    pub fn first_or_default(self) -> Self {
        Expr::call(QueryMethod::FirstOrDefault, self, Vec::new())
    }

    pub fn first_where(self, param: impl Into<String>, body: Expr) -> Self {
        Expr::call(QueryMethod::First, self, alloc::vec![Expr::lambda(param, body)])
    }

    pub fn single(self) -> Self {
        Expr::call(QueryMethod::Single, self, Vec::new())
    }

    pub fn single_or_default(self) -> Self {
        Expr::call(QueryMethod::SingleOrDefault, self, Vec::new())
    }

    pub fn single_where(self, param: impl Into<String>, body: Expr) -> Self {
        Expr::call(QueryMethod::Single, self, alloc::vec![Expr::lambda(param, body)])
    }
}
