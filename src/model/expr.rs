//! Filter expression AST consumed by the planner.
//!
//! Expressions arrive already resolved and typed. The planner only asks
//! structural questions: what category of operator sits at the root, which
//! free columns are referenced, and whether a nested query is involved.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::column::ColumnName;
use crate::planner::PlanNode;

// =============================================================================
// Core Expression Type
// =============================================================================

/// Boolean or scalar expression over table columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value
    Constant(Literal),

    /// Free column reference
    Reference(ColumnName),

    /// Unary operation
    UnaryOp { op: UnaryOp, expr: Box<Expr> },

    /// Binary operation (arithmetic, comparison or logical)
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// `left [NOT] LIKE pattern [ESCAPE escape]`
    StringMatch {
        op: MatchOp,
        left: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
    },

    /// Scalar or aggregate function call
    Function { name: String, args: Vec<Expr> },

    /// Nested query
    Query(Box<SubQuery>),

    /// `left <op> ANY|ALL right`, where `right` is usually a nested query
    Quantified {
        quantifier: Quantifier,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// A nested query: its already-built plan plus the outer columns it reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    pub plan: PlanNode,
    pub correlated: Vec<CorrelatedReference>,
}

/// A column of an enclosing query referenced from inside a nested query.
///
/// `query_level` counts how many query boundaries separate the reference
/// from the query that owns the column, seen from the nested plan: 1 means
/// the immediately enclosing query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelatedReference {
    pub name: ColumnName,
    pub query_level: u32,
}

impl SubQuery {
    pub fn new(plan: PlanNode) -> Self {
        Self {
            plan,
            correlated: Vec::new(),
        }
    }

    pub fn correlated_with(mut self, name: impl Into<ColumnName>, query_level: u32) -> Self {
        self.correlated.push(CorrelatedReference {
            name: name.into(),
            query_level,
        });
        self
    }

    /// Correlated references that point exactly `level` queries outward.
    pub fn correlated_references(&self, level: u32) -> Vec<&CorrelatedReference> {
        self.correlated
            .iter()
            .filter(|c| c.query_level == level)
            .collect()
    }
}

/// Structural category of an expression's root operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprCategory {
    Constant,
    Reference,
    Unary,
    Arithmetic,
    Comparison,
    Logical,
    Pattern,
    Function,
    SubQuery,
    Quantified,
}

impl Expr {
    /// Column reference, parsing `table.column`.
    pub fn column(name: &str) -> Self {
        Expr::Reference(ColumnName::parse(name))
    }

    /// Qualified column reference (table.column).
    pub fn qualified_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Reference(ColumnName::qualified(table, column))
    }

    pub fn int(value: i64) -> Self {
        Expr::Constant(Literal::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Expr::Constant(Literal::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Constant(Literal::String(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Expr::Constant(Literal::Bool(value))
    }

    pub fn null() -> Self {
        Expr::Constant(Literal::Null)
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn sub_query(query: SubQuery) -> Self {
        Expr::Query(Box::new(query))
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::UnaryOp {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn quantified(left: Expr, op: BinaryOp, quantifier: Quantifier, right: Expr) -> Self {
        Expr::Quantified {
            quantifier,
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    // === Convenience methods for common operations ===

    /// expr = other
    pub fn eq(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Eq, other)
    }

    /// expr <> other
    pub fn ne(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Ne, other)
    }

    /// expr < other
    pub fn lt(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Lt, other)
    }

    /// expr > other
    pub fn gt(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Gt, other)
    }

    /// expr <= other
    pub fn lte(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Lte, other)
    }

    /// expr >= other
    pub fn gte(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Gte, other)
    }

    /// expr AND other
    pub fn and(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::And, other)
    }

    /// expr OR other
    pub fn or(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Or, other)
    }

    /// expr + other
    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Add, other)
    }

    /// expr - other
    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Sub, other)
    }

    /// expr * other
    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Mul, other)
    }

    /// NOT expr
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::unary(UnaryOp::Not, self)
    }

    /// expr IS NULL
    pub fn is_null(self) -> Self {
        Self::unary(UnaryOp::IsNull, self)
    }

    /// expr LIKE pattern
    pub fn like(self, pattern: Expr) -> Self {
        Expr::StringMatch {
            op: MatchOp::Like,
            left: Box::new(self),
            pattern: Box::new(pattern),
            escape: None,
        }
    }

    /// expr NOT LIKE pattern
    pub fn not_like(self, pattern: Expr) -> Self {
        Expr::StringMatch {
            op: MatchOp::NotLike,
            left: Box::new(self),
            pattern: Box::new(pattern),
            escape: None,
        }
    }

    /// Attach an ESCAPE clause to a pattern match; other expressions are returned unchanged.
    pub fn escape(self, escape: Expr) -> Self {
        match self {
            Expr::StringMatch {
                op, left, pattern, ..
            } => Expr::StringMatch {
                op,
                left,
                pattern,
                escape: Some(Box::new(escape)),
            },
            other => other,
        }
    }

    /// expr <op> ANY (query)
    pub fn any(self, op: BinaryOp, query: SubQuery) -> Self {
        Self::quantified(self, op, Quantifier::Any, Expr::sub_query(query))
    }

    /// expr <op> ALL (query)
    pub fn all(self, op: BinaryOp, query: SubQuery) -> Self {
        Self::quantified(self, op, Quantifier::All, Expr::sub_query(query))
    }

    // === Structural queries used by the planner ===

    pub fn category(&self) -> ExprCategory {
        match self {
            Expr::Constant(_) => ExprCategory::Constant,
            Expr::Reference(_) => ExprCategory::Reference,
            Expr::UnaryOp { .. } => ExprCategory::Unary,
            Expr::BinaryOp { op, .. } if op.is_logical() => ExprCategory::Logical,
            Expr::BinaryOp { op, .. } if op.is_comparison() => ExprCategory::Comparison,
            Expr::BinaryOp { .. } => ExprCategory::Arithmetic,
            Expr::StringMatch { .. } => ExprCategory::Pattern,
            Expr::Function { .. } => ExprCategory::Function,
            Expr::Query(_) => ExprCategory::SubQuery,
            Expr::Quantified { .. } => ExprCategory::Quantified,
        }
    }

    pub fn is_logical(&self) -> bool {
        self.category() == ExprCategory::Logical
    }

    pub fn is_pattern(&self) -> bool {
        self.category() == ExprCategory::Pattern
    }

    /// Whether the root operator takes exactly one operand.
    pub fn is_unary(&self) -> bool {
        matches!(self, Expr::UnaryOp { .. })
    }

    /// Whether the root operator takes exactly two operands.
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            Expr::BinaryOp { .. } | Expr::StringMatch { .. } | Expr::Quantified { .. }
        )
    }

    /// Whether this is the literal TRUE.
    pub fn is_true(&self) -> bool {
        matches!(self, Expr::Constant(Literal::Bool(true)))
    }

    pub fn as_reference(&self) -> Option<&ColumnName> {
        match self {
            Expr::Reference(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_sub_query(&self) -> Option<&SubQuery> {
        match self {
            Expr::Query(query) => Some(query),
            _ => None,
        }
    }

    /// Distinct free column references, in order of first appearance.
    ///
    /// References inside nested queries belong to those queries and are not
    /// reported here; see [`Expr::correlated_references`].
    pub fn discover_references(&self) -> Vec<ColumnName> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references(&self, refs: &mut Vec<ColumnName>) {
        match self {
            Expr::Constant(_) | Expr::Query(_) => {}
            Expr::Reference(name) => {
                if !refs.contains(name) {
                    refs.push(name.clone());
                }
            }
            Expr::UnaryOp { expr, .. } => expr.collect_references(refs),
            Expr::BinaryOp { left, right, .. } | Expr::Quantified { left, right, .. } => {
                left.collect_references(refs);
                right.collect_references(refs);
            }
            Expr::StringMatch {
                left,
                pattern,
                escape,
                ..
            } => {
                left.collect_references(refs);
                pattern.collect_references(refs);
                if let Some(escape) = escape {
                    escape.collect_references(refs);
                }
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
        }
    }

    /// Whether a nested query appears anywhere in this expression.
    pub fn has_sub_query(&self) -> bool {
        match self {
            Expr::Query(_) => true,
            Expr::Constant(_) | Expr::Reference(_) => false,
            Expr::UnaryOp { expr, .. } => expr.has_sub_query(),
            Expr::BinaryOp { left, right, .. } | Expr::Quantified { left, right, .. } => {
                left.has_sub_query() || right.has_sub_query()
            }
            Expr::StringMatch {
                left,
                pattern,
                escape,
                ..
            } => {
                left.has_sub_query()
                    || pattern.has_sub_query()
                    || escape.as_ref().is_some_and(|e| e.has_sub_query())
            }
            Expr::Function { args, .. } => args.iter().any(Expr::has_sub_query),
        }
    }

    /// Correlated references of nested queries that resolve `level` queries
    /// outward from this expression (0 = the query this expression filters).
    pub fn correlated_references(&self, level: u32) -> Vec<CorrelatedReference> {
        let mut found = Vec::new();
        self.collect_correlated(level, &mut found);
        found
    }

    fn collect_correlated(&self, level: u32, found: &mut Vec<CorrelatedReference>) {
        match self {
            Expr::Query(query) => {
                for c in query.correlated_references(level + 1) {
                    if !found.contains(c) {
                        found.push(c.clone());
                    }
                }
            }
            Expr::Constant(_) | Expr::Reference(_) => {}
            Expr::UnaryOp { expr, .. } => expr.collect_correlated(level, found),
            Expr::BinaryOp { left, right, .. } | Expr::Quantified { left, right, .. } => {
                left.collect_correlated(level, found);
                right.collect_correlated(level, found);
            }
            Expr::StringMatch {
                left,
                pattern,
                escape,
                ..
            } => {
                left.collect_correlated(level, found);
                pattern.collect_correlated(level, found);
                if let Some(escape) = escape {
                    escape.collect_correlated(level, found);
                }
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_correlated(level, found);
                }
            }
        }
    }

    /// Flatten a tree of ANDs into its conjuncts, left to right.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            Expr::BinaryOp {
                left,
                op: BinaryOp::And,
                right,
            } => {
                left.collect_conjuncts(out);
                right.collect_conjuncts(out);
            }
            other => out.push(other),
        }
    }
}

// =============================================================================
// Literal Values
// =============================================================================

/// Literal values in expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

// =============================================================================
// Operators
// =============================================================================

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    // Logical
    And,
    Or,

    // String
    Concat,
}

impl BinaryOp {
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Lte
                | BinaryOp::Gte
        )
    }

    pub fn is_arithmetic(self) -> bool {
        !self.is_logical() && !self.is_comparison()
    }

    /// The operator that keeps the meaning when both operands swap sides.
    ///
    /// Only comparisons have a reverse; other operators are returned as-is.
    pub fn reverse(self) -> Self {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Lte => BinaryOp::Gte,
            BinaryOp::Gte => BinaryOp::Lte,
            other => other,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Lte => "<=",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Concat => "||",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// NOT expr
    Not,
    /// -expr (negation)
    Neg,
    /// expr IS NULL
    IsNull,
    /// expr IS NOT NULL
    IsNotNull,
}

/// String pattern operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchOp {
    Like,
    NotLike,
}

impl MatchOp {
    pub fn symbol(self) -> &'static str {
        match self {
            MatchOp::Like => "LIKE",
            MatchOp::NotLike => "NOT LIKE",
        }
    }
}

/// Quantifier of a comparison against a set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantifier {
    Any,
    All,
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Any => write!(f, "ANY"),
            Quantifier::All => write!(f, "ALL"),
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Bool(true) => write!(f, "TRUE"),
            Literal::Bool(false) => write!(f, "FALSE"),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Renders nested operators in parentheses.
struct Operand<'a>(&'a Expr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::BinaryOp { .. } | Expr::StringMatch { .. } | Expr::Quantified { .. } => {
                write!(f, "({})", self.0)
            }
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(lit) => write!(f, "{}", lit),
            Expr::Reference(name) => write!(f, "{}", name),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {}", Operand(expr)),
                UnaryOp::Neg => write!(f, "-{}", Operand(expr)),
                UnaryOp::IsNull => write!(f, "{} IS NULL", Operand(expr)),
                UnaryOp::IsNotNull => write!(f, "{} IS NOT NULL", Operand(expr)),
            },
            Expr::BinaryOp { left, op, right } => {
                write!(f, "{} {} {}", Operand(left), op, Operand(right))
            }
            Expr::StringMatch {
                op,
                left,
                pattern,
                escape,
            } => {
                write!(f, "{} {} {}", Operand(left), op, Operand(pattern))?;
                if let Some(escape) = escape {
                    write!(f, " ESCAPE {}", Operand(escape))?;
                }
                Ok(())
            }
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Query(_) => write!(f, "(SUBQUERY)"),
            Expr::Quantified {
                quantifier,
                op,
                left,
                right,
            } => write!(f, "{} {} {} {}", Operand(left), op, quantifier, Operand(right)),
        }
    }
}
