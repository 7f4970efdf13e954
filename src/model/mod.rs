//! Input model: column names and the filter expression tree.

pub mod column;
pub mod expr;

pub use column::ColumnName;
pub use expr::{
    BinaryOp, CorrelatedReference, Expr, ExprCategory, Literal, MatchOp, Quantifier, SubQuery,
    UnaryOp,
};
