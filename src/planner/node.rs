//! Executable plan nodes assembled by the planner.
//!
//! The planner only builds these; it never looks inside a node once it has
//! been wrapped or merged. Execution lives elsewhere.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{BinaryOp, ColumnName, Expr, MatchOp, Quantifier};

/// Executable plan node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    /// Rows of a base table source
    Source { name: String },

    /// Cartesian product of two inputs
    NaturalJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },

    /// Join where `column` (from `left`) is compared against an expression
    /// over `right`
    Join {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        column: ColumnName,
        op: BinaryOp,
        right_expr: Expr,
    },

    /// Adds back rows of the cache-marked input named `mark` that found no
    /// match in `input`, padded with nulls
    OuterJoin { input: Box<PlanNode>, mark: String },

    /// Set union of two inputs exposing the same columns, matched by name
    LogicalUnion {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },

    /// Rows of `input` with their columns reordered to `columns`
    Project {
        input: Box<PlanNode>,
        columns: Vec<ColumnName>,
    },

    /// Evaluate `input` once and share the result between all copies with the same id
    Cache { input: Box<PlanNode>, id: u64 },

    /// Remember the rows of `input` under `mark` for a later outer join
    CacheMark { input: Box<PlanNode>, mark: String },

    /// Keep all rows when the constant predicate holds, none otherwise
    ConstantSelect {
        input: Box<PlanNode>,
        predicate: Expr,
    },

    /// `column <op> value` where value holds no column reference
    SimpleSelect {
        input: Box<PlanNode>,
        column: ColumnName,
        op: BinaryOp,
        value: Expr,
    },

    /// `column [NOT] LIKE pattern [ESCAPE escape]`
    SimplePatternSelect {
        input: Box<PlanNode>,
        column: ColumnName,
        op: MatchOp,
        pattern: Expr,
        escape: Option<Expr>,
    },

    /// Row-by-row evaluation of an arbitrary predicate
    ExhaustiveSelect {
        input: Box<PlanNode>,
        predicate: Expr,
    },

    /// `columns <op> ANY|ALL (sub_query)` for a non-correlated sub-query
    NonCorrelatedAnyAll {
        input: Box<PlanNode>,
        sub_query: Box<PlanNode>,
        columns: Vec<ColumnName>,
        op: BinaryOp,
        quantifier: Quantifier,
    },
}

impl PlanNode {
    pub fn source(name: impl Into<String>) -> Self {
        PlanNode::Source { name: name.into() }
    }

    pub fn natural_join(left: PlanNode, right: PlanNode) -> Self {
        PlanNode::NaturalJoin {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn join(
        left: PlanNode,
        right: PlanNode,
        column: ColumnName,
        op: BinaryOp,
        right_expr: Expr,
    ) -> Self {
        PlanNode::Join {
            left: Box::new(left),
            right: Box::new(right),
            column,
            op,
            right_expr,
        }
    }

    pub fn outer_join(input: PlanNode, mark: impl Into<String>) -> Self {
        PlanNode::OuterJoin {
            input: Box::new(input),
            mark: mark.into(),
        }
    }

    pub fn logical_union(left: PlanNode, right: PlanNode) -> Self {
        PlanNode::LogicalUnion {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn project(input: PlanNode, columns: Vec<ColumnName>) -> Self {
        PlanNode::Project {
            input: Box::new(input),
            columns,
        }
    }

    pub fn cache(input: PlanNode, id: u64) -> Self {
        PlanNode::Cache {
            input: Box::new(input),
            id,
        }
    }

    pub fn cache_mark(input: PlanNode, mark: impl Into<String>) -> Self {
        PlanNode::CacheMark {
            input: Box::new(input),
            mark: mark.into(),
        }
    }

    pub fn constant_select(input: PlanNode, predicate: Expr) -> Self {
        PlanNode::ConstantSelect {
            input: Box::new(input),
            predicate,
        }
    }

    pub fn simple_select(input: PlanNode, column: ColumnName, op: BinaryOp, value: Expr) -> Self {
        PlanNode::SimpleSelect {
            input: Box::new(input),
            column,
            op,
            value,
        }
    }

    pub fn simple_pattern_select(
        input: PlanNode,
        column: ColumnName,
        op: MatchOp,
        pattern: Expr,
        escape: Option<Expr>,
    ) -> Self {
        PlanNode::SimplePatternSelect {
            input: Box::new(input),
            column,
            op,
            pattern,
            escape,
        }
    }

    pub fn exhaustive_select(input: PlanNode, predicate: Expr) -> Self {
        PlanNode::ExhaustiveSelect {
            input: Box::new(input),
            predicate,
        }
    }

    pub fn non_correlated_any_all(
        input: PlanNode,
        sub_query: PlanNode,
        columns: Vec<ColumnName>,
        op: BinaryOp,
        quantifier: Quantifier,
    ) -> Self {
        PlanNode::NonCorrelatedAnyAll {
            input: Box::new(input),
            sub_query: Box::new(sub_query),
            columns,
            op,
            quantifier,
        }
    }

    /// Whether this node is a cache wrapper.
    pub fn is_cache(&self) -> bool {
        matches!(self, PlanNode::Cache { .. })
    }

    /// The input of a root `Cache` node, or the node itself.
    pub fn without_cache(self) -> PlanNode {
        match self {
            PlanNode::Cache { input, .. } => *input,
            other => other,
        }
    }

    /// Direct inputs, left to right.
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Source { .. } => vec![],
            PlanNode::NaturalJoin { left, right }
            | PlanNode::Join { left, right, .. }
            | PlanNode::LogicalUnion { left, right } => vec![left.as_ref(), right.as_ref()],
            PlanNode::NonCorrelatedAnyAll {
                input, sub_query, ..
            } => vec![input.as_ref(), sub_query.as_ref()],
            PlanNode::OuterJoin { input, .. }
            | PlanNode::Project { input, .. }
            | PlanNode::Cache { input, .. }
            | PlanNode::CacheMark { input, .. }
            | PlanNode::ConstantSelect { input, .. }
            | PlanNode::SimpleSelect { input, .. }
            | PlanNode::SimplePatternSelect { input, .. }
            | PlanNode::ExhaustiveSelect { input, .. } => vec![input.as_ref()],
        }
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PlanNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Number of nodes in this tree matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&PlanNode) -> bool) -> usize {
        let mut n = 0;
        self.walk(&mut |node| {
            if predicate(node) {
                n += 1;
            }
        });
        n
    }

    /// One-line label used by [`PlanNode::explain`].
    pub fn label(&self) -> String {
        match self {
            PlanNode::Source { name } => format!("Source {}", name),
            PlanNode::NaturalJoin { .. } => "NaturalJoin".to_string(),
            PlanNode::Join {
                column,
                op,
                right_expr,
                ..
            } => format!("Join {} {} {}", column, op, right_expr),
            PlanNode::OuterJoin { mark, .. } => format!("OuterJoin mark={}", mark),
            PlanNode::LogicalUnion { .. } => "LogicalUnion".to_string(),
            PlanNode::Project { columns, .. } => {
                let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
                format!("Project {}", columns.join(", "))
            }
            PlanNode::Cache { id, .. } => format!("Cache id={}", id),
            PlanNode::CacheMark { mark, .. } => format!("CacheMark mark={}", mark),
            PlanNode::ConstantSelect { predicate, .. } => format!("ConstantSelect {}", predicate),
            PlanNode::SimpleSelect {
                column, op, value, ..
            } => format!("SimpleSelect {} {} {}", column, op, value),
            PlanNode::SimplePatternSelect {
                column,
                op,
                pattern,
                escape,
                ..
            } => match escape {
                Some(escape) => format!(
                    "SimplePatternSelect {} {} {} ESCAPE {}",
                    column, op, pattern, escape
                ),
                None => format!("SimplePatternSelect {} {} {}", column, op, pattern),
            },
            PlanNode::ExhaustiveSelect { predicate, .. } => {
                format!("ExhaustiveSelect {}", predicate)
            }
            PlanNode::NonCorrelatedAnyAll {
                columns,
                op,
                quantifier,
                ..
            } => {
                let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
                format!(
                    "NonCorrelatedAnyAll ({}) {} {}",
                    columns.join(", "),
                    op,
                    quantifier
                )
            }
        }
    }

    /// Indented tree, one node per line, children two spaces deeper.
    pub fn explain(&self) -> String {
        let mut lines = Vec::new();
        self.explain_into(0, &mut lines);
        lines.join("\n")
    }

    fn explain_into(&self, depth: usize, lines: &mut Vec<String>) {
        lines.push(format!("{}{}", "  ".repeat(depth), self.label()));
        for child in self.children() {
            child.explain_into(depth + 1, lines);
        }
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain())
    }
}
