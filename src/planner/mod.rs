//! Join and predicate planner - turns a filter over linked table sources
//! into a single executable plan tree.
//!
//! Planning happens in one pass over a [`TableSetPlan`]:
//! 1. Classification: the filter is split into conjuncts and each one is
//!    turned into an [`ExpressionPlan`] with a fixed optimize factor.
//! 2. Ordering: expression plans run in ascending factor order, each one
//!    replacing or merging table plans in the set.
//! 3. Join resolution: whatever sources are left are joined, resolving
//!    explicit (outer) join links first where they clash.

mod classify;
pub mod context;
pub mod expression_plan;
pub mod link_graph;
pub mod node;
pub mod table_plan;
pub mod table_set;

pub use context::{MarkerGenerator, PlanContext};
pub use expression_plan::{ExpressionPlan, PatternPlan, SingleReferencePlan};
pub use node::PlanNode;
pub use table_plan::{JoinLink, JoinType, PlanId, TablePlan};
pub use table_set::{JoinClash, TableSetPlan};

use crate::config::PlannerSettings;
use crate::model::{ColumnName, Expr};
use thiserror::Error;

/// Errors that can occur during planning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Unable to find any table that references {0}")]
    UnresolvedColumn(ColumnName),

    #[error("Column {column} is ambiguous: {count} table plans expose it")]
    AmbiguousColumn { column: ColumnName, count: usize },

    #[error("Unable to find any table plan referenced by key {0}")]
    UnknownUniqueKey(String),

    #[error("Table plan {0} is not part of this set")]
    DanglingLink(PlanId),

    #[error("Plans {left} and {right} can not be naturally joined: their {side} join plans clash")]
    JoinClash {
        left: PlanId,
        right: PlanId,
        side: &'static str,
    },

    #[error("Join type ({0:?}) is not supported")]
    UnsupportedJoinType(JoinType),

    #[error("OR branches expose different columns: expected {expected:?}, found {found:?}")]
    UnionColumnMismatch {
        expected: Vec<ColumnName>,
        found: Vec<ColumnName>,
    },

    #[error("Join links are contradictory: {0}")]
    ContradictoryLinks(String),

    #[error("Join link graph contains a cycle")]
    CyclicJoinGraph,

    #[error("The table set has no table plans")]
    EmptyTableSet,

    #[error("The set has not a single table (found {0})")]
    NotSingleTable(usize),

    #[error("Malformed expression: {0}")]
    MalformedExpression(String),
}

/// Broad class of a [`PlanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A column or key could not be attributed to exactly one table plan.
    Resolution,
    /// The join-link graph or the table set is inconsistent.
    Structural,
    /// The expression does not have the shape its operator requires.
    Malformed,
}

impl PlanError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PlanError::UnresolvedColumn(_)
            | PlanError::AmbiguousColumn { .. }
            | PlanError::UnknownUniqueKey(_) => ErrorCategory::Resolution,
            PlanError::MalformedExpression(_) => ErrorCategory::Malformed,
            PlanError::DanglingLink(_)
            | PlanError::JoinClash { .. }
            | PlanError::UnsupportedJoinType(_)
            | PlanError::ContradictoryLinks(_)
            | PlanError::UnionColumnMismatch { .. }
            | PlanError::CyclicJoinGraph
            | PlanError::EmptyTableSet
            | PlanError::NotSingleTable(_) => ErrorCategory::Structural,
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Main entry point for planning.
#[derive(Debug, Clone, Default)]
pub struct QueryPlanner {
    settings: PlannerSettings,
}

impl QueryPlanner {
    pub fn new(settings: PlannerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    /// Plan `filter` over `tables` and return the single merged table plan.
    ///
    /// Every call gets its own [`PlanContext`], so marker names and cache ids
    /// restart for each run.
    pub fn plan(&self, tables: TableSetPlan, filter: Option<&Expr>) -> PlanResult<TablePlan> {
        let mut ctx = PlanContext::new(&self.settings);
        if self.settings.planner.validate_links {
            link_graph::validate(&tables)?;
        }

        tracing::debug!(
            tables = tables.len(),
            filter = %filter.map(|f| f.to_string()).unwrap_or_default(),
            "planning filter"
        );

        tables.plan(filter, &mut ctx)
    }
}
