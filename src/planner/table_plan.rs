//! A table source being planned, plus its pending join links.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{ColumnName, Expr};
use crate::planner::PlanNode;

static NEXT_PLAN_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle of a [`TablePlan`]. Unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanId(u64);

impl PlanId {
    fn next() -> Self {
        PlanId(NEXT_PLAN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// A pending explicit join with another plan of the same set.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinLink {
    pub target: PlanId,
    pub join_type: JoinType,
    pub on: Option<Expr>,
}

/// One table source (or the merge of several) inside a [`TableSetPlan`].
///
/// For `L <type> JOIN R ON c` the sources are linked as `L.right = R` and
/// `R.left = L`, both carrying the same type and condition.
///
/// [`TableSetPlan`]: crate::planner::TableSetPlan
#[derive(Debug)]
pub struct TablePlan {
    pub(crate) id: PlanId,
    pub(crate) executable: PlanNode,
    pub(crate) columns: Vec<ColumnName>,
    pub(crate) unique_keys: Vec<String>,
    pub(crate) left: Option<JoinLink>,
    pub(crate) right: Option<JoinLink>,
    pub(crate) touched: bool,
}

impl TablePlan {
    pub fn new(executable: PlanNode, columns: Vec<ColumnName>, unique_keys: Vec<String>) -> Self {
        Self {
            id: PlanId::next(),
            executable,
            columns,
            unique_keys,
            left: None,
            right: None,
            touched: false,
        }
    }

    /// A base table: a `Source` node exposing `table.column` for each column,
    /// keyed by the table name.
    pub fn for_table(table: &str, columns: &[&str]) -> Self {
        let columns = columns
            .iter()
            .map(|c| ColumnName::qualified(table, *c))
            .collect();
        Self::new(PlanNode::source(table), columns, vec![table.to_string()])
    }

    pub fn id(&self) -> PlanId {
        self.id
    }

    pub fn executable(&self) -> &PlanNode {
        &self.executable
    }

    pub fn into_executable(self) -> PlanNode {
        self.executable
    }

    pub fn columns(&self) -> &[ColumnName] {
        &self.columns
    }

    pub fn unique_keys(&self) -> &[String] {
        &self.unique_keys
    }

    pub fn left(&self) -> Option<&JoinLink> {
        self.left.as_ref()
    }

    pub fn right(&self) -> Option<&JoinLink> {
        self.right.as_ref()
    }

    pub fn left_target(&self) -> Option<PlanId> {
        self.left.as_ref().map(|l| l.target)
    }

    pub fn right_target(&self) -> Option<PlanId> {
        self.right.as_ref().map(|l| l.target)
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn contains_column(&self, name: &ColumnName) -> bool {
        self.columns.iter().any(|c| name.matches(c))
    }

    pub fn contains_unique_key(&self, key: &str) -> bool {
        self.unique_keys.iter().any(|k| k == key)
    }

    /// Whether `other` is this plan's left or right join partner.
    pub fn is_linked_to(&self, other: PlanId) -> bool {
        self.left_target() == Some(other) || self.right_target() == Some(other)
    }

    /// The partner of a pending outer join on which this plan supplies the
    /// null-padded side, if any.
    pub fn outer_join_dependency(&self) -> Option<PlanId> {
        match (&self.left, &self.right) {
            (Some(link), _) if matches!(link.join_type, JoinType::Left | JoinType::Full) => {
                Some(link.target)
            }
            (_, Some(link)) if matches!(link.join_type, JoinType::Right | JoinType::Full) => {
                Some(link.target)
            }
            _ => None,
        }
    }

    pub fn replace_executable(&mut self, node: PlanNode) {
        self.executable = node;
        self.touched = true;
    }

    /// Wrap the executable without counting as a change.
    pub(crate) fn wrap_untouched(&mut self, wrap: impl FnOnce(PlanNode) -> PlanNode) {
        let node = std::mem::replace(&mut self.executable, PlanNode::source(""));
        self.executable = wrap(node);
    }

    /// Wrap the executable through `wrap`, marking the plan touched.
    pub fn update_executable(&mut self, wrap: impl FnOnce(PlanNode) -> PlanNode) {
        self.wrap_untouched(wrap);
        self.touched = true;
    }

    pub fn set_left_join(&mut self, other: PlanId, join_type: JoinType, on: Option<Expr>) {
        self.left = Some(JoinLink {
            target: other,
            join_type,
            on,
        });
    }

    pub fn set_right_join(&mut self, other: PlanId, join_type: JoinType, on: Option<Expr>) {
        self.right = Some(JoinLink {
            target: other,
            join_type,
            on,
        });
    }

    /// Point any link aimed at one of `from` to `to` instead.
    pub(crate) fn retarget_links(&mut self, from: &[PlanId], to: PlanId) {
        for link in [&mut self.left, &mut self.right].into_iter().flatten() {
            if from.contains(&link.target) {
                link.target = to;
            }
        }
    }

    /// Deep copy under a fresh handle, with no links and not touched.
    ///
    /// Links cannot survive a copy on their own; the owning set re-links
    /// copies by position (see `TableSetPlan::copy`).
    pub fn clone_detached(&self) -> TablePlan {
        TablePlan {
            id: PlanId::next(),
            executable: self.executable.clone(),
            columns: self.columns.clone(),
            unique_keys: self.unique_keys.clone(),
            left: None,
            right: None,
            touched: false,
        }
    }

    /// A new plan exposing `left`'s columns and keys followed by `right`'s,
    /// whose executable is built from the two input executables.
    ///
    /// The result has no links; the owning set decides which links survive.
    pub fn concat(
        left: TablePlan,
        right: TablePlan,
        build: impl FnOnce(PlanNode, PlanNode) -> PlanNode,
    ) -> TablePlan {
        let mut columns = left.columns;
        columns.extend(right.columns);

        let mut unique_keys = left.unique_keys;
        unique_keys.extend(right.unique_keys);

        let mut merged = TablePlan::new(build(left.executable, right.executable), columns, unique_keys);
        merged.touched = true;
        merged
    }
}
