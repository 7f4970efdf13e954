//! The set of table plans a filter is planned over.
//!
//! Every operation here either replaces a table's executable in place or
//! merges two tables into a new one. Merging always shrinks the set, which
//! is what makes join resolution terminate.

use crate::model::{BinaryOp, ColumnName, Expr};
use crate::planner::{
    JoinLink, JoinType, PlanContext, PlanError, PlanId, PlanNode, PlanResult, TablePlan,
};

/// Outcome of checking whether two plans can be joined without breaking
/// their explicit join links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinClash {
    Safe,
    /// Both plans have a pending left join, against different partners.
    LeftClash,
    /// Both plans have a pending right join, against different partners.
    RightClash,
}

/// An ordered collection of table plans.
#[derive(Debug, Default)]
pub struct TableSetPlan {
    tables: Vec<TablePlan>,
    has_joins: bool,
}

impl TableSetPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source table. Does not count as a join.
    pub fn push_source(&mut self, plan: TablePlan) -> PlanId {
        let id = plan.id();
        self.tables.push(plan);
        id
    }

    /// Append a plan produced by merging others.
    pub fn add_table_plan(&mut self, plan: TablePlan) -> PlanId {
        self.has_joins = true;
        self.push_source(plan)
    }

    /// Record `left <join_type> JOIN right ON on` on both sides.
    pub fn join_sources(
        &mut self,
        left: PlanId,
        right: PlanId,
        join_type: JoinType,
        on: Option<Expr>,
    ) -> PlanResult<()> {
        self.require(right)?;
        self.require_mut(left)?
            .set_right_join(right, join_type, on.clone());
        self.require_mut(right)?.set_left_join(left, join_type, on);
        Ok(())
    }

    /// [`join_sources`](Self::join_sources), finding both sides by unique key.
    pub fn join_sources_by_key(
        &mut self,
        left_key: &str,
        right_key: &str,
        join_type: JoinType,
        on: Option<Expr>,
    ) -> PlanResult<()> {
        let left = self.find_table_with_unique_key(left_key)?;
        let right = self.find_table_with_unique_key(right_key)?;
        self.join_sources(left, right, join_type, on)
    }

    pub fn tables(&self) -> &[TablePlan] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Whether any plan of this set was produced by a merge.
    pub fn has_joins(&self) -> bool {
        self.has_joins
    }

    pub fn get(&self, id: PlanId) -> Option<&TablePlan> {
        self.tables.iter().find(|t| t.id() == id)
    }

    pub fn get_mut(&mut self, id: PlanId) -> Option<&mut TablePlan> {
        self.tables.iter_mut().find(|t| t.id() == id)
    }

    pub fn index_of(&self, id: PlanId) -> Option<usize> {
        self.tables.iter().position(|t| t.id() == id)
    }

    pub(crate) fn require(&self, id: PlanId) -> PlanResult<&TablePlan> {
        self.get(id).ok_or(PlanError::DanglingLink(id))
    }

    pub(crate) fn require_mut(&mut self, id: PlanId) -> PlanResult<&mut TablePlan> {
        self.get_mut(id).ok_or(PlanError::DanglingLink(id))
    }

    fn take(&mut self, id: PlanId) -> PlanResult<TablePlan> {
        let index = self.index_of(id).ok_or(PlanError::DanglingLink(id))?;
        Ok(self.tables.remove(index))
    }

    /// The one table plan exposing `column`.
    pub fn find_table_owning(&self, column: &ColumnName) -> PlanResult<PlanId> {
        let mut owners = self.tables.iter().filter(|t| t.contains_column(column));
        let first = owners
            .next()
            .ok_or_else(|| PlanError::UnresolvedColumn(column.clone()))?;
        let others = owners.count();
        if others > 0 {
            return Err(PlanError::AmbiguousColumn {
                column: column.clone(),
                count: others + 1,
            });
        }
        Ok(first.id())
    }

    /// The table plan owning every one of `columns`, or `None` when they
    /// are spread over several plans (or when there are none).
    pub fn find_common_table(&self, columns: &[ColumnName]) -> PlanResult<Option<PlanId>> {
        let Some((first, rest)) = columns.split_first() else {
            return Ok(None);
        };
        let owner = self.find_table_owning(first)?;
        for column in rest {
            if self.find_table_owning(column)? != owner {
                return Ok(None);
            }
        }
        Ok(Some(owner))
    }

    pub fn find_table_with_unique_key(&self, key: &str) -> PlanResult<PlanId> {
        self.tables
            .iter()
            .find(|t| t.contains_unique_key(key))
            .map(TablePlan::id)
            .ok_or_else(|| PlanError::UnknownUniqueKey(key.to_string()))
    }

    /// The only plan of the set.
    pub fn single_plan(&self) -> PlanResult<&TablePlan> {
        match self.tables.as_slice() {
            [only] => Ok(only),
            tables => Err(PlanError::NotSingleTable(tables.len())),
        }
    }

    /// Wrap every plan not already cached in a fresh `Cache` node.
    ///
    /// Returns, per position, whether a cache was added. Caching does not
    /// mark a plan touched.
    pub fn set_cache(&mut self, ctx: &mut PlanContext) -> Vec<bool> {
        self.tables
            .iter_mut()
            .map(|table| {
                if table.executable().is_cache() {
                    return false;
                }
                let id = ctx.next_cache_id();
                table.wrap_untouched(|node| PlanNode::cache(node, id));
                true
            })
            .collect()
    }

    /// Whether joining `left` and `right` would strand one of their links.
    pub fn can_naturally_join(left: &TablePlan, right: &TablePlan) -> JoinClash {
        if left.is_linked_to(right.id()) || right.is_linked_to(left.id()) {
            return JoinClash::Safe;
        }
        match (left.left_target(), right.left_target()) {
            (Some(a), Some(b)) if a != b => return JoinClash::LeftClash,
            _ => {}
        }
        match (left.right_target(), right.right_target()) {
            (Some(a), Some(b)) if a != b => JoinClash::RightClash,
            _ => JoinClash::Safe,
        }
    }

    /// Join every plan in `plans` into one, resolving clashes by joining a
    /// plan with its pending partner first.
    ///
    /// Returns `None` for an empty list.
    pub fn join_all_plans(
        &mut self,
        plans: Vec<PlanId>,
        ctx: &mut PlanContext,
    ) -> PlanResult<Option<PlanId>> {
        let mut working = plans;
        while working.len() > 1 {
            let first = working[0];
            let second = working[1];
            let clash = Self::can_naturally_join(self.require(first)?, self.require(second)?);

            let partner = match clash {
                JoinClash::Safe => {
                    if let Some(pending) = self.pending_outer_join(first, second)? {
                        let resolved = self.resolve_outer_dependencies(pending, ctx)?;
                        working.retain(|id| self.get(*id).is_some());
                        working.insert(0, resolved);
                        continue;
                    }
                    second
                }
                JoinClash::LeftClash => self.require(first)?.left_target().ok_or(
                    PlanError::JoinClash {
                        left: first,
                        right: second,
                        side: "left",
                    },
                )?,
                JoinClash::RightClash => self.require(first)?.right_target().ok_or(
                    PlanError::JoinClash {
                        left: first,
                        right: second,
                        side: "right",
                    },
                )?,
            };
            tracing::trace!(%first, %partner, ?clash, remaining = working.len(), "joining plans");

            let merged = self.naturally_join_plans(first, partner, ctx)?;
            working.retain(|id| *id != first && *id != partner);
            working.insert(0, merged);
        }
        Ok(working.first().copied())
    }

    /// The plan of the pair that null-pads an outer join with a plan outside
    /// the pair. Its outer join has to run before anything else joins it.
    fn pending_outer_join(&self, first: PlanId, second: PlanId) -> PlanResult<Option<PlanId>> {
        for (id, other) in [(first, second), (second, first)] {
            let dependency = self.require(id)?.outer_join_dependency();
            if dependency.is_some_and(|partner| partner != other) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Join two plans, honouring their explicit link if they have one.
    ///
    /// Linked plans are joined by planning their ON condition over copies of
    /// both sides. For an outer join the preserved side is cache-marked and
    /// the result wrapped in an `OuterJoin` naming the same mark.
    pub fn naturally_join_plans(
        &mut self,
        first: PlanId,
        second: PlanId,
        ctx: &mut PlanContext,
    ) -> PlanResult<PlanId> {
        let a = self.require(first)?;
        let b = self.require(second)?;

        let linked = match (a.right(), a.left(), b.right(), b.left()) {
            (Some(link), _, _, _) if link.target == second => Some((link, first, second)),
            (_, Some(link), _, _) if link.target == second => Some((link, second, first)),
            (_, _, Some(link), _) if link.target == first => Some((link, second, first)),
            (_, _, _, Some(link)) if link.target == first => Some((link, first, second)),
            _ => None,
        };

        let Some((link, left, right)) = linked else {
            let side = match Self::can_naturally_join(a, b) {
                JoinClash::Safe => {
                    return self.merge_with(first, second, PlanNode::natural_join);
                }
                JoinClash::LeftClash => "left",
                JoinClash::RightClash => "right",
            };
            return Err(PlanError::JoinClash {
                left: first,
                right: second,
                side,
            });
        };
        let JoinLink { join_type, on, .. } = link.clone();

        let marker = match join_type {
            JoinType::Inner => None,
            JoinType::Left => Some((left, ctx.next_marker())),
            JoinType::Right => Some((right, ctx.next_marker())),
            JoinType::Full => return Err(PlanError::UnsupportedJoinType(join_type)),
        };
        if let Some((preserved, mark)) = &marker {
            self.require_mut(*preserved)?
                .update_executable(|node| PlanNode::cache_mark(node, mark.clone()));
        }

        tracing::debug!(%left, %right, ?join_type, on = ?on.as_ref().map(|c| c.to_string()), "joining linked plans");

        let mut nested = TableSetPlan::new();
        nested.add_table_plan(self.require(left)?.clone_detached());
        nested.add_table_plan(self.require(right)?.clone_detached());
        let mut node = nested.logical_evaluate(on.as_ref(), ctx)?;
        if let Some((_, mark)) = marker {
            node = PlanNode::outer_join(node, mark);
        }

        self.merge_tables(left, right, node)
    }

    /// Replace `left` and `right` with one plan executing `node`.
    pub fn merge_tables(&mut self, left: PlanId, right: PlanId, node: PlanNode) -> PlanResult<PlanId> {
        self.merge_with(left, right, |_, _| node)
    }

    /// Replace `left` and `right` with one plan whose executable is built
    /// from theirs.
    ///
    /// The merged plan exposes `left`'s columns then `right`'s, keeps the
    /// links of both that point outside the pair, and every link in the set
    /// aimed at either input now targets it.
    pub(crate) fn merge_with(
        &mut self,
        left: PlanId,
        right: PlanId,
        build: impl FnOnce(PlanNode, PlanNode) -> PlanNode,
    ) -> PlanResult<PlanId> {
        let left_plan = self.take(left)?;
        let right_plan = match self.take(right) {
            Ok(plan) => plan,
            Err(err) => {
                self.tables.push(left_plan);
                return Err(err);
            }
        };

        let pair = [left, right];
        let external = |link: &Option<JoinLink>| link.clone().filter(|l| !pair.contains(&l.target));
        let inherited_left = external(&left_plan.left).or_else(|| external(&right_plan.left));
        let inherited_right = external(&left_plan.right).or_else(|| external(&right_plan.right));

        let mut merged = TablePlan::concat(left_plan, right_plan, build);
        merged.left = inherited_left;
        merged.right = inherited_right;
        let id = merged.id();

        for table in &mut self.tables {
            table.retarget_links(&pair, id);
        }
        tracing::trace!(%left, %right, merged = %id, "merged table plans");
        Ok(self.add_table_plan(merged))
    }

    /// Join every plan of the set into one.
    pub fn natural_join_all(&mut self, ctx: &mut PlanContext) -> PlanResult<PlanId> {
        let ids: Vec<PlanId> = self.tables.iter().map(TablePlan::id).collect();
        self.join_all_plans(ids, ctx)?
            .ok_or(PlanError::EmptyTableSet)
    }

    /// Join all plans owning one of `references` into one plan.
    ///
    /// Any pending outer join on which an owner supplies the null-padded
    /// side is resolved first.
    pub fn join_plans_with_references(
        &mut self,
        references: &[ColumnName],
        ctx: &mut PlanContext,
    ) -> PlanResult<PlanId> {
        if references.is_empty() {
            return self.natural_join_all(ctx);
        }

        for column in references {
            let owner = self.find_table_owning(column)?;
            self.resolve_outer_dependencies(owner, ctx)?;
        }

        let mut owners = Vec::new();
        for column in references {
            let owner = self.find_table_owning(column)?;
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }

        self.join_all_plans(owners, ctx)?
            .ok_or(PlanError::EmptyTableSet)
    }

    /// Join `id` with its outer-join partner until it no longer supplies the
    /// null-padded side of any pending outer join.
    ///
    /// A filter on that side must only see rows after the outer join has
    /// added them.
    pub(crate) fn resolve_outer_dependencies(
        &mut self,
        id: PlanId,
        ctx: &mut PlanContext,
    ) -> PlanResult<PlanId> {
        let mut id = id;
        while let Some(partner) = self.require(id)?.outer_join_dependency() {
            tracing::debug!(plan = %id, %partner, "resolving outer join before filtering");
            id = self.naturally_join_plans(id, partner, ctx)?;
        }
        Ok(id)
    }

    /// Copy every plan under a fresh handle and re-link the copies by
    /// position. The copy has no joins and nothing touched.
    pub fn copy(&self) -> PlanResult<TableSetPlan> {
        let mut copy = TableSetPlan {
            tables: self.tables.iter().map(TablePlan::clone_detached).collect(),
            has_joins: false,
        };

        for (index, table) in self.tables.iter().enumerate() {
            if let Some(link) = table.left() {
                let target = self.copied_id(&copy, link.target)?;
                copy.tables[index].set_left_join(target, link.join_type, link.on.clone());
            }
            if let Some(link) = table.right() {
                let target = self.copied_id(&copy, link.target)?;
                copy.tables[index].set_right_join(target, link.join_type, link.on.clone());
            }
        }
        Ok(copy)
    }

    fn copied_id(&self, copy: &TableSetPlan, original: PlanId) -> PlanResult<PlanId> {
        let index = self
            .index_of(original)
            .ok_or(PlanError::DanglingLink(original))?;
        Ok(copy.tables[index].id())
    }

    /// Apply a filter expression to the set.
    pub fn plan_for_expression(&mut self, expr: &Expr, ctx: &mut PlanContext) -> PlanResult<()> {
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOp::Or,
                right,
            } => self.plan_for_or(left, right, ctx),
            _ => {
                let conjuncts = expr.conjuncts();
                self.plan_for_expressions(&conjuncts, ctx)
            }
        }
    }

    /// Plan each disjunct over its own copy of the set and union the results.
    ///
    /// Positions neither branch touched keep the parent's plan unchanged.
    fn plan_for_or(&mut self, lhs: &Expr, rhs: &Expr, ctx: &mut PlanContext) -> PlanResult<()> {
        let cached = if ctx.cache_or_branches() {
            self.set_cache(ctx)
        } else {
            vec![false; self.tables.len()]
        };

        let mut left = self.copy()?;
        let mut right = self.copy()?;
        left.plan_for_expression(lhs, ctx)?;
        right.plan_for_expression(rhs, ctx)?;

        // A positional union is only sound when it covers at most one table.
        let spread = left
            .tables
            .iter()
            .zip(&right.tables)
            .filter(|(l, r)| l.is_touched() || r.is_touched())
            .count()
            > 1;
        let reshaped = spread || left.len() != right.len() || left.has_joins || right.has_joins;
        if reshaped {
            // Both sides of the union expose the parent's columns, in the parent's order.
            let order: Vec<ColumnName> = self
                .tables
                .iter()
                .flat_map(|t| t.columns().iter().cloned())
                .collect();
            left.natural_join_all(ctx)?;
            right.natural_join_all(ctx)?;
            left.reorder_columns(&order)?;
            right.reorder_columns(&order)?;
        }
        tracing::debug!(
            tables = self.tables.len(),
            reshaped,
            or = %format!("{} OR {}", lhs, rhs),
            "merging OR branches"
        );

        let mut merged = Vec::with_capacity(left.tables.len());
        let pairs = std::mem::take(&mut left.tables)
            .into_iter()
            .zip(std::mem::take(&mut right.tables));
        for (index, (mut table, other)) in pairs.enumerate() {
            if table.is_touched() || other.is_touched() {
                let other = other.into_executable();
                table.update_executable(|node| PlanNode::logical_union(node, other));
            } else if !reshaped {
                if cached[index] {
                    table.wrap_untouched(PlanNode::without_cache);
                }
                table.touched = self.tables[index].is_touched();
            }
            merged.push(table);
        }

        self.tables = merged;
        self.has_joins |= left.has_joins || right.has_joins;
        Ok(())
    }

    /// Make the only plan of the set expose exactly `order`, projecting its
    /// executable when the columns are the same but differently ordered.
    fn reorder_columns(&mut self, order: &[ColumnName]) -> PlanResult<()> {
        let plan = match self.tables.as_mut_slice() {
            [only] => only,
            tables => return Err(PlanError::NotSingleTable(tables.len())),
        };
        if plan.columns.as_slice() == order {
            return Ok(());
        }
        if plan.columns.len() != order.len() || !order.iter().all(|c| plan.columns.contains(c)) {
            return Err(PlanError::UnionColumnMismatch {
                expected: order.to_vec(),
                found: plan.columns.clone(),
            });
        }

        plan.update_executable(|node| PlanNode::project(node, order.to_vec()));
        plan.columns = order.to_vec();
        Ok(())
    }

    /// Apply `expr` (if any) and join everything left into one executable.
    pub fn logical_evaluate(self, expr: Option<&Expr>, ctx: &mut PlanContext) -> PlanResult<PlanNode> {
        Ok(self.plan(expr, ctx)?.into_executable())
    }

    /// Apply `filter` (if any) and join everything left into one plan.
    pub fn plan(mut self, filter: Option<&Expr>, ctx: &mut PlanContext) -> PlanResult<TablePlan> {
        if self.tables.is_empty() {
            return Err(PlanError::EmptyTableSet);
        }
        if let Some(filter) = filter {
            self.plan_for_expression(filter, ctx)?;
        }
        let id = self.natural_join_all(ctx)?;
        self.take(id)
    }
}
