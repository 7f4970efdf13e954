//! Classified filter predicates and how each one changes a table set.

use crate::model::{BinaryOp, ColumnName, Expr, MatchOp, Quantifier, SubQuery};
use crate::planner::{
    JoinClash, PlanContext, PlanError, PlanId, PlanNode, PlanResult, TableSetPlan,
};

/// A predicate on exactly one column reference.
#[derive(Debug, Clone, PartialEq)]
pub enum SingleReferencePlan {
    /// `column <op> value`, where `value` references no column.
    Simple {
        column: ColumnName,
        op: BinaryOp,
        value: Expr,
    },
    /// Any other predicate over `column`.
    Complex { column: ColumnName, expr: Expr },
}

/// A `[NOT] LIKE` predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternPlan {
    /// `column [NOT] LIKE pattern [ESCAPE escape]` with constant pattern and escape.
    Simple {
        column: ColumnName,
        op: MatchOp,
        pattern: Expr,
        escape: Option<Expr>,
    },
    /// Any other pattern match whose references all live in one table plan.
    Complex {
        expr: Expr,
        references: Vec<ColumnName>,
    },
}

/// A classified predicate, ready to be applied to a [`TableSetPlan`].
///
/// Plans are applied in ascending [`optimize_factor`](Self::optimize_factor)
/// order: cheap, selective predicates first, joins and nested logic last.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionPlan {
    /// References no column.
    Constant { expr: Expr },

    SingleReference(SingleReferencePlan),

    Pattern(PatternPlan),

    /// `column <op> ANY|ALL (sub_query)` with a non-correlated sub-query.
    SimpleSubQuery {
        column: ColumnName,
        op: BinaryOp,
        quantifier: Quantifier,
        query: SubQuery,
    },

    /// A comparison across tables with a bare column on at least one side.
    /// `mixed` when the other side is an expression rather than a column.
    StandardJoin { expr: Expr, mixed: bool },

    /// Any other predicate over several tables, evaluated row by row.
    ExhaustiveJoin {
        expr: Expr,
        references: Vec<ColumnName>,
    },

    /// A nested OR. `joinable` when all referencing disjuncts read one table plan.
    SubLogic { expr: Expr, joinable: bool },

    /// A predicate containing a sub-query that cannot use the fast path.
    /// `references` includes the outer columns the sub-query reads.
    ExhaustiveSubQuery {
        expr: Expr,
        references: Vec<ColumnName>,
    },
}

impl ExpressionPlan {
    /// Ordering weight; lower runs earlier.
    pub fn optimize_factor(&self) -> f64 {
        match self {
            ExpressionPlan::Constant { .. } => 0.0,
            ExpressionPlan::SingleReference(SingleReferencePlan::Simple { .. }) => 0.20,
            ExpressionPlan::SingleReference(SingleReferencePlan::Complex { .. }) => 0.22,
            ExpressionPlan::Pattern(PatternPlan::Simple { .. }) => 0.25,
            ExpressionPlan::Pattern(PatternPlan::Complex { .. }) => 0.27,
            ExpressionPlan::SimpleSubQuery { .. } => 0.30,
            ExpressionPlan::SubLogic { joinable: true, .. } => 0.58,
            ExpressionPlan::StandardJoin { mixed: false, .. } => 0.60,
            ExpressionPlan::StandardJoin { mixed: true, .. } => 0.64,
            ExpressionPlan::ExhaustiveJoin { .. } => 0.68,
            ExpressionPlan::SubLogic { joinable: false, .. } => 0.70,
            ExpressionPlan::ExhaustiveSubQuery { .. } => 0.85,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExpressionPlan::Constant { .. } => "constant",
            ExpressionPlan::SingleReference(SingleReferencePlan::Simple { .. }) => "simple single",
            ExpressionPlan::SingleReference(SingleReferencePlan::Complex { .. }) => "complex single",
            ExpressionPlan::Pattern(PatternPlan::Simple { .. }) => "simple pattern",
            ExpressionPlan::Pattern(PatternPlan::Complex { .. }) => "complex pattern",
            ExpressionPlan::SimpleSubQuery { .. } => "simple sub-query",
            ExpressionPlan::StandardJoin { .. } => "standard join",
            ExpressionPlan::ExhaustiveJoin { .. } => "exhaustive join",
            ExpressionPlan::SubLogic { .. } => "sub-logic",
            ExpressionPlan::ExhaustiveSubQuery { .. } => "exhaustive sub-query",
        }
    }

    /// Apply this predicate to `set`.
    pub fn add_to_plan(&self, set: &mut TableSetPlan, ctx: &mut PlanContext) -> PlanResult<()> {
        tracing::trace!(kind = self.kind(), factor = self.optimize_factor(), "applying expression plan");

        match self {
            ExpressionPlan::Constant { expr } => {
                let ids: Vec<PlanId> = set.tables().iter().map(|t| t.id()).collect();
                for id in ids {
                    set.require_mut(id)?
                        .update_executable(|node| PlanNode::constant_select(node, expr.clone()));
                }
                Ok(())
            }

            ExpressionPlan::SingleReference(SingleReferencePlan::Simple { column, op, value }) => {
                let owner = owner_of(set, column, ctx)?;
                set.require_mut(owner)?.update_executable(|node| {
                    PlanNode::simple_select(node, column.clone(), *op, value.clone())
                });
                Ok(())
            }

            ExpressionPlan::SingleReference(SingleReferencePlan::Complex { column, expr }) => {
                let owner = owner_of(set, column, ctx)?;
                exhaustive_select(set, owner, expr)
            }

            ExpressionPlan::Pattern(PatternPlan::Simple {
                column,
                op,
                pattern,
                escape,
            }) => {
                let owner = owner_of(set, column, ctx)?;
                set.require_mut(owner)?.update_executable(|node| {
                    PlanNode::simple_pattern_select(
                        node,
                        column.clone(),
                        *op,
                        pattern.clone(),
                        escape.clone(),
                    )
                });
                Ok(())
            }

            ExpressionPlan::Pattern(PatternPlan::Complex { expr, references })
            | ExpressionPlan::ExhaustiveJoin { expr, references }
            | ExpressionPlan::ExhaustiveSubQuery { expr, references } => {
                let id = set.join_plans_with_references(references, ctx)?;
                exhaustive_select(set, id, expr)
            }

            ExpressionPlan::SimpleSubQuery {
                column,
                op,
                quantifier,
                query,
            } => {
                let owner = owner_of(set, column, ctx)?;
                set.require_mut(owner)?.update_executable(|node| {
                    PlanNode::non_correlated_any_all(
                        node,
                        query.plan.clone(),
                        vec![column.clone()],
                        *op,
                        *quantifier,
                    )
                });
                Ok(())
            }

            ExpressionPlan::StandardJoin { expr, .. } => standard_join(set, expr, ctx),

            ExpressionPlan::SubLogic { expr, .. } => set.plan_for_expression(expr, ctx),
        }
    }
}

/// The plan owning `column`, after it has been joined with any outer-join
/// partner it null-pads.
fn owner_of(set: &mut TableSetPlan, column: &ColumnName, ctx: &mut PlanContext) -> PlanResult<PlanId> {
    let owner = set.find_table_owning(column)?;
    set.resolve_outer_dependencies(owner, ctx)
}

fn exhaustive_select(set: &mut TableSetPlan, id: PlanId, expr: &Expr) -> PlanResult<()> {
    set.require_mut(id)?
        .update_executable(|node| PlanNode::exhaustive_select(node, expr.clone()));
    Ok(())
}

/// Join the plans behind both sides of `expr` on the bare column side.
fn standard_join(set: &mut TableSetPlan, expr: &Expr, ctx: &mut PlanContext) -> PlanResult<()> {
    let Expr::BinaryOp { left, op, right } = expr else {
        return Err(PlanError::MalformedExpression(format!(
            "join predicate is not a comparison: {}",
            expr
        )));
    };

    let lhs_refs = left.discover_references();
    let rhs_refs = right.discover_references();
    if lhs_refs.is_empty() || rhs_refs.is_empty() {
        let id = set.join_plans_with_references(&expr.discover_references(), ctx)?;
        return exhaustive_select(set, id, expr);
    }

    set.join_plans_with_references(&lhs_refs, ctx)?;
    let rhs = set.join_plans_with_references(&rhs_refs, ctx)?;
    // Joining the right side may have absorbed the left plan.
    let lhs = set.find_table_owning(&lhs_refs[0])?;

    if lhs == rhs {
        return exhaustive_select(set, lhs, expr);
    }

    let blocked = {
        let (l, r) = (set.require(lhs)?, set.require(rhs)?);
        l.is_linked_to(rhs)
            || r.is_linked_to(lhs)
            || TableSetPlan::can_naturally_join(l, r) != JoinClash::Safe
    };
    if blocked {
        let id = set
            .join_all_plans(vec![lhs, rhs], ctx)?
            .ok_or(PlanError::EmptyTableSet)?;
        return exhaustive_select(set, id, expr);
    }

    if let Some(column) = left.as_reference() {
        set.merge_with(lhs, rhs, |l, r| {
            PlanNode::join(l, r, column.clone(), *op, (**right).clone())
        })?;
    } else if let Some(column) = right.as_reference() {
        set.merge_with(rhs, lhs, |r, l| {
            PlanNode::join(r, l, column.clone(), op.reverse(), (**left).clone())
        })?;
    } else {
        let id = set
            .join_all_plans(vec![lhs, rhs], ctx)?
            .ok_or(PlanError::EmptyTableSet)?;
        return exhaustive_select(set, id, expr);
    }
    Ok(())
}
