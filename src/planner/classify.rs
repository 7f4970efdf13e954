//! Sorting filter conjuncts into expression plans.

use crate::model::{BinaryOp, ColumnName, Expr, ExprCategory};
use crate::planner::{
    ExpressionPlan, PatternPlan, PlanContext, PlanResult, SingleReferencePlan, TableSetPlan,
};

/// Per-shape queues, drained in this order before the stable factor sort.
#[derive(Default)]
struct Buckets {
    constants: Vec<ExpressionPlan>,
    singles: Vec<ExpressionPlan>,
    patterns: Vec<ExpressionPlan>,
    sub_queries: Vec<ExpressionPlan>,
    multis: Vec<ExpressionPlan>,
    sub_logic: Vec<ExpressionPlan>,
}

impl Buckets {
    fn into_sorted(self) -> Vec<ExpressionPlan> {
        let mut plans: Vec<ExpressionPlan> = [
            self.constants,
            self.singles,
            self.patterns,
            self.sub_queries,
            self.multis,
            self.sub_logic,
        ]
        .into_iter()
        .flatten()
        .collect();
        plans.sort_by(|a, b| a.optimize_factor().total_cmp(&b.optimize_factor()));
        plans
    }
}

impl TableSetPlan {
    /// Apply a list of conjuncts, cheapest first.
    pub fn plan_for_expressions(&mut self, exprs: &[&Expr], ctx: &mut PlanContext) -> PlanResult<()> {
        let plans = self.classify(exprs)?;
        tracing::debug!(
            conjuncts = exprs.len(),
            plans = plans.len(),
            "classified conjuncts"
        );
        for plan in &plans {
            plan.add_to_plan(self, ctx)?;
        }
        Ok(())
    }

    /// Classify `exprs` against the current tables, in application order.
    pub fn classify(&self, exprs: &[&Expr]) -> PlanResult<Vec<ExpressionPlan>> {
        let mut buckets = Buckets::default();

        for &expr in exprs {
            if expr.is_true() {
                continue;
            }

            if needs_wrapping(expr) {
                // `e AND TRUE` is one opaque predicate: never split, never a sub-logic.
                let wrapped = expr.clone().and(Expr::bool(true));
                if wrapped.has_sub_query() {
                    buckets.sub_queries.push(classify_sub_query(wrapped));
                } else {
                    let mut references = wrapped.discover_references();
                    match references.len() {
                        0 => buckets.constants.push(ExpressionPlan::Constant { expr: wrapped }),
                        1 => buckets.singles.push(ExpressionPlan::SingleReference(
                            SingleReferencePlan::Complex {
                                column: references.remove(0),
                                expr: wrapped,
                            },
                        )),
                        _ => buckets.multis.push(ExpressionPlan::ExhaustiveJoin {
                            expr: wrapped,
                            references,
                        }),
                    }
                }
                continue;
            }

            if expr.is_logical() {
                buckets.sub_logic.push(self.classify_sub_logic(expr)?);
            } else if expr.has_sub_query() {
                buckets.sub_queries.push(classify_sub_query(expr.clone()));
            } else if expr.is_pattern() {
                buckets.patterns.push(self.classify_pattern(expr)?);
            } else {
                let references = expr.discover_references();
                match references.len() {
                    0 => buckets.constants.push(ExpressionPlan::Constant { expr: expr.clone() }),
                    1 => buckets.singles.push(classify_single(expr, &references[0])),
                    _ => buckets.multis.push(classify_multi(expr, references)),
                }
            }
        }

        Ok(buckets.into_sorted())
    }

    fn classify_pattern(&self, expr: &Expr) -> PlanResult<ExpressionPlan> {
        let references = expr.discover_references();
        if references.is_empty() {
            return Ok(ExpressionPlan::Constant { expr: expr.clone() });
        }

        if let Expr::StringMatch {
            op,
            left,
            pattern,
            escape,
        } = expr
        {
            let constant_escape = escape
                .as_ref()
                .map_or(true, |e| e.discover_references().is_empty());
            if let Some(column) = left.as_reference() {
                if pattern.discover_references().is_empty() && constant_escape {
                    return Ok(ExpressionPlan::Pattern(PatternPlan::Simple {
                        column: column.clone(),
                        op: *op,
                        pattern: (**pattern).clone(),
                        escape: escape.as_deref().cloned(),
                    }));
                }
            }
        }

        Ok(match self.find_common_table(&references)? {
            Some(_) => ExpressionPlan::Pattern(PatternPlan::Complex {
                expr: expr.clone(),
                references,
            }),
            None => ExpressionPlan::ExhaustiveJoin {
                expr: expr.clone(),
                references,
            },
        })
    }

    /// An OR is joinable when every disjunct that references columns reads
    /// the same single table plan.
    fn classify_sub_logic(&self, expr: &Expr) -> PlanResult<ExpressionPlan> {
        let mut joinable = true;
        if let Expr::BinaryOp { left, right, .. } = expr {
            let mut common = None;
            for side in [left, right] {
                let references = side.discover_references();
                if references.is_empty() {
                    continue;
                }
                match (self.find_common_table(&references)?, common) {
                    (Some(owner), None) => common = Some(owner),
                    (Some(owner), Some(seen)) if owner == seen => {}
                    _ => {
                        joinable = false;
                        break;
                    }
                }
            }
        }

        Ok(ExpressionPlan::SubLogic {
            expr: expr.clone(),
            joinable,
        })
    }
}

/// Predicates that are neither a comparison-like binary nor a unary
/// operator (bare columns, constants, functions, arithmetic).
fn needs_wrapping(expr: &Expr) -> bool {
    (expr.is_binary() && expr.category() == ExprCategory::Arithmetic)
        || (!expr.is_unary() && !expr.is_binary())
}

fn classify_single(expr: &Expr, column: &ColumnName) -> ExpressionPlan {
    if let Expr::BinaryOp { left, op, right } = expr {
        if op.is_comparison() {
            if let Some(column) = left.as_reference() {
                if right.discover_references().is_empty() {
                    return simple_single(column, *op, right);
                }
            }
            if let Some(column) = right.as_reference() {
                if left.discover_references().is_empty() {
                    return simple_single(column, op.reverse(), left);
                }
            }
        }
    }

    ExpressionPlan::SingleReference(SingleReferencePlan::Complex {
        column: column.clone(),
        expr: expr.clone(),
    })
}

fn simple_single(column: &ColumnName, op: BinaryOp, value: &Expr) -> ExpressionPlan {
    ExpressionPlan::SingleReference(SingleReferencePlan::Simple {
        column: column.clone(),
        op,
        value: value.clone(),
    })
}

fn classify_multi(expr: &Expr, references: Vec<ColumnName>) -> ExpressionPlan {
    if let Expr::BinaryOp { left, op, right } = expr {
        if op.is_comparison() {
            match (left.as_reference(), right.as_reference()) {
                (Some(_), Some(_)) => {
                    return ExpressionPlan::StandardJoin {
                        expr: expr.clone(),
                        mixed: false,
                    }
                }
                (Some(_), None) | (None, Some(_)) => {
                    return ExpressionPlan::StandardJoin {
                        expr: expr.clone(),
                        mixed: true,
                    }
                }
                (None, None) => {}
            }
        }
    }

    ExpressionPlan::ExhaustiveJoin {
        expr: expr.clone(),
        references,
    }
}

/// `column <op> ANY|ALL (q)` with a non-correlated `q` takes the fast path;
/// anything else is evaluated over every table it or its sub-queries read.
fn classify_sub_query(expr: Expr) -> ExpressionPlan {
    if let Expr::Quantified {
        quantifier,
        op,
        left,
        right,
    } = &expr
    {
        if let (Some(column), Some(query)) = (left.as_reference(), right.as_sub_query()) {
            if query.correlated_references(1).is_empty() {
                return ExpressionPlan::SimpleSubQuery {
                    column: column.clone(),
                    op: *op,
                    quantifier: *quantifier,
                    query: query.clone(),
                };
            }
        }
    }

    let mut references = expr.discover_references();
    for correlated in expr.correlated_references(0) {
        if !references.contains(&correlated.name) {
            references.push(correlated.name);
        }
    }

    if references.is_empty() {
        ExpressionPlan::Constant { expr }
    } else {
        ExpressionPlan::ExhaustiveSubQuery { expr, references }
    }
}
