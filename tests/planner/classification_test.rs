// tests/planner/classification_test.rs
use joinplan::model::{BinaryOp, ColumnName, Expr, MatchOp};
use joinplan::planner::{
    ExpressionPlan, PatternPlan, PlanContext, PlanNode, SingleReferencePlan, TablePlan,
    TableSetPlan,
};

fn orders_and_customers() -> TableSetPlan {
    let mut set = TableSetPlan::new();
    set.push_source(TablePlan::for_table("orders", &["id", "customer_id", "total", "code"]));
    set.push_source(TablePlan::for_table("customers", &["cid", "name"]));
    set
}

fn factors(plans: &[ExpressionPlan]) -> Vec<f64> {
    plans.iter().map(ExpressionPlan::optimize_factor).collect()
}

#[test]
fn test_constants_run_first() {
    let set = orders_and_customers();
    let join = Expr::column("orders.customer_id").eq(Expr::column("customers.cid"));
    let single = Expr::column("orders.total").gt(Expr::int(100));
    let constant = Expr::int(1).eq(Expr::int(1));

    let plans = set.classify(&[&join, &single, &constant]).unwrap();

    assert_eq!(factors(&plans), vec![0.0, 0.20, 0.60]);
    assert_eq!(
        plans[0],
        ExpressionPlan::Constant {
            expr: Expr::int(1).eq(Expr::int(1))
        }
    );
}

#[test]
fn test_equal_factors_keep_conjunct_order() {
    let set = orders_and_customers();
    let first = Expr::column("orders.total").gt(Expr::int(1));
    let second = Expr::column("customers.name").eq(Expr::string("x"));
    let third = Expr::column("orders.id").lt(Expr::int(9));

    let plans = set.classify(&[&first, &second, &third]).unwrap();

    let columns: Vec<ColumnName> = plans
        .iter()
        .map(|p| match p {
            ExpressionPlan::SingleReference(SingleReferencePlan::Simple { column, .. }) => {
                column.clone()
            }
            other => panic!("unexpected plan {:?}", other),
        })
        .collect();
    assert_eq!(
        columns,
        vec![
            ColumnName::qualified("orders", "total"),
            ColumnName::qualified("customers", "name"),
            ColumnName::qualified("orders", "id"),
        ]
    );
}

#[test]
fn test_full_factor_ladder() {
    let set = orders_and_customers();
    let simple_single = Expr::column("orders.total").gt(Expr::int(1));
    let complex_single = Expr::column("orders.total")
        .mul(Expr::int(2))
        .gt(Expr::int(1));
    let simple_pattern = Expr::column("orders.code").like(Expr::string("A%"));
    let complex_pattern = Expr::function("upper", vec![Expr::column("orders.code")])
        .like(Expr::string("A%"));
    let equi_join = Expr::column("orders.customer_id").eq(Expr::column("customers.cid"));
    let mixed_join = Expr::column("orders.total").gt(Expr::column("customers.cid").add(Expr::int(1)));
    let exhaustive = Expr::function(
        "f",
        vec![Expr::column("orders.total"), Expr::column("customers.cid")],
    )
    .eq(Expr::int(0));
    let joinable_or = Expr::column("orders.total")
        .gt(Expr::int(1))
        .or(Expr::column("orders.id").eq(Expr::int(2)));
    let cross_or = Expr::column("orders.total")
        .gt(Expr::int(1))
        .or(Expr::column("customers.name").eq(Expr::string("x")));

    let plans = set
        .classify(&[
            &cross_or,
            &exhaustive,
            &joinable_or,
            &mixed_join,
            &equi_join,
            &complex_pattern,
            &simple_pattern,
            &complex_single,
            &simple_single,
        ])
        .unwrap();

    assert_eq!(
        factors(&plans),
        vec![0.20, 0.22, 0.25, 0.27, 0.58, 0.60, 0.64, 0.68, 0.70]
    );
    assert!(matches!(
        plans[3],
        ExpressionPlan::Pattern(PatternPlan::Complex { .. })
    ));
}

#[test]
fn test_pattern_with_escape() {
    let set = orders_and_customers();
    let expr = Expr::column("orders.code")
        .like(Expr::string("A!%%"))
        .escape(Expr::string("!"));

    let plans = set.classify(&[&expr]).unwrap();

    assert_eq!(
        plans,
        vec![ExpressionPlan::Pattern(PatternPlan::Simple {
            column: ColumnName::qualified("orders", "code"),
            op: MatchOp::Like,
            pattern: Expr::string("A!%%"),
            escape: Some(Expr::string("!")),
        })]
    );

    let mut set = set;
    let mut ctx = PlanContext::default();
    set.plan_for_expressions(&[&expr], &mut ctx).unwrap();
    assert_eq!(
        set.tables()[0].executable().label(),
        "SimplePatternSelect orders.code LIKE 'A!%%' ESCAPE '!'"
    );
}

#[test]
fn test_constant_pattern_is_constant() {
    let set = orders_and_customers();
    let expr = Expr::string("abc").not_like(Expr::string("a%"));

    let plans = set.classify(&[&expr]).unwrap();

    assert_eq!(factors(&plans), vec![0.0]);
}

#[test]
fn test_arithmetic_and_function_predicates_are_wrapped() {
    let set = orders_and_customers();
    let arithmetic = Expr::column("orders.total").sub(Expr::int(1));
    let function = Expr::function("is_valid", vec![Expr::column("customers.name")]);
    let constant = Expr::bool(false);

    let plans = set.classify(&[&arithmetic, &function, &constant]).unwrap();

    assert_eq!(
        plans,
        vec![
            ExpressionPlan::Constant {
                expr: Expr::bool(false).and(Expr::bool(true)),
            },
            ExpressionPlan::SingleReference(SingleReferencePlan::Complex {
                column: ColumnName::qualified("orders", "total"),
                expr: Expr::column("orders.total")
                    .sub(Expr::int(1))
                    .and(Expr::bool(true)),
            }),
            ExpressionPlan::SingleReference(SingleReferencePlan::Complex {
                column: ColumnName::qualified("customers", "name"),
                expr: Expr::function("is_valid", vec![Expr::column("customers.name")])
                    .and(Expr::bool(true)),
            }),
        ]
    );
}

#[test]
fn test_wrapped_predicate_is_applied_once() {
    let mut set = orders_and_customers();
    let mut ctx = PlanContext::default();
    let flag = Expr::column("orders.code");

    set.plan_for_expression(&flag, &mut ctx).unwrap();

    assert_eq!(
        set.tables()[0].executable(),
        &PlanNode::exhaustive_select(
            PlanNode::source("orders"),
            Expr::column("orders.code").and(Expr::bool(true)),
        )
    );
    assert!(!set.tables()[1].is_touched());
}

#[test]
fn test_unary_predicate_is_complex_single() {
    let set = orders_and_customers();
    let expr = Expr::column("customers.name").is_null();

    let plans = set.classify(&[&expr]).unwrap();

    assert!(matches!(
        &plans[..],
        [ExpressionPlan::SingleReference(SingleReferencePlan::Complex { column, .. })]
            if *column == ColumnName::qualified("customers", "name")
    ));
}

#[test]
fn test_and_of_constants_applies_to_every_table() {
    let mut set = orders_and_customers();
    let mut ctx = PlanContext::default();
    let filter = Expr::int(1)
        .lt(Expr::int(2))
        .and(Expr::column("orders.id").eq(Expr::int(3)));

    set.plan_for_expression(&filter, &mut ctx).unwrap();

    assert_eq!(
        set.tables()[0].executable(),
        &PlanNode::simple_select(
            PlanNode::constant_select(PlanNode::source("orders"), Expr::int(1).lt(Expr::int(2))),
            ColumnName::qualified("orders", "id"),
            BinaryOp::Eq,
            Expr::int(3),
        )
    );
    assert_eq!(
        set.tables()[1].executable(),
        &PlanNode::constant_select(PlanNode::source("customers"), Expr::int(1).lt(Expr::int(2)))
    );
}
