// tests/planner/or_planning_test.rs
use joinplan::config::PlannerSettings;
use joinplan::model::Expr;
use joinplan::planner::{JoinType, PlanNode, QueryPlanner, TablePlan, TableSetPlan};

fn two_sources() -> TableSetPlan {
    let mut set = TableSetPlan::new();
    set.push_source(TablePlan::for_table("orders", &["id", "total"]));
    set.push_source(TablePlan::for_table("customers", &["cid", "name"]));
    set
}

#[test]
fn test_vacuous_or_matches_no_filter() {
    let vacuous = Expr::bool(true).or(Expr::bool(true));
    let planner = QueryPlanner::default();

    let with_or = planner.plan(two_sources(), Some(&vacuous)).unwrap();
    let without = planner.plan(two_sources(), None).unwrap();

    assert_eq!(with_or.executable(), without.executable());
    assert_eq!(with_or.columns(), without.columns());
    assert_eq!(with_or.executable().count(PlanNode::is_cache), 0);
}

#[test]
fn test_vacuous_or_keeps_outer_join_links() {
    let build = || {
        let mut set = TableSetPlan::new();
        let a = set.push_source(TablePlan::for_table("a", &["k"]));
        let b = set.push_source(TablePlan::for_table("b", &["k"]));
        set.join_sources(
            a,
            b,
            JoinType::Left,
            Some(Expr::column("a.k").eq(Expr::column("b.k"))),
        )
        .unwrap();
        set
    };
    let vacuous = Expr::bool(true).or(Expr::bool(true).and(Expr::bool(true)));
    let planner = QueryPlanner::default();

    let with_or = planner.plan(build(), Some(&vacuous)).unwrap();
    let without = planner.plan(build(), None).unwrap();

    assert_eq!(with_or.executable().explain(), without.executable().explain());
}

#[test]
fn test_single_table_or_unions_cached_branches() {
    let filter = Expr::column("orders.total")
        .gt(Expr::int(100))
        .or(Expr::column("orders.id").eq(Expr::int(7)));

    let plan = QueryPlanner::default()
        .plan(two_sources(), Some(&filter))
        .unwrap();

    insta::assert_snapshot!(plan.executable().explain(), @r"
    NaturalJoin
      LogicalUnion
        SimpleSelect orders.total > 100
          Cache id=1
            Source orders
        SimpleSelect orders.id = 7
          Cache id=1
            Source orders
      Source customers
    ");
}

#[test]
fn test_or_without_caching() {
    let settings =
        PlannerSettings::from_toml("[planner]\ncache_or_branches = false\n").unwrap();
    let filter = Expr::column("orders.total")
        .gt(Expr::int(100))
        .or(Expr::column("customers.name").eq(Expr::string("acme")));

    let plan = QueryPlanner::new(settings)
        .plan(two_sources(), Some(&filter))
        .unwrap();

    let root = plan.executable();
    assert_eq!(root.count(PlanNode::is_cache), 0);
    assert_eq!(root.count(|n| matches!(n, PlanNode::LogicalUnion { .. })), 1);
    assert_eq!(root.count(|n| matches!(n, PlanNode::NaturalJoin { .. })), 2);
}

#[test]
fn test_or_touching_different_tables_joins_before_union() {
    let filter = Expr::column("orders.total")
        .gt(Expr::int(100))
        .or(Expr::column("customers.name").eq(Expr::string("acme")));

    let plan = QueryPlanner::default()
        .plan(two_sources(), Some(&filter))
        .unwrap();

    insta::assert_snapshot!(plan.executable().explain(), @r"
    LogicalUnion
      NaturalJoin
        SimpleSelect orders.total > 100
          Cache id=1
            Source orders
        Cache id=2
          Source customers
      NaturalJoin
        Cache id=1
          Source orders
        SimpleSelect customers.name = 'acme'
          Cache id=2
            Source customers
    ");
}

#[test]
fn test_nested_or_inside_and() {
    let filter = Expr::column("orders.id").gt(Expr::int(0)).and(
        Expr::column("orders.total")
            .lt(Expr::int(10))
            .or(Expr::column("orders.total").gt(Expr::int(90))),
    );

    let plan = QueryPlanner::default()
        .plan(two_sources(), Some(&filter))
        .unwrap();

    insta::assert_snapshot!(plan.executable().explain(), @r"
    NaturalJoin
      LogicalUnion
        SimpleSelect orders.total < 10
          Cache id=1
            SimpleSelect orders.id > 0
              Source orders
        SimpleSelect orders.total > 90
          Cache id=1
            SimpleSelect orders.id > 0
              Source orders
      Source customers
    ");
}

#[test]
fn test_or_branches_with_joins_are_merged_whole() {
    let filter = Expr::column("orders.id")
        .eq(Expr::column("customers.cid"))
        .or(Expr::column("orders.total").gt(Expr::int(5)));

    let plan = QueryPlanner::default()
        .plan(two_sources(), Some(&filter))
        .unwrap();

    let root = plan.executable();
    assert!(matches!(root, PlanNode::LogicalUnion { .. }));
    assert_eq!(root.count(|n| matches!(n, PlanNode::Join { .. })), 1);
    assert_eq!(root.count(|n| matches!(n, PlanNode::NaturalJoin { .. })), 1);
    assert_eq!(plan.columns().len(), 4);
}

#[test]
fn test_reshaped_branches_share_parent_column_order() {
    let mut set = TableSetPlan::new();
    set.push_source(TablePlan::for_table("a", &["x"]));
    set.push_source(TablePlan::for_table("b", &["y"]));
    set.push_source(TablePlan::for_table("c", &["z"]));
    let filter = Expr::column("a.x")
        .eq(Expr::column("b.y"))
        .or(Expr::column("a.x").eq(Expr::column("c.z")));

    let plan = QueryPlanner::default().plan(set, Some(&filter)).unwrap();

    insta::assert_snapshot!(plan.executable().explain(), @r"
    LogicalUnion
      Project a.x, b.y, c.z
        NaturalJoin
          Cache id=3
            Source c
          Join a.x = b.y
            Cache id=1
              Source a
            Cache id=2
              Source b
      Project a.x, b.y, c.z
        NaturalJoin
          Cache id=2
            Source b
          Join a.x = c.z
            Cache id=1
              Source a
            Cache id=3
              Source c
    ");
    let columns: Vec<String> = plan.columns().iter().map(|c| c.to_string()).collect();
    assert_eq!(columns, vec!["a.x", "b.y", "c.z"]);
}
