// tests/planner/outer_join_test.rs
use joinplan::config::PlannerSettings;
use joinplan::model::Expr;
use joinplan::planner::{JoinType, PlanError, PlanNode, QueryPlanner, TablePlan, TableSetPlan};

fn linked(join_type: JoinType) -> TableSetPlan {
    let mut set = TableSetPlan::new();
    let a = set.push_source(TablePlan::for_table("a", &["k", "v"]));
    let b = set.push_source(TablePlan::for_table("b", &["k", "w"]));
    set.join_sources(
        a,
        b,
        join_type,
        Some(Expr::column("a.k").eq(Expr::column("b.k"))),
    )
    .unwrap();
    set
}

fn marks(node: &PlanNode) -> (Vec<String>, Vec<String>) {
    let mut outer = Vec::new();
    let mut cached = Vec::new();
    node.walk(&mut |n| match n {
        PlanNode::OuterJoin { mark, .. } => outer.push(mark.clone()),
        PlanNode::CacheMark { mark, .. } => cached.push(mark.clone()),
        _ => {}
    });
    (outer, cached)
}

#[test]
fn test_right_join_marks_right_side() {
    let plan = QueryPlanner::default()
        .plan(linked(JoinType::Right), None)
        .unwrap();

    insta::assert_snapshot!(plan.executable().explain(), @r"
    OuterJoin mark=OUTER_JOIN_1
      Join a.k = b.k
        Source a
        CacheMark mark=OUTER_JOIN_1
          Source b
    ");
}

#[test]
fn test_inner_join_has_no_marks() {
    let plan = QueryPlanner::default()
        .plan(linked(JoinType::Inner), None)
        .unwrap();

    let (outer, cached) = marks(plan.executable());
    assert!(outer.is_empty());
    assert!(cached.is_empty());
}

#[test]
fn test_full_join_is_rejected() {
    let result = QueryPlanner::default().plan(linked(JoinType::Full), None);

    assert_eq!(
        result.unwrap_err(),
        PlanError::UnsupportedJoinType(JoinType::Full)
    );
}

#[test]
fn test_filter_on_preserved_side_runs_before_outer_join() {
    let filter = Expr::column("a.v").eq(Expr::int(1));

    let plan = QueryPlanner::default()
        .plan(linked(JoinType::Left), Some(&filter))
        .unwrap();

    insta::assert_snapshot!(plan.executable().explain(), @r"
    OuterJoin mark=OUTER_JOIN_1
      Join a.k = b.k
        CacheMark mark=OUTER_JOIN_1
          SimpleSelect a.v = 1
            Source a
        Source b
    ");
}

#[test]
fn test_filter_on_null_supplying_side_runs_after_outer_join() {
    let filter = Expr::column("b.w").eq(Expr::int(1));

    let plan = QueryPlanner::default()
        .plan(linked(JoinType::Left), Some(&filter))
        .unwrap();

    insta::assert_snapshot!(plan.executable().explain(), @r"
    SimpleSelect b.w = 1
      OuterJoin mark=OUTER_JOIN_1
        Join a.k = b.k
          CacheMark mark=OUTER_JOIN_1
            Source a
          Source b
    ");
}

#[test]
fn test_chained_outer_joins_get_distinct_marks() {
    let mut set = TableSetPlan::new();
    let a = set.push_source(TablePlan::for_table("a", &["k"]));
    let b = set.push_source(TablePlan::for_table("b", &["k", "j"]));
    let c = set.push_source(TablePlan::for_table("c", &["j"]));
    set.join_sources(
        a,
        b,
        JoinType::Left,
        Some(Expr::column("a.k").eq(Expr::column("b.k"))),
    )
    .unwrap();
    set.join_sources(
        b,
        c,
        JoinType::Left,
        Some(Expr::column("b.j").eq(Expr::column("c.j"))),
    )
    .unwrap();

    let plan = QueryPlanner::default().plan(set, None).unwrap();
    let (mut outer, mut cached) = marks(plan.executable());
    outer.sort();
    cached.sort();

    assert_eq!(outer, vec!["OUTER_JOIN_1", "OUTER_JOIN_2"]);
    assert_eq!(outer, cached);
    assert_eq!(plan.columns().len(), 4);
}

#[test]
fn test_marker_prefix_from_settings() {
    let settings = PlannerSettings::from_toml("[markers]\nprefix = \"OJ\"\n").unwrap();

    let plan = QueryPlanner::new(settings)
        .plan(linked(JoinType::Left), None)
        .unwrap();

    let (outer, cached) = marks(plan.executable());
    assert_eq!(outer, vec!["OJ_1"]);
    assert_eq!(cached, vec!["OJ_1"]);
}

#[test]
fn test_uuid_markers_pair_up() {
    let settings = PlannerSettings::from_toml("[markers]\nstrategy = \"uuid\"\n").unwrap();

    let plan = QueryPlanner::new(settings)
        .plan(linked(JoinType::Left), None)
        .unwrap();

    let (outer, cached) = marks(plan.executable());
    assert_eq!(outer.len(), 1);
    assert_eq!(outer, cached);
    assert!(outer[0].starts_with("OUTER_JOIN_"));
    assert_ne!(outer[0], "OUTER_JOIN_1");
}

#[test]
fn test_unlinked_table_joins_after_outer_join() {
    // d is listed between the null-supplying side and its preserved side.
    let mut set = TableSetPlan::new();
    let b = set.push_source(TablePlan::for_table("b", &["k"]));
    set.push_source(TablePlan::for_table("d", &["m"]));
    let a = set.push_source(TablePlan::for_table("a", &["k"]));
    set.join_sources(
        a,
        b,
        JoinType::Left,
        Some(Expr::column("a.k").eq(Expr::column("b.k"))),
    )
    .unwrap();

    let plan = QueryPlanner::default().plan(set, None).unwrap();

    insta::assert_snapshot!(plan.executable().explain(), @r"
    NaturalJoin
      OuterJoin mark=OUTER_JOIN_1
        Join a.k = b.k
          CacheMark mark=OUTER_JOIN_1
            Source a
          Source b
      Source d
    ");
    let columns: Vec<String> = plan.columns().iter().map(|c| c.to_string()).collect();
    assert_eq!(columns, vec!["a.k", "b.k", "d.m"]);
}
