//! Consistency checks on the explicit join links of a table set.
//!
//! Natural join resolution assumes every link points into the set, that
//! `a.right = b` exactly when `b.left = a` (same type, same ON condition),
//! and that the links form a forest. A cycle would make the clash
//! resolution in `join_all_plans` chase links that can never be satisfied.

use petgraph::algo::is_cyclic_undirected;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::HashMap;

use crate::planner::{PlanError, PlanId, PlanResult, TableSetPlan};

/// Validate the join links of `set`.
pub fn validate(set: &TableSetPlan) -> PlanResult<()> {
    let mut graph: UnGraph<PlanId, ()> = UnGraph::new_undirected();
    let mut nodes: HashMap<PlanId, NodeIndex> = HashMap::new();

    for plan in set.tables() {
        nodes.insert(plan.id(), graph.add_node(plan.id()));
    }

    for plan in set.tables() {
        if let Some(link) = plan.left() {
            let partner = set
                .get(link.target)
                .ok_or(PlanError::DanglingLink(link.target))?;
            let back = partner.right().filter(|r| r.target == plan.id());
            if !back.is_some_and(|r| r.join_type == link.join_type && r.on == link.on) {
                return Err(PlanError::ContradictoryLinks(format!(
                    "{} joins {} on its left, but {} has no matching right join",
                    plan.id(),
                    link.target,
                    link.target
                )));
            }
        }

        if let Some(link) = plan.right() {
            let partner = set
                .get(link.target)
                .ok_or(PlanError::DanglingLink(link.target))?;
            let back = partner.left().filter(|l| l.target == plan.id());
            if !back.is_some_and(|l| l.join_type == link.join_type && l.on == link.on) {
                return Err(PlanError::ContradictoryLinks(format!(
                    "{} joins {} on its right, but {} has no matching left join",
                    plan.id(),
                    link.target,
                    link.target
                )));
            }

            // One edge per relationship; the mirrored left link is implied.
            graph.add_edge(nodes[&plan.id()], nodes[&link.target], ());
        }
    }

    if is_cyclic_undirected(&graph) {
        return Err(PlanError::CyclicJoinGraph);
    }

    tracing::trace!(
        tables = graph.node_count(),
        links = graph.edge_count(),
        "join links validated"
    );
    Ok(())
}
