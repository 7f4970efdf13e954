//! # Joinplan
//!
//! Builds one executable plan tree from a filter over a set of linked table
//! sources.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        TableSetPlan (sources + explicit join links)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [classify]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ExpressionPlan per conjunct, ordered by factor    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [add_to_plan / OR copy + union]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Filtered and partially merged table plans         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [join resolution]
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Single PlanNode tree                   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use joinplan::model::Expr;
//! use joinplan::planner::{JoinType, QueryPlanner, TablePlan, TableSetPlan};
//!
//! let mut set = TableSetPlan::new();
//! let orders = set.push_source(TablePlan::for_table("orders", &["id", "customer_id"]));
//! let customers = set.push_source(TablePlan::for_table("customers", &["id", "name"]));
//! set.join_sources(
//!     orders,
//!     customers,
//!     JoinType::Left,
//!     Some(Expr::column("orders.customer_id").eq(Expr::column("customers.id"))),
//! )
//! .unwrap();
//!
//! let plan = QueryPlanner::default().plan(set, None).unwrap();
//! assert_eq!(plan.columns().len(), 4);
//! ```

pub mod config;
pub mod model;
pub mod planner;

pub use config::PlannerSettings;
pub use model::{ColumnName, Expr};
pub use planner::{PlanError, PlanNode, PlanResult, QueryPlanner, TablePlan, TableSetPlan};
