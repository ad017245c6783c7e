//! Declaration and scheduling of render graph nodes.
//!
//! Each frame starts with an empty `ResourcePlanner`. Every active pass opens a node with
//! `begin_node` and declares its reads and writes. `ResourcePlanner::finish` canonicalizes the
//! declarations and `RenderGraphPlan::new` computes the schedule.

mod graph_error;
pub use graph_error::RenderGraphError;

mod graph_resource;
pub use graph_resource::*;

mod graph_node;
pub use graph_node::*;

mod resource_planner;
pub use resource_planner::*;

mod graph_plan;
pub use graph_plan::*;
