//! Frame orchestration on top of `vela-api`.
//!
//! Passes declare the resources they touch through a `ResourcePlanner`. The declarations are
//! turned into a `RenderGraphPlan` (dependencies, layers, execution order, cross-queue
//! synchronization). The `Renderer` then materializes the physical resources, records every pass
//! into its own command list with a `ResourceStateTracker`, reconciles the pending barriers
//! against the `GlobalResourceStateTracker` and submits with the required fence waits.

pub mod graph;
pub use graph::*;

pub mod resources;
pub use resources::*;

pub mod descriptors;
pub use descriptors::*;

pub mod upload;
pub use upload::*;

pub mod renderer;
pub use renderer::*;

pub use vela_api as api;
pub use vela_base as base;
