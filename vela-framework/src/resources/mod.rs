//! Physical resources behind the graph: state tracking, per-frame materialization, pooling of
//! command lists and caching of pipeline objects.

mod state_tracker;
pub use state_tracker::*;

mod frame_resources;
pub use frame_resources::*;

mod pool;
pub use pool::*;

mod pipeline_cache;
pub use pipeline_cache::*;
