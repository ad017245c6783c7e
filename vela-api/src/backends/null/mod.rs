//! Headless backend. Work submitted to a queue runs on a worker thread owned by that queue, so
//! fences complete asynchronously the same way they would on a GPU.

mod api;
pub use api::*;

mod device_context;
pub use device_context::*;

mod fence;
pub use fence::*;

mod gpu;
pub use gpu::VelaExecutedCommand;
pub(crate) use gpu::NullGpu;

mod queue;
pub use queue::*;

mod command_list;
pub use command_list::*;

mod resources;
pub use resources::*;

mod descriptor_heap;
pub use descriptor_heap::*;

mod pipeline;
pub use pipeline::*;
