//! Explicit GPU API contract consumed by the vela render graph.
//!
//! Every object (`VelaDeviceContext`, `VelaQueue`, `VelaCommandList`, ...) is an enum over the
//! backends compiled into the crate. The `null` backend is always available. It executes command
//! lists on one worker thread per queue, signals real fences, honors GPU-side waits, tracks the
//! state of every subresource and reports commands that use a resource in the wrong state. This
//! makes it suitable for headless runs and for testing everything built on top of the API.

pub use api::*;
pub use buffer::*;
pub use command_list::*;
pub use descriptor_heap::*;
pub use device_context::*;
pub use error::*;
pub use fence::*;
pub use pipeline::*;
pub use queue::*;
pub use texture::*;
pub use types::*;

mod backends;
pub use backends::null;

mod api;
mod buffer;
mod command_list;
mod descriptor_heap;
mod device_context;
mod error;
mod fence;
mod pipeline;
mod queue;
mod texture;
mod types;

/// Number of bits a fence value's queue tag is shifted by. The remaining low bits hold the
/// per-queue counter.
pub const FENCE_VALUE_TAG_SHIFT: u32 = 56;

/// Mask for the counter part of a fence value
pub const FENCE_VALUE_COUNTER_MASK: u64 = (1 << FENCE_VALUE_TAG_SHIFT) - 1;

/// Distance in bytes between two descriptors in a heap created by the null backend
pub const NULL_DESCRIPTOR_INCREMENT_SIZE: u32 = 32;

/// Maximum number of simultaneously bound render targets
pub const MAX_RENDER_TARGET_ATTACHMENTS: usize = 8;
