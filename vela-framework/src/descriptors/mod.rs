//! Descriptor management. `DescriptorAllocator` hands out long-lived CPU descriptor ranges from
//! fixed-size pages, `DynamicDescriptorHeap` hands out shader-visible tables that only live for
//! one frame.

mod descriptor_allocator;
pub use descriptor_allocator::*;

mod dynamic_descriptor_heap;
pub use dynamic_descriptor_heap::*;
