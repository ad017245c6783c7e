use crate::null::VelaDescriptorHeapNull;
use crate::{
    VelaCpuDescriptorHandle, VelaDescriptorHeapDef, VelaDescriptorView, VelaGpuDescriptorHandle,
    VelaResult,
};

/// A fixed-size array of descriptors of one type. Handles to individual descriptors are computed
/// as `start + index * descriptor_increment_size()`.
#[derive(Clone, Debug)]
pub enum VelaDescriptorHeap {
    Null(VelaDescriptorHeapNull),
}

impl VelaDescriptorHeap {
    pub fn heap_def(&self) -> &VelaDescriptorHeapDef {
        match self {
            VelaDescriptorHeap::Null(inner) => inner.heap_def(),
        }
    }

    pub fn descriptor_increment_size(&self) -> u32 {
        match self {
            VelaDescriptorHeap::Null(inner) => inner.descriptor_increment_size(),
        }
    }

    pub fn cpu_handle_start(&self) -> VelaCpuDescriptorHandle {
        match self {
            VelaDescriptorHeap::Null(inner) => inner.cpu_handle_start(),
        }
    }

    /// Only shader-visible heaps have GPU handles
    pub fn gpu_handle_start(&self) -> Option<VelaGpuDescriptorHandle> {
        match self {
            VelaDescriptorHeap::Null(inner) => inner.gpu_handle_start(),
        }
    }

    pub fn write_descriptor(
        &self,
        index: u32,
        view: &VelaDescriptorView,
    ) -> VelaResult<()> {
        match self {
            VelaDescriptorHeap::Null(inner) => inner.write_descriptor(index, view),
        }
    }

    /// Get the underlying null heap, if this is a null heap
    pub fn null_descriptor_heap(&self) -> Option<&VelaDescriptorHeapNull> {
        match self {
            VelaDescriptorHeap::Null(inner) => Some(inner),
        }
    }
}
