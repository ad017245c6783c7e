use super::NullGpu;
use crate::{
    VelaCpuDescriptorHandle, VelaDescriptorHeapDef, VelaDescriptorView, VelaGpuDescriptorHandle,
    VelaResult, NULL_DESCRIPTOR_INCREMENT_SIZE,
};
use std::sync::{Arc, Mutex};

// Bit set on GPU handles so they never collide with CPU handles
const GPU_HANDLE_BIT: u64 = 1 << 63;

#[derive(Debug)]
struct NullDescriptorHeapInner {
    heap_def: VelaDescriptorHeapDef,
    heap_index: u32,
    cpu_start: VelaCpuDescriptorHandle,
    gpu_start: Option<VelaGpuDescriptorHandle>,
    descriptors: Mutex<Vec<Option<VelaDescriptorView>>>,
    gpu: Arc<NullGpu>,
}

impl Drop for NullDescriptorHeapInner {
    fn drop(&mut self) {
        self.gpu.free_heap_index(self.heap_index);
    }
}

/// Each heap owns a distinct 4GB range of fake handle addresses, so a handle identifies the heap
/// it came from.
#[derive(Clone, Debug)]
pub struct VelaDescriptorHeapNull {
    inner: Arc<NullDescriptorHeapInner>,
}

impl VelaDescriptorHeapNull {
    pub(crate) fn new(
        gpu: &Arc<NullGpu>,
        heap_def: &VelaDescriptorHeapDef,
    ) -> VelaResult<Self> {
        gpu.check_removed()?;
        heap_def.verify()?;

        let heap_index = gpu.allocate_heap_index();
        let cpu_start = VelaCpuDescriptorHandle((heap_index as u64 + 1) << 32);
        let gpu_start = if heap_def.shader_visible {
            Some(VelaGpuDescriptorHandle(cpu_start.0 | GPU_HANDLE_BIT))
        } else {
            None
        };

        log::trace!(
            "Created {:?} descriptor heap with {} descriptors at {:#x}",
            heap_def.heap_type,
            heap_def.descriptor_count,
            cpu_start.0
        );

        let inner = NullDescriptorHeapInner {
            heap_def: heap_def.clone(),
            heap_index,
            cpu_start,
            gpu_start,
            descriptors: Mutex::new(vec![None; heap_def.descriptor_count as usize]),
            gpu: gpu.clone(),
        };

        Ok(VelaDescriptorHeapNull {
            inner: Arc::new(inner),
        })
    }

    pub fn heap_def(&self) -> &VelaDescriptorHeapDef {
        &self.inner.heap_def
    }

    pub fn descriptor_increment_size(&self) -> u32 {
        NULL_DESCRIPTOR_INCREMENT_SIZE
    }

    pub fn cpu_handle_start(&self) -> VelaCpuDescriptorHandle {
        self.inner.cpu_start
    }

    pub fn gpu_handle_start(&self) -> Option<VelaGpuDescriptorHandle> {
        self.inner.gpu_start
    }

    pub fn write_descriptor(
        &self,
        index: u32,
        view: &VelaDescriptorView,
    ) -> VelaResult<()> {
        self.inner.gpu.check_removed()?;

        if view.heap_type() != self.inner.heap_def.heap_type {
            return Err(format!(
                "Descriptor {:?} can't be written into a {:?} heap",
                view, self.inner.heap_def.heap_type
            ))?;
        }

        let mut descriptors = self.inner.descriptors.lock().unwrap();
        let slot = descriptors.get_mut(index as usize).ok_or_else(|| {
            format!(
                "Descriptor index {} is out of range for a heap of {} descriptors",
                index, self.inner.heap_def.descriptor_count
            )
        })?;
        *slot = Some(*view);
        Ok(())
    }

    pub fn descriptor(
        &self,
        index: u32,
    ) -> Option<VelaDescriptorView> {
        self.inner
            .descriptors
            .lock()
            .unwrap()
            .get(index as usize)
            .copied()
            .flatten()
    }
}
