use vela_api::{
    VelaCpuDescriptorHandle, VelaDescriptorHeap, VelaDescriptorHeapDef, VelaDescriptorHeapType,
    VelaDescriptorView, VelaDeviceContext, VelaGpuDescriptorHandle, VelaResult,
};

/// Descriptors allocated from a `DynamicDescriptorHeap`. Only valid until the frame slot it came
/// from is reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DynamicDescriptorTable {
    offset: u32,
    count: u32,
    cpu_start: VelaCpuDescriptorHandle,
    gpu_start: VelaGpuDescriptorHandle,
    increment_size: u32,
}

impl DynamicDescriptorTable {
    /// Index of the first descriptor within the whole heap
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn cpu_handle(
        &self,
        index: u32,
    ) -> VelaCpuDescriptorHandle {
        assert!(index < self.count);
        self.cpu_start.offset(index, self.increment_size)
    }

    pub fn gpu_handle(
        &self,
        index: u32,
    ) -> VelaGpuDescriptorHandle {
        assert!(index < self.count);
        self.gpu_start.offset(index, self.increment_size)
    }
}

/// Shader-visible CBV/SRV/UAV heap split into one partition per frame in flight.
///
/// Allocation bumps through the current partition. `begin_frame` switches to a slot and resets
/// it, so the caller must only reuse a slot once the frame that last used it has completed.
pub struct DynamicDescriptorHeap {
    heap: VelaDescriptorHeap,
    descriptors_per_frame: u32,
    frame_count: u32,
    current_slot: u32,
    next_offset: u32,
    high_water_mark: u32,
}

impl DynamicDescriptorHeap {
    pub fn new(
        device_context: &VelaDeviceContext,
        descriptors_per_frame: u32,
        frame_count: u32,
    ) -> VelaResult<Self> {
        let heap = device_context.create_descriptor_heap(&VelaDescriptorHeapDef {
            heap_type: VelaDescriptorHeapType::CbvSrvUav,
            descriptor_count: descriptors_per_frame * frame_count,
            shader_visible: true,
        })?;

        Ok(DynamicDescriptorHeap {
            heap,
            descriptors_per_frame,
            frame_count,
            current_slot: 0,
            next_offset: 0,
            high_water_mark: 0,
        })
    }

    pub fn heap(&self) -> &VelaDescriptorHeap {
        &self.heap
    }

    pub fn current_slot(&self) -> u32 {
        self.current_slot
    }

    /// Descriptors still available in the current partition
    pub fn remaining(&self) -> u32 {
        self.descriptors_per_frame - self.next_offset
    }

    /// Most descriptors any single frame has used
    pub fn high_water_mark(&self) -> u32 {
        self.high_water_mark
    }

    /// Switch to the partition of `slot` and discard everything allocated from it before
    pub fn begin_frame(
        &mut self,
        slot: u32,
    ) {
        assert!(
            slot < self.frame_count,
            "Frame slot {} out of range, the heap has {} partitions",
            slot,
            self.frame_count
        );
        self.current_slot = slot;
        self.next_offset = 0;
    }

    pub fn allocate(
        &mut self,
        count: u32,
    ) -> VelaResult<DynamicDescriptorTable> {
        if count == 0 || self.next_offset + count > self.descriptors_per_frame {
            return Err(format!(
                "Dynamic descriptor heap can't fit {} descriptors, {} of {} remain this frame",
                count,
                self.remaining(),
                self.descriptors_per_frame
            ))?;
        }

        let gpu_handle_start = self
            .heap
            .gpu_handle_start()
            .ok_or("Dynamic descriptor heap is not shader visible")?;

        let offset = self.current_slot * self.descriptors_per_frame + self.next_offset;
        self.next_offset += count;
        self.high_water_mark = self.high_water_mark.max(self.next_offset);

        let increment_size = self.heap.descriptor_increment_size();
        Ok(DynamicDescriptorTable {
            offset,
            count,
            cpu_start: self.heap.cpu_handle_start().offset(offset, increment_size),
            gpu_start: gpu_handle_start.offset(offset, increment_size),
            increment_size,
        })
    }

    pub fn write_descriptor(
        &self,
        table: &DynamicDescriptorTable,
        index: u32,
        view: &VelaDescriptorView,
    ) -> VelaResult<()> {
        if index >= table.count {
            return Err(format!(
                "Descriptor index {} out of range for a table of {}",
                index, table.count
            ))?;
        }

        self.heap.write_descriptor(table.offset + index, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_api::null::VelaApiDefNull;
    use vela_api::VelaApi;

    #[test]
    fn test_partitions_reset_per_slot() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut heap = DynamicDescriptorHeap::new(&api.device_context(), 8, 2).unwrap();

        heap.begin_frame(0);
        let a = heap.allocate(6).unwrap();
        assert_eq!(a.offset(), 0);
        assert!(heap.allocate(3).is_err());

        heap.begin_frame(1);
        let b = heap.allocate(8).unwrap();
        assert_eq!(b.offset(), 8);

        heap.begin_frame(0);
        let c = heap.allocate(3).unwrap();
        assert_eq!(c.offset(), 0);
        assert_eq!(c.gpu_handle(0), a.gpu_handle(0));
        assert_eq!(heap.high_water_mark(), 8);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_slot_out_of_range() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut heap = DynamicDescriptorHeap::new(&api.device_context(), 8, 2).unwrap();
        heap.begin_frame(2);
    }
}
