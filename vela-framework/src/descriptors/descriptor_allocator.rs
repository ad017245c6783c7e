use vela_api::{
    VelaCpuDescriptorHandle, VelaDescriptorHeap, VelaDescriptorHeapDef, VelaDescriptorHeapType,
    VelaDescriptorView, VelaDeviceContext, VelaGpuDescriptorHandle, VelaResult,
};
use vela_base::IndexPool;

/// Stable handle to a page. The generation changes every time the slot is reused so a stale
/// handle never refers to a newer page.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorPageId {
    index: u32,
    generation: u32,
}

impl DescriptorPageId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// A contiguous range of descriptors within one page. Return it with `DescriptorAllocator::free`.
#[derive(Debug)]
pub struct DescriptorAllocation {
    page: DescriptorPageId,
    offset: u32,
    count: u32,
    cpu_start: VelaCpuDescriptorHandle,
    gpu_start: Option<VelaGpuDescriptorHandle>,
    increment_size: u32,
}

impl DescriptorAllocation {
    pub fn page(&self) -> DescriptorPageId {
        self.page
    }

    /// First descriptor of the range within its page
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
        assert!(
            index < self.count,
            "Descriptor index {} out of range for an allocation of {}",
            index,
            self.count
        );
        self.cpu_start.offset(index, self.increment_size)
    }

    /// Only allocations from shader-visible pages have GPU handles
    pub fn gpu_handle(
        &self,
        index: u32,
    ) -> Option<VelaGpuDescriptorHandle> {
        assert!(
            index < self.count,
            "Descriptor index {} out of range for an allocation of {}",
            index,
            self.count
        );
        self.gpu_start.map(|x| x.offset(index, self.increment_size))
    }
}

struct DescriptorPage {
    heap: VelaDescriptorHeap,
    next_offset: u32,
    live_allocations: u32,
    // Retired pages get no new allocations and are destroyed once the last allocation is freed
    retired: bool,
}

#[derive(Default)]
struct DescriptorPageSlot {
    generation: u32,
    page: Option<DescriptorPage>,
}

/// Bump allocator over fixed-size descriptor heap pages.
///
/// Allocations never span pages. When the current page can't fit a request it is retired and a
/// new page becomes current. Retired pages stay alive until every allocation made from them has
/// been freed.
pub struct DescriptorAllocator {
    device_context: VelaDeviceContext,
    heap_type: VelaDescriptorHeapType,
    page_size: u32,
    shader_visible: bool,
    slots: Vec<DescriptorPageSlot>,
    slot_indices: IndexPool,
    current_page: Option<DescriptorPageId>,
}

impl DescriptorAllocator {
    pub fn new(
        device_context: &VelaDeviceContext,
        heap_type: VelaDescriptorHeapType,
        page_size: u32,
    ) -> Self {
        DescriptorAllocator {
            device_context: device_context.clone(),
            heap_type,
            page_size,
            shader_visible: false,
            slots: Default::default(),
            slot_indices: IndexPool::new(),
            current_page: None,
        }
    }

    pub fn heap_type(&self) -> VelaDescriptorHeapType {
        self.heap_type
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of pages that currently exist, current and retired
    pub fn page_count(&self) -> usize {
        self.slots.iter().filter(|x| x.page.is_some()).count()
    }

    pub fn current_page(&self) -> Option<DescriptorPageId> {
        self.current_page
    }

    /// The heap backing a page, if the page still exists
    pub fn page_heap(
        &self,
        page: DescriptorPageId,
    ) -> Option<&VelaDescriptorHeap> {
        self.live_page(page).map(|x| &x.heap)
    }

    fn live_page(
        &self,
        page: DescriptorPageId,
    ) -> Option<&DescriptorPage> {
        let slot = self.slots.get(page.index as usize)?;
        if slot.generation != page.generation {
            return None;
        }

        slot.page.as_ref()
    }

    fn create_page(&mut self) -> VelaResult<DescriptorPageId> {
        let heap = self
            .device_context
            .create_descriptor_heap(&VelaDescriptorHeapDef {
                heap_type: self.heap_type,
                descriptor_count: self.page_size,
                shader_visible: self.shader_visible,
            })?;

        let index = self.slot_indices.allocate();
        if index as usize >= self.slots.len() {
            self.slots
                .resize_with(index as usize + 1, Default::default);
        }

        let slot = &mut self.slots[index as usize];
        slot.page = Some(DescriptorPage {
            heap,
            next_offset: 0,
            live_allocations: 0,
            retired: false,
        });

        let page = DescriptorPageId {
            index,
            generation: slot.generation,
        };
        log::debug!(
            "Created {:?} descriptor page {:?} ({} descriptors)",
            self.heap_type,
            page,
            self.page_size
        );
        Ok(page)
    }

    fn destroy_page(
        &mut self,
        page: DescriptorPageId,
    ) {
        log::debug!("Destroying {:?} descriptor page {:?}", self.heap_type, page);
        let slot = &mut self.slots[page.index as usize];
        slot.page = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.slot_indices.free(page.index);
    }

    fn retire_current_page(&mut self) {
        if let Some(current) = self.current_page.take() {
            let slot = &mut self.slots[current.index as usize];
            let destroy = match &mut slot.page {
                Some(page) => {
                    page.retired = true;
                    page.live_allocations == 0
                }
                None => false,
            };

            log::trace!("Retired {:?} descriptor page {:?}", self.heap_type, current);
            if destroy {
                self.destroy_page(current);
            }
        }
    }

    /// Allocate `count` contiguous descriptors. `count` must be between 1 and the page size.
    pub fn allocate(
        &mut self,
        count: u32,
    ) -> VelaResult<DescriptorAllocation> {
        if count == 0 || count > self.page_size {
            return Err(format!(
                "Can't allocate {} {:?} descriptors from pages of {}",
                count, self.heap_type, self.page_size
            ))?;
        }

        let fits = self
            .current_page
            .and_then(|x| self.live_page(x))
            .map(|x| x.next_offset + count <= self.page_size)
            .unwrap_or(false);

        if !fits {
            self.retire_current_page();
            self.current_page = Some(self.create_page()?);
        }

        let page_id = self
            .current_page
            .ok_or("Descriptor allocator has no current page")?;
        let page = self.slots[page_id.index as usize]
            .page
            .as_mut()
            .ok_or("Current descriptor page was destroyed")?;

        let offset = page.next_offset;
        page.next_offset += count;
        page.live_allocations += 1;

        let increment_size = page.heap.descriptor_increment_size();
        let allocation = DescriptorAllocation {
            page: page_id,
            offset,
            count,
            cpu_start: page.heap.cpu_handle_start().offset(offset, increment_size),
            gpu_start: page
                .heap
                .gpu_handle_start()
                .map(|x| x.offset(offset, increment_size)),
            increment_size,
        };

        log::trace!(
            "Allocated {} {:?} descriptors at {} in page {:?}",
            count,
            self.heap_type,
            offset,
            page_id
        );
        Ok(allocation)
    }

    /// Release an allocation. The page is destroyed if it is retired and this was its last
    /// allocation.
    pub fn free(
        &mut self,
        allocation: DescriptorAllocation,
    ) {
        let page_id = allocation.page;
        let page = match self.slots.get_mut(page_id.index as usize) {
            Some(slot) if slot.generation == page_id.generation => slot.page.as_mut(),
            _ => None,
        };

        let page = match page {
            Some(page) => page,
            None => panic!(
                "Freed a {:?} descriptor allocation from page {:?} which no longer exists",
                self.heap_type, page_id
            ),
        };

        page.live_allocations -= 1;
        if page.retired && page.live_allocations == 0 {
            self.destroy_page(page_id);
        }
    }

    /// Write one descriptor of an allocation
    pub fn write_descriptor(
        &self,
        allocation: &DescriptorAllocation,
        index: u32,
        view: &VelaDescriptorView,
    ) -> VelaResult<()> {
        if index >= allocation.count {
            return Err(format!(
                "Descriptor index {} out of range for an allocation of {}",
                index, allocation.count
            ))?;
        }

        let page = self
            .live_page(allocation.page)
            .ok_or("Descriptor allocation refers to a destroyed page")?;
        page.heap
            .write_descriptor(allocation.offset + index, view)
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        let live: u32 = self
            .slots
            .iter()
            .filter_map(|x| x.page.as_ref())
            .map(|x| x.live_allocations)
            .sum();
        if live > 0 {
            log::warn!(
                "{:?} descriptor allocator dropped with {} live allocations",
                self.heap_type,
                live
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_api::null::VelaApiDefNull;
    use vela_api::{VelaApi, VelaResourceId};

    #[test]
    fn test_page_rollover_keeps_old_page_alive() {
        let _ = env_logger::builder().is_test(true).try_init();
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut allocator = DescriptorAllocator::new(
            &api.device_context(),
            VelaDescriptorHeapType::RenderTargetView,
            4,
        );

        let first = allocator.allocate(3).unwrap();
        let first_page = first.page();
        let first_start = allocator
            .page_heap(first_page)
            .unwrap()
            .cpu_handle_start();
        assert_eq!(first.cpu_handle(0), first_start);

        // Doesn't fit in the single remaining descriptor
        let second = allocator.allocate(2).unwrap();
        assert_ne!(second.page(), first_page);
        assert_eq!(allocator.page_count(), 2);

        // The old page is retired, not destroyed, and its handles still point into it
        let increment = allocator
            .page_heap(first_page)
            .unwrap()
            .descriptor_increment_size();
        assert_eq!(first.cpu_handle(2), first_start.offset(2, increment));
        let second_start = allocator
            .page_heap(second.page())
            .unwrap()
            .cpu_handle_start();
        assert_eq!(second.cpu_handle(0), second_start);
        assert_eq!(second.cpu_handle(1), second_start.offset(1, increment));

        allocator.free(first);
        assert_eq!(allocator.page_count(), 1);
        assert!(allocator.page_heap(first_page).is_none());

        // Slot reuse bumps the generation
        let third = allocator.allocate(4).unwrap();
        assert_eq!(third.page().index(), first_page.index());
        assert_ne!(third.page().generation(), first_page.generation());

        allocator.free(second);
        allocator.free(third);
    }

    #[test]
    fn test_allocation_size_limits() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut allocator = DescriptorAllocator::new(
            &api.device_context(),
            VelaDescriptorHeapType::DepthStencilView,
            8,
        );

        assert!(allocator.allocate(9).is_err());
        assert!(allocator.allocate(0).is_err());
        assert_eq!(allocator.page_count(), 0);

        let full = allocator.allocate(8).unwrap();
        allocator.free(full);
    }

    #[test]
    fn test_write_descriptor_lands_in_page() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut allocator = DescriptorAllocator::new(
            &api.device_context(),
            VelaDescriptorHeapType::CbvSrvUav,
            16,
        );

        let padding = allocator.allocate(5).unwrap();
        let allocation = allocator.allocate(2).unwrap();
        let view = VelaDescriptorView::ShaderResource {
            resource: VelaResourceId(42),
        };
        allocator
            .write_descriptor(&allocation, 1, &view)
            .unwrap();
        assert!(allocator
            .write_descriptor(&allocation, 2, &view)
            .is_err());

        let heap = allocator.page_heap(allocation.page()).unwrap();
        assert_eq!(
            heap.null_descriptor_heap().unwrap().descriptor(6),
            Some(view)
        );

        allocator.free(padding);
        allocator.free(allocation);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_handle_outside_allocation_panics() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut allocator = DescriptorAllocator::new(
            &api.device_context(),
            VelaDescriptorHeapType::RenderTargetView,
            4,
        );
        let allocation = allocator.allocate(2).unwrap();
        allocation.cpu_handle(2);
    }
}
