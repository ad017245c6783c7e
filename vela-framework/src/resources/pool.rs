use fnv::FnvHashMap;
use std::collections::VecDeque;
use vela_api::{VelaCommandList, VelaDeviceContext, VelaQueueType, VelaResult};

pub type PoolResourceAllocatorAllocFn<T> =
    dyn Fn(&VelaDeviceContext) -> VelaResult<T> + Send + Sync;

/// Implement to customize how PooledResourceAllocator resets pooled resources
pub trait PooledResourceImpl {
    fn reset(&mut self) -> VelaResult<()>;
}

struct PoolResourceInFlight<T: PooledResourceImpl> {
    pool: T,
    live_until_frame: u64,
}

/// Hands out resources that the GPU may still be using after they are retired. A retired
/// resource is reset and becomes available again once the frame it was retired in has
/// completed. A maximum count should be provided so that an unbounded leak can be detected.
pub struct PooledResourceAllocator<T: PooledResourceImpl> {
    device_context: VelaDeviceContext,

    // Allocates a new resource
    allocate_fn: Box<PoolResourceAllocatorAllocFn<T>>,

    // Frames are retired in increasing order, so the front always completes first
    in_flight_pools: VecDeque<PoolResourceInFlight<T>>,

    // Resources that have been reset and are ready for allocation
    reset_pools: Vec<T>,

    // Number of resources we have created in total
    created_pool_count: u32,

    // Max number of resources to create (sum includes allocated, in flight and reset resources)
    max_pool_count: u32,
}

impl<T: PooledResourceImpl> PooledResourceAllocator<T> {
    pub fn new<F: Fn(&VelaDeviceContext) -> VelaResult<T> + Send + Sync + 'static>(
        device_context: &VelaDeviceContext,
        max_pool_count: u32,
        allocate_fn: F,
    ) -> Self {
        PooledResourceAllocator {
            device_context: device_context.clone(),
            allocate_fn: Box::new(allocate_fn),
            in_flight_pools: Default::default(),
            reset_pools: Default::default(),
            created_pool_count: 0,
            max_pool_count,
        }
    }

    /// Allocate a resource, either reusing one that has been reset or creating a new one
    pub fn allocate_pool(&mut self) -> VelaResult<T> {
        if let Some(pool) = self.reset_pools.pop() {
            return Ok(pool);
        }

        if self.created_pool_count >= self.max_pool_count {
            return Err(format!(
                "Pool allocator exceeded its limit of {} resources, are they being retired?",
                self.max_pool_count
            ))?;
        }

        self.created_pool_count += 1;
        (self.allocate_fn)(&self.device_context)
    }

    /// Schedule the resource to be reset once `frame` completes
    pub fn retire_pool(
        &mut self,
        pool: T,
        frame: u64,
    ) {
        self.in_flight_pools.push_back(PoolResourceInFlight {
            pool,
            live_until_frame: frame,
        });
    }

    /// Reset every resource whose frame is complete and make it available
    pub fn update(
        &mut self,
        last_completed_frame: u64,
    ) -> VelaResult<()> {
        while let Some(in_flight) = self.in_flight_pools.front() {
            if in_flight.live_until_frame > last_completed_frame {
                break;
            }

            if let Some(mut in_flight) = self.in_flight_pools.pop_front() {
                T::reset(&mut in_flight.pool)?;
                self.reset_pools.push(in_flight.pool);
            }
        }

        Ok(())
    }

    pub fn created_pool_count(&self) -> u32 {
        self.created_pool_count
    }

    pub fn in_flight_pool_count(&self) -> usize {
        self.in_flight_pools.len()
    }

    /// Immediately destroy everything. We assume the device is idle and nothing is in flight.
    pub fn destroy(&mut self) {
        self.in_flight_pools.clear();
        self.reset_pools.clear();
    }
}

impl PooledResourceImpl for VelaCommandList {
    fn reset(&mut self) -> VelaResult<()> {
        VelaCommandList::reset(self)
    }
}

pub type CommandListPoolAllocator = PooledResourceAllocator<VelaCommandList>;

/// Recycles command lists per queue type once the frame that submitted them has completed
pub struct CommandListPool {
    allocators: FnvHashMap<VelaQueueType, CommandListPoolAllocator>,
}

impl CommandListPool {
    pub fn new(
        device_context: &VelaDeviceContext,
        max_lists_per_queue: u32,
    ) -> Self {
        let allocators = VelaQueueType::ALL
            .iter()
            .map(|&queue_type| {
                let allocator = CommandListPoolAllocator::new(
                    device_context,
                    max_lists_per_queue,
                    move |device_context| device_context.create_command_list(queue_type),
                );
                (queue_type, allocator)
            })
            .collect();

        CommandListPool { allocators }
    }

    fn allocator_mut(
        &mut self,
        queue_type: VelaQueueType,
    ) -> &mut CommandListPoolAllocator {
        // Every queue type gets an allocator in new()
        self.allocators.get_mut(&queue_type).unwrap()
    }

    /// An open, empty command list for `queue_type`
    pub fn allocate(
        &mut self,
        queue_type: VelaQueueType,
    ) -> VelaResult<VelaCommandList> {
        self.allocator_mut(queue_type).allocate_pool()
    }

    /// Return a submitted list. It is reused after `frame` completes.
    pub fn retire(
        &mut self,
        command_list: VelaCommandList,
        frame: u64,
    ) {
        let queue_type = command_list.queue_type();
        self.allocator_mut(queue_type)
            .retire_pool(command_list, frame);
    }

    pub fn update(
        &mut self,
        last_completed_frame: u64,
    ) -> VelaResult<()> {
        for allocator in self.allocators.values_mut() {
            allocator.update(last_completed_frame)?;
        }

        Ok(())
    }

    pub fn created_count(
        &self,
        queue_type: VelaQueueType,
    ) -> u32 {
        self.allocators
            .get(&queue_type)
            .map(|x| x.created_pool_count())
            .unwrap_or(0)
    }

    pub fn destroy(&mut self) {
        for allocator in self.allocators.values_mut() {
            allocator.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_api::null::VelaApiDefNull;
    use vela_api::VelaApi;

    #[test]
    fn test_lists_are_reused_after_their_frame_completes() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut pool = CommandListPool::new(&api.device_context(), 4);

        let mut list = pool.allocate(VelaQueueType::Compute).unwrap();
        list.set_marker("first use").unwrap();
        list.close().unwrap();
        pool.retire(list, 1);

        pool.update(0).unwrap();
        let other = pool.allocate(VelaQueueType::Compute).unwrap();
        assert_eq!(pool.created_count(VelaQueueType::Compute), 2);
        pool.retire(other, 1);

        pool.update(1).unwrap();
        let reused = pool.allocate(VelaQueueType::Compute).unwrap();
        assert_eq!(pool.created_count(VelaQueueType::Compute), 2);
        assert!(reused.is_open());
        assert!(reused.null_command_list().unwrap().commands().is_empty());
        assert_eq!(reused.queue_type(), VelaQueueType::Compute);
        pool.destroy();
    }

    #[test]
    fn test_limit_is_enforced() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut pool = CommandListPool::new(&api.device_context(), 1);
        let _list = pool.allocate(VelaQueueType::Graphics).unwrap();
        assert!(pool.allocate(VelaQueueType::Graphics).is_err());
    }
}
