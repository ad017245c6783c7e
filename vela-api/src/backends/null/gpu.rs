use super::VelaFenceNull;
use crate::{
    VelaBuffer, VelaCommand, VelaError, VelaQueueType, VelaResourceBarrier, VelaResourceId,
    VelaResourceState, VelaResult,
};
use fnv::FnvHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vela_base::IndexPool;

/// A command as it was executed by a queue worker, in execution order across all queues
#[derive(Clone, Debug)]
pub struct VelaExecutedCommand {
    pub queue_type: VelaQueueType,
    pub command: VelaCommand,
}

#[derive(Debug, Default)]
struct NullGpuState {
    resource_states: FnvHashMap<(VelaResourceId, u32), VelaResourceState>,
    executed_commands: Vec<VelaExecutedCommand>,
    validation_errors: Vec<String>,
}

/// Device-wide state shared by every object created from a null device. Queue workers execute
/// commands against it.
#[derive(Debug)]
pub(crate) struct NullGpu {
    state: Mutex<NullGpuState>,
    fences: [VelaFenceNull; 3],
    last_submitted_values: [AtomicU64; 3],
    next_object_id: AtomicU64,
    heap_indices: Mutex<IndexPool>,
    device_removed: AtomicBool,
    execution_latency: Duration,
}

impl NullGpu {
    pub(crate) fn new(execution_latency: Duration) -> Self {
        let fence_for = |queue_type: VelaQueueType| VelaFenceNull::new(queue_type.fence_tag());
        let submitted_for = |queue_type: VelaQueueType| AtomicU64::new(queue_type.fence_tag());

        NullGpu {
            state: Default::default(),
            fences: [
                fence_for(VelaQueueType::Graphics),
                fence_for(VelaQueueType::Compute),
                fence_for(VelaQueueType::Transfer),
            ],
            last_submitted_values: [
                submitted_for(VelaQueueType::Graphics),
                submitted_for(VelaQueueType::Compute),
                submitted_for(VelaQueueType::Transfer),
            ],
            next_object_id: AtomicU64::new(1),
            heap_indices: Mutex::new(IndexPool::new()),
            device_removed: AtomicBool::new(false),
            execution_latency,
        }
    }

    pub(crate) fn check_removed(&self) -> VelaResult<()> {
        if self.device_removed.load(Ordering::Acquire) {
            Err(VelaError::DeviceRemoved(
                "the null device was removed".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    pub(crate) fn set_removed(&self) {
        log::warn!("Null device removed");
        self.device_removed.store(true, Ordering::Release);
    }

    pub(crate) fn allocate_object_id(&self) -> u64 {
        self.next_object_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn allocate_heap_index(&self) -> u32 {
        self.heap_indices.lock().unwrap().allocate()
    }

    pub(crate) fn free_heap_index(
        &self,
        index: u32,
    ) {
        self.heap_indices.lock().unwrap().free(index);
    }

    pub(crate) fn fence(
        &self,
        queue_type: VelaQueueType,
    ) -> &VelaFenceNull {
        &self.fences[queue_type.index()]
    }

    pub(crate) fn last_submitted_value(
        &self,
        queue_type: VelaQueueType,
    ) -> u64 {
        self.last_submitted_values[queue_type.index()].load(Ordering::Acquire)
    }

    pub(crate) fn set_last_submitted_value(
        &self,
        queue_type: VelaQueueType,
        value: u64,
    ) {
        self.last_submitted_values[queue_type.index()].store(value, Ordering::Release);
    }

    pub(crate) fn execution_latency(&self) -> Duration {
        self.execution_latency
    }

    //
    // Resource registration
    //
    pub(crate) fn register_resource(
        &self,
        resource: VelaResourceId,
        subresource_count: u32,
    ) {
        let mut state = self.state.lock().unwrap();
        for subresource in 0..subresource_count {
            state
                .resource_states
                .insert((resource, subresource), VelaResourceState::COMMON);
        }
    }

    pub(crate) fn unregister_resource(
        &self,
        resource: VelaResourceId,
        subresource_count: u32,
    ) {
        let mut state = self.state.lock().unwrap();
        for subresource in 0..subresource_count {
            state.resource_states.remove(&(resource, subresource));
        }
    }

    pub(crate) fn resource_state(
        &self,
        resource: VelaResourceId,
        subresource: u32,
    ) -> Option<VelaResourceState> {
        self.state
            .lock()
            .unwrap()
            .resource_states
            .get(&(resource, subresource))
            .copied()
    }

    pub(crate) fn executed_commands(&self) -> Vec<VelaExecutedCommand> {
        self.state.lock().unwrap().executed_commands.clone()
    }

    pub(crate) fn clear_executed_commands(&self) {
        self.state.lock().unwrap().executed_commands.clear();
    }

    pub(crate) fn validation_errors(&self) -> Vec<String> {
        self.state.lock().unwrap().validation_errors.clone()
    }

    //
    // Execution, called from queue workers
    //
    #[profiling::function]
    pub(crate) fn execute(
        &self,
        queue_type: VelaQueueType,
        commands: Vec<VelaCommand>,
    ) {
        let mut state = self.state.lock().unwrap();
        for command in commands {
            match &command {
                VelaCommand::ResourceBarrier(barriers) => {
                    for barrier in barriers {
                        state.apply_barrier(queue_type, barrier);
                    }
                }
                VelaCommand::ClearRenderTarget { resource, .. } => {
                    state.require_state(
                        queue_type,
                        "clear",
                        *resource,
                        VelaResourceState::RENDER_TARGET,
                    );
                }
                VelaCommand::ClearDepthStencil { resource, .. } => {
                    state.require_state(
                        queue_type,
                        "depth clear",
                        *resource,
                        VelaResourceState::DEPTH_WRITE,
                    );
                }
                VelaCommand::CopyBuffer {
                    src,
                    src_offset,
                    dst,
                    dst_offset,
                    size,
                } => {
                    // Upload and readback memory is always accessible to copies
                    if !src.buffer_def().memory_usage.is_cpu_visible() {
                        state.require_state(
                            queue_type,
                            "copy source",
                            src.resource_id(),
                            VelaResourceState::COPY_SRC,
                        );
                    }
                    if !dst.buffer_def().memory_usage.is_cpu_visible() {
                        state.require_state(
                            queue_type,
                            "copy destination",
                            dst.resource_id(),
                            VelaResourceState::COPY_DST,
                        );
                    }

                    let result = copy_buffer_contents(src, *src_offset, dst, *dst_offset, *size);
                    if let Err(e) = result {
                        state.report(queue_type, e.to_string());
                    }
                }
                VelaCommand::Draw { .. }
                | VelaCommand::Dispatch { .. }
                | VelaCommand::SetMarker(_) => {}
            }

            log::trace!("[{:?}] executed {:?}", queue_type, command);
            state.executed_commands.push(VelaExecutedCommand {
                queue_type,
                command,
            });
        }
    }
}

impl NullGpuState {
    fn report(
        &mut self,
        queue_type: VelaQueueType,
        message: String,
    ) {
        log::warn!("[{:?}] validation: {}", queue_type, message);
        self.validation_errors.push(message);
    }

    fn apply_barrier(
        &mut self,
        queue_type: VelaQueueType,
        barrier: &VelaResourceBarrier,
    ) {
        let key = (barrier.resource, barrier.subresource);
        match self.resource_states.get(&key).copied() {
            None => self.report(
                queue_type,
                format!(
                    "Barrier references {} subresource {} which does not exist",
                    barrier.resource, barrier.subresource
                ),
            ),
            Some(current) => {
                if current != barrier.state_before {
                    self.report(
                        queue_type,
                        format!(
                            "Barrier on {} subresource {} expects {:?} but the resource is in {:?}",
                            barrier.resource, barrier.subresource, barrier.state_before, current
                        ),
                    );
                }

                self.resource_states.insert(key, barrier.state_after);
            }
        }
    }

    fn require_state(
        &mut self,
        queue_type: VelaQueueType,
        operation: &str,
        resource: VelaResourceId,
        required: VelaResourceState,
    ) {
        let current = self.resource_states.get(&(resource, 0)).copied();
        if current != Some(required) {
            self.report(
                queue_type,
                format!(
                    "{} of {} requires {:?} but the resource is in {:?}",
                    operation, resource, required, current
                ),
            );
        }
    }
}

fn copy_buffer_contents(
    src: &VelaBuffer,
    src_offset: u64,
    dst: &VelaBuffer,
    dst_offset: u64,
    size: u64,
) -> VelaResult<()> {
    let (VelaBuffer::Null(src), VelaBuffer::Null(dst)) = (src, dst);

    let src_end = src_offset + size;
    let dst_end = dst_offset + size;
    if src_end > src.buffer_def().size || dst_end > dst.buffer_def().size {
        return Err(format!(
            "Copy of {} bytes from {}+{} to {}+{} is out of bounds",
            size,
            src.resource_id(),
            src_offset,
            dst.resource_id(),
            dst_offset
        ))?;
    }

    if src.resource_id() == dst.resource_id() {
        src.with_memory(|memory| {
            memory.copy_within(src_offset as usize..src_end as usize, dst_offset as usize)
        });
    } else {
        let data = src.with_memory(|memory| memory[src_offset as usize..src_end as usize].to_vec());
        dst.with_memory(|memory| {
            memory[dst_offset as usize..dst_end as usize].copy_from_slice(&data)
        });
    }

    Ok(())
}
