use crate::null::VelaQueueNull;
use crate::{VelaCommandList, VelaFence, VelaQueueType, VelaResult};

/// A queue allows work to be submitted to the GPU
///
/// Work that has been submitted to the same queue executes in submission order. Work on
/// different queues is unordered unless a GPU-side wait was inserted with `insert_wait` or
/// `insert_wait_for_queue`.
///
/// Each queue owns one fence. Its values are tagged with the queue type in their high bits (see
/// `VelaQueueType::fence_tag`), so a fence value identifies the queue that will signal it.
#[derive(Clone, Debug)]
pub enum VelaQueue {
    Null(VelaQueueNull),
}

impl VelaQueue {
    /// Returns an opaque ID associated with this queue
    pub fn queue_id(&self) -> u32 {
        match self {
            VelaQueue::Null(inner) => inner.queue_id(),
        }
    }

    /// Get the type of queue that this is
    pub fn queue_type(&self) -> VelaQueueType {
        match self {
            VelaQueue::Null(inner) => inner.queue_type(),
        }
    }

    pub fn fence(&self) -> VelaFence {
        match self {
            VelaQueue::Null(inner) => VelaFence::Null(inner.fence().clone()),
        }
    }

    /// Close the command list (if still open), submit it and signal the next fence value. The
    /// returned value is reached once the list has finished executing. Values returned by one
    /// queue strictly increase.
    ///
    /// The list's commands are handed to the queue. The list may be reset and reused, but only
    /// once the returned value has completed if the backend requires it.
    pub fn execute_command_list(
        &self,
        command_list: &mut VelaCommandList,
    ) -> VelaResult<u64> {
        match (self, command_list) {
            (VelaQueue::Null(inner), VelaCommandList::Null(command_list)) => {
                inner.execute_command_list(command_list)
            }
        }
    }

    /// Signal the next fence value after all previously submitted work
    pub fn signal(&self) -> VelaResult<u64> {
        match self {
            VelaQueue::Null(inner) => inner.signal(),
        }
    }

    pub fn last_submitted_fence_value(&self) -> u64 {
        match self {
            VelaQueue::Null(inner) => inner.last_submitted_fence_value(),
        }
    }

    pub fn completed_fence_value(&self) -> u64 {
        match self {
            VelaQueue::Null(inner) => inner.completed_fence_value(),
        }
    }

    /// Non-blocking poll
    pub fn is_fence_completed(
        &self,
        value: u64,
    ) -> bool {
        match self {
            VelaQueue::Null(inner) => inner.is_fence_completed(value),
        }
    }

    /// Block the calling thread until this queue's fence reaches `value`
    pub fn wait_for_fence_cpu(
        &self,
        value: u64,
    ) -> VelaResult<()> {
        match self {
            VelaQueue::Null(inner) => inner.wait_for_fence_cpu(value),
        }
    }

    /// GPU-side wait. Work submitted to this queue afterwards does not start until the fence
    /// that `value` belongs to has reached it. Does not block the CPU.
    pub fn insert_wait(
        &self,
        value: u64,
    ) -> VelaResult<()> {
        match self {
            VelaQueue::Null(inner) => inner.insert_wait(value),
        }
    }

    /// GPU-side wait for everything submitted to `other` so far
    pub fn insert_wait_for_queue(
        &self,
        other: &VelaQueue,
    ) -> VelaResult<()> {
        match (self, other) {
            (VelaQueue::Null(inner), VelaQueue::Null(other)) => inner.insert_wait_for_queue(other),
        }
    }

    /// GPU-side wait for a specific value signaled by `other`
    pub fn insert_wait_for_queue_value(
        &self,
        other: &VelaQueue,
        value: u64,
    ) -> VelaResult<()> {
        match (self, other) {
            (VelaQueue::Null(inner), VelaQueue::Null(other)) => {
                inner.insert_wait_for_queue_value(other, value)
            }
        }
    }

    /// Signal, then block until the signal is reached. Only meant for shutdown and resize.
    pub fn flush(&self) -> VelaResult<u64> {
        match self {
            VelaQueue::Null(inner) => inner.flush(),
        }
    }

    pub fn wait_for_queue_idle(&self) -> VelaResult<()> {
        match self {
            VelaQueue::Null(inner) => inner.wait_for_queue_idle(),
        }
    }

    /// Get the underlying null queue, if this is a null queue
    pub fn null_queue(&self) -> Option<&VelaQueueNull> {
        match self {
            VelaQueue::Null(inner) => Some(inner),
        }
    }
}
