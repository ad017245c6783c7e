use crate::null::VelaFenceNull;
use crate::VelaResult;
use std::time::Duration;

/// A GPU -> CPU synchronization mechanism.
///
/// Every queue owns exactly one fence. The fence holds a 64-bit value that only increases. Each
/// submission to the queue is followed by a signal to the next value, so a value works as a
/// ticket for everything submitted up to that point.
#[derive(Clone, Debug)]
pub enum VelaFence {
    Null(VelaFenceNull),
}

impl VelaFence {
    /// The largest value the GPU has signaled so far
    pub fn completed_value(&self) -> u64 {
        match self {
            VelaFence::Null(inner) => inner.completed_value(),
        }
    }

    pub fn is_completed(
        &self,
        value: u64,
    ) -> bool {
        match self {
            VelaFence::Null(inner) => inner.is_completed(value),
        }
    }

    /// Block the calling thread until the fence reaches `value`
    pub fn wait(
        &self,
        value: u64,
    ) -> VelaResult<()> {
        match self {
            VelaFence::Null(inner) => inner.wait(value),
        }

        Ok(())
    }

    /// Returns false if the timeout expired before the fence reached `value`
    pub fn wait_timeout(
        &self,
        value: u64,
        timeout: Duration,
    ) -> VelaResult<bool> {
        Ok(match self {
            VelaFence::Null(inner) => inner.wait_timeout(value, timeout),
        })
    }
}
