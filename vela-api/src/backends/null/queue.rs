use super::{NullGpu, VelaCommandListNull, VelaFenceNull};
use crate::{VelaCommand, VelaQueueType, VelaResult};
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

#[derive(Debug)]
enum NullQueueWork {
    Execute(Vec<VelaCommand>),
    Signal(u64),
    Wait { fence: VelaFenceNull, value: u64 },
}

#[derive(Debug)]
struct NullQueueInner {
    queue_type: VelaQueueType,
    queue_id: u32,
    gpu: Arc<NullGpu>,
    // Held while submitting so that work items and the value they signal stay paired
    last_submitted_value: Mutex<u64>,
    work_tx: Option<Sender<NullQueueWork>>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for NullQueueInner {
    fn drop(&mut self) {
        // Disconnecting the channel ends the worker loop once queued work has drained
        self.work_tx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Worker thread for {:?} queue panicked", self.queue_type);
            }
        }
    }
}

/// A queue with its own fence. Work runs in submission order on a dedicated worker thread.
#[derive(Clone, Debug)]
pub struct VelaQueueNull {
    inner: Arc<NullQueueInner>,
}

impl VelaQueueNull {
    pub(crate) fn new(
        gpu: &Arc<NullGpu>,
        queue_type: VelaQueueType,
    ) -> VelaResult<Self> {
        gpu.check_removed()?;

        let (work_tx, work_rx) = crossbeam_channel::unbounded();
        let worker_gpu = gpu.clone();
        let worker = std::thread::Builder::new()
            .name(format!("null-{:?}-queue", queue_type).to_lowercase())
            .spawn(move || run_queue_worker(queue_type, worker_gpu, work_rx))?;

        let inner = NullQueueInner {
            queue_type,
            queue_id: queue_type.index() as u32,
            gpu: gpu.clone(),
            last_submitted_value: Mutex::new(gpu.last_submitted_value(queue_type)),
            work_tx: Some(work_tx),
            worker: Some(worker),
        };

        Ok(VelaQueueNull {
            inner: Arc::new(inner),
        })
    }

    pub fn queue_id(&self) -> u32 {
        self.inner.queue_id
    }

    pub fn queue_type(&self) -> VelaQueueType {
        self.inner.queue_type
    }

    pub fn fence(&self) -> &VelaFenceNull {
        self.inner.gpu.fence(self.inner.queue_type)
    }

    fn send(
        &self,
        work: NullQueueWork,
    ) -> VelaResult<()> {
        let work_tx = self
            .inner
            .work_tx
            .as_ref()
            .ok_or("Queue has been shut down")?;
        work_tx
            .send(work)
            .map_err(|_| "The queue worker thread has exited")?;
        Ok(())
    }

    // Caller must hold the submission lock
    fn signal_next(
        &self,
        last_submitted_value: &mut u64,
    ) -> VelaResult<u64> {
        let value = *last_submitted_value + 1;
        self.send(NullQueueWork::Signal(value))?;
        *last_submitted_value = value;
        self.inner
            .gpu
            .set_last_submitted_value(self.inner.queue_type, value);
        Ok(value)
    }

    #[profiling::function]
    pub fn execute_command_list(
        &self,
        command_list: &mut VelaCommandListNull,
    ) -> VelaResult<u64> {
        self.inner.gpu.check_removed()?;
        if command_list.queue_type() != self.inner.queue_type {
            return Err(format!(
                "Command list recorded for {:?} can't be submitted to a {:?} queue",
                command_list.queue_type(),
                self.inner.queue_type
            ))?;
        }

        let commands = command_list.take_for_submit();
        let mut last_submitted_value = self.inner.last_submitted_value.lock().unwrap();
        self.send(NullQueueWork::Execute(commands))?;
        let value = self.signal_next(&mut *last_submitted_value)?;
        log::trace!(
            "[{:?}] submitted command list, fence value {:#x}",
            self.inner.queue_type,
            value
        );
        Ok(value)
    }

    /// Signal the next fence value once everything submitted so far has executed
    pub fn signal(&self) -> VelaResult<u64> {
        self.inner.gpu.check_removed()?;
        let mut last_submitted_value = self.inner.last_submitted_value.lock().unwrap();
        self.signal_next(&mut *last_submitted_value)
    }

    pub fn last_submitted_fence_value(&self) -> u64 {
        *self.inner.last_submitted_value.lock().unwrap()
    }

    pub fn completed_fence_value(&self) -> u64 {
        self.fence().completed_value()
    }

    pub fn is_fence_completed(
        &self,
        value: u64,
    ) -> bool {
        self.fence().is_completed(value)
    }

    pub fn wait_for_fence_cpu(
        &self,
        value: u64,
    ) -> VelaResult<()> {
        self.inner.gpu.check_removed()?;
        if value > self.last_submitted_fence_value() {
            return Err(format!(
                "Fence value {:#x} was never submitted to the {:?} queue (last submitted {:#x})",
                value,
                self.inner.queue_type,
                self.last_submitted_fence_value()
            ))?;
        }

        self.fence().wait(value);
        Ok(())
    }

    /// Make work submitted after this call wait on the GPU until the fence of the queue that
    /// produced `value` reaches it. The queue is identified by the value's tag.
    pub fn insert_wait(
        &self,
        value: u64,
    ) -> VelaResult<()> {
        self.inner.gpu.check_removed()?;
        let producer = VelaQueueType::from_fence_value(value)
            .ok_or_else(|| format!("Fence value {:#x} does not carry a queue tag", value))?;

        if value > self.inner.gpu.last_submitted_value(producer) {
            return Err(format!(
                "Can't wait for fence value {:#x}, the {:?} queue has not submitted it",
                value, producer
            ))?;
        }

        let fence = self.inner.gpu.fence(producer).clone();
        // Hold the submission lock so the wait lands between two submissions, not inside one
        let _last_submitted_value = self.inner.last_submitted_value.lock().unwrap();
        self.send(NullQueueWork::Wait { fence, value })
    }

    pub fn insert_wait_for_queue(
        &self,
        other: &VelaQueueNull,
    ) -> VelaResult<()> {
        self.insert_wait(other.last_submitted_fence_value())
    }

    pub fn insert_wait_for_queue_value(
        &self,
        other: &VelaQueueNull,
        value: u64,
    ) -> VelaResult<()> {
        if VelaQueueType::from_fence_value(value) != Some(other.queue_type()) {
            return Err(format!(
                "Fence value {:#x} was not signaled by the {:?} queue",
                value,
                other.queue_type()
            ))?;
        }

        self.insert_wait(value)
    }

    /// Signal and block until the GPU catches up
    pub fn flush(&self) -> VelaResult<u64> {
        let value = self.signal()?;
        self.wait_for_fence_cpu(value)?;
        Ok(value)
    }

    pub fn wait_for_queue_idle(&self) -> VelaResult<()> {
        self.flush().map(|_| ())
    }
}

fn run_queue_worker(
    queue_type: VelaQueueType,
    gpu: Arc<NullGpu>,
    work_rx: Receiver<NullQueueWork>,
) {
    let latency = gpu.execution_latency();
    for work in work_rx {
        match work {
            NullQueueWork::Execute(commands) => {
                if !latency.is_zero() {
                    std::thread::sleep(latency);
                }
                gpu.execute(queue_type, commands);
            }
            NullQueueWork::Signal(value) => gpu.fence(queue_type).signal(value),
            NullQueueWork::Wait { fence, value } => fence.wait(value),
        }
    }

    log::trace!("Worker for {:?} queue exiting", queue_type);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::{VelaApiDefNull, VelaDeviceContextNull};
    use crate::VelaResourceBarrier;
    use crate::VelaResourceState;
    use std::time::Duration;

    fn device(latency_ms: u64) -> VelaDeviceContextNull {
        let _ = env_logger::builder().is_test(true).try_init();
        VelaDeviceContextNull::new(&VelaApiDefNull {
            execution_latency: Duration::from_millis(latency_ms),
        })
    }

    #[test]
    fn test_fence_values_strictly_increase() {
        let device_context = device(0);
        let queue = device_context.create_queue(VelaQueueType::Graphics).unwrap();

        let mut previous = queue.last_submitted_fence_value();
        for _ in 0..8 {
            let mut list = device_context
                .create_command_list(VelaQueueType::Graphics)
                .unwrap();
            list.draw(3, 1).unwrap();
            let value = queue.execute_command_list(&mut list).unwrap();
            assert!(value > previous);
            assert_eq!(
                VelaQueueType::from_fence_value(value),
                Some(VelaQueueType::Graphics)
            );
            previous = value;
        }

        queue.wait_for_fence_cpu(previous).unwrap();
        assert!(queue.completed_fence_value() >= previous);
    }

    #[test]
    fn test_wait_for_fence_cpu_does_not_return_early() {
        let device_context = device(30);
        let queue = device_context.create_queue(VelaQueueType::Graphics).unwrap();
        let mut list = device_context
            .create_command_list(VelaQueueType::Graphics)
            .unwrap();
        list.set_marker("slow").unwrap();
        let value = queue.execute_command_list(&mut list).unwrap();

        // The worker sleeps before executing, so the value can't be complete yet
        assert!(!queue.is_fence_completed(value));
        queue.wait_for_fence_cpu(value).unwrap();
        assert!(queue.is_fence_completed(value));
        assert_eq!(device_context.executed_commands().len(), 1);
    }

    #[test]
    fn test_wait_for_unsubmitted_value_fails() {
        let device_context = device(0);
        let queue = device_context.create_queue(VelaQueueType::Compute).unwrap();
        let future = VelaQueueType::Compute.fence_tag() | 100;
        assert!(queue.wait_for_fence_cpu(future).is_err());
        assert!(queue.insert_wait(future).is_err());
        assert!(queue.insert_wait(100).is_err());
    }

    #[test]
    fn test_insert_wait_for_queue_orders_work_across_queues() {
        let device_context = device(20);
        let graphics = device_context.create_queue(VelaQueueType::Graphics).unwrap();
        let compute = device_context.create_queue(VelaQueueType::Compute).unwrap();

        let mut producer = device_context
            .create_command_list(VelaQueueType::Compute)
            .unwrap();
        producer.set_marker("produce").unwrap();
        compute.execute_command_list(&mut producer).unwrap();

        graphics.insert_wait_for_queue(&compute).unwrap();
        let mut consumer = device_context
            .create_command_list(VelaQueueType::Graphics)
            .unwrap();
        consumer.set_marker("consume").unwrap();
        let value = graphics.execute_command_list(&mut consumer).unwrap();
        graphics.wait_for_fence_cpu(value).unwrap();

        let markers: Vec<_> = device_context
            .executed_commands()
            .into_iter()
            .filter_map(|executed| match executed.command {
                VelaCommand::SetMarker(label) => Some(label),
                _ => None,
            })
            .collect();
        assert_eq!(markers, vec!["produce".to_string(), "consume".to_string()]);
    }

    #[test]
    fn test_flush_drains_queue() {
        let device_context = device(5);
        let queue = device_context.create_queue(VelaQueueType::Transfer).unwrap();
        for _ in 0..3 {
            let mut list = device_context
                .create_command_list(VelaQueueType::Transfer)
                .unwrap();
            list.set_marker("copy").unwrap();
            queue.execute_command_list(&mut list).unwrap();
        }

        let value = queue.flush().unwrap();
        assert_eq!(queue.completed_fence_value(), value);
        assert_eq!(device_context.executed_commands().len(), 3);
    }

    #[test]
    fn test_mismatched_barrier_is_reported() {
        let device_context = device(0);
        let queue = device_context.create_queue(VelaQueueType::Graphics).unwrap();
        let buffer = device_context
            .create_buffer(&crate::VelaBufferDef {
                size: 16,
                ..Default::default()
            })
            .unwrap();

        let mut list = device_context
            .create_command_list(VelaQueueType::Graphics)
            .unwrap();
        list.resource_barrier(&[VelaResourceBarrier {
            resource: buffer.resource_id(),
            subresource: 0,
            state_before: VelaResourceState::COPY_DST,
            state_after: VelaResourceState::SHADER_RESOURCE,
        }])
        .unwrap();
        queue.execute_command_list(&mut list).unwrap();
        queue.flush().unwrap();

        assert_eq!(device_context.validation_errors().len(), 1);
        assert_eq!(
            device_context.gpu_resource_state(buffer.resource_id(), 0),
            Some(VelaResourceState::SHADER_RESOURCE)
        );
    }

    #[test]
    fn test_device_removed_fails_calls() {
        let device_context = device(0);
        let queue = device_context.create_queue(VelaQueueType::Graphics).unwrap();
        device_context.simulate_device_removed();

        let result = queue.signal();
        assert!(matches!(result, Err(crate::VelaError::DeviceRemoved(_))));
        assert!(device_context
            .create_command_list(VelaQueueType::Graphics)
            .is_err());
    }
}
