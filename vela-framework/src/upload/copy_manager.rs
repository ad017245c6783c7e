use super::UploadAllocation;
use crate::resources::ResourceStateTracker;
use vela_api::{VelaBuffer, VelaCommandList, VelaResourceState, VelaResult};

/// A copy from the upload ring into a GPU buffer
#[derive(Clone, Debug)]
pub struct ScheduledBufferCopy {
    pub source: UploadAllocation,
    pub destination: VelaBuffer,
    pub destination_offset: u64,
}

struct CopiesInFlight {
    frame: u64,
    // Keeps the destinations alive until the GPU is done with them
    copies: Vec<ScheduledBufferCopy>,
}

/// Batches copies out of the upload ring and records them together at the start of a frame.
/// Destinations are left in COPY_DST, the graph transitions them before a node reads them.
#[derive(Default)]
pub struct ResourceCopyManager {
    scheduled: Vec<ScheduledBufferCopy>,
    in_flight: Vec<CopiesInFlight>,
    completed_copy_count: u64,
}

impl ResourceCopyManager {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn schedule_buffer_copy(
        &mut self,
        source: UploadAllocation,
        destination: &VelaBuffer,
        destination_offset: u64,
    ) -> VelaResult<()> {
        let destination_size = destination.buffer_def().size;
        if destination_offset + source.size() > destination_size {
            return Err(format!(
                "Copy of {} bytes at offset {} overflows {} of {} bytes",
                source.size(),
                destination_offset,
                destination.resource_id(),
                destination_size
            ))?;
        }

        self.scheduled.push(ScheduledBufferCopy {
            source,
            destination: destination.clone(),
            destination_offset,
        });
        Ok(())
    }

    /// Record every scheduled copy into `command_list`. Returns the number of copies recorded.
    #[profiling::function]
    pub fn record_scheduled_copies(
        &mut self,
        tracker: &mut ResourceStateTracker,
        command_list: &mut VelaCommandList,
        frame: u64,
    ) -> VelaResult<usize> {
        if self.scheduled.is_empty() {
            return Ok(0);
        }

        let copies = std::mem::take(&mut self.scheduled);
        for copy in &copies {
            tracker.resource_barrier(
                copy.destination.resource_id(),
                0,
                VelaResourceState::COPY_DST,
            );
        }
        tracker.flush_barriers(command_list)?;

        for copy in &copies {
            command_list.copy_buffer_to_buffer(
                copy.source.buffer(),
                copy.source.offset(),
                &copy.destination,
                copy.destination_offset,
                copy.source.size(),
            )?;
        }

        log::trace!("Recorded {} buffer copies for frame {}", copies.len(), frame);
        let count = copies.len();
        self.in_flight.push(CopiesInFlight { frame, copies });
        Ok(count)
    }

    /// Forget copies whose frame has completed
    pub fn retire(
        &mut self,
        last_completed_frame: u64,
    ) {
        let mut completed = 0;
        self.in_flight.retain(|x| {
            let done = x.frame <= last_completed_frame;
            if done {
                completed += x.copies.len() as u64;
            }
            !done
        });
        self.completed_copy_count += completed;
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.iter().map(|x| x.copies.len()).sum()
    }

    pub fn completed_copy_count(&self) -> u64 {
        self.completed_copy_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::GlobalResourceStateTracker;
    use crate::upload::UploadRingBuffer;
    use vela_api::null::VelaApiDefNull;
    use vela_api::{
        VelaApi, VelaBufferDef, VelaMemoryUsage, VelaQueueType, VelaResourceUsage,
    };

    #[test]
    fn test_copy_reaches_destination() {
        let _ = env_logger::builder().is_test(true).try_init();
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let device_context = api.device_context();
        let queue = device_context.create_queue(VelaQueueType::Graphics).unwrap();
        let mut ring = UploadRingBuffer::new(&device_context, 1024).unwrap();

        // CPU-visible so the result can be read back
        let destination = device_context
            .create_buffer(&VelaBufferDef {
                size: 16,
                memory_usage: VelaMemoryUsage::GpuToCpu,
                usage: VelaResourceUsage::COPY_DST,
            })
            .unwrap();
        let mut global = GlobalResourceStateTracker::new();
        global.track_resource(destination.resource_id(), 1, VelaResourceState::COMMON);

        let mut copies = ResourceCopyManager::new();
        let source = ring.push(&[9, 8, 7, 6], 4).unwrap();
        copies
            .schedule_buffer_copy(source.clone(), &destination, 4)
            .unwrap();
        assert!(copies
            .schedule_buffer_copy(source, &destination, 14)
            .is_err());

        let mut tracker = ResourceStateTracker::new();
        let mut barrier_list = device_context
            .create_command_list(VelaQueueType::Graphics)
            .unwrap();
        let mut copy_list = device_context
            .create_command_list(VelaQueueType::Graphics)
            .unwrap();
        assert_eq!(
            copies
                .record_scheduled_copies(&mut tracker, &mut copy_list, 1)
                .unwrap(),
            1
        );
        assert_eq!(
            tracker
                .flush_pending_barriers(&global, &mut barrier_list)
                .unwrap(),
            1
        );
        tracker.commit_final_resource_states(&mut global);

        queue.execute_command_list(&mut barrier_list).unwrap();
        let fence_value = queue.execute_command_list(&mut copy_list).unwrap();
        queue.wait_for_fence_cpu(fence_value).unwrap();
        ring.finish_frame(1);

        assert_eq!(
            destination.read_host_visible_buffer(4, 4).unwrap(),
            vec![9, 8, 7, 6]
        );
        assert_eq!(
            global.state(destination.resource_id(), 0),
            VelaResourceState::COPY_DST
        );
        assert!(device_context
            .null_device_context()
            .unwrap()
            .validation_errors()
            .is_empty());

        assert_eq!(copies.in_flight_count(), 1);
        copies.retire(1);
        ring.retire_frames(1);
        assert_eq!(copies.in_flight_count(), 0);
        assert_eq!(copies.completed_copy_count(), 1);
        assert_eq!(ring.bytes_in_use(), 0);
    }
}
