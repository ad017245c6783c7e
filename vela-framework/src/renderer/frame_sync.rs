use std::collections::VecDeque;
use vela_api::{VelaQueue, VelaQueueType, VelaResult};

struct FrameInFlight {
    frame: u64,
    // Last value signaled on each queue that received work during the frame
    fence_values: Vec<(VelaQueueType, u64)>,
}

/// Tracks which submitted frames the GPU has finished and keeps the CPU from running more than
/// `frames_in_flight` frames ahead.
///
/// `queues` passed to every call is indexed by `VelaQueueType::index`.
pub struct FrameSync {
    in_flight: VecDeque<FrameInFlight>,
    frames_in_flight: u32,
    last_completed_frame: u64,
}

impl FrameSync {
    pub fn new(frames_in_flight: u32) -> Self {
        FrameSync {
            in_flight: Default::default(),
            frames_in_flight,
            last_completed_frame: 0,
        }
    }

    /// 0 until the first frame completes
    pub fn last_completed_frame(&self) -> u64 {
        self.last_completed_frame
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn is_complete(
        in_flight: &FrameInFlight,
        queues: &[VelaQueue],
    ) -> bool {
        in_flight
            .fence_values
            .iter()
            .all(|&(queue_type, value)| queues[queue_type.index()].is_fence_completed(value))
    }

    /// Non-blocking. Returns the last completed frame.
    pub fn poll(
        &mut self,
        queues: &[VelaQueue],
    ) -> u64 {
        while let Some(in_flight) = self.in_flight.front() {
            if !Self::is_complete(in_flight, queues) {
                break;
            }

            self.last_completed_frame = in_flight.frame;
            self.in_flight.pop_front();
        }

        self.last_completed_frame
    }

    /// Block until fewer than `frames_in_flight` frames are in flight. Returns the last completed
    /// frame.
    #[profiling::function]
    pub fn throttle(
        &mut self,
        queues: &[VelaQueue],
    ) -> VelaResult<u64> {
        self.poll(queues);
        while self.in_flight.len() >= self.frames_in_flight as usize {
            if let Some(oldest) = self.in_flight.front() {
                log::trace!("Waiting for frame {} to complete", oldest.frame);
                for &(queue_type, value) in &oldest.fence_values {
                    queues[queue_type.index()].wait_for_fence_cpu(value)?;
                }
            }

            self.poll(queues);
        }

        Ok(self.last_completed_frame)
    }

    /// Block until every frame has completed
    pub fn wait_for_all(
        &mut self,
        queues: &[VelaQueue],
    ) -> VelaResult<u64> {
        while let Some(in_flight) = self.in_flight.pop_front() {
            for &(queue_type, value) in &in_flight.fence_values {
                queues[queue_type.index()].wait_for_fence_cpu(value)?;
            }

            self.last_completed_frame = in_flight.frame;
        }

        Ok(self.last_completed_frame)
    }

    /// Record the fence values that mark the end of `frame`. Frames must end in order.
    pub fn end_frame(
        &mut self,
        frame: u64,
        fence_values: Vec<(VelaQueueType, u64)>,
    ) {
        debug_assert!(self.in_flight.back().map_or(true, |x| x.frame < frame));
        self.in_flight.push_back(FrameInFlight {
            frame,
            fence_values,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vela_api::null::VelaApiDefNull;
    use vela_api::VelaApi;

    #[test]
    fn test_throttle_waits_for_oldest_frame() {
        let _ = env_logger::builder().is_test(true).try_init();
        let api = VelaApi::new_null(&VelaApiDefNull {
            execution_latency: Duration::from_millis(5),
        })
        .unwrap();
        let device_context = api.device_context();
        let queues: Vec<_> = VelaQueueType::ALL
            .iter()
            .map(|&x| device_context.create_queue(x).unwrap())
            .collect();
        let graphics = &queues[VelaQueueType::Graphics.index()];

        let mut frame_sync = FrameSync::new(2);
        for frame in 1..=2 {
            let mut command_list = device_context
                .create_command_list(VelaQueueType::Graphics)
                .unwrap();
            let value = graphics.execute_command_list(&mut command_list).unwrap();
            frame_sync.end_frame(frame, vec![(VelaQueueType::Graphics, value)]);
        }

        let last_completed = frame_sync.throttle(&queues).unwrap();
        assert!(last_completed >= 1);
        assert!(frame_sync.in_flight_count() < 2);

        assert_eq!(frame_sync.wait_for_all(&queues).unwrap(), 2);
        assert_eq!(frame_sync.in_flight_count(), 0);
    }

    #[test]
    fn test_frame_without_work_completes_immediately() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let device_context = api.device_context();
        let queues: Vec<_> = VelaQueueType::ALL
            .iter()
            .map(|&x| device_context.create_queue(x).unwrap())
            .collect();

        let mut frame_sync = FrameSync::new(1);
        frame_sync.end_frame(1, Vec::default());
        assert_eq!(frame_sync.poll(&queues), 1);
    }
}
