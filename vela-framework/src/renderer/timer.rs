use std::time;

/// Time passing between rendered frames, handed to every pass's `render`
#[derive(Copy, Clone, Debug)]
pub struct FrameTimer {
    app_start_instant: time::Instant,
    current_instant: time::Instant,
    total_time: time::Duration,
    previous_frame_time: time::Duration,
    previous_frame_dt: f32,
    frame_index: u64,
}

impl FrameTimer {
    /// Default is not allowed because the current time affects the object
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let now_instant = time::Instant::now();
        FrameTimer {
            app_start_instant: now_instant,
            current_instant: now_instant,
            total_time: time::Duration::default(),
            previous_frame_time: time::Duration::default(),
            previous_frame_dt: 0.0,
            frame_index: 0,
        }
    }

    /// Call once at the start of every frame
    pub fn update(&mut self) {
        let now_instant = time::Instant::now();
        self.update_with_instant(now_instant);
    }

    pub(crate) fn update_with_instant(
        &mut self,
        now_instant: time::Instant,
    ) {
        let elapsed = now_instant.saturating_duration_since(self.current_instant);
        self.current_instant = now_instant;
        self.total_time = now_instant.saturating_duration_since(self.app_start_instant);
        self.previous_frame_time = elapsed;
        self.previous_frame_dt = elapsed.as_secs_f32();
        self.frame_index += 1;
    }

    /// Number of frames started so far. The first frame is 1.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn total_time(&self) -> time::Duration {
        self.total_time
    }

    pub fn current_instant(&self) -> time::Instant {
        self.current_instant
    }

    /// Time between the start of the previous frame and the start of this one
    pub fn previous_frame_time(&self) -> time::Duration {
        self.previous_frame_time
    }

    /// previous frame time in f32 seconds
    pub fn delta_time(&self) -> f32 {
        self.previous_frame_dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_advances_frame_and_time() {
        let mut timer = FrameTimer::new();
        let start = timer.current_instant();
        timer.update_with_instant(start + time::Duration::from_millis(16));
        timer.update_with_instant(start + time::Duration::from_millis(40));

        assert_eq!(timer.frame_index(), 2);
        assert_eq!(timer.previous_frame_time(), time::Duration::from_millis(24));
        assert_eq!(timer.total_time(), time::Duration::from_millis(40));
        assert!((timer.delta_time() - 0.024).abs() < 1e-6);
    }
}
