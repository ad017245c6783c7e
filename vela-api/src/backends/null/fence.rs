use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct NullFenceInner {
    completed_value: Mutex<u64>,
    signaled: Condvar,
}

/// A 64-bit monotonic fence. Values are only ever raised by the queue worker that owns the
/// fence. Waiters block on a condition variable.
#[derive(Clone, Debug)]
pub struct VelaFenceNull {
    inner: Arc<NullFenceInner>,
}

impl VelaFenceNull {
    pub(crate) fn new(initial_value: u64) -> Self {
        let inner = NullFenceInner {
            completed_value: Mutex::new(initial_value),
            signaled: Condvar::new(),
        };

        VelaFenceNull {
            inner: Arc::new(inner),
        }
    }

    pub fn completed_value(&self) -> u64 {
        *self.inner.completed_value.lock().unwrap()
    }

    pub fn is_completed(
        &self,
        value: u64,
    ) -> bool {
        self.completed_value() >= value
    }

    /// Raise the fence to `value`. Lower values are ignored so the fence never goes backwards.
    pub(crate) fn signal(
        &self,
        value: u64,
    ) {
        let mut completed_value = self.inner.completed_value.lock().unwrap();
        if value > *completed_value {
            *completed_value = value;
            self.inner.signaled.notify_all();
        }
    }

    /// Block until the fence reaches `value`
    pub fn wait(
        &self,
        value: u64,
    ) {
        let mut completed_value = self.inner.completed_value.lock().unwrap();
        while *completed_value < value {
            completed_value = self.inner.signaled.wait(completed_value).unwrap();
        }
    }

    /// Block until the fence reaches `value` or the timeout expires. Returns true if the value
    /// was reached.
    pub fn wait_timeout(
        &self,
        value: u64,
        timeout: Duration,
    ) -> bool {
        let completed_value = self.inner.completed_value.lock().unwrap();
        let (completed_value, _) = self
            .inner
            .signaled
            .wait_timeout_while(completed_value, timeout, |completed| *completed < value)
            .unwrap();
        *completed_value >= value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signal_is_monotonic() {
        let fence = VelaFenceNull::new(0);
        fence.signal(5);
        fence.signal(3);
        assert_eq!(fence.completed_value(), 5);
        assert!(fence.is_completed(5));
        assert!(!fence.is_completed(6));
    }

    #[test]
    fn test_wait_blocks_until_signaled() {
        let fence = VelaFenceNull::new(0);
        let signaler = fence.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signaler.signal(1);
            thread::sleep(Duration::from_millis(20));
            signaler.signal(2);
        });

        fence.wait(2);
        assert!(fence.completed_value() >= 2);
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let fence = VelaFenceNull::new(0);
        assert!(!fence.wait_timeout(1, Duration::from_millis(10)));
        fence.signal(1);
        assert!(fence.wait_timeout(1, Duration::from_millis(10)));
    }
}
