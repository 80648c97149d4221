use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::core::lock::{lock_mutex, wait, wait_timeout};

/// A state value guarded by one mutex, paired with one condition variable.
///
/// Each encoder owns one of these per direction (input queue, output ring).
/// Producers lock, mutate, [`notify`](Signal::notify) and release; the single
/// consumer waits with a deadline.
pub struct Signal<T> {
    state: Mutex<T>,
    cond: Condvar,
    context: &'static str,
}

impl<T> Signal<T> {
    pub fn new(state: T, context: &'static str) -> Self {
        Self {
            state: Mutex::new(state),
            cond: Condvar::new(),
            context,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        lock_mutex(&self.state, self.context)
    }

    pub fn notify(&self) {
        self.cond.notify_one();
    }

    pub fn notify_all(&self) {
        self.cond.notify_all();
    }

    /// Blocks without a deadline while `keep_waiting` holds.
    pub fn wait_while<'a, F>(&self, mut guard: MutexGuard<'a, T>, mut keep_waiting: F) -> MutexGuard<'a, T>
    where
        F: FnMut(&mut T) -> bool,
    {
        while keep_waiting(&mut *guard) {
            guard = wait(&self.cond, guard, self.context);
        }
        guard
    }

    /// Blocks while `keep_waiting` holds, at most for `timeout`.
    pub fn wait_while_for<'a, F>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
        keep_waiting: F,
    ) -> MutexGuard<'a, T>
    where
        F: FnMut(&mut T) -> bool,
    {
        wait_timeout(&self.cond, guard, timeout, self.context, keep_waiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn notify_releases_waiter() {
        let signal = Arc::new(Signal::new(0u32, "test"));
        let producer = signal.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            *producer.lock() = 3;
            producer.notify();
        });

        let guard = signal.lock();
        let guard = signal.wait_while_for(guard, Duration::from_secs(5), |value| *value == 0);
        assert_eq!(*guard, 3);
        drop(guard);
        handle.join().unwrap();
    }
}
