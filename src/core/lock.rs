use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

fn log_poisoned(lock_type: &str, context: &str) {
    log::error!("{} lock poisoned in {}", lock_type, context);
}

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub fn lock_mutex<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log_poisoned("Mutex", context);
            poisoned.into_inner()
        }
    }
}

/// Blocks on `cond` until notified.
pub fn wait<'a, T>(cond: &Condvar, guard: MutexGuard<'a, T>, context: &str) -> MutexGuard<'a, T> {
    match cond.wait(guard) {
        Ok(guard) => guard,
        Err(poisoned) => {
            log_poisoned("Condvar", context);
            poisoned.into_inner()
        }
    }
}

/// Waits on `cond` while `keep_waiting` holds, but never past `deadline`.
///
/// Spurious wakeups are absorbed by re-checking the predicate. Returns the
/// guard with the lock held either way; the caller inspects the state.
pub fn wait_until<'a, T, F>(
    cond: &Condvar,
    mut guard: MutexGuard<'a, T>,
    deadline: Instant,
    context: &str,
    mut keep_waiting: F,
) -> MutexGuard<'a, T>
where
    F: FnMut(&mut T) -> bool,
{
    while keep_waiting(&mut *guard) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        guard = match cond.wait_timeout(guard, deadline - now) {
            Ok((guard, _)) => guard,
            Err(poisoned) => {
                log_poisoned("Condvar", context);
                poisoned.into_inner().0
            }
        };
    }
    guard
}

/// Like [`wait_until`] with a relative timeout.
pub fn wait_timeout<'a, T, F>(
    cond: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
    context: &str,
    keep_waiting: F,
) -> MutexGuard<'a, T>
where
    F: FnMut(&mut T) -> bool,
{
    let deadline = Instant::now()
        .checked_add(timeout)
        .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));
    wait_until(cond, guard, deadline, context, keep_waiting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn poisoned_mutex_is_recovered() {
        let mutex = Arc::new(Mutex::new(7u32));
        let cloned = mutex.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison it");
        })
        .join();

        assert!(mutex.is_poisoned());
        assert_eq!(*lock_mutex(&mutex, "test"), 7);
    }

    #[test]
    fn wait_timeout_returns_after_deadline() {
        let mutex = Mutex::new(false);
        let cond = Condvar::new();
        let start = Instant::now();
        let guard = lock_mutex(&mutex, "test");
        let guard = wait_timeout(&cond, guard, Duration::from_millis(20), "test", |ready| !*ready);
        assert!(!*guard);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
