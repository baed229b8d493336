//! Completion-context safe lock for the descriptor pool
//!
//! Descriptors are released from completion handlers, which may run on a
//! thread that is already inside a pool critical section (for example a
//! transmit path that completes inline). A plain mutex would self-deadlock
//! there. `BhLock` marks the holding thread as having completions masked
//! for the duration of the critical section and rejects same-thread
//! re-entry with [`Error::LockRecursion`].

use crate::error::{Error, Result};
use parking_lot::{Mutex, MutexGuard};
use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Number of BhLocks held by this thread
    static MASK_DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Non-zero per-thread identity
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

fn thread_token() -> u64 {
    THREAD_TOKEN.with(|t| *t)
}

/// Whether the current thread holds any `BhLock`
///
/// Completion dispatchers check this and defer delivery rather than
/// calling back into a pool from inside its own critical section.
pub fn completions_masked() -> bool {
    MASK_DEPTH.with(|d| d.get() > 0)
}

/// Mutex that masks completion delivery on the holding thread
#[derive(Debug)]
pub struct BhLock<T> {
    name: String,
    /// Token of the holding thread, 0 when unlocked
    owner: AtomicU64,
    inner: Mutex<T>,
}

impl<T> BhLock<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            owner: AtomicU64::new(0),
            inner: Mutex::new(value),
        }
    }

    /// Acquire the lock
    ///
    /// Fails instead of deadlocking when the calling thread already holds
    /// this lock.
    pub fn lock(&self) -> Result<BhLockGuard<'_, T>> {
        let me = thread_token();
        // Only this thread ever stores `me`, so a relaxed load is enough
        if self.owner.load(Ordering::Relaxed) == me {
            return Err(Error::LockRecursion(format!(
                "{} re-entered from its own critical section",
                self.name
            )));
        }

        MASK_DEPTH.with(|d| d.set(d.get() + 1));
        let guard = self.inner.lock();
        self.owner.store(me, Ordering::Relaxed);

        Ok(BhLockGuard { lock: self, guard })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the calling thread currently holds this lock
    pub fn held_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == thread_token()
    }
}

/// RAII guard; unlocks and unmasks completions on drop
pub struct BhLockGuard<'a, T> {
    lock: &'a BhLock<T>,
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for BhLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for BhLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for BhLockGuard<'_, T> {
    fn drop(&mut self) {
        // The mutex itself is released when `guard` drops right after this
        self.lock.owner.store(0, Ordering::Relaxed);
        MASK_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lock_masks_completions() -> Result<()> {
        let lock = BhLock::new("test", 0u32);
        assert!(!completions_masked());

        {
            let mut guard = lock.lock()?;
            *guard += 1;
            assert!(completions_masked());
            assert!(lock.held_by_current_thread());
        }

        assert!(!completions_masked());
        assert!(!lock.held_by_current_thread());
        assert_eq!(*lock.lock()?, 1);
        Ok(())
    }

    #[test]
    fn test_recursion_is_reported() -> Result<()> {
        let lock = BhLock::new("desc_pool_lock", ());
        let _guard = lock.lock()?;

        match lock.lock() {
            Err(Error::LockRecursion(msg)) => assert!(msg.contains("desc_pool_lock")),
            other => panic!("expected LockRecursion, got {:?}", other.map(|_| ())),
        }

        // A different lock on the same thread is fine
        let other = BhLock::new("other", ());
        let _inner = other.lock()?;
        Ok(())
    }

    #[test]
    fn test_lock_across_threads() {
        let lock = Arc::new(BhLock::new("shared", 0u64));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        *lock.lock().unwrap() += 1;
                    }
                    assert!(!completions_masked());
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock().unwrap(), 4000);
    }
}
