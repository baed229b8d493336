//! Descriptor pool implementation

use super::descriptor::{DescId, Descriptor};
use super::free_list::FreeList;
use super::lock::BhLock;
use super::stats::{PoolCounters, PoolStats};
use crate::error::{Error, Result};
use crate::metrics;
use tracing::{debug, error, info, warn};

/// Live state of an initialized pool
struct PoolState<T> {
    /// Fixed backing array, indexed by `DescId`
    slots: Box<[Descriptor<T>]>,
    free_list: FreeList,
    counters: PoolCounters,
}

impl<T> PoolState<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn leased(&self) -> usize {
        self.capacity() - self.free_list.len()
    }

    /// Look up a slot that the caller currently holds
    fn leased_slot(&mut self, id: DescId) -> Result<&mut Descriptor<T>> {
        let capacity = self.capacity();
        let slot = self.slots.get_mut(id.index()).ok_or_else(|| Error::InvalidHandle {
            id: id.0,
            reason: format!("out of range for pool of {} descriptors", capacity),
        })?;

        if !slot.in_use {
            return Err(Error::InvalidHandle {
                id: id.0,
                reason: "descriptor is not leased".to_string(),
            });
        }
        Ok(slot)
    }
}

/// Fixed-capacity pool of management frame descriptors
///
/// A caller acquires a [`DescId`] before submitting a frame and releases it
/// once the completion has been processed. Free descriptors are handed out
/// most-recently-released first.
///
/// The pool starts uninitialized; [`DescPool::init`] allocates the backing
/// array and [`DescPool::deinit`] drops it again. Every operation on an
/// uninitialized pool fails with [`Error::InvalidState`].
pub struct DescPool<T = ()> {
    name: String,
    state: BhLock<Option<PoolState<T>>>,
}

impl<T> DescPool<T> {
    /// Create an uninitialized pool
    ///
    /// `name` labels the pool's metrics and must be unique per process;
    /// two live pools sharing a name overwrite each other's gauges.
    /// [`crate::MgmtTxRxContext`] derives unique names from the psoc id.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let state = BhLock::new(format!("{}_lock", name), None);
        Self { name, state }
    }

    /// Create and initialize a pool in one step
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Result<Self> {
        let pool = Self::new(name);
        pool.init(capacity)?;
        Ok(pool)
    }

    /// Allocate `capacity` descriptors and put all of them on the free list
    pub fn init(&self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            error!(pool = %self.name, "Invalid pool size 0 given");
            return Err(Error::InvalidArgument(
                "descriptor pool capacity must be greater than zero".to_string(),
            ));
        }
        if capacity > u32::MAX as usize {
            error!(pool = %self.name, capacity, "Pool size exceeds descriptor id range");
            return Err(Error::InvalidArgument(format!(
                "descriptor pool capacity {} exceeds {}",
                capacity,
                u32::MAX
            )));
        }

        // Allocate before taking the lock so a failure leaves nothing behind
        let mut slots = allocate_slots(capacity).map_err(|e| {
            error!(pool = %self.name, capacity, "Failed to allocate desc pool");
            e
        })?;

        let mut free_list = FreeList::new();
        for i in 0..capacity as u32 {
            free_list.push_front(&mut slots, DescId(i));
        }

        {
            let mut state = self.state.lock()?;
            if state.is_some() {
                return Err(Error::InvalidState(format!(
                    "descriptor pool '{}' is already initialized",
                    self.name
                )));
            }
            *state = Some(PoolState {
                slots,
                free_list,
                counters: PoolCounters::default(),
            });
            metrics::record_levels(&self.name, 0, capacity);
        }

        info!(pool = %self.name, capacity, "Initialized mgmt desc pool");
        Ok(())
    }

    /// Drop the backing array
    ///
    /// Descriptors still leased are discarded together with their payloads.
    /// Payloads are dropped after the pool lock is released.
    pub fn deinit(&self) -> Result<()> {
        let (state, drained, leaked) = {
            let mut guard = self.state.lock()?;
            let Some(mut state) = guard.take() else {
                drop(guard);
                error!(pool = %self.name, "Empty mgmt descriptor pool");
                return Err(self.not_ready());
            };
            let leaked = state.leased();
            let drained = state.free_list.drain(&mut state.slots);
            metrics::record_levels(&self.name, 0, 0);
            (state, drained, leaked)
        };
        drop(state);

        if leaked > 0 {
            warn!(pool = %self.name, leaked, "Discarding descriptors still in flight");
        }
        info!(pool = %self.name, drained, "Deinitialized mgmt desc pool");
        Ok(())
    }

    /// Lease a free descriptor
    ///
    /// Returns [`Error::Exhausted`] when every descriptor is in flight; the
    /// caller is expected to drop or requeue the frame.
    pub fn acquire(&self) -> Result<DescId> {
        self.acquire_inner(None)
    }

    /// Lease a free descriptor and attach `payload` to it
    pub fn acquire_with(&self, payload: T) -> Result<DescId> {
        self.acquire_inner(Some(payload))
    }

    fn acquire_inner(&self, payload: Option<T>) -> Result<DescId> {
        let id = {
            let mut guard = self.state.lock()?;
            let state = guard.as_mut().ok_or_else(|| self.not_ready())?;

            let Some(id) = state.free_list.pop_front(&mut state.slots) else {
                state.counters.on_exhausted();
                let capacity = state.capacity();
                drop(guard);

                metrics::record_exhausted(&self.name);
                error!(pool = %self.name, capacity, "Descriptor freelist empty");
                return Err(Error::Exhausted {
                    pool: self.name.clone(),
                    capacity,
                });
            };

            state.slots[id.index()].lease(payload);
            let leased = state.leased();
            state.counters.on_acquire(leased);
            metrics::record_levels(&self.name, leased, state.free_list.len());
            id
        };

        metrics::record_acquire(&self.name);
        info!(pool = %self.name, desc_id = id.0, "Retrieved mgmt desc");
        Ok(id)
    }

    /// Return a descriptor to the free list, handing back its payload
    ///
    /// Out-of-range ids and ids that are not currently leased are rejected
    /// with [`Error::InvalidHandle`] and leave the pool untouched.
    pub fn release(&self, id: DescId) -> Result<Option<T>> {
        let payload = {
            let mut guard = self.state.lock()?;
            let state = guard.as_mut().ok_or_else(|| self.not_ready())?;

            let freed = state.leased_slot(id).map(Descriptor::free);
            let payload = match freed {
                Ok(payload) => payload,
                Err(e) => {
                    drop(guard);
                    error!(pool = %self.name, desc_id = id.0, error = %e, "Rejected mgmt desc put");
                    return Err(e);
                }
            };
            state.free_list.push_front(&mut state.slots, id);
            state.counters.on_release();
            metrics::record_levels(&self.name, state.leased(), state.free_list.len());
            payload
        };

        metrics::record_release(&self.name);
        info!(pool = %self.name, desc_id = id.0, "Put mgmt desc into freelist");
        Ok(payload)
    }

    /// Attach a payload to a leased descriptor, returning the previous one
    pub fn attach(&self, id: DescId, payload: T) -> Result<Option<T>> {
        let mut guard = self.state.lock()?;
        let state = guard.as_mut().ok_or_else(|| self.not_ready())?;
        let slot = state.leased_slot(id)?;
        debug!(pool = %self.name, desc_id = id.0, "Attached payload");
        Ok(slot.payload.replace(payload))
    }

    /// Run `f` on the payload of a leased descriptor
    ///
    /// `f` runs with the pool lock held and must not call back into this
    /// pool; doing so fails with [`Error::LockRecursion`].
    pub fn with_payload<R>(&self, id: DescId, f: impl FnOnce(Option<&mut T>) -> R) -> Result<R> {
        let mut guard = self.state.lock()?;
        let state = guard.as_mut().ok_or_else(|| self.not_ready())?;
        let slot = state.leased_slot(id)?;
        Ok(f(slot.payload.as_mut()))
    }

    /// Whether `id` is currently leased
    pub fn is_leased(&self, id: DescId) -> Result<bool> {
        let guard = self.state.lock()?;
        let state = guard.as_ref().ok_or_else(|| self.not_ready())?;
        state
            .slots
            .get(id.index())
            .map(Descriptor::in_use)
            .ok_or_else(|| Error::InvalidHandle {
                id: id.0,
                reason: format!("out of range for pool of {} descriptors", state.capacity()),
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the pool is initialized
    ///
    /// Reports `false` when called from inside this pool's own critical
    /// section (for example from a `with_payload` closure).
    pub fn is_ready(&self) -> bool {
        self.state.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Number of descriptors, 0 while uninitialized
    ///
    /// Like [`DescPool::stats`], reads 0 when re-entered from this pool's
    /// own critical section.
    pub fn capacity(&self) -> usize {
        self.stats().capacity
    }

    /// Descriptors on the free list; 0 when uninitialized or re-entered
    pub fn free_count(&self) -> usize {
        self.stats().free
    }

    /// Descriptors in flight; 0 when uninitialized or re-entered
    pub fn leased_count(&self) -> usize {
        self.stats().leased
    }

    /// Snapshot of the pool's levels and counters
    ///
    /// Returns an empty, not-ready snapshot when called from inside this
    /// pool's own critical section.
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            name: self.name.clone(),
            ..Default::default()
        };

        if let Ok(guard) = self.state.lock() {
            if let Some(state) = guard.as_ref() {
                stats.ready = true;
                stats.capacity = state.capacity();
                stats.free = state.free_list.len();
                stats.leased = state.leased();
                stats.high_watermark = state.counters.high_watermark;
                stats.acquires = state.counters.acquires;
                stats.releases = state.counters.releases;
                stats.exhaustions = state.counters.exhaustions;
            }
        }
        stats
    }

    fn not_ready(&self) -> Error {
        Error::InvalidState(format!(
            "descriptor pool '{}' is not initialized",
            self.name
        ))
    }
}

impl<T> std::fmt::Debug for DescPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescPool")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}

fn allocate_slots<T>(capacity: usize) -> Result<Box<[Descriptor<T>]>> {
    let mut slots = Vec::new();
    slots.try_reserve_exact(capacity).map_err(|e| {
        Error::OutOfMemory(format!(
            "failed to allocate {} descriptors: {}",
            capacity, e
        ))
    })?;
    slots.extend((0..capacity as u32).map(|i| Descriptor::new(DescId(i))));
    Ok(slots.into_boxed_slice())
}
