//! Management Frame Descriptor Pool
//!
//! Fixed-capacity pool of correlation handles for management frames that
//! are in flight between submission and their asynchronous completion.
//!
//! # Architecture
//!
//! ```text
//! DescPool
//!   └─→ BhLock (completion-masked critical section)
//!        └─→ PoolState
//!             ├─→ slots:     [d0][d1][d2][d3]     (fixed, indexed by DescId)
//!             └─→ free_list: head → d3 → d1 → ∅   (LIFO, links live in the slots)
//! ```
//!
//! A slot is always either free (on the list, `in_use == false`) or leased
//! (off the list, `in_use == true`). `acquire` pops the head and `release`
//! pushes back onto it, so both are O(1).

pub mod descriptor;
pub mod free_list;
pub mod lock;
pub mod pool;
pub mod stats;

pub use descriptor::{DescId, Descriptor};
pub use free_list::FreeList;
pub use lock::{completions_masked, BhLock, BhLockGuard};
pub use pool::DescPool;
pub use stats::PoolStats;
