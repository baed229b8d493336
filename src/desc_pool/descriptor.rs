//! Descriptor slots for the management frame descriptor pool

use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation handle for one in-flight management frame
///
/// The value is the slot's index in the pool's backing array and never
/// changes for the lifetime of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DescId(pub u32);

impl DescId {
    /// Create a new descriptor ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Index into the backing array
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DescId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "desc#{}", self.0)
    }
}

impl From<DescId> for u32 {
    fn from(id: DescId) -> Self {
        id.0
    }
}

/// A slot in the descriptor pool
///
/// `next_free` is the intrusive free-list link. It is only meaningful
/// while the slot is free.
#[derive(Debug)]
pub struct Descriptor<T> {
    /// Stable ID (array index)
    pub(crate) id: DescId,
    /// Whether this slot is currently leased to a caller
    pub(crate) in_use: bool,
    /// Next free slot, if any
    pub(crate) next_free: Option<u32>,
    /// Caller-owned data, never interpreted by the pool
    pub(crate) payload: Option<T>,
}

impl<T> Descriptor<T> {
    /// Create a new free slot
    pub fn new(id: DescId) -> Self {
        Self {
            id,
            in_use: false,
            next_free: None,
            payload: None,
        }
    }

    pub fn id(&self) -> DescId {
        self.id
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }

    /// Lease this slot
    pub(crate) fn lease(&mut self, payload: Option<T>) {
        self.in_use = true;
        self.next_free = None;
        self.payload = payload;
    }

    /// Return this slot, handing back whatever the caller attached
    pub(crate) fn free(&mut self) -> Option<T> {
        self.in_use = false;
        self.payload.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desc_id_creation() {
        let id = DescId::new(7);
        assert_eq!(id.index(), 7);
        assert_eq!(u32::from(id), 7);
        assert_eq!(id.to_string(), "desc#7");
    }

    #[test]
    fn test_descriptor_lifecycle() {
        let mut desc: Descriptor<&str> = Descriptor::new(DescId::new(0));
        assert!(!desc.in_use());

        desc.lease(Some("probe_req"));
        assert!(desc.in_use());
        assert_eq!(desc.id(), DescId::new(0));

        assert_eq!(desc.free(), Some("probe_req"));
        assert!(!desc.in_use());
        assert_eq!(desc.free(), None);
    }
}
