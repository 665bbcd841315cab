//! Graphics resource accounting
//!
//! Every visual object holds a handle from the pool and must hand it back
//! when it leaves the scene. The live count is what leak tests assert on.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    CellMesh,
    Spark,
    Ribbon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(u64);

#[derive(Debug, Default)]
pub struct ResourcePool {
    next: u64,
    live: HashMap<ResourceHandle, ResourceKind>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, kind: ResourceKind) -> ResourceHandle {
        let handle = ResourceHandle(self.next);
        self.next += 1;
        self.live.insert(handle, kind);
        handle
    }

    /// Release a handle; false if it was already released.
    pub fn release(&mut self, handle: ResourceHandle) -> bool {
        self.live.remove(&handle).is_some()
    }

    pub fn live(&self) -> usize {
        self.live.len()
    }

    pub fn live_of(&self, kind: ResourceKind) -> usize {
        self.live.values().filter(|k| **k == kind).count()
    }
}
