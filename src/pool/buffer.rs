//! Buffer slot bookkeeping and pooled buffer hand-out

use serde::{Deserialize, Serialize};

use crate::driver::BufferHandle;
use crate::topology::BufferId;

/// One entry in a port's slot table
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferSlot {
    /// Whether the slot holds a physically allocated buffer
    pub allocated: bool,
    /// Whether the buffer is currently out with the driver or a caller
    pub in_use: bool,
    /// Driver-assigned identity of the allocated buffer
    pub handle: Option<BufferHandle>,
}

impl BufferSlot {
    /// Whether the slot can be handed out right now
    pub fn is_available(&self) -> bool {
        self.allocated && !self.in_use
    }

    /// Reset the slot to its unallocated state
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A buffer handed out of a pool: the packed slot identity plus the
/// driver-assigned handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PooledBuffer {
    /// Packed (component, port, slot index) identity
    pub id: BufferId,
    /// Driver-assigned identity
    pub handle: BufferHandle,
}

/// Snapshot of one port's buffer counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BufferCounts {
    /// Buffers currently physically allocated
    pub allocated: usize,
    /// Buffers the port's requirement asks for (max)
    pub requested: usize,
    /// Allocated buffers currently out with the driver or a caller
    pub in_use: usize,
}
