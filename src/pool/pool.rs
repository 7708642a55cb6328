//! The per-output-port allocation engine

use tracing::debug;

use super::buffer::{BufferCounts, BufferSlot, PooledBuffer};
use crate::driver::{BufferAllocator, BufferHandle};
use crate::error::{MonetError, Result};
use crate::format::{BufferConfiguration, BufferRequirement};
use crate::topology::{BufferId, OutputLocation};

/// Fixed slot-table capacity per output port. The hardware requires a
/// bounded allocation guarantee, so the table never grows.
pub const MAX_BUFFERS_PER_PORT: usize = 16;

/// Allocation, repurpose, resize, and free logic for one output port.
///
/// Physical allocation always uses the original configuration footprint;
/// the original footprint must therefore be a superset of every later
/// current configuration. Buffers are reconfigured to the current
/// configuration right after allocation when the two differ.
#[derive(Debug, Clone)]
pub struct BufferPool {
    used: bool,
    requirement: BufferRequirement,
    original_config: BufferConfiguration,
    current_config: BufferConfiguration,
    slots: [BufferSlot; MAX_BUFFERS_PER_PORT],
    total_allocated: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self {
            used: false,
            requirement: BufferRequirement::default(),
            original_config: BufferConfiguration::default(),
            current_config: BufferConfiguration::default(),
            slots: [BufferSlot::default(); MAX_BUFFERS_PER_PORT],
            total_allocated: 0,
        }
    }
}

impl BufferPool {
    /// Create an unused pool with default requirement and configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this port participates in the current stream
    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Mark the port as participating (or not)
    pub fn set_used(&mut self, used: bool) {
        self.used = used;
    }

    /// The port's negotiated requirement
    pub fn requirement(&self) -> &BufferRequirement {
        &self.requirement
    }

    /// Replace the port's requirement
    pub fn set_requirement(&mut self, requirement: BufferRequirement) {
        self.requirement = requirement;
    }

    /// Mutable access to the port's requirement; used while merging caller
    /// overrides and driver-mandated constraints during negotiation
    pub fn requirement_mut(&mut self) -> &mut BufferRequirement {
        &mut self.requirement
    }

    /// Update only the requirement's count range
    pub fn set_counts(&mut self, min_count: usize, max_count: usize) {
        self.requirement.min_count = min_count;
        self.requirement.max_count = max_count;
    }

    /// The configuration buffers were physically allocated against
    pub fn original_config(&self) -> &BufferConfiguration {
        &self.original_config
    }

    /// The configuration buffers currently present to the pipeline
    pub fn current_config(&self) -> &BufferConfiguration {
        &self.current_config
    }

    /// Replace the current configuration bookkeeping
    pub fn set_current_config(&mut self, config: BufferConfiguration) {
        self.current_config = config;
    }

    /// Fix the original configuration from the current one. Done once at
    /// first successful negotiation, and again only after a full teardown.
    pub fn snapshot_original(&mut self) {
        self.original_config = self.current_config.clone();
    }

    /// Number of buffers currently allocated
    pub fn total_allocated(&self) -> usize {
        self.total_allocated
    }

    /// Snapshot of allocated/requested/in-use counts
    pub fn counts(&self) -> BufferCounts {
        BufferCounts {
            allocated: self.total_allocated,
            requested: self.requirement.max_count,
            in_use: self.slots.iter().filter(|s| s.allocated && s.in_use).count(),
        }
    }

    /// Forget all allocation bookkeeping without touching the driver.
    /// Only valid when the buffers were already reclaimed elsewhere.
    pub fn clear_bookkeeping(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.clear();
        }
        self.total_allocated = 0;
    }

    /// Allocate one buffer at a time into free slots until the requirement's
    /// max count is met.
    ///
    /// Allocation always uses the original configuration; each buffer is
    /// reconfigured to the current configuration right away when the two
    /// differ. An individual allocation failure after the minimum count has
    /// been reached still counts as success (partial fulfillment). A second
    /// call once the max is reached is a no-op.
    pub fn allocate_up_to(
        &mut self,
        location: OutputLocation,
        allocator: &mut dyn BufferAllocator,
    ) -> Result<()> {
        if !self.used {
            return Ok(());
        }

        while self.total_allocated < self.requirement.max_count {
            let index = match self.slots.iter().position(|s| !s.allocated) {
                Some(index) => index,
                None => {
                    if self.total_allocated >= self.requirement.min_count {
                        return Ok(());
                    }
                    return Err(MonetError::insufficient_memory(
                        self.requirement.min_count,
                        self.total_allocated,
                    ));
                }
            };

            let handle = match allocator.allocate_buffer(location, &self.original_config) {
                Ok(handle) => handle,
                Err(err) => {
                    if self.total_allocated >= self.requirement.min_count {
                        debug!(
                            ?location,
                            allocated = self.total_allocated,
                            requested = self.requirement.max_count,
                            "partial allocation accepted at minimum requirement"
                        );
                        return Ok(());
                    }
                    return Err(err);
                }
            };

            self.slots[index] = BufferSlot {
                allocated: true,
                in_use: false,
                handle: Some(handle),
            };
            self.total_allocated += 1;

            if !self.current_config.matches(&self.original_config) {
                allocator.set_buffer_config(location, &self.current_config, handle)?;
            }
        }
        Ok(())
    }

    /// Free allocated-and-unused buffers in every slot at index >= the
    /// requirement's max count. In-use slots are left untouched; shrink is
    /// best-effort.
    pub fn resize_down(
        &mut self,
        location: OutputLocation,
        allocator: &mut dyn BufferAllocator,
    ) -> Result<()> {
        if !self.used {
            return Ok(());
        }

        let keep = self.requirement.max_count.min(MAX_BUFFERS_PER_PORT);
        let restore = !self.current_config.matches(&self.original_config);
        for index in keep..MAX_BUFFERS_PER_PORT {
            if !self.slots[index].is_available() {
                continue;
            }
            let handle = self.slots[index].handle.expect("allocated slot has a handle");
            if restore {
                allocator.set_buffer_config(location, &self.original_config, handle)?;
            }
            allocator.free_buffer(location, handle)?;
            self.slots[index].clear();
            self.total_allocated -= 1;
        }
        Ok(())
    }

    /// Free every allocated-and-unused buffer.
    ///
    /// Before freeing, the allocator is offered a bulk restore-to-original
    /// repurpose as a pre-teardown normalization hint. In-use buffers stay
    /// allocated; the caller must recover them from the driver first.
    /// Idempotent.
    pub fn free_unused(
        &mut self,
        location: OutputLocation,
        allocator: &mut dyn BufferAllocator,
    ) -> Result<()> {
        if !self.used {
            return Ok(());
        }

        if self.total_allocated > 0 {
            let handles = self.allocated_handles();
            if allocator.repurpose_buffers(
                location,
                &self.original_config,
                &self.original_config,
                &handles,
            )? {
                debug!(?location, "restored buffers to their original configuration");
            }
        }

        for index in 0..MAX_BUFFERS_PER_PORT {
            if !self.slots[index].is_available() {
                continue;
            }
            let handle = self.slots[index].handle.expect("allocated slot has a handle");
            allocator.free_buffer(location, handle)?;
            self.slots[index].clear();
            self.total_allocated -= 1;
        }
        Ok(())
    }

    /// Ask the allocator to adapt the existing slot set in place from the
    /// original configuration to `target`.
    ///
    /// On acceptance the pool adopts `target` as its current configuration
    /// with no change to allocation flags or counts. On rejection the caller
    /// falls back to free-then-reallocate.
    pub fn repurpose(
        &mut self,
        location: OutputLocation,
        allocator: &mut dyn BufferAllocator,
        target: &BufferConfiguration,
    ) -> Result<bool> {
        let handles = self.allocated_handles();
        let accepted =
            allocator.repurpose_buffers(location, &self.original_config, target, &handles)?;
        if accepted {
            self.current_config = target.clone();
        }
        Ok(accepted)
    }

    /// Hand out up to `n` allocated-and-unused buffers, tagging each with
    /// its packed identity and flipping it to in-use.
    pub fn acquire_unused(
        &mut self,
        location: OutputLocation,
        n: usize,
    ) -> Result<Vec<PooledBuffer>> {
        if !self.used {
            return Err(MonetError::invalid_state("port is not used by this stream"));
        }
        if n == 0 {
            return Err(MonetError::bad_parameter("n", "requested zero buffers"));
        }

        let mut out = Vec::new();
        for index in 0..MAX_BUFFERS_PER_PORT {
            if self.slots[index].is_available() {
                let handle = self.slots[index].handle.expect("allocated slot has a handle");
                self.slots[index].in_use = true;
                out.push(PooledBuffer {
                    id: BufferId::pack(location, index),
                    handle,
                });
                if out.len() == n {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Peek at up to `n` allocated-and-unused buffers without acquiring them
    pub fn unused_buffers(&self, location: OutputLocation, n: usize) -> Result<Vec<PooledBuffer>> {
        if !self.used {
            return Err(MonetError::invalid_state("port is not used by this stream"));
        }
        if n == 0 {
            return Err(MonetError::bad_parameter("n", "requested zero buffers"));
        }

        let mut out = Vec::new();
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.is_available() {
                out.push(PooledBuffer {
                    id: BufferId::pack(location, index),
                    handle: slot.handle.expect("allocated slot has a handle"),
                });
                if out.len() == n {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Return previously acquired buffers, matching each handle's identity
    /// against the slot table. Returns the number of buffers released.
    pub fn release(&mut self, handles: &[BufferHandle]) -> Result<usize> {
        if !self.used {
            return Err(MonetError::invalid_state("port is not used by this stream"));
        }

        let mut released = 0;
        for handle in handles {
            for slot in self.slots.iter_mut() {
                if slot.allocated && slot.handle == Some(*handle) {
                    slot.in_use = false;
                    released += 1;
                    break;
                }
            }
        }
        Ok(released)
    }

    /// Mark one slot in-use (or not) by index; used by the stream while
    /// handing buffers to the driver
    pub(crate) fn set_in_use(&mut self, index: usize, in_use: bool) {
        self.slots[index].in_use = in_use;
    }

    /// Clear the in-use flag on every slot; used after the driver has
    /// returned all buffers for the port
    pub(crate) fn clear_all_in_use(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.in_use = false;
        }
    }

    fn allocated_handles(&self) -> Vec<BufferHandle> {
        self.slots
            .iter()
            .filter(|s| s.allocated)
            .filter_map(|s| s.handle)
            .collect()
    }
}
