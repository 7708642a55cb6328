//! One pipeline session's buffer protocol against the driver

use tracing::{debug, warn};

use super::state::{StreamConfig, StreamType};
use crate::driver::{BufferAllocator, BufferHandle, BufferHandler};
use crate::error::{MonetError, Result};
use crate::format::BufferConfiguration;
use crate::pool::{BufferCounts, PooledBuffer, MAX_BUFFERS_PER_PORT};
use crate::topology::{Component, InputLocation, OutputLocation};

/// Owns the per-port pools of one session and drives buffers to and from
/// the external driver.
///
/// Streams are constructed empty and only become operational once a factory
/// has negotiated their configuration and attached the driver collaborators.
/// All methods must be serialized by the caller; there is no internal
/// locking at this layer.
pub struct Stream {
    initialized: bool,
    stream_type: StreamType,
    config: StreamConfig,
    allocator: Option<Box<dyn BufferAllocator>>,
    handler: Option<Box<dyn BufferHandler>>,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("initialized", &self.initialized)
            .field("stream_type", &self.stream_type)
            .field("allocated_locations", &self.config.allocated_locations())
            .finish()
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream {
    /// Create an uninitialized stream; it must be built by a factory before
    /// any buffer operation succeeds
    pub fn new() -> Self {
        Self {
            initialized: false,
            stream_type: StreamType::StandardCapture,
            config: StreamConfig::new(),
            allocator: None,
            handler: None,
        }
    }

    /// Whether the stream has been built and not yet closed or invalidated
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The session layout this stream was built for
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    fn guard(&self, operation: &str) -> Result<()> {
        if !self.initialized {
            return Err(MonetError::not_initialized(operation));
        }
        Ok(())
    }

    /// The current configuration of one output port
    pub fn output_port_config(&self, location: OutputLocation) -> Result<&BufferConfiguration> {
        self.guard("output_port_config")?;
        Ok(self.config.output(location).current_config())
    }

    /// The current configuration of one input port
    pub fn input_port_config(&self, location: InputLocation) -> Result<&BufferConfiguration> {
        self.guard("input_port_config")?;
        Ok(&self.config.input(location).current_config)
    }

    /// Allocated/requested/in-use counts for one output port
    pub fn buffer_counts(&self, location: OutputLocation) -> Result<BufferCounts> {
        self.guard("buffer_counts")?;
        Ok(self.config.output(location).counts())
    }

    /// Every output location currently holding allocated buffers
    pub fn allocated_locations(&self) -> Result<Vec<OutputLocation>> {
        self.guard("allocated_locations")?;
        Ok(self.config.allocated_locations())
    }

    /// Allocate buffers for one port up to its requirement
    pub fn allocate_at(&mut self, location: OutputLocation) -> Result<()> {
        self.guard("allocate_at")?;
        let allocator = required_allocator(&mut self.allocator)?;
        self.config
            .output_mut(location)
            .allocate_up_to(location, allocator.as_mut())
    }

    /// Allocate buffers for every used output port in the pipeline
    pub fn allocate_all(&mut self) -> Result<()> {
        self.guard("allocate_all")?;
        let allocator = required_allocator(&mut self.allocator)?;
        self.config.try_for_each_output(|location, pool| {
            pool.allocate_up_to(location, allocator.as_mut())
        })
    }

    /// Hand every allocated-and-unused buffer at the port to the driver,
    /// marking each in-use. No-op on unused ports.
    pub fn send_to_driver(&mut self, location: OutputLocation) -> Result<()> {
        self.guard("send_to_driver")?;
        let handler = required_handler(&mut self.handler)?;
        let pool = self.config.output_mut(location);

        if !pool.is_used() {
            return Ok(());
        }

        let outgoing = pool.unused_buffers(location, MAX_BUFFERS_PER_PORT)?;
        for buffer in outgoing {
            handler.give_buffer_to_component(location, &buffer)?;
            pool.set_in_use(buffer.id.index(), true);
        }
        Ok(())
    }

    /// Send buffers for every output port of one component
    pub fn send_to_component(&mut self, component: Component) -> Result<()> {
        self.guard("send_to_component")?;
        for location in OutputLocation::ports_of(component) {
            self.send_to_driver(location)?;
        }
        Ok(())
    }

    /// Ask the driver to return every buffer it holds for the port, then
    /// clear the in-use flags. No-op when the port is unused or nothing is
    /// out with the driver.
    pub fn recover_from_driver(&mut self, location: OutputLocation) -> Result<()> {
        self.guard("recover_from_driver")?;
        let handler = required_handler(&mut self.handler)?;
        let pool = self.config.output_mut(location);

        if !pool.is_used() || pool.total_allocated() == 0 {
            return Ok(());
        }
        if pool.counts().in_use == 0 {
            return Ok(());
        }

        handler.return_buffers_to_manager(location)?;
        pool.clear_all_in_use();
        Ok(())
    }

    /// Recover buffers from every output port of one component
    pub fn recover_from_component(&mut self, component: Component) -> Result<()> {
        self.guard("recover_from_component")?;
        for location in OutputLocation::ports_of(component) {
            self.recover_from_driver(location)?;
        }
        Ok(())
    }

    /// Change one port's buffer count, reallocating or shrinking as needed.
    ///
    /// `max_requested` is clamped to the pool capacity; the call succeeds as
    /// long as at least `min_required` buffers could be obtained, returning
    /// the achieved count. Buffers are recovered from the driver before any
    /// resize and re-sent afterwards.
    pub fn set_buffer_count(
        &mut self,
        location: OutputLocation,
        min_required: usize,
        mut max_requested: usize,
    ) -> Result<usize> {
        self.guard("set_buffer_count")?;

        if min_required > max_requested {
            return Err(MonetError::bad_parameter(
                "min_required",
                "minimum exceeds requested maximum",
            ));
        }
        if min_required > MAX_BUFFERS_PER_PORT {
            return Err(MonetError::bad_parameter(
                "min_required",
                format!("minimum exceeds pool capacity {}", MAX_BUFFERS_PER_PORT),
            ));
        }
        if max_requested > MAX_BUFFERS_PER_PORT {
            debug!(
                requested = max_requested,
                capped = MAX_BUFFERS_PER_PORT,
                "requested buffer count capped to pool capacity"
            );
            max_requested = MAX_BUFFERS_PER_PORT;
        }

        let current = self.config.output(location).total_allocated();
        let previous_requirement = self.config.output(location).requirement().clone();
        self.config
            .output_mut(location)
            .set_counts(min_required, max_requested);

        if current == max_requested {
            return Ok(current);
        }

        // Buffers must not be owned by the driver while the pool resizes
        self.recover_from_driver(location)?;

        let achieved = {
            let allocator = required_allocator(&mut self.allocator)?;
            let pool = self.config.output_mut(location);
            if current > max_requested {
                pool.resize_down(location, allocator.as_mut())?;
            } else if let Err(err) = pool.allocate_up_to(location, allocator.as_mut()) {
                // Failed below the minimum: put the pool back at its
                // pre-call size before surfacing the error. The pre-call
                // size may sit below the previous requirement's maximum
                // (partial fulfillment), so shrink to the actual count.
                pool.set_counts(previous_requirement.min_count, current);
                pool.resize_down(location, allocator.as_mut())?;
                pool.set_requirement(previous_requirement);
                return Err(err);
            }
            pool.total_allocated()
        };

        self.send_to_driver(location)?;

        debug!(
            ?location,
            min_required, max_requested, achieved, "buffer count updated"
        );
        Ok(achieved)
    }

    /// Reconcile one component's ports against a newly negotiated state.
    ///
    /// Ports whose configuration is unchanged only take the new counts.
    /// Changed ports are recovered (when buffers are out), then repurposed
    /// in place if the allocator accepts; otherwise freed, with the new
    /// configuration adopted as both current and original so the next
    /// allocation builds the new footprint.
    pub fn reconfigure_component(
        &mut self,
        component: Component,
        new_state: &super::state::ComponentState,
    ) -> Result<()> {
        self.guard("reconfigure_component")?;

        for location in OutputLocation::ports_of(component) {
            let new_pool = new_state.output(location.port());
            if !new_pool.is_used() {
                continue;
            }

            let configs_match = {
                let old_pool = self.config.output(location);
                old_pool.current_config().matches(new_pool.current_config())
            };

            if configs_match {
                let old_pool = self.config.output_mut(location);
                old_pool.set_counts(
                    new_pool.requirement().min_count,
                    new_pool.requirement().max_count,
                );
                continue;
            }

            if self.config.output(location).counts().in_use > 0 {
                self.recover_from_driver(location)?;
            }

            let allocator = required_allocator(&mut self.allocator)?;
            let old_pool = self.config.output_mut(location);

            if old_pool.repurpose(location, allocator.as_mut(), new_pool.current_config())? {
                debug!(?location, "adapted buffers in place");
                continue;
            }

            old_pool.free_unused(location, allocator.as_mut())?;
            old_pool.set_used(true);
            old_pool.set_requirement(new_pool.requirement().clone());
            old_pool.set_current_config(new_pool.current_config().clone());
            old_pool.snapshot_original();
        }
        Ok(())
    }

    /// Hand out up to `n` unused buffers at the port, marking them in-use
    pub fn acquire_unused(
        &mut self,
        location: OutputLocation,
        n: usize,
    ) -> Result<Vec<PooledBuffer>> {
        self.guard("acquire_unused")?;
        self.config.output_mut(location).acquire_unused(location, n)
    }

    /// Peek at up to `n` unused buffers without acquiring them
    pub fn unused_buffers(
        &self,
        location: OutputLocation,
        n: usize,
    ) -> Result<Vec<PooledBuffer>> {
        self.guard("unused_buffers")?;
        self.config.output(location).unused_buffers(location, n)
    }

    /// Return previously acquired buffers by handle identity
    pub fn release(&mut self, location: OutputLocation, handles: &[BufferHandle]) -> Result<usize> {
        self.guard("release")?;
        self.config.output_mut(location).release(handles)
    }

    /// Recover every port from the driver and free all unused buffers.
    ///
    /// Any port still holding allocated buffers afterwards signals a caller
    /// leak; that is logged rather than failed, and the stream still ends up
    /// closed.
    pub fn close(&mut self) -> Result<()> {
        self.guard("close")?;

        for component in Component::ALL {
            self.recover_from_component(component)?;
        }

        let allocator = required_allocator(&mut self.allocator)?;
        self.config.try_for_each_output(|location, pool| {
            pool.free_unused(location, allocator.as_mut())
        })?;

        for location in self.config.allocated_locations() {
            warn!(
                ?location,
                allocated = self.config.output(location).total_allocated(),
                "buffers not returned at close, expect a leak"
            );
        }

        self.allocator = None;
        self.handler = None;
        self.initialized = false;
        Ok(())
    }

    // Factory-side plumbing. The factory owns negotiation and is the only
    // code allowed to attach collaborators or swap the session config.

    pub(crate) fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut StreamConfig {
        &mut self.config
    }

    pub(crate) fn replace_config(&mut self, config: StreamConfig) {
        self.config = config;
    }

    pub(crate) fn has_allocator(&self) -> bool {
        self.allocator.is_some()
    }

    pub(crate) fn attach(
        &mut self,
        allocator: Box<dyn BufferAllocator>,
        handler: Box<dyn BufferHandler>,
    ) {
        self.allocator = Some(allocator);
        self.handler = Some(handler);
    }

    pub(crate) fn detach(&mut self) {
        self.allocator = None;
        self.handler = None;
        self.initialized = false;
    }

    pub(crate) fn mark_initialized(&mut self, stream_type: StreamType) {
        self.stream_type = stream_type;
        self.initialized = true;
    }
}

fn required_allocator(
    slot: &mut Option<Box<dyn BufferAllocator>>,
) -> Result<&mut Box<dyn BufferAllocator>> {
    slot.as_mut()
        .ok_or_else(|| MonetError::invalid_state("no allocator attached to stream"))
}

fn required_handler(
    slot: &mut Option<Box<dyn BufferHandler>>,
) -> Result<&mut Box<dyn BufferHandler>> {
    slot.as_mut()
        .ok_or_else(|| MonetError::invalid_state("no buffer handler attached to stream"))
}
