//! Driver-side collaborator contracts
//!
//! The engine never touches physical memory itself. Allocation, hardware
//! hand-off, and requirement/configuration negotiation are delegated to
//! these traits, implemented by the hardware-specific driver layer.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::format::BufferConfiguration;
use crate::pool::PooledBuffer;
use crate::stream::ComponentState;
use crate::topology::{Component, OutputLocation};

/// Opaque driver-assigned buffer identity.
///
/// Slot bookkeeping matches on this handle rather than on slot index, since
/// a buffer returned by the driver may carry a driver-assigned identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferHandle(pub u64);

/// Performs physical buffer allocation and in-place reconfiguration
pub trait BufferAllocator {
    /// Prepare the allocator for use; called once before any allocation
    fn initialize(&mut self) -> Result<()>;

    /// Allocate one buffer for a port against the given configuration
    fn allocate_buffer(
        &mut self,
        location: OutputLocation,
        config: &BufferConfiguration,
    ) -> Result<BufferHandle>;

    /// Reconfigure one already-allocated buffer to a new configuration
    fn set_buffer_config(
        &mut self,
        location: OutputLocation,
        config: &BufferConfiguration,
        handle: BufferHandle,
    ) -> Result<()>;

    /// Release one buffer back to the hardware
    fn free_buffer(&mut self, location: OutputLocation, handle: BufferHandle) -> Result<()>;

    /// Ask whether the given buffers can be adapted in place from
    /// `original` to `target` without reallocation. The allocator is the
    /// sole authority on acceptance; a `false` return is not an error.
    fn repurpose_buffers(
        &mut self,
        location: OutputLocation,
        original: &BufferConfiguration,
        target: &BufferConfiguration,
        handles: &[BufferHandle],
    ) -> Result<bool>;
}

/// Hands buffers to and recovers them from the running pipeline.
///
/// Both calls may block awaiting hardware completion; timeout policy is the
/// implementation's responsibility.
pub trait BufferHandler {
    /// Hand one buffer to the component that owns the port
    fn give_buffer_to_component(
        &mut self,
        location: OutputLocation,
        buffer: &PooledBuffer,
    ) -> Result<()>;

    /// Ask the component to return every buffer it holds for the port
    fn return_buffers_to_manager(&mut self, location: OutputLocation) -> Result<()>;
}

/// Negotiates requirements and configurations with the silicon blocks
pub trait DriverConfigurator {
    /// Reset driver-side port state ahead of a renegotiation
    fn configure_drivers(&mut self) -> Result<()>;

    /// Overlay hardware-mandated requirements onto the component's
    /// output ports
    fn get_output_requirements(
        &mut self,
        component: Component,
        state: &mut ComponentState,
    ) -> Result<()>;

    /// Turn output requirements into concrete configurations. As a
    /// negotiation side effect this also fills the component's input-port
    /// requirements.
    fn get_output_configuration(
        &mut self,
        component: Component,
        state: &mut ComponentState,
    ) -> Result<()>;

    /// Query the input requirement a component imposes on its upstream
    fn get_input_requirement(
        &mut self,
        component: Component,
        state: &mut ComponentState,
    ) -> Result<()>;
}

/// Constructs driver collaborators bound to one device.
///
/// Injected into the factory instead of the original design's per-device
/// statics; a fresh backend is handed over again at reinit boundaries.
pub trait DriverBackend {
    /// Create an allocator for a new stream; the factory initializes it
    fn new_allocator(&self) -> Result<Box<dyn BufferAllocator>>;

    /// Create a handler for a new stream
    fn new_handler(&self) -> Result<Box<dyn BufferHandler>>;

    /// Create a configurator bound to this device's driver info
    fn new_configurator(&self) -> Result<Box<dyn DriverConfigurator>>;
}
