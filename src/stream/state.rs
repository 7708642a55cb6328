//! Per-session port state aggregation

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::format::{BufferConfiguration, BufferRequirement};
use crate::pool::BufferPool;
use crate::topology::{Component, InputLocation, OutputLocation};

/// Named pipeline session layouts a factory knows how to negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamType {
    /// The standard capture topology: preview, still, video, and thumbnail
    /// outputs on the processing stage
    StandardCapture,
}

/// Requirement and configuration bookkeeping for one input port.
/// Input ports own no buffers.
#[derive(Debug, Clone, Default)]
pub struct InputPortState {
    pub used: bool,
    pub requirement: BufferRequirement,
    pub original_config: BufferConfiguration,
    pub current_config: BufferConfiguration,
}

/// All port state of one component
#[derive(Debug, Clone)]
pub struct ComponentState {
    output_ports: Vec<BufferPool>,
    input_ports: Vec<InputPortState>,
}

impl ComponentState {
    /// Create empty state sized to the component's port table
    pub fn for_component(component: Component) -> Self {
        Self {
            output_ports: (0..component.output_port_count())
                .map(|_| BufferPool::new())
                .collect(),
            input_ports: (0..component.input_port_count())
                .map(|_| InputPortState::default())
                .collect(),
        }
    }

    /// The pool behind one output port
    pub fn output(&self, port: u32) -> &BufferPool {
        &self.output_ports[port as usize]
    }

    /// Mutable access to one output port's pool
    pub fn output_mut(&mut self, port: u32) -> &mut BufferPool {
        &mut self.output_ports[port as usize]
    }

    /// One input port's bookkeeping
    pub fn input(&self, port: u32) -> &InputPortState {
        &self.input_ports[port as usize]
    }

    /// Mutable access to one input port's bookkeeping
    pub fn input_mut(&mut self, port: u32) -> &mut InputPortState {
        &mut self.input_ports[port as usize]
    }

    /// Number of output ports on this component
    pub fn output_port_count(&self) -> usize {
        self.output_ports.len()
    }
}

/// The aggregate port state of every component for one session
#[derive(Debug, Clone)]
pub struct StreamConfig {
    components: Vec<ComponentState>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            components: Component::ALL
                .iter()
                .map(|&c| ComponentState::for_component(c))
                .collect(),
        }
    }
}

impl StreamConfig {
    /// Create a cleared configuration covering the whole topology
    pub fn new() -> Self {
        Self::default()
    }

    /// One component's state
    pub fn component(&self, component: Component) -> &ComponentState {
        &self.components[component as usize]
    }

    /// Mutable access to one component's state
    pub fn component_mut(&mut self, component: Component) -> &mut ComponentState {
        &mut self.components[component as usize]
    }

    /// The pool at one output location
    pub fn output(&self, location: OutputLocation) -> &BufferPool {
        self.component(location.component()).output(location.port())
    }

    /// Mutable access to the pool at one output location
    pub fn output_mut(&mut self, location: OutputLocation) -> &mut BufferPool {
        self.component_mut(location.component())
            .output_mut(location.port())
    }

    /// Input-port bookkeeping at one input location
    pub fn input(&self, location: InputLocation) -> &InputPortState {
        self.component(location.component()).input(location.port())
    }

    /// Mutable access to input-port bookkeeping at one input location
    pub fn input_mut(&mut self, location: InputLocation) -> &mut InputPortState {
        self.component_mut(location.component())
            .input_mut(location.port())
    }

    /// Every output location whose port currently holds allocated buffers
    pub fn allocated_locations(&self) -> Vec<OutputLocation> {
        OutputLocation::all()
            .filter(|&location| self.output(location).total_allocated() > 0)
            .collect()
    }

    /// Run a fallible closure over every output location in the pipeline
    pub fn try_for_each_output<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(OutputLocation, &mut BufferPool) -> Result<()>,
    {
        for location in OutputLocation::all() {
            f(location, self.output_mut(location))?;
        }
        Ok(())
    }
}
