//! Validated port coordinates and packed buffer identifiers

use serde::{Deserialize, Serialize};

use super::component::Component;
use crate::error::{MonetError, Result};

/// A validated (component, output port) coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputLocation {
    component: Component,
    port: u32,
}

impl OutputLocation {
    /// Create an output location, rejecting out-of-range ports
    pub fn new(component: Component, port: impl Into<u32>) -> Result<Self> {
        let port = port.into();
        if port as usize >= component.output_port_count() {
            return Err(MonetError::bad_parameter(
                "port",
                format!(
                    "output port {} out of range for {:?} ({} ports)",
                    port,
                    component,
                    component.output_port_count()
                ),
            ));
        }
        Ok(Self { component, port })
    }

    /// Iterate every output location of one component
    pub fn ports_of(component: Component) -> impl Iterator<Item = OutputLocation> {
        (0..component.output_port_count() as u32).map(move |port| Self { component, port })
    }

    /// Iterate every output location in the pipeline, in component order
    pub fn all() -> impl Iterator<Item = OutputLocation> {
        Component::ALL.iter().flat_map(|&c| Self::ports_of(c))
    }

    /// The component of this location
    pub fn component(&self) -> Component {
        self.component
    }

    /// The port index within the component
    pub fn port(&self) -> u32 {
        self.port
    }
}

/// A validated (component, input port) coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputLocation {
    component: Component,
    port: u32,
}

impl InputLocation {
    /// Create an input location, rejecting out-of-range ports
    pub fn new(component: Component, port: impl Into<u32>) -> Result<Self> {
        let port = port.into();
        if port as usize >= component.input_port_count() {
            return Err(MonetError::bad_parameter(
                "port",
                format!(
                    "input port {} out of range for {:?} ({} ports)",
                    port,
                    component,
                    component.input_port_count()
                ),
            ));
        }
        Ok(Self { component, port })
    }

    /// The component of this location
    pub fn component(&self) -> Component {
        self.component
    }

    /// The port index within the component
    pub fn port(&self) -> u32 {
        self.port
    }
}

/// Packed identity of one buffer slot: (component, port, slot index),
/// one byte each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId(u32);

impl BufferId {
    /// Pack a location and slot index into a buffer id
    pub fn pack(location: OutputLocation, index: usize) -> Self {
        let comp = (location.component() as u32) & 0xff;
        let port = location.port() & 0xff;
        let index = (index as u32) & 0xff;
        Self((comp << 16) | (port << 8) | index)
    }

    /// Recover the location this id was packed from
    pub fn location(&self) -> Result<OutputLocation> {
        let comp = (self.0 >> 16) & 0xff;
        let port = (self.0 >> 8) & 0xff;
        let component = Component::ALL
            .into_iter()
            .find(|c| *c as u32 == comp)
            .ok_or_else(|| MonetError::bad_parameter("buffer id", "unknown component"))?;
        OutputLocation::new(component, port)
    }

    /// The slot index within the owning port's table
    pub fn index(&self) -> usize {
        (self.0 & 0xff) as usize
    }

    /// Raw packed value
    pub fn raw(&self) -> u32 {
        self.0
    }
}
