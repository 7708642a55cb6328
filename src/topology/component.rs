//! Pipeline components and their per-component port tables

use serde::{Deserialize, Serialize};

/// Number of components in the pipeline
pub const COMPONENT_COUNT: usize = 3;

/// Per-component port counts, indexed by `Component as usize`.
/// Kept as one table so port-range checks never go ad hoc.
const OUTPUT_PORT_COUNTS: [usize; COMPONENT_COUNT] = [2, 4, 0];
const INPUT_PORT_COUNTS: [usize; COMPONENT_COUNT] = [0, 2, 3];

/// A pipeline stage with a fixed number of ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Component {
    /// Imaging source; produces preview and capture buffers
    Source = 0,
    /// Processing stage (scaling/zoom); the main buffer consumer and producer
    Processing = 1,
    /// Host sink; receives processed buffers, owns none itself
    Host = 2,
}

impl Component {
    /// All components, in pipeline order
    pub const ALL: [Component; COMPONENT_COUNT] =
        [Component::Source, Component::Processing, Component::Host];

    /// Number of components in the pipeline
    pub const fn count() -> usize {
        COMPONENT_COUNT
    }

    /// Number of output ports on this component
    pub const fn output_port_count(self) -> usize {
        OUTPUT_PORT_COUNTS[self as usize]
    }

    /// Number of input ports on this component
    pub const fn input_port_count(self) -> usize {
        INPUT_PORT_COUNTS[self as usize]
    }
}

/// Output ports of the source component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SourceOutput {
    Preview = 0,
    Capture = 1,
}

/// Output ports of the processing component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ProcessingOutput {
    Preview = 0,
    Still = 1,
    Video = 2,
    Thumbnail = 3,
}

/// Input ports of the processing component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ProcessingInput {
    Preview = 0,
    Still = 1,
}

/// Input ports of the host component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum HostInput {
    Preview = 0,
    Video = 1,
    Still = 2,
}

impl From<SourceOutput> for u32 {
    fn from(port: SourceOutput) -> u32 {
        port as u32
    }
}

impl From<ProcessingOutput> for u32 {
    fn from(port: ProcessingOutput) -> u32 {
        port as u32
    }
}

impl From<ProcessingInput> for u32 {
    fn from(port: ProcessingInput) -> u32 {
        port as u32
    }
}

impl From<HostInput> for u32 {
    fn from(port: HostInput) -> u32 {
        port as u32
    }
}
