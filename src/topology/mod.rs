//! Pipeline topology: components, ports, and validated locations
//!
//! The pipeline is a fixed set of components, each with a statically known
//! number of input and output ports. Output ports own buffers; input ports
//! carry requirement/configuration bookkeeping only.

pub mod component;
pub mod location;

// Re-export main types
pub use component::{
    Component, HostInput, ProcessingInput, ProcessingOutput, SourceOutput, COMPONENT_COUNT,
};
pub use location::{BufferId, InputLocation, OutputLocation};
