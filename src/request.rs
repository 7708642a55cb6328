//! Caller-supplied buffer overrides consumed during stream build

use serde::{Deserialize, Serialize};

use crate::error::{MonetError, Result};
use crate::topology::{Component, OutputLocation, COMPONENT_COUNT};

/// Maximum number of queued overrides per component
pub const MAX_CUSTOM_REQUESTS: usize = 8;

/// One caller override for a port's buffer counts and surface size.
///
/// A width or height of zero leaves the negotiated dimension untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferRequest {
    pub location: OutputLocation,
    pub min_buffers: usize,
    pub max_buffers: usize,
    pub width: u32,
    pub height: u32,
}

impl BufferRequest {
    /// Create a count-only override
    pub fn counts(location: OutputLocation, min_buffers: usize, max_buffers: usize) -> Self {
        Self {
            location,
            min_buffers,
            max_buffers,
            width: 0,
            height: 0,
        }
    }

    /// Set the requested surface size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Bounded per-component LIFO stacks of buffer overrides.
///
/// Filled by the caller before a build or rebuild, drained by the factory
/// while merging overrides into the negotiated requirements.
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    stacks: [Vec<BufferRequest>; COMPONENT_COUNT],
}

impl StreamRequest {
    /// Create an empty request set
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an override for one output port.
    ///
    /// Fails with `Overflow` when the component's stack is full and with
    /// `BadParameter` when an override for the same port is already queued.
    pub fn push(&mut self, request: BufferRequest) -> Result<()> {
        let component = request.location.component();
        let stack = &mut self.stacks[component as usize];

        if stack.len() >= MAX_CUSTOM_REQUESTS {
            return Err(MonetError::overflow("custom request stack", MAX_CUSTOM_REQUESTS));
        }

        if stack.iter().any(|queued| queued.location == request.location) {
            return Err(MonetError::bad_parameter(
                "location",
                format!(
                    "override already queued for {:?} port {}",
                    component,
                    request.location.port()
                ),
            ));
        }

        stack.push(request);
        Ok(())
    }

    /// Pop the most recently queued override for one component
    pub fn pop(&mut self, component: Component) -> Option<BufferRequest> {
        self.stacks[component as usize].pop()
    }

    /// Number of overrides queued for one component
    pub fn len(&self, component: Component) -> usize {
        self.stacks[component as usize].len()
    }

    /// Whether no overrides are queued at all
    pub fn is_empty(&self) -> bool {
        self.stacks.iter().all(|stack| stack.is_empty())
    }
}
