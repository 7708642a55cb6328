//! Error types and handling for Monet

/// Result type alias for Monet operations
pub type Result<T> = std::result::Result<T, MonetError>;

/// Error types for the buffer negotiation and pooling engine
#[derive(Debug, thiserror::Error)]
pub enum MonetError {
    /// Invalid parameters: out-of-range locations, malformed requests,
    /// duplicate overrides
    #[error("Bad parameter: {parameter} - {message}")]
    BadParameter { parameter: String, message: String },

    /// Operation attempted on a stream that has not been built yet
    #[error("Not initialized: {operation}")]
    NotInitialized { operation: String },

    /// Operation out of sequence (e.g. reinit without a prior invalidate)
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Pool slot table exhausted before the minimum buffer count was met
    #[error("Insufficient memory: requested {requested}, allocated {allocated}")]
    InsufficientMemory { requested: usize, allocated: usize },

    /// Bounded container capacity exceeded (request queue, registry)
    #[error("Overflow: {container} is at capacity {capacity}")]
    Overflow { container: String, capacity: usize },

    /// Pass-through failure reported by the driver layer
    #[error("Driver error: {message}")]
    Driver { message: String },
}

impl MonetError {
    /// Create a bad parameter error
    pub fn bad_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a not initialized error
    pub fn not_initialized(operation: impl Into<String>) -> Self {
        Self::NotInitialized {
            operation: operation.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an insufficient memory error
    pub fn insufficient_memory(requested: usize, allocated: usize) -> Self {
        Self::InsufficientMemory {
            requested,
            allocated,
        }
    }

    /// Create an overflow error
    pub fn overflow(container: impl Into<String>, capacity: usize) -> Self {
        Self::Overflow {
            container: container.into(),
            capacity,
        }
    }

    /// Create a driver pass-through error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }
}
