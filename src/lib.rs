//! # Monet - Pipeline Buffer Negotiation & Pooling
//!
//! Monet is the buffer negotiation and pooling engine for fixed
//! camera-style media pipelines: it coordinates buffer requirements,
//! negotiated memory configurations, bounded per-port pools, and buffer
//! hand-off between a small set of pipeline stages and an external
//! hardware driver.
//!
//! ## Features
//!
//! - **Validated topology**: components and ports are a closed, statically
//!   sized coordinate space
//! - **Bounded pools**: fixed-capacity slot tables per output port, with
//!   partial-fulfillment allocation down to a negotiated minimum
//! - **Repurposing**: in-place adaptation of live buffers to a new
//!   configuration when the allocator accepts, avoiding reallocation
//! - **Recover-before-free**: every resize, repurpose, and teardown path
//!   reclaims driver-held buffers first; nothing is freed while in use
//! - **Driver-agnostic**: physical allocation, hand-off, and hardware
//!   negotiation live behind injected traits
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   BufferManager                     │
//! │        per-device registry of StreamFactory         │
//! ├─────────────────────────────────────────────────────┤
//! │  StreamFactory            │  Stream                 │
//! │  - requirement/config     │  - per-port BufferPool  │
//! │    negotiation            │  - send/recover/resize  │
//! │  - build & rebuild        │  - close guarantees     │
//! └─────────────────────────────────────────────────────┘
//!            │                          │
//!            ▼                          ▼
//! ┌─────────────────────┐   ┌──────────────────────────┐
//! │  DriverConfigurator │   │  BufferAllocator /       │
//! │  (negotiation)      │   │  BufferHandler (memory,  │
//! │                     │   │  hardware hand-off)      │
//! └─────────────────────┘   └──────────────────────────┘
//! ```
//!
//! Streams are single-threaded by contract: callers serialize all method
//! invocations on a given stream; there is no internal locking.

// Core modules
pub mod driver;
pub mod error;
pub mod factory;
pub mod format;
pub mod manager;
pub mod pool;
pub mod request;
pub mod stream;
pub mod topology;

// Main API re-exports
pub use driver::{BufferAllocator, BufferHandle, BufferHandler, DriverBackend, DriverConfigurator};
pub use error::{MonetError, Result};
pub use factory::StreamFactory;
pub use format::{
    BufferConfiguration, BufferRequirement, ColorFormat, Endianness, FormatId, MemorySpace,
    SurfaceDescriptor, SurfaceLayout, DEFAULT_OUTPUT_BUFFERS, DEFAULT_OUTPUT_HEIGHT,
    DEFAULT_OUTPUT_WIDTH,
};
pub use manager::{BufferManager, MAX_DEVICES};
pub use pool::{BufferCounts, BufferPool, BufferSlot, PooledBuffer, MAX_BUFFERS_PER_PORT};
pub use request::{BufferRequest, StreamRequest, MAX_CUSTOM_REQUESTS};
pub use stream::{ComponentState, InputPortState, Stream, StreamConfig, StreamType};
pub use topology::{
    BufferId, Component, HostInput, InputLocation, OutputLocation, ProcessingInput,
    ProcessingOutput, SourceOutput, COMPONENT_COUNT,
};
