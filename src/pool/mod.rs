//! Per-port buffer pooling
//!
//! Every output port owns a fixed-capacity table of buffer slots plus the
//! allocate/repurpose/resize/free logic that drives it. Input ports hold no
//! buffers and are tracked in the stream's bookkeeping only.

pub mod buffer;
pub mod pool;

// Re-export main types
pub use buffer::{BufferCounts, BufferSlot, PooledBuffer};
pub use pool::{BufferPool, MAX_BUFFERS_PER_PORT};
