//! Stream aggregation: per-port pools plus the driver hand-off protocol
//!
//! A stream owns the buffer bookkeeping of every component and port for one
//! pipeline session. Streams are built and rebuilt by the factory; callers
//! must serialize all method invocations on a given stream.

pub mod state;
pub mod stream;

// Re-export main types
pub use state::{ComponentState, InputPortState, StreamConfig, StreamType};
pub use stream::Stream;
