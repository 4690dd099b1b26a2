//! Connection lifecycle tracing: the hook table a transport calls into, the
//! collector that timestamps each hook, and a stream adapter that detects the
//! first response byte.

pub mod collector;
pub mod stream;
pub mod timestamps;

pub use collector::{ClientTrace, TraceCollector};
pub use stream::FirstByteStream;
pub use timestamps::{Phase, TraceTimestamps};
