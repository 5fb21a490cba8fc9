//! Trace hook type shared with the tracing crate, or a local stand-in when
//! tracing is compiled out.

#[cfg(feature = "trace")]
pub use ktrace::{TraceError, TraceHook};

#[cfg(feature = "trace")]
pub type TraceResult = Result<(), TraceError>;

#[cfg(not(feature = "trace"))]
use alloc::sync::Arc;

#[cfg(not(feature = "trace"))]
pub type TraceError = core::convert::Infallible;

#[cfg(not(feature = "trace"))]
pub type TraceResult = Result<(), TraceError>;

#[cfg(not(feature = "trace"))]
pub type TraceHook = Arc<dyn Fn(u8, &[u8]) -> TraceResult + Send + Sync>;
