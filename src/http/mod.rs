//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request logging, timeouts)
//!     → middleware.rs (extract propagated context, open server span)
//!     → handler (child spans, counters)
//!     → Send to client
//! ```

pub mod middleware;
pub mod server;

pub use middleware::{trace_request, RequestTracing};
pub use server::{AppState, DiceServer};
