//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → context.rs (pooled per-request state)
//!     → module::ParsedRequest → dispatch::Dispatcher
//!     → dispatch::response (status, headers, body)
//!     → Send to client
//! ```

pub mod context;
pub mod request;
pub mod server;

pub use context::{ContextPool, PooledContext, RequestContext};
pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
