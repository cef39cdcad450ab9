//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! ParsedRequest
//!     → Splitter (PreferLocal | PreferUpstream)
//!     → dispatcher.rs: upstream attempt, then local fallback
//!     → Fetched { kind, source, payload } | DispatchError
//!     → response.rs (status, content type, source header)
//! ```

pub mod dispatcher;
pub mod response;

pub use dispatcher::{DispatchError, Dispatcher, Fetched, Payload};
pub use response::{content_type, X_MODPROXY_SOURCE};
