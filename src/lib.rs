//! Caching Go module proxy library.

pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod http;
pub mod lifecycle;
pub mod module;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
