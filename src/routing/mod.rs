//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! ParsedRequest (module identity, kind)
//!     → splitter.rs (policy: upstream | patterns | probe)
//!     → matcher.rs (evaluate local-only module patterns)
//!     → Return: Route::PreferLocal or Route::PreferUpstream
//!
//! Policy Compilation (at startup):
//!     RoutingConfig
//!     → Compile patterns (domain / address prefix)
//!     → Freeze as immutable Splitter
//! ```
//!
//! # Design Decisions
//! - Splitters compiled at startup, immutable at runtime
//! - Deterministic for the pattern policies: same module, same route
//! - Default policy never touches the network

pub mod matcher;
pub mod splitter;

pub use matcher::{AddressPrefixMatcher, AnyMatcher, DomainMatcher, ModuleMatcher};
pub use splitter::{PatternSplitter, ProbeSplitter, Route, Splitter, UpstreamFirst};
