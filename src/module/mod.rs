//! Module addressing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound path "/github.com/!org/repo/@v/v1.0.0.zip"
//!     → path.rs (classify by suffix, split address / version)
//!     → escape.rs (decode "!o" → "O")
//!     → ParsedRequest { ModuleIdentity("github.com/Org/repo", v1.0.0), Archive }
//!
//! Outbound (cache file or upstream URL):
//!     ModuleIdentity + RequestKind
//!     → identity.rs (per-kind relative path)
//!     → escape.rs (encode address only)
//!     → "github.com/!org/repo/@v/v1.0.0.zip"
//! ```
//!
//! # Design Decisions
//! - Addresses are stored decoded; escaping happens only at the edges
//! - The pending `latest` version is a distinct variant, so it can never be
//!   used to name a version file
//! - Everything here is pure; no I/O

pub mod escape;
pub mod identity;
pub mod path;

pub use escape::{decode, encode, EscapeError, ESCAPE_MARKER};
pub use identity::{ModuleIdentity, ModuleVersion};
pub use path::{classify, ParsedRequest, PathError, RequestKind};
