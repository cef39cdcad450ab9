//! Case-escaping for module addresses.
//!
//! Module addresses may contain uppercase letters, but the on-disk cache and
//! the wire protocol must work on case-insensitive filesystems. Every
//! uppercase ASCII letter is therefore written as the escape marker `!`
//! followed by its lowercase form:
//!
//! ```text
//! github.com/Org/Project  <->  github.com/!org/!project
//! ```
//!
//! # Invariants
//! - `decode(encode(a)) == a` for every printable-ASCII `a` without `!`
//! - `encode` is the identity on strings without uppercase letters
//! - Encoded strings never contain uppercase ASCII letters

use std::borrow::Cow;

use thiserror::Error;

/// The escape marker placed before a folded uppercase letter.
pub const ESCAPE_MARKER: char = '!';

/// Errors produced by the escaping codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscapeError {
    /// `encode` was handed a string the address checks should have rejected.
    #[error("internal error: inconsistency in address encoding at byte {position}")]
    Inconsistent { position: usize },

    /// Non-ASCII character in an escaped address.
    #[error("invalid escaped address {0:?}: non-ASCII character")]
    NonAscii(String),

    /// Uppercase letter not introduced by the escape marker.
    #[error("invalid escaped address {0:?}: unescaped uppercase letter")]
    UnescapedUppercase(String),

    /// Escape marker not followed by a lowercase letter.
    #[error("invalid escaped address {0:?}: dangling escape marker")]
    DanglingMarker(String),
}

/// Returns true if `c` may appear in a decoded address.
#[inline]
pub fn is_encodable(c: char) -> bool {
    c != ESCAPE_MARKER && (c.is_ascii_graphic() || c == ' ')
}

/// Escape every uppercase ASCII letter in a decoded address.
///
/// Callers must only pass addresses that passed [`is_encodable`] for every
/// character; anything else is reported as [`EscapeError::Inconsistent`].
/// Strings without uppercase letters are returned borrowed.
pub fn encode(decoded: &str) -> Result<Cow<'_, str>, EscapeError> {
    let mut has_upper = false;
    for (position, c) in decoded.char_indices() {
        if !is_encodable(c) {
            return Err(EscapeError::Inconsistent { position });
        }
        has_upper |= c.is_ascii_uppercase();
    }

    if !has_upper {
        return Ok(Cow::Borrowed(decoded));
    }

    let mut out = String::with_capacity(decoded.len() + 8);
    for c in decoded.chars() {
        if c.is_ascii_uppercase() {
            out.push(ESCAPE_MARKER);
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    Ok(Cow::Owned(out))
}

/// Reverse [`encode`].
pub fn decode(encoded: &str) -> Result<Cow<'_, str>, EscapeError> {
    if !encoded.contains(ESCAPE_MARKER) {
        if !encoded.is_ascii() {
            return Err(EscapeError::NonAscii(encoded.to_string()));
        }
        if encoded.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(EscapeError::UnescapedUppercase(encoded.to_string()));
        }
        return Ok(Cow::Borrowed(encoded));
    }

    let mut out = String::with_capacity(encoded.len());
    let mut escaped = false;
    for c in encoded.chars() {
        if !c.is_ascii() {
            return Err(EscapeError::NonAscii(encoded.to_string()));
        }
        if escaped {
            if !c.is_ascii_lowercase() {
                return Err(EscapeError::DanglingMarker(encoded.to_string()));
            }
            out.push(c.to_ascii_uppercase());
            escaped = false;
            continue;
        }
        if c == ESCAPE_MARKER {
            escaped = true;
            continue;
        }
        if c.is_ascii_uppercase() {
            return Err(EscapeError::UnescapedUppercase(encoded.to_string()));
        }
        out.push(c);
    }

    if escaped {
        return Err(EscapeError::DanglingMarker(encoded.to_string()));
    }
    Ok(Cow::Owned(out))
}
