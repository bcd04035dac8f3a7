//! Error types and the byte-span they point at.
//!
//! Mirrors the shape of a forgiving-JSON-parser's error module: a flat,
//! `thiserror`-derived enum carrying a byte offset, so every fatal
//! condition in the driver can be reported without a line/column pass
//! over the whole document.

use thiserror::Error;

/// A byte-offset span into the input stream.
///
/// Offsets are measured from the start of the stream, not from the start
/// of the current chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start position (inclusive), in bytes from the start of the stream.
    pub start: usize,
    /// End position (exclusive), in bytes from the start of the stream.
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Creates a zero-width span at a single byte offset.
    pub fn at(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }
}

/// All fatal error kinds the driver can surface.
///
/// Every variant is fatal to the current iteration (spec §7): once
/// returned from `next()`, the iterator yields no further items.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed bytes at the token level: a stray byte outside any
    /// scalar, a malformed escape, a malformed number, or an unknown
    /// keyword.
    #[error("lexical error at byte {offset}: {message}")]
    Lexical {
        /// Byte offset of the offending input.
        offset: usize,
        /// Human-readable description.
        message: String,
    },

    /// Unbalanced brackets, a missing comma or colon, a value where a key
    /// was expected, or a key where a value was expected.
    #[error("structural error at byte {offset}: {message}")]
    Structural {
        /// Byte offset of the offending token.
        offset: usize,
        /// Human-readable description.
        message: String,
    },

    /// The Pointer string is not valid RFC 6901.
    #[error("invalid JSON Pointer {pointer:?}: {message}")]
    PointerSyntax {
        /// The offending pointer string.
        pointer: String,
        /// Human-readable description.
        message: String,
    },

    /// The byte stream ended before the Pointer matched any container.
    #[error("JSON Pointer {pointer:?} did not match any container (stream ended at byte {offset})")]
    PointerNotFound {
        /// The pointer that failed to match.
        pointer: String,
        /// Byte offset where the stream ended.
        offset: usize,
    },

    /// The Pointer matched a value that is not an object or array.
    #[error("JSON Pointer {pointer:?} matched a non-container value at byte {offset}")]
    PointerNotIterable {
        /// The pointer that matched a scalar.
        pointer: String,
        /// Byte offset of the matched scalar.
        offset: usize,
    },

    /// The leaf JSON decoder rejected a child's raw bytes.
    #[error("failed to decode value at byte {offset}: {source}")]
    Decode {
        /// Byte offset of the start of the raw value.
        offset: usize,
        /// The decoder's own error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The byte source failed.
    #[error("I/O error at byte {offset}: {source}")]
    Io {
        /// Byte offset at the time of the failure.
        offset: usize,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_at_is_zero_width() {
        let s = Span::at(5);
        assert_eq!(s.start, 5);
        assert_eq!(s.end, 5);
    }

    #[test]
    fn error_messages_carry_offset() {
        let e = Error::Lexical {
            offset: 42,
            message: "bad escape".to_string(),
        };
        assert!(format!("{e}").contains("42"));
    }
}
