//! RFC 6901 JSON Pointer parsing (spec §4.4).
//!
//! A pointer is parsed once, at construction, into an ordered list of
//! reference tokens. The empty string denotes the document root. Numeric
//! tokens are never pre-interpreted as array indices here — matching
//! against a live path happens later, in the driver.

use crate::error::Error;

/// A parsed JSON Pointer: an ordered sequence of decoded reference tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pointer {
    tokens: Vec<String>,
}

impl Pointer {
    /// Parses a JSON Pointer string per RFC 6901.
    ///
    /// The empty string parses to the root pointer (zero tokens). Any
    /// other string must start with `/`; `~1` is decoded to `/` and then
    /// `~0` is decoded to `~` — in that order, since decoding `~0` first
    /// would corrupt a literal `~1` written as `~01`.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if raw.is_empty() {
            return Ok(Pointer { tokens: Vec::new() });
        }
        if !raw.starts_with('/') {
            return Err(Error::PointerSyntax {
                pointer: raw.to_string(),
                message: "pointer must be empty or start with '/'".to_string(),
            });
        }

        let tokens = raw[1..]
            .split('/')
            .map(|segment| decode_segment(segment))
            .collect();
        Ok(Pointer { tokens })
    }

    /// The number of reference tokens (0 for the root pointer).
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether this pointer designates the document root.
    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The reference token at `index`, if any.
    pub fn token(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(|s| s.as_str())
    }
}

fn decode_segment(segment: &str) -> String {
    // `~1` -> `/` first, then `~0` -> `~`. Order matters: decoding `~0`
    // first would turn a literal "~1" (encoded as "~01") into "/".
    segment.replace("~1", "/").replace("~0", "~")
}
