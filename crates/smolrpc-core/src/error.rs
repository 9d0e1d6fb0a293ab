use std::fmt;

/// A decode failure: truncated input, an out-of-range variant discriminant,
/// or trailing bytes left over after a top-level value was decoded.
///
/// Every codec failure collapses into this single "invalid serialized
/// value" kind, matching the wire-level contract: the framework does not
/// try to distinguish *why* a peer's bytes were malformed beyond what's
/// useful for a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes remained in the buffer than the value needed.
    Truncated { needed: usize, available: usize },
    /// A `variant<...>` discriminant was `>= ` the number of branches.
    InvalidDiscriminant { found: u8, variant_count: u8 },
    /// Bytes remained after a complete top-level value was decoded.
    TrailingBytes { remaining: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => write!(
                f,
                "invalid serialized value: needed {needed} bytes, only {available} available"
            ),
            DecodeError::InvalidDiscriminant {
                found,
                variant_count,
            } => write!(
                f,
                "invalid serialized value: variant discriminant {found} is out of range (have {variant_count} branches)"
            ),
            DecodeError::TrailingBytes { remaining } => write!(
                f,
                "invalid serialized value: {remaining} trailing byte(s) after decoding"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}
