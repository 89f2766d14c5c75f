//! Error taxonomy and configurable limits.
//!
//! Mirrors the hand-rolled `Display`/`Error` style the teacher crate uses
//! for `NonNormal` rather than reaching for a derive macro.

use std::cell::Cell;
use std::fmt::{self, Display};

/// Every way a public operation can fail, grouped by cause rather than by
/// which struct raised it (see spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GVariantError {
    /// Unrecognized element, bracket mismatch, or bad pair shape.
    InvalidType,
    /// A pair (`{..}`) had a non-basic key, a second key, or was left open.
    PairShape,
    /// Signature nesting exceeded `Limits::max_depth`.
    NestingTooDeep,
    /// Signature length exceeded `Limits::max_signature_len`.
    SignatureTooLong,
    /// The requested element disagrees with the residual type, the
    /// container is exhausted, or the wrong bracket was used on
    /// `enter`/`exit`/`end`.
    TypeMismatch,
    /// Summed span length does not fit in a machine word.
    BufferTooLarge,
    /// Allocation failed while growing the scatter buffer.
    OutOfMemory,
    /// Span count would exceed `Limits::max_spans`.
    TooManySpans,
    /// Attempted to mutate the implicit null/unit variant.
    NullVariantMutation,
    /// An invariant was violated. Reported, but never expected in
    /// practice; callers should treat this the same as a bug report.
    Internal,
}

impl Display for GVariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            GVariantError::InvalidType => "invalid or malformed GVariant type string",
            GVariantError::PairShape => "dictionary entry type has the wrong shape",
            GVariantError::NestingTooDeep => "type signature nests too deeply",
            GVariantError::SignatureTooLong => "type signature is too long",
            GVariantError::TypeMismatch => "requested element does not match residual type",
            GVariantError::BufferTooLarge => "total span length overflows a machine word",
            GVariantError::OutOfMemory => "allocation failed",
            GVariantError::TooManySpans => "too many spans in scatter buffer",
            GVariantError::NullVariantMutation => "attempted to mutate the null variant",
            GVariantError::Internal => "internal invariant violated",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for GVariantError {}

pub type Result<T> = std::result::Result<T, GVariantError>;

/// The first error latched onto a [`crate::Variant`][Variant], if any.
///
/// [Variant]: crate::variant::Variant
#[derive(Debug, Default)]
pub struct Poison(Cell<Option<GVariantError>>);

impl Poison {
    pub fn new() -> Self {
        Poison(Cell::new(None))
    }

    /// Latch `err` iff nothing has been latched yet.
    pub fn set(&self, err: GVariantError) {
        if self.0.get().is_none() {
            self.0.set(Some(err));
        }
    }

    pub fn get(&self) -> Option<GVariantError> {
        self.0.get()
    }
}

/// Tunable ceilings an embedder may override. Defaults match the floors
/// the spec requires ("at least 255", "at least 65535", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_depth: u16,
    pub max_signature_len: u32,
    pub max_spans: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_depth: 255,
            max_signature_len: 65535,
            max_spans: 65535,
        }
    }
}
