//! The root value object: type string, buffer, level stack, poison, sealed
//! flag (spec §3 "Variant", §6 lifecycle operations).

use crate::buffer::{ScatterBuffer, Span};
use crate::error::{GVariantError, Limits, Poison, Result};
use crate::level::{Level, LevelStack};
use crate::signature::parse_exactly_one;

/// A sealed (read-only) or unsealed (writer) GVariant root value.
///
/// `'a` bounds any caller-supplied [`Span::Borrowed`] data passed to
/// [`Variant::new_from_spans`] or spliced in via a writer's `insert`.
#[derive(Debug)]
pub struct Variant<'a> {
    pub(crate) root_type: Vec<u8>,
    pub(crate) buffer: ScatterBuffer<'a>,
    pub(crate) levels: LevelStack,
    pub(crate) poison: Poison,
    pub(crate) sealed: bool,
    pub(crate) limits: Limits,
}

impl<'a> Variant<'a> {
    /// Create an empty, unsealed writer-variant of `root_type`.
    pub fn new(root_type: &[u8]) -> Result<Self> {
        Self::with_limits(root_type, Limits::default())
    }

    pub fn with_limits(root_type: &[u8], limits: Limits) -> Result<Self> {
        parse_exactly_one(root_type, &limits)?;
        let root = Level::root(root_type.to_vec(), 0);
        Ok(Variant {
            root_type: root_type.to_vec(),
            buffer: ScatterBuffer::new(&limits),
            levels: LevelStack::new(root, &limits),
            poison: Poison::new(),
            sealed: false,
            limits,
        })
    }

    /// Wrap externally-owned spans as a sealed reader-variant. Born sealed;
    /// spans are referenced, not copied (spec §3 "Ownership").
    pub fn new_from_spans(root_type: &[u8], spans: Vec<Span<'a>>) -> Result<Self> {
        Self::new_from_spans_with_limits(root_type, spans, Limits::default())
    }

    pub fn new_from_spans_with_limits(
        root_type: &[u8],
        spans: Vec<Span<'a>>,
        limits: Limits,
    ) -> Result<Self> {
        parse_exactly_one(root_type, &limits)?;
        let buffer = ScatterBuffer::from_spans(spans, &limits)?;
        let size = buffer.len();
        let root = Level::root(root_type.to_vec(), size);
        Ok(Variant {
            root_type: root_type.to_vec(),
            buffer,
            levels: LevelStack::new(root, &limits),
            poison: Poison::new(),
            sealed: true,
            limits,
        })
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// The first error latched on this variant, if any (spec §4.8).
    pub fn return_poison(&self) -> Option<GVariantError> {
        self.poison.get()
    }

    pub fn get_spans(&self) -> &[Span<'a>] {
        self.buffer.spans()
    }

    pub fn root_type(&self) -> &[u8] {
        &self.root_type
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Latch `err` as poison (if nothing is latched yet) and return it.
    pub(crate) fn fail<T>(&self, err: GVariantError) -> Result<T> {
        self.poison.set(err);
        Err(err)
    }
}
