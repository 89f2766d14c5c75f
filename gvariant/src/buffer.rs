//! Scatter-gather buffer model shared by reader and writer (spec §4.4).
//!
//! A variant's payload is an ordered list of byte spans. Spans are either
//! owned (freed with the variant) or borrowed from a caller-supplied
//! lifetime. The buffer supports random-access reads across span
//! boundaries and append-only writes that grow the trailing owned span,
//! splitting off a fresh owned span whenever a caller splices in
//! pre-serialized content via [`ScatterBuffer::insert_spans`].
//!
//! This diverges from the C reference design in one respect, noted here
//! rather than left implicit: the reference implementation shares a
//! single bidirectionally-growing arena between the "front" (payload) and
//! "tail" (in-progress framing-offset table) regions of the *currently
//! open* container, with lazy `fold`/`unfold` cursor maintenance to track
//! which physical span a logical offset currently falls in. In Rust,
//! owned spans are heap allocations (`Box<[u8]>`/`Vec<u8>`) that never
//! move underneath an outstanding reference, so there is no need to claw
//! back a shared arena's tail region for reuse; this buffer keeps the
//! front (payload) region here and gives each open container its own
//! small `Vec<u8>` staging area for framing entries (see `level.rs`,
//! `writer.rs`). Random access for reads is done with a cumulative-length
//! prefix table and binary search (`locate`) rather than an incrementally
//! folded cursor — same asymptotic cost class, simpler to verify safe.

use std::borrow::Cow;

use crate::error::{GVariantError, Limits, Result};

/// One contiguous byte region backing part of a variant's serialized
/// form. See spec DESIGN NOTES §9 "Allocator markers".
#[derive(Debug)]
pub enum Span<'a> {
    /// Allocated and owned by this buffer; freed when the buffer is
    /// dropped.
    Owned(Box<[u8]>),
    /// Referenced from caller-owned memory that must outlive the buffer.
    Borrowed(&'a [u8]),
}

impl<'a> Span<'a> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Span::Owned(b) => b,
            Span::Borrowed(s) => s,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Span::Owned(_))
    }
}

const MIN_ARENA: usize = 4 * 1024;
const MAX_ARENA: usize = 2 * 1024 * 1024 * 1024;

/// Smallest arena capacity in `{MIN_ARENA, MIN_ARENA*2, MIN_ARENA*4, ...,
/// MAX_ARENA}` that is at least `needed` (clamped to `MAX_ARENA` even if
/// that's not enough — a single arena larger than 2GiB is never grown
/// again in one step; the caller loops).
fn grown_capacity(needed: usize) -> usize {
    let mut cap = MIN_ARENA;
    while cap < needed && cap < MAX_ARENA {
        cap = cap.saturating_mul(2).min(MAX_ARENA);
    }
    cap.max(needed.min(MAX_ARENA))
}

fn align_up(offset: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (offset + alignment - 1) & !(alignment - 1)
}

/// Ordered sequence of spans with cumulative-length index, plus (for
/// writer variants) a trailing owned arena still being appended to.
#[derive(Debug)]
pub struct ScatterBuffer<'a> {
    spans: Vec<Span<'a>>,
    /// `prefix[i]` = total bytes in `spans[..i]`. Always `spans.len() + 1`
    /// entries long, `prefix[0] == 0`.
    prefix: Vec<usize>,
    /// Bytes appended since the last flush, not yet pushed into `spans`.
    open: Vec<u8>,
    max_spans: u32,
}

impl<'a> ScatterBuffer<'a> {
    pub fn new(limits: &Limits) -> Self {
        ScatterBuffer {
            spans: Vec::new(),
            prefix: vec![0],
            open: Vec::new(),
            max_spans: limits.max_spans,
        }
    }

    /// Wrap caller-supplied spans for reading. Born fully flushed (no
    /// open arena).
    pub fn from_spans(spans: Vec<Span<'a>>, limits: &Limits) -> Result<Self> {
        if spans.len() as u64 > limits.max_spans as u64 {
            return Err(GVariantError::TooManySpans);
        }
        let mut prefix = Vec::with_capacity(spans.len() + 1);
        let mut total: usize = 0;
        prefix.push(0);
        for s in &spans {
            total = total
                .checked_add(s.len())
                .ok_or(GVariantError::BufferTooLarge)?;
            prefix.push(total);
        }
        Ok(ScatterBuffer {
            spans,
            prefix,
            open: Vec::new(),
            max_spans: limits.max_spans,
        })
    }

    pub fn len(&self) -> usize {
        *self.prefix.last().unwrap() + self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn span_count(&self) -> usize {
        self.spans.len() + usize::from(!self.open.is_empty())
    }

    /// Locate the (span index, intra-span offset) for logical position
    /// `global`, treating the still-open arena as a final virtual span.
    /// `None` iff `global > self.len()` (one past the end is valid, used
    /// by zero-length reads at the end of the buffer).
    fn locate(&self, global: usize) -> Option<(usize, usize)> {
        let flushed_len = *self.prefix.last().unwrap();
        if global > self.len() {
            return None;
        }
        if global >= flushed_len {
            return Some((self.spans.len(), global - flushed_len));
        }
        // Binary search for the span containing `global`: the largest
        // index `i` such that prefix[i] <= global.
        let idx = match self.prefix.binary_search(&global) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Some((idx, global - self.prefix[idx]))
    }

    fn span_slice(&self, idx: usize) -> &[u8] {
        if idx == self.spans.len() {
            &self.open
        } else {
            self.spans[idx].as_slice()
        }
    }

    /// Read the logical byte range `[start, end)`. Returns `None` if the
    /// range is out of bounds or inverted; callers (reader.rs) treat an
    /// out-of-range slot as the type's default value rather than an
    /// error, per spec §4.6/§6 "Extensions".
    pub fn try_read(&self, start: usize, end: usize) -> Option<Cow<'_, [u8]>> {
        if start > end || end > self.len() {
            return None;
        }
        if start == end {
            return Some(Cow::Borrowed(&[]));
        }
        let (start_idx, start_off) = self.locate(start)?;
        let (end_idx, end_off) = self.locate(end)?;
        if start_idx == end_idx {
            return Some(Cow::Borrowed(&self.span_slice(start_idx)[start_off..end_off]));
        }
        // Crosses a span boundary: this only happens when the caller
        // handed the reader multiple spans whose split points don't line
        // up with a value's natural boundaries. Rare; materialize it.
        let mut out = Vec::with_capacity(end - start);
        out.extend_from_slice(&self.span_slice(start_idx)[start_off..]);
        for idx in start_idx + 1..end_idx {
            out.extend_from_slice(self.span_slice(idx));
        }
        out.extend_from_slice(&self.span_slice(end_idx)[..end_off]);
        Some(Cow::Owned(out))
    }

    fn ensure_open_capacity(&mut self, additional: usize) {
        let needed = self.open.len() + additional;
        if self.open.capacity() < needed {
            let target = grown_capacity(needed).max(needed);
            tracing::trace!(needed, target, "growing scatter buffer arena");
            self.open.reserve(target - self.open.len());
        }
    }

    /// Append `bytes` at the front, first padding the logical stream with
    /// zero bytes up to the next multiple of `align`. Returns the start
    /// offset of `bytes` (i.e. the offset right after the padding).
    pub fn append(&mut self, align: usize, bytes: &[u8]) -> Result<usize> {
        let cur_len = self.len();
        let start = align_up(cur_len, align);
        let pad = start - cur_len;
        let total_needed = pad
            .checked_add(bytes.len())
            .ok_or(GVariantError::BufferTooLarge)?;
        start
            .checked_add(bytes.len())
            .ok_or(GVariantError::BufferTooLarge)?;
        self.ensure_open_capacity(total_needed);
        self.open.resize(self.open.len() + pad, 0);
        self.open.extend_from_slice(bytes);
        Ok(start)
    }

    /// Append `n` zero bytes after aligning, without needing to
    /// materialize them first. Returns the start offset.
    pub fn append_zeroed(&mut self, align: usize, n: usize) -> Result<usize> {
        let cur_len = self.len();
        let start = align_up(cur_len, align);
        let pad = start - cur_len;
        let total = pad.checked_add(n).ok_or(GVariantError::BufferTooLarge)?;
        self.ensure_open_capacity(total);
        self.open.resize(self.open.len() + pad + n, 0);
        Ok(start)
    }

    /// Zero-copy splice: flush the in-progress arena (if non-empty) as a
    /// finalized owned span, then push each of `new_spans` in order.
    /// Writing resumes in a fresh arena afterwards.
    pub fn insert_spans(&mut self, new_spans: impl IntoIterator<Item = Span<'a>>) -> Result<()> {
        self.flush_open()?;
        for s in new_spans {
            self.push_span(s)?;
        }
        Ok(())
    }

    fn flush_open(&mut self) -> Result<()> {
        if !self.open.is_empty() {
            let flushed = std::mem::take(&mut self.open);
            self.push_span(Span::Owned(flushed.into_boxed_slice()))?;
        }
        Ok(())
    }

    fn push_span(&mut self, s: Span<'a>) -> Result<()> {
        if self.spans.len() as u64 + 1 > self.max_spans as u64 {
            return Err(GVariantError::TooManySpans);
        }
        let new_total = self
            .prefix
            .last()
            .unwrap()
            .checked_add(s.len())
            .ok_or(GVariantError::BufferTooLarge)?;
        self.spans.push(s);
        self.prefix.push(new_total);
        Ok(())
    }

    /// Finalize all pending writes into `spans`, trimming the trailing
    /// arena's excess capacity, and return the final span list.
    pub fn finish(mut self) -> Result<Vec<Span<'a>>> {
        self.flush_open()?;
        Ok(self.spans)
    }

    pub fn spans(&self) -> &[Span<'a>] {
        &self.spans
    }

    /// Flush the open arena into `spans` in place, without consuming the
    /// buffer (used by `seal`, which keeps reading from the same buffer
    /// afterwards).
    pub fn flush(&mut self) -> Result<()> {
        self.flush_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits::default()
    }

    #[test]
    fn append_pads_for_alignment() {
        let mut buf = ScatterBuffer::new(&limits());
        buf.append(1, &[0xAA]).unwrap();
        let start = buf.append(4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(start, 4);
        assert_eq!(buf.len(), 8);
        assert_eq!(
            buf.try_read(0, 8).unwrap().as_ref(),
            &[0xAA, 0, 0, 0, 1, 2, 3, 4]
        );
    }

    #[test]
    fn insert_spans_splices_without_copying() {
        let mut buf = ScatterBuffer::new(&limits());
        buf.append(1, b"abc").unwrap();
        let external = b"XYZ";
        buf.insert_spans(vec![Span::Borrowed(external)]).unwrap();
        buf.append(1, b"def").unwrap();
        assert_eq!(buf.try_read(0, 9).unwrap().as_ref(), b"abcXYZdef");
        let spans = buf.finish().unwrap();
        assert_eq!(spans.len(), 3);
        assert!(spans[0].is_owned());
        assert!(!spans[1].is_owned());
        assert!(spans[2].is_owned());
    }

    #[test]
    fn read_across_span_boundary_materializes() {
        let spans = vec![Span::Borrowed(&b"hello "[..]), Span::Borrowed(&b"world"[..])];
        let buf = ScatterBuffer::from_spans(spans, &limits()).unwrap();
        assert_eq!(buf.try_read(3, 8).unwrap().as_ref(), b"lo wo");
    }

    #[test]
    fn out_of_range_read_is_none() {
        let buf = ScatterBuffer::from_spans(vec![Span::Borrowed(b"abc")], &limits()).unwrap();
        assert!(buf.try_read(1, 10).is_none());
        assert!(buf.try_read(5, 6).is_none());
        assert_eq!(buf.try_read(3, 3).unwrap().as_ref(), b"");
    }

    #[test]
    fn too_many_spans_rejected() {
        let tight = Limits {
            max_spans: 1,
            ..limits()
        };
        let spans = vec![Span::Borrowed(b"a"), Span::Borrowed(b"b")];
        assert_eq!(
            ScatterBuffer::from_spans(spans, &tight).unwrap_err(),
            GVariantError::TooManySpans
        );
    }

    #[test]
    fn grown_capacity_stays_within_bounds() {
        assert_eq!(grown_capacity(1), MIN_ARENA);
        assert_eq!(grown_capacity(MIN_ARENA + 1), MIN_ARENA * 2);
        assert!(grown_capacity(usize::MAX / 2) <= MAX_ARENA.max(usize::MAX / 2));
    }
}
