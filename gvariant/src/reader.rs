//! Deserialization primitives (spec §4.6): `peek_count`, `peek_type`,
//! `enter`/`exit`, `read`, `rewind`, and the internal `peek`/`advance`
//! cursor algebra they share with the writer's framing-offset bookkeeping.
//!
//! The fixed-vs-dynamic slot computation generalizes the teacher's
//! `NonFixedWidthArrayIterator::next`/`NonFixedWidthArray::index` (read a
//! framing offset from the tail, fall back to an empty/default slot on any
//! out-of-range read) from "array of one element type" to any container
//! kind. The `m` container's NUL-marker handling mirrors
//! `MaybeNonFixedSize`; the string leaf's "last byte must be NUL, else
//! empty" rule mirrors `Str::to_bytes`.

use std::borrow::Cow;

use crate::element;
use crate::error::{GVariantError, Limits, Result};
use crate::level::{Enclosing, Level, LevelView};
use crate::signature::{parse_exactly_one, parse_one, TypeInfo};
use crate::variant::Variant;
use crate::wordcodec::{self, WordSize};

fn align_up(offset: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return offset;
    }
    (offset + alignment - 1) & !(alignment - 1)
}

/// Clamp a computed `(start, end)` slot into the level's bounds. An `end`
/// outside `[offset, size]`, or an inverted range, truncates to an empty
/// slot at the current offset rather than failing (spec §4.6 "Partial-
/// failure semantics").
fn clamp_slot(offset: usize, size: usize, slot: (usize, usize)) -> (usize, usize) {
    let (start, end) = slot;
    if end < start || end < offset || end > size || start > size {
        let o = offset.min(size);
        (o, o)
    } else {
        (start, end)
    }
}

/// Number of top-level members of a tuple/pair's `inner` type string that
/// get their own framing-offset slot: every dynamically-sized member
/// except an exempted dynamic *last* member (spec §4.6/§4.7 "no framing
/// slot needed for the final child"). A static property of the type
/// string, computed once when the container is entered.
fn count_table_entries(inner: &[u8], limits: &Limits) -> Result<usize> {
    let mut rest = inner;
    let mut count = 0usize;
    let mut last_was_dynamic = false;
    while !rest.is_empty() {
        let info = parse_one(rest, limits)?;
        last_was_dynamic = !info.is_fixed();
        if last_was_dynamic {
            count += 1;
        }
        rest = &rest[info.length..];
    }
    if last_was_dynamic && count > 0 {
        count -= 1;
    }
    Ok(count)
}

fn advance_level(level: &mut Level, type_info: &TypeInfo, end: usize) {
    level.offset = end.min(level.size);
    match level.enclosing {
        Enclosing::Array | Enclosing::Maybe => {
            level.index = level.index.saturating_sub(1);
        }
        Enclosing::Tuple | Enclosing::Pair => {
            if !type_info.is_fixed() {
                level.index += 1;
            }
            let n = type_info.length.min(level.residual_type.len());
            level.residual_type.drain(0..n);
        }
        Enclosing::Variant | Enclosing::Root => {
            level.residual_type.clear();
        }
    }
}

impl<'a> Variant<'a> {
    /// Remaining dynamic element count at the current level (spec
    /// `peek_count`).
    pub fn peek_count(&self) -> usize {
        let level = self.levels.top();
        match level.enclosing {
            Enclosing::Array | Enclosing::Maybe => level.index,
            _ => usize::from(!level.residual_type.is_empty()),
        }
    }

    /// The residual type string at the current level.
    pub fn peek_type(&self) -> &[u8] {
        &self.levels.top().residual_type
    }

    /// Reset the reader cursor to the root, discarding any open levels.
    pub fn rewind(&mut self) -> Result<()> {
        if !self.sealed {
            return self.fail(GVariantError::TypeMismatch);
        }
        let size = self.buffer.len();
        let root = Level::root(self.root_type.clone(), size);
        self.levels.reset_to_root(root);
        Ok(())
    }

    fn read_word(&self, global_start: usize, global_end: usize, word: WordSize) -> u64 {
        match self.buffer.try_read(global_start, global_end) {
            Some(bytes) if bytes.len() == word.bytes() => wordcodec::fetch(&bytes, word),
            _ => 0,
        }
    }

    fn nth_from_tail(&self, view: LevelView, n: usize) -> u64 {
        let wb = view.word_size.bytes();
        let local_end = view.size.saturating_sub(n * wb);
        let local_start = local_end.saturating_sub(wb);
        self.read_word(view.base + local_start, view.base + local_end, view.word_size)
    }

    /// Compute the `(start, end)` slot, local to the current level, for the
    /// next element described by `type_info` (spec §4.6 internal `peek`).
    fn peek_slot(&self, view: LevelView, type_info: &TypeInfo) -> (usize, usize) {
        if type_info.is_fixed() {
            let start = align_up(view.offset, type_info.alignment as usize);
            return (start, start + type_info.size);
        }
        let start = align_up(view.offset, type_info.alignment.max(1) as usize);
        let end = match view.enclosing {
            Enclosing::Variant => view.index,
            Enclosing::Maybe => view.size.saturating_sub(1),
            Enclosing::Array => {
                if view.index == 0 {
                    view.offset
                } else {
                    self.nth_from_tail(view, view.index - 1) as usize
                }
            }
            Enclosing::Tuple | Enclosing::Pair => {
                if view.residual_len == type_info.length {
                    view.size
                        .saturating_sub(view.table_entries * view.word_size.bytes())
                } else if view.index >= 1 {
                    self.nth_from_tail(view, view.index - 1) as usize
                } else {
                    view.offset
                }
            }
            Enclosing::Root => view.size,
        };
        (start, end)
    }

    /// Read one basic leaf matching `element`. Returns the leaf's raw bytes
    /// (fixed size, or the NUL-stripped content for `s`/`o`/`g`); malformed
    /// or truncated wire data yields the type's default value rather than
    /// an error (spec §4.6/§6 "Extensions").
    pub fn read(&mut self, element: u8) -> Result<Cow<'_, [u8]>> {
        if !self.sealed {
            return self.fail(GVariantError::TypeMismatch);
        }
        let view = self.levels.top().view();
        let residual = self.levels.top().residual_type.clone();
        if residual.first().copied() != Some(element) || !element::is_valid_basic(element) {
            return self.fail(GVariantError::TypeMismatch);
        }
        if matches!(view.enclosing, Enclosing::Array | Enclosing::Maybe) && view.index == 0 {
            return self.fail(GVariantError::TypeMismatch);
        }
        let type_info = match parse_one(&residual, &self.limits) {
            Ok(t) => t,
            Err(e) => return self.fail(e),
        };
        let (start, end) = clamp_slot(view.offset, view.size, self.peek_slot(view, &type_info));
        let is_string = matches!(element, b's' | b'o' | b'g');

        let result: Cow<'_, [u8]> = if is_string {
            if start == end {
                Cow::Borrowed(&[])
            } else {
                match self.buffer.try_read(view.base + start, view.base + end) {
                    Some(bytes) if bytes.last() == Some(&0) => match bytes {
                        Cow::Borrowed(b) => Cow::Borrowed(&b[..b.len() - 1]),
                        Cow::Owned(mut b) => {
                            b.pop();
                            Cow::Owned(b)
                        }
                    },
                    _ => Cow::Borrowed(&[]),
                }
            }
        } else {
            match self.buffer.try_read(view.base + start, view.base + end) {
                Some(bytes) if bytes.len() == type_info.size => bytes,
                _ => Cow::Owned(vec![0u8; type_info.size]),
            }
        };

        advance_level(self.levels.top_mut(), &type_info, end);
        Ok(result)
    }

    /// Enter one container level per character of `containers` (e.g. `b"a"`
    /// to enter an array). Spec §4.6 `enter`.
    pub fn enter(&mut self, containers: &[u8]) -> Result<()> {
        for &c in containers {
            self.enter_one(c)?;
        }
        Ok(())
    }

    fn enter_one(&mut self, c: u8) -> Result<()> {
        if !self.sealed {
            return self.fail(GVariantError::TypeMismatch);
        }
        let enclosing = match Enclosing::from_char(c) {
            Some(e) => e,
            None => return self.fail(GVariantError::TypeMismatch),
        };
        let view = self.levels.top().view();
        let residual = self.levels.top().residual_type.clone();
        if residual.first().copied() != Some(c) {
            return self.fail(GVariantError::TypeMismatch);
        }
        if matches!(view.enclosing, Enclosing::Array | Enclosing::Maybe) && view.index == 0 {
            return self.fail(GVariantError::TypeMismatch);
        }
        let type_info = match parse_one(&residual, &self.limits) {
            Ok(t) => t,
            Err(e) => return self.fail(e),
        };
        let (start, end) = clamp_slot(view.offset, view.size, self.peek_slot(view, &type_info));
        let child_base = view.base + start;
        let child_size = end.saturating_sub(start);

        let new_level = match enclosing {
            Enclosing::Array => self.build_array_level(&residual, child_base, child_size)?,
            Enclosing::Maybe => self.build_maybe_level(&residual, child_base, child_size)?,
            Enclosing::Variant => self.build_variant_level(child_base, child_size),
            Enclosing::Tuple | Enclosing::Pair => {
                self.build_bracket_level(enclosing, &residual, &type_info, child_base, child_size)?
            }
            Enclosing::Root => return self.fail(GVariantError::TypeMismatch),
        };

        self.levels.push(new_level)?;
        advance_level(
            self.levels
                .parent_mut()
                .expect("just pushed a child onto a non-empty stack"),
            &type_info,
            end,
        );
        Ok(())
    }

    fn build_array_level(&self, residual: &[u8], base: usize, size: usize) -> Result<Level> {
        let child_sig = &residual[1..];
        let child_info = match parse_one(child_sig, &self.limits) {
            Ok(t) => t,
            Err(e) => return self.fail(e),
        };
        let child_type = child_sig[..child_info.length].to_vec();
        let index = if child_info.is_fixed() {
            let f = child_info.size;
            if f != 0 && size % f == 0 {
                size / f
            } else {
                0
            }
        } else {
            let word = WordSize::for_container_len(size);
            let wb = word.bytes();
            if size == 0 || size < wb {
                0
            } else {
                let last = self.read_word(base + size - wb, base + size, word);
                match size.checked_sub(last as usize) {
                    Some(num) if num % wb == 0 => num / wb,
                    _ => 0,
                }
            }
        };
        Ok(Level::child(Enclosing::Array, child_type, size, base, index))
    }

    fn build_maybe_level(&self, residual: &[u8], base: usize, size: usize) -> Result<Level> {
        let child_sig = &residual[1..];
        let child_info = match parse_one(child_sig, &self.limits) {
            Ok(t) => t,
            Err(e) => return self.fail(e),
        };
        let child_type = child_sig[..child_info.length].to_vec();
        let index = if size == 0 {
            0
        } else if child_info.is_fixed() {
            usize::from(size == child_info.size)
        } else {
            1
        };
        let level_size = if index != 0 { size } else { 0 };
        Ok(Level::child(Enclosing::Maybe, child_type, level_size, base, index))
    }

    fn build_variant_level(&self, base: usize, size: usize) -> Level {
        let fallback = || Level::child(Enclosing::Variant, b"()".to_vec(), 0, base, 0);
        if size == 0 {
            return fallback();
        }
        let bytes = match self.buffer.try_read(base, base + size) {
            Some(b) => b,
            None => return fallback(),
        };
        match bytes.iter().rposition(|&b| b == 0) {
            Some(pos) => {
                let candidate = &bytes[pos + 1..];
                if parse_exactly_one(candidate, &self.limits).is_ok() {
                    Level::child(Enclosing::Variant, candidate.to_vec(), size, base, pos)
                } else {
                    fallback()
                }
            }
            None => fallback(),
        }
    }

    fn build_bracket_level(
        &self,
        enclosing: Enclosing,
        residual: &[u8],
        container_info: &TypeInfo,
        base: usize,
        size: usize,
    ) -> Result<Level> {
        let inner = &residual[1..container_info.length - 1];
        let mut level = Level::child(enclosing, inner.to_vec(), size, base, 1);
        level.table_entries = match count_table_entries(inner, &self.limits) {
            Ok(n) => n,
            Err(e) => return self.fail(e),
        };
        Ok(level)
    }

    /// Exit one container level per character of `containers`, asserting
    /// each matches the level it closes (spec §4.6 `exit`).
    pub fn exit(&mut self, containers: &[u8]) -> Result<()> {
        for &c in containers {
            self.exit_one(c)?;
        }
        Ok(())
    }

    fn exit_one(&mut self, c: u8) -> Result<()> {
        let expected = match Enclosing::from_char(c) {
            Some(e) => e,
            None => return self.fail(GVariantError::TypeMismatch),
        };
        if self.levels.is_at_root() || self.levels.top().enclosing != expected {
            return self.fail(GVariantError::TypeMismatch);
        }
        self.levels.pop();
        Ok(())
    }
}

/// Convenience used by the vararg driver: true iff `c` denotes a basic
/// (non-container) leaf character.
pub(crate) fn is_basic_leaf(c: u8) -> bool {
    element::is_valid_basic(c) && c != b'v'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Span;

    fn reader(ty: &[u8], data: &'static [u8]) -> Variant<'static> {
        Variant::new_from_spans(ty, vec![Span::Borrowed(data)]).unwrap()
    }

    #[test]
    fn s1_basic_u() {
        let mut v = reader(b"u", &[0xff, 0x00, 0xff, 0x00]);
        let bytes = v.read(b'u').unwrap().into_owned();
        assert_eq!(u32::from_le_bytes(bytes.try_into().unwrap()), 0x00ff00ff);
        v.rewind().unwrap();
        let bytes = v.read(b'u').unwrap().into_owned();
        assert_eq!(u32::from_le_bytes(bytes.try_into().unwrap()), 0x00ff00ff);
    }

    #[test]
    fn s2_tuple_u() {
        let mut v = reader(b"(u)", &[0xff, 0x00, 0xff, 0x00]);
        assert_eq!(v.read(b'u').unwrap_err(), GVariantError::TypeMismatch);
        v.enter(b"(").unwrap();
        let bytes = v.read(b'u').unwrap().into_owned();
        assert_eq!(u32::from_le_bytes(bytes.try_into().unwrap()), 0x00ff00ff);
        v.exit(b"(").unwrap();
    }

    #[test]
    fn s3_array_u() {
        let mut v = reader(b"au", &[0xff, 0x00, 0xff, 0x00]);
        v.enter(b"a").unwrap();
        assert_eq!(v.peek_count(), 1);
        let bytes = v.read(b'u').unwrap().into_owned();
        assert_eq!(u32::from_le_bytes(bytes.try_into().unwrap()), 0x00ff00ff);
        assert_eq!(v.peek_count(), 0);
    }

    #[test]
    fn s5_variant_recursion() {
        let mut v = reader(b"v", b"\xff\x00\xff\x00\x00u");
        v.enter(b"v").unwrap();
        assert_eq!(v.peek_type(), b"u");
        let bytes = v.read(b'u').unwrap().into_owned();
        assert_eq!(u32::from_le_bytes(bytes.try_into().unwrap()), 0x00ff00ff);
    }

    #[test]
    fn malformed_string_yields_default() {
        let mut v = reader(b"s", b"no-nul");
        let bytes = v.read(b's').unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn empty_array_has_zero_count() {
        let v = reader(b"au", b"");
        assert_eq!(v.peek_count(), 1); // root residual type non-empty
    }
}
