//! Serialization primitives (spec §4.7): `begin`, `write`, `end`, `insert`,
//! `seal`, and the framing-offset emission policy they share.
//!
//! This is the reader's slot algebra run backwards: where `reader.rs` reads
//! a framing offset out of a container's tail to find where a dynamic
//! child ends, the writer stages each child's end offset as it's written
//! (`Level::framing`) and compacts the staged entries into a real
//! tail-of-container offset table once the container's final size (and
//! therefore its word size, spec §4.3) is known, on `end()`.

use crate::element;
use crate::error::{GVariantError, Result};
use crate::level::{Enclosing, Level};
use crate::signature::{parse_exactly_one, parse_one, TypeInfo};
use crate::variant::Variant;
use crate::wordcodec::{self, WordSize};

impl<'a> Variant<'a> {
    /// Open a new container of kind `c` (`a`, `m`, `v`, `(`, `{`) as the
    /// next element at the current level. `variant_type` is required, and
    /// must itself be a single complete type, when `c == b'v'`.
    pub fn begin(&mut self, c: u8, variant_type: Option<&[u8]>) -> Result<()> {
        if self.sealed {
            return self.fail(GVariantError::NullVariantMutation);
        }
        let enclosing = match Enclosing::from_char(c) {
            Some(e) => e,
            None => return self.fail(GVariantError::TypeMismatch),
        };
        let residual = self.levels.top().residual_type.clone();
        if residual.first().copied() != Some(c) {
            return self.fail(GVariantError::TypeMismatch);
        }
        let type_info = match parse_one(&residual, &self.limits) {
            Ok(t) => t,
            Err(e) => return self.fail(e),
        };
        let child_base = match self.buffer.append_zeroed(type_info.alignment as usize, 0) {
            Ok(b) => b,
            Err(e) => return self.fail(e),
        };

        let mut level = match enclosing {
            Enclosing::Array | Enclosing::Maybe => {
                let child_sig = &residual[1..];
                let child_info = match parse_one(child_sig, &self.limits) {
                    Ok(t) => t,
                    Err(e) => return self.fail(e),
                };
                let child_type = child_sig[..child_info.length].to_vec();
                let mut level = Level::child(enclosing, child_type, 0, child_base, 0);
                level.maybe_child_fixed = child_info.is_fixed();
                level
            }
            Enclosing::Variant => {
                let vty = match variant_type {
                    Some(t) => t,
                    None => return self.fail(GVariantError::TypeMismatch),
                };
                if parse_exactly_one(vty, &self.limits).is_err() {
                    return self.fail(GVariantError::InvalidType);
                }
                let mut level = Level::child(Enclosing::Variant, vty.to_vec(), 0, child_base, 0);
                level.v_embedded_type = vty.to_vec();
                level
            }
            Enclosing::Tuple | Enclosing::Pair => {
                let inner = residual[1..type_info.length - 1].to_vec();
                Level::child(enclosing, inner, 0, child_base, 1)
            }
            Enclosing::Root => return self.fail(GVariantError::TypeMismatch),
        };
        level.own_info = Some(type_info);

        tracing::trace!(container = c as char, depth = self.levels.depth() + 1, "begin");
        self.levels.push(level)
    }

    /// Write a basic leaf value at the current level. `value` must be
    /// exactly the leaf's fixed size for fixed types; for `s`/`o`/`g` it is
    /// the string content with no NUL (the terminator is added here).
    pub fn write(&mut self, leaf: u8, value: &[u8]) -> Result<()> {
        if self.sealed {
            return self.fail(GVariantError::NullVariantMutation);
        }
        let info = element::lookup(leaf);
        if !info.basic {
            return self.fail(GVariantError::TypeMismatch);
        }
        if self.levels.top().residual_type.first().copied() != Some(leaf) {
            return self.fail(GVariantError::TypeMismatch);
        }

        let is_string = matches!(leaf, b's' | b'o' | b'g');
        let start = if is_string {
            let mut bytes = Vec::with_capacity(value.len() + 1);
            bytes.extend_from_slice(value);
            bytes.push(0);
            match self.buffer.append(1, &bytes) {
                Ok(s) => s,
                Err(e) => return self.fail(e),
            }
        } else {
            if value.len() != info.fixed_size as usize {
                return self.fail(GVariantError::TypeMismatch);
            }
            match self.buffer.append(info.alignment as usize, value) {
                Ok(s) => s,
                Err(e) => return self.fail(e),
            }
        };
        let written_len = if is_string { value.len() + 1 } else { value.len() };
        let base = self.levels.top().base;
        let new_offset = (start + written_len) - base;

        let type_info = TypeInfo {
            alignment: info.alignment,
            size: if info.fixed { info.fixed_size as usize } else { 0 },
            bound_size: 0,
            depth: 0,
            length: 1,
        };
        self.record_write(&type_info, new_offset);
        Ok(())
    }

    /// Splice a caller-provided pre-serialized value of type `ty` in
    /// directly, without copying (spec §3 "Ownership", §4.4 `insert_spans`).
    pub fn insert(&mut self, ty: &[u8], spans: Vec<crate::buffer::Span<'a>>) -> Result<()> {
        if self.sealed {
            return self.fail(GVariantError::NullVariantMutation);
        }
        if !self.levels.top().residual_type.starts_with(ty) {
            return self.fail(GVariantError::TypeMismatch);
        }
        let type_info = match parse_exactly_one(ty, &self.limits) {
            Ok(t) => t,
            Err(e) => return self.fail(e),
        };
        let total: usize = spans.iter().map(crate::buffer::Span::len).sum();
        if type_info.is_fixed() && total != type_info.size {
            return self.fail(GVariantError::TypeMismatch);
        }
        if let Err(e) = self.buffer.append_zeroed(type_info.alignment as usize, 0) {
            return self.fail(e);
        }
        let base = self.levels.top().base;
        if let Err(e) = self.buffer.insert_spans(spans) {
            return self.fail(e);
        }
        let new_offset = self.buffer.len() - base;
        self.record_write(&type_info, new_offset);
        Ok(())
    }

    /// Close the currently open container, folding its result into the
    /// parent's bookkeeping.
    pub fn end(&mut self) -> Result<()> {
        if self.sealed {
            return self.fail(GVariantError::NullVariantMutation);
        }
        if self.levels.is_at_root() {
            return self.fail(GVariantError::TypeMismatch);
        }
        let level = self.levels.pop().expect("checked not at root");
        let own_info = level.own_info.expect("writer levels always carry own_info");
        let content_len = level.offset;

        match level.enclosing {
            Enclosing::Variant => {
                let mut tail = Vec::with_capacity(level.v_embedded_type.len() + 1);
                tail.push(0);
                tail.extend_from_slice(&level.v_embedded_type);
                if let Err(e) = self.buffer.append(1, &tail) {
                    return self.fail(e);
                }
            }
            Enclosing::Maybe => {
                if content_len > 0 && !level.maybe_child_fixed {
                    if let Err(e) = self.buffer.append(1, &[0u8]) {
                        return self.fail(e);
                    }
                }
            }
            Enclosing::Array | Enclosing::Tuple | Enclosing::Pair => {
                let count = level.framing_entry_count();
                if count > 0 {
                    let word = WordSize::for_container_len(content_len);
                    let mut table = vec![0u8; count * word.bytes()];
                    for i in 0..count {
                        let value = level.framing_entry(i);
                        // Staged entries are in chronological write order.
                        // Arrays read back via `index` counting down from
                        // the total, tuples/pairs via `index` counting up
                        // from 0 among dynamic children only; laying the
                        // table out to match each reading direction keeps
                        // `reader.rs`'s uniform `nth_from_tail` formula
                        // correct for both. See DESIGN.md.
                        let slot = if matches!(level.enclosing, Enclosing::Array) {
                            i
                        } else {
                            count - 1 - i
                        };
                        wordcodec::write_offset_table_entry(&mut table, word, slot, value);
                    }
                    if let Err(e) = self.buffer.append(1, &table) {
                        return self.fail(e);
                    }
                }
            }
            Enclosing::Root => unreachable!("root is never begun/ended"),
        }

        if own_info.is_fixed() {
            let current_total = self.buffer.len() - level.base;
            if current_total < own_info.size {
                if let Err(e) = self
                    .buffer
                    .append_zeroed(1, own_info.size - current_total)
                {
                    return self.fail(e);
                }
            }
        }

        let total_size = self.buffer.len() - level.base;
        let new_offset = level.base - self.levels.top().base + total_size;
        tracing::trace!(depth = self.levels.depth(), "end");
        self.record_write(&own_info, new_offset);
        Ok(())
    }

    /// Close all open containers, flush the pending arena, and mark the
    /// variant sealed (readable). Equivalent to `rewind` if already sealed.
    pub fn seal(&mut self) -> Result<()> {
        if self.sealed {
            return self.rewind();
        }
        while !self.levels.is_at_root() {
            self.end()?;
        }
        if let Err(e) = self.buffer.flush() {
            return self.fail(e);
        }
        self.sealed = true;
        let size = self.buffer.len();
        self.levels
            .reset_to_root(Level::root(self.root_type.clone(), size));
        tracing::debug!(len = size, span_count = self.buffer.span_count(), "sealed variant");
        Ok(())
    }

    /// Shared bookkeeping for "a value of `type_info`'s shape now occupies
    /// this level up through local offset `new_offset`": stage a framing
    /// entry if needed, advance the per-kind counter, drain consumed type
    /// characters, and move the front cursor. Used by `write` (for leaves),
    /// `insert`, and `end` (for a just-closed child container) alike.
    fn record_write(&mut self, type_info: &TypeInfo, new_offset: usize) {
        let level = self.levels.top_mut();
        let has_more_after = matches!(level.enclosing, Enclosing::Tuple | Enclosing::Pair)
            && level.residual_type.len() > type_info.length;
        match level.enclosing {
            Enclosing::Array => {
                if !type_info.is_fixed() {
                    level.push_framing_entry(new_offset as u64);
                }
                level.index += 1;
            }
            Enclosing::Tuple | Enclosing::Pair => {
                if !type_info.is_fixed() {
                    if has_more_after {
                        level.push_framing_entry(new_offset as u64);
                    }
                    level.index += 1;
                }
                let n = type_info.length.min(level.residual_type.len());
                level.residual_type.drain(0..n);
            }
            Enclosing::Maybe | Enclosing::Variant | Enclosing::Root => {
                level.residual_type.clear();
            }
        }
        level.offset = new_offset;
    }
}
