//! A standalone codec for the GVariant binary serialization format: a
//! signature parser, a scatter-gather buffer, and reader/writer state
//! machines over a stack of per-container cursors, plus a vararg driver
//! for walking a compound signature one element at a time.

pub mod buffer;
pub mod element;
pub mod error;
pub mod level;
#[cfg(test)]
mod proptests;
pub mod reader;
pub mod signature;
pub mod vararg;
pub mod variant;
pub mod wordcodec;
pub mod writer;

pub use buffer::Span;
pub use error::{GVariantError, Limits, Result};
pub use signature::TypeInfo;
pub use vararg::VarargDriver;
pub use variant::Variant;

use crate::reader::is_basic_leaf;

/// One element of a flattened, pre-order vararg walk (spec §4.9, §6
/// `readv`/`writev`): a basic value, or a container boundary. `readv`
/// produces a `Vec<VarargItem>` describing an entire compound value in
/// one pass; `writev` consumes one to reproduce the same shape against a
/// fresh writer [`Variant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarargItem {
    /// A basic leaf's type character and raw bytes.
    Leaf(u8, Vec<u8>),
    /// Entering an array, with its element count.
    EnterArray(usize),
    /// Entering a maybe: `true` for `Just`, `false` for `Nothing`. A
    /// `Nothing` maybe is immediately followed by `Leave`, with no `Leaf`
    /// in between.
    EnterMaybe(bool),
    /// Entering a variant, with its embedded type.
    EnterVariant(Vec<u8>),
    /// Entering a tuple.
    EnterTuple,
    /// Entering a dict entry.
    EnterPair,
    /// Leaving whatever container was most recently entered.
    Leave,
}

impl<'a> Variant<'a> {
    /// Walk `signature` against this (sealed) variant's contents,
    /// entering/exiting containers and sizing arrays from `peek_count`
    /// automatically, and return the full pre-order trace as a flat
    /// `Vec<VarargItem>` (spec §4.9/§6 `readv`).
    pub fn readv(&mut self, signature: &[u8]) -> Result<Vec<VarargItem>> {
        let mut driver = VarargDriver::new(signature, *self.limits());
        let mut out = Vec::new();
        loop {
            match driver.next() {
                0 => break,
                -1 => {
                    let c = self.leave_char(&driver)?;
                    self.exit(&[c])?;
                    out.push(VarargItem::Leave);
                }
                n => {
                    let c = n as u8;
                    if is_basic_leaf(c) {
                        let bytes = self.read(c)?.into_owned();
                        out.push(VarargItem::Leaf(c, bytes));
                    } else {
                        self.enter(&[c])?;
                        match c {
                            b'a' => {
                                let count = self.peek_count();
                                driver.enter(Some(count))?;
                                out.push(VarargItem::EnterArray(count));
                            }
                            b'm' => {
                                let present = self.peek_count() != 0;
                                driver.enter(None)?;
                                out.push(VarargItem::EnterMaybe(present));
                                if !present {
                                    // The driver still owes one dispense of
                                    // the child type before it reports
                                    // `leave`; there is nothing to read, so
                                    // discard it and let the next loop
                                    // iteration's `-1` drive the matching
                                    // `exit` as usual.
                                    driver.next();
                                }
                            }
                            b'v' => {
                                let ty = self.peek_type().to_vec();
                                driver.enter(None)?;
                                driver.set_variant_type(&ty)?;
                                out.push(VarargItem::EnterVariant(ty));
                            }
                            b'(' => {
                                driver.enter(None)?;
                                out.push(VarargItem::EnterTuple);
                            }
                            b'{' => {
                                driver.enter(None)?;
                                out.push(VarargItem::EnterPair);
                            }
                            _ => return self.fail(GVariantError::TypeMismatch),
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Replay a trace captured by `readv` (or hand-built) against this
    /// (unsealed) writer variant, reproducing the same shape (spec §4.9/§6
    /// `writev`).
    pub fn writev(&mut self, signature: &[u8], items: &[VarargItem]) -> Result<()> {
        let mut driver = VarargDriver::new(signature, *self.limits());
        let mut it = items.iter();
        loop {
            match driver.next() {
                0 => break,
                -1 => {
                    match it.next() {
                        Some(VarargItem::Leave) => {}
                        _ => return self.fail(GVariantError::TypeMismatch),
                    }
                    self.end()?;
                }
                n => {
                    let c = n as u8;
                    if is_basic_leaf(c) {
                        match it.next() {
                            Some(VarargItem::Leaf(item_c, bytes)) if *item_c == c => {
                                self.write(c, bytes)?;
                            }
                            _ => return self.fail(GVariantError::TypeMismatch),
                        }
                    } else {
                        self.writev_enter(c, &mut driver, &mut it)?;
                    }
                }
            }
        }
        if it.next().is_some() {
            return self.fail(GVariantError::TypeMismatch);
        }
        Ok(())
    }

    fn writev_enter(
        &mut self,
        c: u8,
        driver: &mut VarargDriver,
        it: &mut std::slice::Iter<VarargItem>,
    ) -> Result<()> {
        match c {
            b'a' => match it.next() {
                Some(VarargItem::EnterArray(count)) => {
                    self.begin(b'a', None)?;
                    driver.enter(Some(*count))
                }
                _ => self.fail(GVariantError::TypeMismatch),
            },
            b'm' => match it.next() {
                Some(VarargItem::EnterMaybe(present)) => {
                    self.begin(b'm', None)?;
                    driver.enter(None)?;
                    if !*present {
                        // Discard the driver's one owed child dispense;
                        // the outer loop's next `-1` drives the matching
                        // `end` and consumes the trace's `Leave` entry.
                        driver.next();
                    }
                    Ok(())
                }
                _ => self.fail(GVariantError::TypeMismatch),
            },
            b'v' => match it.next() {
                Some(VarargItem::EnterVariant(ty)) => {
                    self.begin(b'v', Some(ty))?;
                    driver.enter(None)?;
                    driver.set_variant_type(ty)
                }
                _ => self.fail(GVariantError::TypeMismatch),
            },
            b'(' => match it.next() {
                Some(VarargItem::EnterTuple) => {
                    self.begin(b'(', None)?;
                    driver.enter(None)
                }
                _ => self.fail(GVariantError::TypeMismatch),
            },
            b'{' => match it.next() {
                Some(VarargItem::EnterPair) => {
                    self.begin(b'{', None)?;
                    driver.enter(None)
                }
                _ => self.fail(GVariantError::TypeMismatch),
            },
            _ => self.fail(GVariantError::TypeMismatch),
        }
    }

    fn leave_char(&self, driver: &VarargDriver) -> Result<u8> {
        driver.last_leave().ok_or(GVariantError::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Span;

    #[test]
    fn readv_flattens_nested_compound() {
        let mut w = Variant::new(b"(uaum(s)u)").unwrap();
        w.begin(b'(', None).unwrap();
        w.write(b'u', &1u32.to_le_bytes()).unwrap();
        w.begin(b'a', None).unwrap();
        w.write(b'u', &2u32.to_le_bytes()).unwrap();
        w.write(b'u', &3u32.to_le_bytes()).unwrap();
        w.end().unwrap();
        w.begin(b'm', None).unwrap();
        w.begin(b'(', None).unwrap();
        w.write(b's', b"hi").unwrap();
        w.end().unwrap();
        w.end().unwrap();
        w.write(b'u', &4u32.to_le_bytes()).unwrap();
        w.end().unwrap();
        w.seal().unwrap();

        let spans: Vec<Span> = w
            .get_spans()
            .iter()
            .map(|s| Span::Owned(s.as_slice().to_vec().into_boxed_slice()))
            .collect();
        let mut r = Variant::new_from_spans(b"(uaum(s)u)", spans).unwrap();
        let trace = r.readv(b"(uaum(s)u)").unwrap();
        assert_eq!(
            trace,
            vec![
                VarargItem::EnterTuple,
                VarargItem::Leaf(b'u', 1u32.to_le_bytes().to_vec()),
                VarargItem::EnterArray(2),
                VarargItem::Leaf(b'u', 2u32.to_le_bytes().to_vec()),
                VarargItem::Leaf(b'u', 3u32.to_le_bytes().to_vec()),
                VarargItem::Leave,
                VarargItem::EnterMaybe(true),
                VarargItem::EnterTuple,
                VarargItem::Leaf(b's', b"hi".to_vec()),
                VarargItem::Leave,
                VarargItem::Leave,
                VarargItem::Leaf(b'u', 4u32.to_le_bytes().to_vec()),
                VarargItem::Leave,
            ]
        );
    }

    #[test]
    fn writev_reproduces_a_readv_trace() {
        let trace = vec![
            VarargItem::EnterTuple,
            VarargItem::Leaf(b's', b"ok".to_vec()),
            VarargItem::Leaf(b'u', 9u32.to_le_bytes().to_vec()),
            VarargItem::Leave,
        ];
        let mut w = Variant::new(b"(su)").unwrap();
        w.writev(b"(su)", &trace).unwrap();
        w.seal().unwrap();
        assert!(w.get_spans().iter().map(Span::len).sum::<usize>() > 0);
    }

    #[test]
    fn readv_nothing_maybe_has_no_leaf() {
        let mut w = Variant::new(b"mu").unwrap();
        w.begin(b'm', None).unwrap();
        w.end().unwrap();
        w.seal().unwrap();
        let spans: Vec<Span> = w
            .get_spans()
            .iter()
            .map(|s| Span::Owned(s.as_slice().to_vec().into_boxed_slice()))
            .collect();
        let mut r = Variant::new_from_spans(b"mu", spans).unwrap();
        let trace = r.readv(b"mu").unwrap();
        assert_eq!(trace, vec![VarargItem::EnterMaybe(false), VarargItem::Leave]);
    }
}
