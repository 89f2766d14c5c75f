//! Vararg driver (spec §4.9): a stack-based walker over a compound
//! signature, independent of any `Variant`. Scans a user-supplied type
//! string and dispatches, one call at a time, the sequence of
//! read/write/enter/exit operations a caller should perform against a
//! reader or writer to walk the same shape.
//!
//! Mirrors `level.rs`'s `LevelStack` on purpose: both are "stack of
//! per-container state machines" over a type string, just driven by
//! different inputs (wire data vs. a bare signature).

use crate::element;
use crate::error::{GVariantError, Limits, Result};
use crate::level::Enclosing;
use crate::signature::{parse_exactly_one, parse_one};

/// At least 16 per spec; generous headroom for deeply nested vararg calls
/// without needing a configurable limit of its own.
const MAX_VARARG_FRAMES: usize = 32;

#[derive(Debug)]
enum VarargFrame {
    /// A flat run of types consumed front-to-back: the root signature, or
    /// the inside of an entered tuple/pair/variant. `container_char` is
    /// the character the caller used to `enter`/`begin` this level
    /// (`None` at the root, which is never left).
    Sequence {
        residual: Vec<u8>,
        container_char: Option<u8>,
    },
    /// A single child type dispensed repeatedly: the inside of an entered
    /// array or maybe. `remaining` is the element count still to dispense
    /// (`a`, caller-supplied) or `-1` (`m`, meaning "dispense once, then
    /// stop" — spec's "−1 for non-array").
    Repeated {
        child: Vec<u8>,
        remaining: i64,
        container_char: u8,
    },
}

/// Stack-based walker over a compound type string (spec §4.9).
#[derive(Debug)]
pub struct VarargDriver {
    frames: Vec<VarargFrame>,
    /// The container character of the level `next()` most recently
    /// signalled −1 for, so the caller can look up which bracket to pass
    /// to `exit`/`end` without having tracked it independently.
    last_leave: Option<u8>,
    limits: Limits,
}

impl VarargDriver {
    pub fn new(signature: &[u8], limits: Limits) -> Self {
        VarargDriver {
            frames: vec![VarargFrame::Sequence {
                residual: signature.to_vec(),
                container_char: None,
            }],
            last_leave: None,
            limits,
        }
    }

    /// The container character `next()`'s most recent −1 result refers
    /// to: what a caller should pass to the reader's `exit`/writer's
    /// `end` to close the level just left.
    pub fn last_leave(&self) -> Option<u8> {
        self.last_leave
    }

    /// The next element character to process, −1 to leave the current
    /// level, or 0 once the whole signature is exhausted.
    pub fn next(&mut self) -> i32 {
        loop {
            let at_root = self.frames.len() == 1;
            match self.frames.last_mut() {
                None => return 0,
                Some(VarargFrame::Sequence {
                    residual,
                    container_char,
                }) => {
                    if let Some(&c) = residual.first() {
                        if is_leaf(c) {
                            residual.remove(0);
                        }
                        return c as i32;
                    }
                    if at_root {
                        return 0;
                    }
                    self.last_leave = *container_char;
                    self.frames.pop();
                    return -1;
                }
                Some(VarargFrame::Repeated {
                    remaining,
                    child,
                    container_char,
                }) => {
                    if *remaining == 0 {
                        self.last_leave = Some(*container_char);
                        self.frames.pop();
                        return -1;
                    }
                    let c = child[0];
                    *remaining = if *remaining > 0 { *remaining - 1 } else { 0 };
                    return c as i32;
                }
            }
        }
    }

    /// Descend into the container whose opening character `next()` just
    /// returned. `count` gives the element count for an array (`a`);
    /// ignored for every other container kind.
    pub fn enter(&mut self, count: Option<usize>) -> Result<()> {
        if self.frames.len() + 1 > MAX_VARARG_FRAMES {
            return Err(GVariantError::NestingTooDeep);
        }
        let (c, type_str): (u8, Vec<u8>) = match self.frames.last() {
            Some(VarargFrame::Sequence { residual, .. }) => {
                let info = parse_one(residual, &self.limits)?;
                (residual[0], residual[..info.length].to_vec())
            }
            Some(VarargFrame::Repeated {
                child, remaining, ..
            }) => {
                if *remaining == 0 {
                    return Err(GVariantError::TypeMismatch);
                }
                (child[0], child.clone())
            }
            None => return Err(GVariantError::TypeMismatch),
        };
        let enclosing = Enclosing::from_char(c).ok_or(GVariantError::TypeMismatch)?;
        let info = parse_exactly_one(&type_str, &self.limits)?;

        if let Some(VarargFrame::Sequence { residual, .. }) = self.frames.last_mut() {
            let n = info.length.min(residual.len());
            residual.drain(0..n);
        }

        let new_frame = match enclosing {
            Enclosing::Array => VarargFrame::Repeated {
                child: type_str[1..].to_vec(),
                remaining: count.map_or(-1, |n| n as i64),
                container_char: b'a',
            },
            Enclosing::Maybe => VarargFrame::Repeated {
                child: type_str[1..].to_vec(),
                remaining: -1,
                container_char: b'm',
            },
            // The embedded type isn't known until the caller reads it off
            // the reader (`peek_type`) or supplies it to the writer
            // (`begin('v', ty)`); `set_variant_type` fills it in.
            Enclosing::Variant => VarargFrame::Sequence {
                residual: Vec::new(),
                container_char: Some(b'v'),
            },
            // `exit`/`end` take the *opening* character, matching
            // `Enclosing::from_char` uniformly for enter and exit.
            Enclosing::Tuple => VarargFrame::Sequence {
                residual: type_str[1..type_str.len() - 1].to_vec(),
                container_char: Some(b'('),
            },
            Enclosing::Pair => VarargFrame::Sequence {
                residual: type_str[1..type_str.len() - 1].to_vec(),
                container_char: Some(b'{'),
            },
            Enclosing::Root => return Err(GVariantError::TypeMismatch),
        };
        self.frames.push(new_frame);
        Ok(())
    }

    /// Supply the embedded type once known, immediately after `enter`ing
    /// a `v` level (spec: variant recursion's child type is read off the
    /// wire or chosen by the writer, not present in the outer signature).
    pub fn set_variant_type(&mut self, ty: &[u8]) -> Result<()> {
        match self.frames.last_mut() {
            Some(VarargFrame::Sequence {
                residual,
                container_char: Some(b'v'),
            }) => {
                parse_exactly_one(ty, &self.limits)?;
                *residual = ty.to_vec();
                Ok(())
            }
            _ => Err(GVariantError::TypeMismatch),
        }
    }
}

fn is_leaf(c: u8) -> bool {
    element::is_valid_basic(c) && c != b'v'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_sequence_dispenses_in_order() {
        let mut d = VarargDriver::new(b"su", Limits::default());
        assert_eq!(d.next(), b's' as i32);
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), 0);
    }

    #[test]
    fn tuple_opens_and_leaves() {
        let mut d = VarargDriver::new(b"(su)", Limits::default());
        assert_eq!(d.next(), b'(' as i32);
        d.enter(None).unwrap();
        assert_eq!(d.next(), b's' as i32);
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), -1);
        assert_eq!(d.last_leave(), Some(b'('));
        assert_eq!(d.next(), 0);
    }

    #[test]
    fn array_dispenses_count_then_leaves() {
        let mut d = VarargDriver::new(b"au", Limits::default());
        assert_eq!(d.next(), b'a' as i32);
        d.enter(Some(3)).unwrap();
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), -1);
        assert_eq!(d.next(), 0);
    }

    #[test]
    fn maybe_dispenses_once() {
        let mut d = VarargDriver::new(b"mu", Limits::default());
        assert_eq!(d.next(), b'm' as i32);
        d.enter(None).unwrap();
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), -1);
    }

    #[test]
    fn variant_type_is_set_after_entering() {
        let mut d = VarargDriver::new(b"v", Limits::default());
        assert_eq!(d.next(), b'v' as i32);
        d.enter(None).unwrap();
        d.set_variant_type(b"u").unwrap();
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), -1);
    }

    #[test]
    fn nested_compound_matches_spec_scenario() {
        // (u a u m(s) u)
        let mut d = VarargDriver::new(b"(uaum(s)u)", Limits::default());
        assert_eq!(d.next(), b'(' as i32);
        d.enter(None).unwrap();
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), b'a' as i32);
        d.enter(Some(2)).unwrap();
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), -1); // leave array
        assert_eq!(d.next(), b'm' as i32);
        d.enter(None).unwrap();
        assert_eq!(d.next(), b'(' as i32);
        d.enter(None).unwrap();
        assert_eq!(d.next(), b's' as i32);
        assert_eq!(d.next(), -1); // leave inner tuple
        assert_eq!(d.next(), -1); // leave maybe
        assert_eq!(d.next(), b'u' as i32);
        assert_eq!(d.next(), -1); // leave outer tuple
        assert_eq!(d.next(), 0);
    }
}
