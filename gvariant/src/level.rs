//! Per-container cursor state and the stack of it (spec §3 "Level", §4.5
//! "Level stack").

use crate::error::{GVariantError, Limits, Result};
use crate::signature::TypeInfo;
use crate::wordcodec::WordSize;

/// Which kind of container a level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enclosing {
    /// The implicit outermost level holding the root type.
    Root,
    Tuple,
    Pair,
    Array,
    Maybe,
    Variant,
}

impl Enclosing {
    pub fn opening_char(self) -> Option<u8> {
        match self {
            Enclosing::Root => None,
            Enclosing::Tuple => Some(b'('),
            Enclosing::Pair => Some(b'{'),
            Enclosing::Array => Some(b'a'),
            Enclosing::Maybe => Some(b'm'),
            Enclosing::Variant => Some(b'v'),
        }
    }

    pub fn from_char(c: u8) -> Option<Enclosing> {
        match c {
            b'(' => Some(Enclosing::Tuple),
            b'{' => Some(Enclosing::Pair),
            b'a' => Some(Enclosing::Array),
            b'm' => Some(Enclosing::Maybe),
            b'v' => Some(Enclosing::Variant),
            _ => None,
        }
    }
}

/// Per-container cursor state (spec §3 "Level").
#[derive(Debug)]
pub struct Level {
    /// Bytes available to this container.
    pub size: usize,
    pub enclosing: Enclosing,
    /// Framing-offset word size chosen for this container.
    pub word_size: WordSize,
    /// Remaining type characters to be consumed at this level.
    pub residual_type: Vec<u8>,
    /// Front cursor: logical byte offset from the container's start.
    pub offset: usize,
    /// Global buffer offset corresponding to local offset 0 in this
    /// container (reader: where the container's bytes begin in the
    /// sealed buffer; writer: the append position when this level was
    /// entered).
    pub base: usize,
    /// Container-specific counter; see spec §3 invariants.
    pub index: usize,
    /// Writer-only: staged framing-offset entries for children of this
    /// container, 8 bytes little-endian each, oldest first, compacted to
    /// `word_size` on `end()`.
    pub framing: Vec<u8>,
    /// Writer-only: inner type string supplied to `begin('v', ty)`,
    /// emitted (preceded by a NUL) when the level closes.
    pub v_embedded_type: Vec<u8>,
    /// Writer-only: the `TypeInfo` of this container's own type, as seen
    /// from its parent's residual type at `begin()` time. Needed again at
    /// `end()` to decide whether to pad to a fixed size and how many type
    /// characters to drain from the parent.
    pub own_info: Option<TypeInfo>,
    /// Reader-only, `Tuple`/`Pair` levels: number of dynamically-sized
    /// members that actually get a framing-offset slot (every dynamic
    /// member except an exempted dynamic *last* member). Used to size the
    /// trailing offset table back out of `size` when computing the last
    /// member's implicit end (spec §4.6 "no framing slot needed for the
    /// final child").
    pub table_entries: usize,
    /// Writer-only, `Maybe` levels: whether the child type is fixed-size,
    /// recorded at `begin()` time. `end()` needs this to decide whether a
    /// present (`Just`) child needs the NUL marker appended, but by then
    /// `record_write` has already cleared `residual_type`, so it can't be
    /// re-derived by re-parsing it.
    pub maybe_child_fixed: bool,
}

impl Level {
    pub fn root(root_type: Vec<u8>, size: usize) -> Level {
        Level {
            size,
            enclosing: Enclosing::Root,
            word_size: WordSize::for_container_len(size),
            residual_type: root_type,
            offset: 0,
            base: 0,
            index: 0,
            framing: Vec::new(),
            v_embedded_type: Vec::new(),
            own_info: None,
            table_entries: 0,
            maybe_child_fixed: false,
        }
    }

    pub fn child(
        enclosing: Enclosing,
        residual_type: Vec<u8>,
        size: usize,
        base: usize,
        index: usize,
    ) -> Level {
        Level {
            size,
            enclosing,
            word_size: WordSize::for_container_len(size),
            residual_type,
            offset: 0,
            base,
            index,
            framing: Vec::new(),
            v_embedded_type: Vec::new(),
            own_info: None,
            table_entries: 0,
            maybe_child_fixed: false,
        }
    }

    /// Push an 8-byte little-endian end-offset onto this container's
    /// framing staging area (writer only).
    pub fn push_framing_entry(&mut self, end_offset: u64) {
        self.framing.extend_from_slice(&end_offset.to_le_bytes());
    }

    pub fn framing_entry_count(&self) -> usize {
        self.framing.len() / 8
    }

    pub fn framing_entry(&self, n: usize) -> u64 {
        u64::from_le_bytes(self.framing[n * 8..n * 8 + 8].try_into().unwrap())
    }

    /// A cheap `Copy` snapshot of the scalar fields, so reader/writer code
    /// can read them without holding a borrow of the level across a
    /// subsequent mutation.
    pub fn view(&self) -> LevelView {
        LevelView {
            enclosing: self.enclosing,
            word_size: self.word_size,
            offset: self.offset,
            base: self.base,
            index: self.index,
            size: self.size,
            residual_len: self.residual_type.len(),
            table_entries: self.table_entries,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LevelView {
    pub enclosing: Enclosing,
    pub word_size: WordSize,
    pub offset: usize,
    pub base: usize,
    pub index: usize,
    pub size: usize,
    pub residual_len: usize,
    pub table_entries: usize,
}

/// Stack of open container levels, root first.
///
/// The spec's DESIGN NOTES prescribe a tagged-sum `Inline(array) |
/// Linked(chunk*, next)` to keep shallow stacks allocation-free and spill
/// deep ones into linked chunks, mirroring the C implementation's avoidance
/// of realloc (which would invalidate raw pointers other code holds into
/// the top-of-stack entry). Nothing in this Rust port holds a raw pointer
/// into a `Level` across a push/pop — every access goes through
/// `top`/`top_mut`, a fresh borrow each time — so a plain `Vec<Level>`
/// already gives the same amortized-allocation behavior (and, via
/// `Vec::pop`'s capacity retention, the same "spare chunk cached for
/// reuse" effect) without the extra indirection. See DESIGN.md.
#[derive(Debug)]
pub struct LevelStack {
    levels: Vec<Level>,
    max_depth: u16,
}

impl LevelStack {
    pub fn new(root: Level, limits: &Limits) -> Self {
        let mut levels = Vec::with_capacity(8);
        levels.push(root);
        LevelStack {
            levels,
            max_depth: limits.max_depth,
        }
    }

    pub fn push(&mut self, level: Level) -> Result<()> {
        if self.levels.len() > self.max_depth as usize {
            return Err(GVariantError::NestingTooDeep);
        }
        self.levels.push(level);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Level> {
        if self.levels.len() <= 1 {
            // The root level is never popped.
            return None;
        }
        self.levels.pop()
    }

    pub fn top(&self) -> &Level {
        self.levels.last().expect("root level always present")
    }

    pub fn top_mut(&mut self) -> &mut Level {
        self.levels.last_mut().expect("root level always present")
    }

    /// The level directly below the current top, if any (used by
    /// `advance`/`end` to update the parent after a child completes).
    pub fn parent_mut(&mut self) -> Option<&mut Level> {
        let n = self.levels.len();
        if n < 2 {
            None
        } else {
            Some(&mut self.levels[n - 2])
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn is_at_root(&self) -> bool {
        self.levels.len() == 1
    }

    /// Truncate back to just the root level (used by `rewind`/`seal`).
    pub fn reset_to_root(&mut self, new_root: Level) {
        self.levels.truncate(1);
        self.levels[0] = new_root;
    }
}
