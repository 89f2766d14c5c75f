//! Static per-character properties of type-string elements (spec §4.1).
//!
//! # 2.3 Type Strings (quoted from the GVariant spec, as the teacher crate
//! does for the wire-layout rules it reproduces)
//!
//! Every character of a valid type string has a single, unchanging meaning:
//! an alignment requirement, whether it denotes a fixed-size value, and
//! whether it is "basic" (usable as a dictionary-entry key).

/// One row of the element table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementInfo {
    /// Power-of-two alignment in bytes: 1, 2, 4 or 8.
    pub alignment: u8,
    /// True if this character may appear in a parsed wire type string.
    pub real: bool,
    /// True if this is a basic (non-container) leaf, eligible as a
    /// dictionary-entry key.
    pub basic: bool,
    /// True if the size of a value of this type is always `1 << alignment`.
    pub fixed: bool,
    /// `1 << alignment` when `fixed`, else 0.
    pub fixed_size: u8,
}

const INVALID: ElementInfo = ElementInfo {
    alignment: 0,
    real: false,
    basic: false,
    fixed: false,
    fixed_size: 0,
};

const fn basic(alignment: u8) -> ElementInfo {
    ElementInfo {
        alignment,
        real: true,
        basic: true,
        fixed: true,
        fixed_size: alignment,
    }
}

const fn string_like() -> ElementInfo {
    ElementInfo {
        alignment: 1,
        real: true,
        basic: true,
        fixed: false,
        fixed_size: 0,
    }
}

const fn container(alignment: u8) -> ElementInfo {
    ElementInfo {
        alignment,
        real: true,
        basic: false,
        fixed: false,
        fixed_size: 0,
    }
}

/// API-only pseudo-elements (`r e ? *`): recognized by tooling that wants to
/// describe "any basic type" etc, but never legal in a wire type string.
const fn pseudo() -> ElementInfo {
    ElementInfo {
        alignment: 0,
        real: false,
        basic: false,
        fixed: false,
        fixed_size: 0,
    }
}

/// Build the 256-entry table once, at compile time isn't possible with a
/// loop in a const fn on every edition we target, so it's built lazily and
/// cached; lookups are O(1) either way.
fn build_table() -> [ElementInfo; 256] {
    let mut t = [INVALID; 256];
    t[b'b' as usize] = basic(1); // boolean
    t[b'y' as usize] = basic(1); // byte
    t[b'n' as usize] = basic(2); // int16
    t[b'q' as usize] = basic(2); // uint16
    t[b'i' as usize] = basic(4); // int32
    t[b'u' as usize] = basic(4); // uint32
    t[b'x' as usize] = basic(8); // int64
    t[b't' as usize] = basic(8); // uint64
    t[b'h' as usize] = basic(4); // handle (gint32, same wire shape as u)
    t[b'd' as usize] = basic(8); // double
    t[b's' as usize] = string_like(); // string
    t[b'o' as usize] = string_like(); // object path
    t[b'g' as usize] = string_like(); // signature string
    t[b'v' as usize] = container(8); // variant recursion
    t[b'm' as usize] = container(1); // maybe (alignment of child, computed by parser)
    t[b'a' as usize] = container(1); // array (alignment of child, computed by parser)
    t[b'(' as usize] = container(8); // tuple open
    t[b')' as usize] = container(8); // tuple close
    t[b'{' as usize] = container(8); // pair open
    t[b'}' as usize] = container(8); // pair close
    t[b'r' as usize] = pseudo(); // any tuple
    t[b'e' as usize] = pseudo(); // any dict entry
    t[b'?' as usize] = pseudo(); // any basic
    t[b'*' as usize] = pseudo(); // any type
    t
}

thread_local! {
    static TABLE: [ElementInfo; 256] = build_table();
}

/// Look up the static properties of a single type-string character.
/// O(1). Unrecognized bytes (including all non-ASCII) yield `INVALID`.
pub fn lookup(c: u8) -> ElementInfo {
    TABLE.with(|t| t[c as usize])
}

pub fn is_valid_basic(c: u8) -> bool {
    lookup(c).basic
}
