//! Interface shared by the two compressed BASE/CHECK encodings.
//!
//! The trie walks the arrays through [`BcStore`] only, so the encoding is a
//! compile-time choice with no per-access dispatch. Traversal carries the
//! current node's BASE with it: [`BcStore::base_of_child`] turns a child slot
//! and its parent's BASE into the child's BASE in O(1) for both encodings,
//! which lets the pointer format store nothing but XOR deltas.

use std::io::{self, Write};

use crate::serial::ImageSource;
use crate::Result;

/// Uncompressed construction output, consumed by [`BcStore::freeze`].
///
/// All four arrays are indexed by slot id. `checks` holds edge codes (0 for
/// the root sentinel and for unused slots), `bases` holds child offsets, or
/// tail offsets for leaf slots.
#[derive(Debug)]
pub struct RawBc {
    pub(crate) bases: Vec<u32>,
    pub(crate) checks: Vec<u32>,
    pub(crate) parents: Vec<u32>,
    pub(crate) used: Vec<bool>,
}

impl RawBc {
    pub(crate) fn num_slots(&self) -> usize {
        self.bases.len()
    }
}

/// Read interface over a frozen BASE/CHECK store.
pub trait BcStore<'a>: Sized {
    /// Image tag byte identifying the encoding.
    const FORMAT_TAG: u8;

    /// Compresses the raw construction arrays.
    fn freeze(raw: &RawBc) -> Self;

    /// Number of slots.
    fn num_slots(&self) -> u64;

    /// Edge code stored at slot `i`; 0 for unused slots and the root.
    fn check_at(&self, i: u32) -> u32;

    /// BASE of slot `i`, given the BASE of its parent.
    fn base_of_child(&self, i: u32, parent_base: u32) -> u32;

    /// BASE of slot `i` without parent context. O(depth) in the pointer
    /// encoding; used by decode, never on the lookup path.
    fn base_at(&self, i: u32) -> u32;

    /// Parent slot of `i` (0 for the root).
    fn parent_at(&self, i: u32) -> u32;

    /// Whether slot `i` holds a live node.
    fn is_used(&self, i: u32) -> bool;

    /// Exact image size of [`write_into`](Self::write_into)'s output.
    fn serialized_len(&self) -> u64;

    /// Writes the store to an image section.
    fn write_into<W: Write>(&self, w: &mut W) -> io::Result<()>;

    /// Reads a store written by [`write_into`](Self::write_into).
    fn parse_from<S: ImageSource<'a>>(src: &mut S) -> Result<Self>;
}
