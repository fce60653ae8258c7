//! Pointer-format BASE/CHECK store (image tag `P`).
//!
//! Live slots are compacted by rank over a used-slot bit vector. CHECK codes
//! sit in a compact vector sized to the alphabet. BASE values are stored as
//! the XOR against the parent's BASE: greedy slot placement keeps the delta
//! inside one byte almost always, so an 8-bit vector holds the common case
//! and a flag bit vector redirects the rest into a full-width overflow table
//! addressed by flag rank.

use std::io::{self, Write};

use crate::bc::{BcStore, RawBc};
use crate::bitvec::{BitVector, BitVectorBuilder};
use crate::intvec::IntVector;
use crate::serial::ImageSource;
use crate::{Error, Result};

const SHORT_WIDTH: u32 = 8;

/// XOR-delta encoded BASE/CHECK arrays.
#[derive(Clone, Debug)]
pub struct PtrBc<'a> {
    used: BitVector<'a>,
    checks: IntVector<'a>,
    deltas: IntVector<'a>,
    overflow_flags: BitVector<'a>,
    overflow: IntVector<'a>,
    parents: IntVector<'a>,
}

impl PtrBc<'_> {
    #[inline]
    fn delta_at(&self, i: u32) -> u32 {
        let pos = self.used.rank(i as usize);
        if self.overflow_flags.get(pos) {
            self.overflow.get(self.overflow_flags.rank(pos)) as u32
        } else {
            self.deltas.get(pos) as u32
        }
    }
}

impl<'a> BcStore<'a> for PtrBc<'a> {
    const FORMAT_TAG: u8 = b'P';

    fn freeze(raw: &RawBc) -> Self {
        let n = raw.num_slots();
        let mut used = BitVectorBuilder::with_len(n);
        let mut checks = Vec::new();
        let mut deltas = Vec::new();
        let mut flags = BitVectorBuilder::new();
        let mut overflow = Vec::new();
        for i in 0..n {
            if !raw.used[i] {
                continue;
            }
            used.set_bit(i, true);
            checks.push(raw.checks[i]);
            let parent_base = if i == 0 {
                0
            } else {
                raw.bases[raw.parents[i] as usize]
            };
            let delta = raw.bases[i] ^ parent_base;
            if delta >> SHORT_WIDTH == 0 {
                deltas.push(delta);
                flags.push_bit(false);
            } else {
                deltas.push(0);
                flags.push_bit(true);
                overflow.push(delta);
            }
        }
        Self {
            used: BitVector::build(used, false),
            checks: IntVector::build(&checks),
            deltas: IntVector::with_width(&deltas, SHORT_WIDTH),
            overflow_flags: BitVector::build(flags, false),
            overflow: IntVector::build(&overflow),
            parents: IntVector::build(&raw.parents),
        }
    }

    fn num_slots(&self) -> u64 {
        self.used.len() as u64
    }

    #[inline]
    fn check_at(&self, i: u32) -> u32 {
        if !self.used.get(i as usize) {
            return 0;
        }
        self.checks.get(self.used.rank(i as usize)) as u32
    }

    #[inline]
    fn base_of_child(&self, i: u32, parent_base: u32) -> u32 {
        self.delta_at(i) ^ parent_base
    }

    fn base_at(&self, i: u32) -> u32 {
        // XOR of the deltas along the path to the root.
        let mut acc = 0;
        let mut j = i;
        loop {
            acc ^= self.delta_at(j);
            if j == 0 {
                return acc;
            }
            j = self.parent_at(j);
        }
    }

    #[inline]
    fn parent_at(&self, i: u32) -> u32 {
        self.parents.get(i as usize) as u32
    }

    #[inline]
    fn is_used(&self, i: u32) -> bool {
        self.used.get(i as usize)
    }

    fn serialized_len(&self) -> u64 {
        self.used.serialized_len()
            + self.checks.serialized_len()
            + self.deltas.serialized_len()
            + self.overflow_flags.serialized_len()
            + self.overflow.serialized_len()
            + self.parents.serialized_len()
    }

    fn write_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.used.write_into(w)?;
        self.checks.write_into(w)?;
        self.deltas.write_into(w)?;
        self.overflow_flags.write_into(w)?;
        self.overflow.write_into(w)?;
        self.parents.write_into(w)
    }

    fn parse_from<S: ImageSource<'a>>(src: &mut S) -> Result<Self> {
        let used = BitVector::parse_from(src)?;
        let checks = IntVector::parse_from(src)?;
        let deltas = IntVector::parse_from(src)?;
        let overflow_flags = BitVector::parse_from(src)?;
        let overflow = IntVector::parse_from(src)?;
        let parents = IntVector::parse_from(src)?;
        let live = used.num_ones();
        if checks.len() != live
            || deltas.len() != live
            || overflow_flags.len() != live
            || overflow.len() != overflow_flags.num_ones()
            || parents.len() != used.len()
        {
            return Err(Error::Corrupt("pointer store sizes"));
        }
        Ok(Self {
            used,
            checks,
            deltas,
            overflow_flags,
            overflow,
            parents,
        })
    }
}
