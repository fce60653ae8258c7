//! The dictionary façade: construction, lookup, decode, image I/O.

use std::io::{Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::bc::BcStore;
use crate::bc_bytes::DacsBc;
use crate::bc_ptr::PtrBc;
use crate::bitvec::BitVector;
use crate::build;
use crate::codetable::CodeTable;
use crate::serial::{self, ImageCursor, ImageSource, SliceReader};
use crate::tail::Tail;
use crate::{Error, Result};

/// Static compressed string dictionary.
///
/// Maps each of `n` stored keys to a unique id in `[0, n)` and back. Built
/// once from sorted distinct byte strings, then queried read-only; a built
/// dictionary is immutable and freely shared across threads.
///
/// The BASE/CHECK encoding is the type parameter: [`PtrDict`] stores XOR
/// deltas behind a pointer table, [`DacsDict`] stores byte-level
/// direct-access codes. The lifetime is `'static` for owned dictionaries and
/// bounded by the image buffer for [`from_image`](Dict::from_image) loads.
pub struct Dict<'a, B> {
    pub(crate) bc: B,
    pub(crate) terms: BitVector<'a>,
    pub(crate) leaves: BitVector<'a>,
    pub(crate) tail: Tail<'a>,
    pub(crate) table: CodeTable,
    pub(crate) num_keys: u64,
    pub(crate) max_length: u64,
    pub(crate) bin_mode: bool,
}

/// Dictionary over the pointer-format BC store.
pub type PtrDict<'a> = Dict<'a, PtrBc<'a>>;

/// Dictionary over the DACs-format BC store.
pub type DacsDict<'a> = Dict<'a, DacsBc<'a>>;

impl<'a, B: BcStore<'a>> Dict<'a, B> {
    /// Builds a dictionary from sorted, distinct keys.
    ///
    /// `bin_mode` forces the binary-safe tail encoding; it is enabled
    /// automatically when any key contains a zero byte.
    ///
    /// # Errors
    ///
    /// [`Error::NotSorted`] if the keys are not strictly increasing,
    /// [`Error::TooLarge`] if the trie outgrows the 31-bit slot space.
    pub fn build<K: AsRef<[u8]>>(keys: &[K], bin_mode: bool) -> Result<Self> {
        let key_slices: Vec<&[u8]> = keys.iter().map(|k| k.as_ref()).collect();
        for (i, w) in key_slices.windows(2).enumerate() {
            if w[0] >= w[1] {
                return Err(Error::NotSorted(i + 1));
            }
        }

        let (table, max_length, has_zero) = CodeTable::build(&key_slices);
        let bin_mode = bin_mode || has_zero;
        let out = build::build_trie(&key_slices, &table, bin_mode)?;

        Ok(Self {
            bc: B::freeze(&out.raw),
            terms: BitVector::build(out.terms, true),
            leaves: BitVector::build(out.leaves, false),
            tail: out.tail,
            table,
            num_keys: key_slices.len() as u64,
            max_length,
            bin_mode,
        })
    }

    /// Number of stored keys.
    pub fn num_keys(&self) -> u64 {
        self.num_keys
    }

    /// Length of the longest stored key.
    pub fn max_length(&self) -> u64 {
        self.max_length
    }

    /// Number of distinct byte values across the stored keys.
    pub fn alphabet_size(&self) -> u64 {
        self.table.alphabet_size()
    }

    /// Whether the binary-safe tail encoding is active.
    pub fn bin_mode(&self) -> bool {
        self.bin_mode
    }

    /// Size of the serialized image in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.image_len() as usize
    }

    /// Looks up `key`, returning its id if stored.
    pub fn lookup(&self, key: impl AsRef<[u8]>) -> Option<u64> {
        let key = key.as_ref();
        let mut node: u32 = 0;
        let mut base = self.bc.base_at(0);
        for (pos, &b) in key.iter().enumerate() {
            if self.leaves.get(node as usize) {
                return self.tail_match(node, base, &key[pos..]);
            }
            let code = self.table.code(b);
            if code == 0 {
                return None;
            }
            let child = base ^ code;
            if child as u64 >= self.bc.num_slots() || self.bc.check_at(child) != code {
                return None;
            }
            base = self.bc.base_of_child(child, base);
            node = child;
        }
        if self.leaves.get(node as usize) {
            return self.tail_match(node, base, &[]);
        }
        if self.terms.get(node as usize) {
            Some(self.terms.rank(node as usize) as u64)
        } else {
            None
        }
    }

    fn tail_match(&self, node: u32, offset: u32, rest: &[u8]) -> Option<u64> {
        if self.tail.suffix(offset as usize) == rest {
            Some(self.terms.rank(node as usize) as u64)
        } else {
            None
        }
    }

    /// Reconstructs the key with the given id.
    ///
    /// `id` must be below [`num_keys`](Self::num_keys); passing a larger id
    /// is a caller bug (checked in debug builds).
    pub fn decode(&self, id: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.max_length as usize);
        self.decode_into(id, &mut out);
        out
    }

    /// [`decode`](Self::decode) into a caller-provided buffer.
    pub fn decode_into(&self, id: u64, out: &mut Vec<u8>) {
        out.clear();
        debug_assert!(id < self.num_keys, "id out of range");
        if id >= self.num_keys {
            return;
        }
        let leaf = self.terms.select(id as usize) as u32;
        let tail_offset = self
            .leaves
            .get(leaf as usize)
            .then(|| self.bc.base_at(leaf));

        let mut node = leaf;
        while node != 0 {
            out.push(self.table.byte(self.bc.check_at(node)));
            node = self.bc.parent_at(node);
        }
        out.reverse();
        if let Some(offset) = tail_offset {
            self.tail.extend_into(offset as usize, out);
        }
    }

    /// Serializes the dictionary, returning the number of bytes written.
    pub fn serialize_into<W: Write>(&self, mut w: W) -> Result<u64> {
        w.write_all(&serial::MAGIC)?;
        w.write_u32::<LittleEndian>(serial::VERSION)?;
        w.write_u8(B::FORMAT_TAG)?;
        w.write_u8(self.bin_mode as u8)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_u64::<LittleEndian>(self.num_keys)?;
        w.write_u64::<LittleEndian>(self.max_length)?;
        w.write_u64::<LittleEndian>(self.table.alphabet_size())?;

        w.write_u64::<LittleEndian>(self.table.serialized_len())?;
        self.table.write_into(&mut w)?;
        w.write_u64::<LittleEndian>(self.bc.serialized_len())?;
        self.bc.write_into(&mut w)?;
        w.write_u64::<LittleEndian>(self.terms.serialized_len())?;
        self.terms.write_into(&mut w)?;
        w.write_u64::<LittleEndian>(self.leaves.serialized_len())?;
        self.leaves.write_into(&mut w)?;

        w.write_u64::<LittleEndian>(self.tail_section_len())?;
        w.write_u64::<LittleEndian>(self.tail.bytes.len() as u64)?;
        serial::write_padded(&mut w, &self.tail.bytes)?;
        if let Some(marker) = &self.tail.marker {
            w.write_u64::<LittleEndian>(marker.serialized_len())?;
            marker.write_into(&mut w)?;
        }

        Ok(self.image_len())
    }

    /// Loads an owned dictionary, copying out of `bytes`.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Self::parse(&mut SliceReader::new(bytes))
    }

    /// Loads an owned dictionary from a reader.
    pub fn deserialize_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::deserialize(&bytes)
    }

    /// Loads a dictionary whose arrays borrow from `image` in place.
    ///
    /// `image` must be 8-byte aligned (a page-aligned memory map always is)
    /// and must outlive the dictionary.
    pub fn from_image(image: &'a [u8]) -> Result<Self> {
        Self::parse(&mut ImageCursor::new(image)?)
    }

    fn parse<S: ImageSource<'a>>(src: &mut S) -> Result<Self> {
        let magic = src.bytes(8)?;
        if *magic != serial::MAGIC {
            return Err(Error::Corrupt("bad magic"));
        }
        if src.u32()? != serial::VERSION {
            return Err(Error::Corrupt("unsupported version"));
        }
        if src.byte()? != B::FORMAT_TAG {
            return Err(Error::Corrupt("format tag mismatch"));
        }
        let bin_mode = match src.byte()? {
            0 => false,
            1 => true,
            _ => return Err(Error::Corrupt("binary mode flag")),
        };
        src.u16()?;
        let num_keys = src.u64()?;
        let max_length = src.u64()?;
        let sigma = src.u64()?;

        let table = serial::section(src, |s| CodeTable::parse_from(s, sigma))?;
        let bc = serial::section(src, B::parse_from)?;
        let terms = serial::section(src, BitVector::parse_from)?;
        let leaves = serial::section(src, BitVector::parse_from)?;
        let tail_bytes = serial::section(src, |s| {
            let n = s.u64()? as usize;
            s.bytes(n)
        })?;
        let marker = if bin_mode {
            Some(serial::section(src, BitVector::parse_from)?)
        } else {
            None
        };

        if terms.num_ones() as u64 != num_keys
            || terms.len() as u64 != bc.num_slots()
            || leaves.len() != terms.len()
        {
            return Err(Error::Corrupt("dictionary sizes"));
        }
        if let Some(m) = &marker {
            if m.len() != tail_bytes.len() {
                return Err(Error::Corrupt("tail marker length"));
            }
        }

        Ok(Self {
            bc,
            terms,
            leaves,
            tail: Tail {
                bytes: tail_bytes,
                marker,
            },
            table,
            num_keys,
            max_length,
            bin_mode,
        })
    }

    fn tail_section_len(&self) -> u64 {
        8 + (self.tail.bytes.len() + serial::padding_for(self.tail.bytes.len())) as u64
    }

    fn image_len(&self) -> u64 {
        let mut total = 40;
        total += 8 + self.table.serialized_len();
        total += 8 + self.bc.serialized_len();
        total += 8 + self.terms.serialized_len();
        total += 8 + self.leaves.serialized_len();
        total += 8 + self.tail_section_len();
        if let Some(marker) = &self.tail.marker {
            total += 8 + marker.serialized_len();
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise<B: BcStore<'static>>(keys: &[&[u8]]) {
        let dict = Dict::<B>::build(keys, false).unwrap();
        assert_eq!(dict.num_keys(), keys.len() as u64);
        let mut seen = std::collections::HashSet::new();
        for &key in keys {
            let id = dict.lookup(key).unwrap_or_else(|| {
                panic!("key {:?} not found", String::from_utf8_lossy(key))
            });
            assert!(id < keys.len() as u64);
            assert!(seen.insert(id), "duplicate id {id}");
            assert_eq!(dict.decode(id), key);
        }
    }

    fn exercise_both(keys: &[&[u8]]) {
        exercise::<PtrBc<'static>>(keys);
        exercise::<DacsBc<'static>>(keys);
    }

    #[test]
    fn small_sets() {
        exercise_both(&[b"a"]);
        exercise_both(&[b"a", b"b"]);
        exercise_both(&[b"a", b"ab", b"abc", b"b", b"bc", b"bcd"]);
        exercise_both(&[b"deal", b"idea", b"ideal", b"ideas", b"ideology"]);
    }

    #[test]
    fn empty_dictionary() {
        let keys: Vec<&[u8]> = Vec::new();
        let dict = PtrDict::build(&keys, false).unwrap();
        assert_eq!(dict.num_keys(), 0);
        assert_eq!(dict.max_length(), 0);
        assert_eq!(dict.lookup(b"anything"), None);
        assert_eq!(dict.lookup(b""), None);
    }

    #[test]
    fn empty_key_is_storable() {
        let keys: Vec<&[u8]> = vec![b"", b"a"];
        let dict = PtrDict::build(&keys, false).unwrap();
        let id = dict.lookup(b"").unwrap();
        assert_eq!(dict.decode(id), b"");
    }

    #[test]
    fn absent_keys() {
        let keys: Vec<&[u8]> = vec![b"Mac", b"MacBook", b"iMac"];
        let dict = DacsDict::build(&keys, false).unwrap();
        for missing in [&b"Ma"[..], b"MacB", b"MacBookPro", b"iPad", b"", b"zzz"] {
            assert_eq!(dict.lookup(missing), None, "{missing:?}");
        }
    }

    #[test]
    fn unsorted_keys_rejected() {
        let keys: Vec<&[u8]> = vec![b"b", b"a"];
        assert!(matches!(
            PtrDict::build(&keys, false),
            Err(Error::NotSorted(1))
        ));
        let dup: Vec<&[u8]> = vec![b"a", b"a"];
        assert!(matches!(PtrDict::build(&dup, false), Err(Error::NotSorted(1))));
    }

    #[test]
    fn binary_mode_auto_detection() {
        let keys: Vec<&[u8]> = vec![b"a\x00b", b"a\x00c"];
        let dict = PtrDict::build(&keys, false).unwrap();
        assert!(dict.bin_mode());
        for &key in &keys {
            let id = dict.lookup(key).unwrap();
            assert_eq!(dict.decode(id), key);
        }
    }

    #[test]
    fn binary_mode_forced() {
        let keys: Vec<&[u8]> = vec![b"plain"];
        let dict = PtrDict::build(&keys, true).unwrap();
        assert!(dict.bin_mode());
        assert!(dict.lookup(b"plain").is_some());
    }

    #[test]
    fn serialize_round_trip_owned() {
        let keys: Vec<&[u8]> = vec![b"deal", b"idea", b"ideal", b"ideas", b"tea", b"trie"];
        let dict = PtrDict::build(&keys, false).unwrap();

        let mut buf = Vec::new();
        let written = dict.serialize_into(&mut buf).unwrap();
        assert_eq!(written as usize, buf.len());
        assert_eq!(dict.memory_bytes(), buf.len());

        let loaded = PtrDict::deserialize(&buf).unwrap();
        assert_eq!(loaded.num_keys(), dict.num_keys());
        assert_eq!(loaded.alphabet_size(), dict.alphabet_size());
        for &key in &keys {
            assert_eq!(loaded.lookup(key), dict.lookup(key));
        }
    }

    #[test]
    fn wrong_format_tag_rejected() {
        let keys: Vec<&[u8]> = vec![b"one", b"two"];
        let dict = PtrDict::build(&keys, false).unwrap();
        let mut buf = Vec::new();
        dict.serialize_into(&mut buf).unwrap();
        assert!(matches!(
            DacsDict::deserialize(&buf),
            Err(Error::Corrupt("format tag mismatch"))
        ));
    }

    #[test]
    fn corrupt_images_rejected() {
        let keys: Vec<&[u8]> = vec![b"one", b"two"];
        let dict = PtrDict::build(&keys, false).unwrap();
        let mut buf = Vec::new();
        dict.serialize_into(&mut buf).unwrap();

        assert!(PtrDict::deserialize(&buf[..10]).is_err());

        let mut bad_magic = buf.clone();
        bad_magic[0] ^= 0xFF;
        assert!(matches!(
            PtrDict::deserialize(&bad_magic),
            Err(Error::Corrupt("bad magic"))
        ));

        let mut bad_version = buf.clone();
        bad_version[8] = 99;
        assert!(matches!(
            PtrDict::deserialize(&bad_version),
            Err(Error::Corrupt("unsupported version"))
        ));

        let mut truncated = buf.clone();
        truncated.truncate(buf.len() - 8);
        assert!(PtrDict::deserialize(&truncated).is_err());
    }

    #[test]
    fn dictionaries_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PtrDict<'static>>();
        assert_send_sync::<DacsDict<'static>>();
    }
}
