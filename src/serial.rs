//! Little-endian image plumbing shared by every component.
//!
//! A dictionary image is a flat sequence of 64-bit little-endian fields and
//! 8-byte-aligned blobs. Two load paths exist over the same parsing code:
//! [`SliceReader`] copies payloads into owned storage, [`ImageCursor`] hands
//! out zero-copy views into a caller-provided buffer (e.g. a memory map).

#[cfg(not(target_endian = "little"))]
compile_error!("zero-copy image loading requires a little-endian platform");

use std::borrow::Cow;
use std::io::{self, Write};
use std::mem;
use std::slice;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{Error, Result};

/// Magic bytes opening every serialized dictionary image.
pub const MAGIC: [u8; 8] = *b"lexidict";

/// Image format version.
pub const VERSION: u32 = 1;

/// Number of zero bytes needed to pad `len` up to a multiple of 8.
pub(crate) fn padding_for(len: usize) -> usize {
    len.wrapping_neg() % 8
}

/// Writes a `u64` slice as consecutive little-endian words.
pub(crate) fn write_u64s<W: Write>(w: &mut W, words: &[u64]) -> io::Result<()> {
    for &x in words {
        w.write_u64::<LittleEndian>(x)?;
    }
    Ok(())
}

/// Writes a byte blob followed by zero padding up to 8-byte alignment.
pub(crate) fn write_padded<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    const PAD: [u8; 8] = [0; 8];
    w.write_all(bytes)?;
    w.write_all(&PAD[..padding_for(bytes.len())])
}

/// Parsing interface shared by the owned and borrowed load paths.
///
/// Every method advances the source cursor. Blob reads consume the trailing
/// alignment padding, so a well-formed image keeps the cursor 8-byte aligned
/// between fields.
pub trait ImageSource<'a> {
    /// Reads one little-endian `u64`.
    fn u64(&mut self) -> Result<u64>;
    /// Reads one little-endian `u32`.
    fn u32(&mut self) -> Result<u32>;
    /// Reads one little-endian `u16`.
    fn u16(&mut self) -> Result<u16>;
    /// Reads one byte.
    fn byte(&mut self) -> Result<u8>;
    /// Reads `n` words.
    fn u64s(&mut self, n: usize) -> Result<Cow<'a, [u64]>>;
    /// Reads an `n`-byte blob and its alignment padding.
    fn bytes(&mut self, n: usize) -> Result<Cow<'a, [u8]>>;
    /// Bytes consumed so far.
    fn pos(&self) -> usize;
    /// Bytes left in the source.
    fn remaining(&self) -> usize;
}

/// Runs `f` against one length-prefixed section, checking that the declared
/// length fits the source and that `f` consumed exactly that many bytes.
pub(crate) fn section<'a, S, T>(src: &mut S, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T>
where
    S: ImageSource<'a>,
{
    let len = src.u64()? as usize;
    if len % 8 != 0 || len > src.remaining() {
        return Err(Error::Corrupt("section length exceeds image"));
    }
    let start = src.pos();
    let value = f(src)?;
    if src.pos() - start != len {
        return Err(Error::Corrupt("section length mismatch"));
    }
    Ok(value)
}

/// Copying reader over a byte slice. No alignment requirements; every word is
/// assembled with `from_le_bytes`.
pub struct SliceReader<'b> {
    data: &'b [u8],
    pos: usize,
}

impl<'b> SliceReader<'b> {
    /// Wraps `data` for a copying parse.
    pub fn new(data: &'b [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'b [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.data.len())
            .ok_or(Error::Corrupt("truncated image"))?;
        let chunk = &self.data[self.pos..end];
        self.pos = end;
        Ok(chunk)
    }
}

impl<'a> ImageSource<'a> for SliceReader<'_> {
    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8-byte chunk")))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes(b.try_into().expect("4-byte chunk")))
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes(b.try_into().expect("2-byte chunk")))
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u64s(&mut self, n: usize) -> Result<Cow<'a, [u64]>> {
        let raw = self.take(n.checked_mul(8).ok_or(Error::Corrupt("blob length overflow"))?)?;
        let words = raw
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().expect("8-byte chunk")))
            .collect();
        Ok(Cow::Owned(words))
    }

    fn bytes(&mut self, n: usize) -> Result<Cow<'a, [u8]>> {
        let blob = self.take(n)?.to_vec();
        self.take(padding_for(n))?;
        Ok(Cow::Owned(blob))
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Zero-copy cursor over an 8-byte-aligned image. Word blobs are reinterpreted
/// in place, so the backing buffer must outlive the loaded dictionary.
pub struct ImageCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ImageCursor<'a> {
    /// Wraps `data`, rejecting buffers that are not 8-byte aligned.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.as_ptr() as usize % mem::align_of::<u64>() != 0 {
            return Err(Error::Misaligned);
        }
        Ok(Self { data, pos: 0 })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.data.len())
            .ok_or(Error::Corrupt("truncated image"))?;
        let chunk = &self.data[self.pos..end];
        self.pos = end;
        Ok(chunk)
    }
}

impl<'a> ImageSource<'a> for ImageCursor<'a> {
    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8-byte chunk")))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes(b.try_into().expect("4-byte chunk")))
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes(b.try_into().expect("2-byte chunk")))
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u64s(&mut self, n: usize) -> Result<Cow<'a, [u64]>> {
        debug_assert_eq!(self.pos % 8, 0, "word blob read at unaligned offset");
        let raw = self.take(n.checked_mul(8).ok_or(Error::Corrupt("blob length overflow"))?)?;
        if raw.as_ptr() as usize % mem::align_of::<u64>() != 0 {
            return Err(Error::Misaligned);
        }
        // SAFETY: the pointer is 8-byte aligned (checked above), `raw` spans
        // exactly `n * 8` in-bounds bytes, any bit pattern is a valid `u64`,
        // and the returned lifetime is tied to the backing buffer. The crate
        // only compiles on little-endian targets, so the in-memory layout
        // matches the serialized format.
        let words = unsafe { slice::from_raw_parts(raw.as_ptr() as *const u64, n) };
        Ok(Cow::Borrowed(words))
    }

    fn bytes(&mut self, n: usize) -> Result<Cow<'a, [u8]>> {
        let blob = self.take(n)?;
        self.take(padding_for(n))?;
        Ok(Cow::Borrowed(blob))
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}
