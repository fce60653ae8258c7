//! A static compressed string dictionary.
//!
//! This crate maps a sorted set of distinct byte strings to dense integer
//! ids and back, through a double-array trie whose child slots are placed
//! with XOR offsets. Unary paths are collapsed into an out-of-band tail
//! store, terminal and leaf nodes are tracked by rank/select bit vectors,
//! and the BASE/CHECK arrays are kept in one of two compressed encodings
//! chosen at compile time. A dictionary serializes to a single contiguous
//! little-endian image that loads either into owned memory or zero-copy
//! from a memory-mapped buffer.
//!
//! # Quick start
//!
//! ```
//! use lexime_dict::PtrDict;
//!
//! // Input keys must be sorted and distinct.
//! let keys: Vec<&[u8]> = vec![b"Mac", b"MacBook", b"MacBook_Air", b"iMac"];
//! let dict = PtrDict::build(&keys, false)?;
//! assert_eq!(dict.num_keys(), 4);
//!
//! // Forward lookup and reverse decoding are a bijection.
//! let id = dict.lookup(b"MacBook").unwrap();
//! assert_eq!(dict.decode(id), b"MacBook");
//! assert_eq!(dict.lookup(b"MacBook_Pro"), None);
//!
//! // Enumeration reports every key in lexicographic order.
//! let mut it = dict.enumerate();
//! let mut found = Vec::new();
//! while it.next() {
//!     found.push(it.decoded().to_vec());
//! }
//! assert_eq!(found.len(), 4);
//! assert_eq!(found[0], b"Mac");
//! # Ok::<(), lexime_dict::Error>(())
//! ```

#![warn(missing_docs)]

mod bc;
mod bc_bytes;
mod bc_ptr;
mod bitvec;
mod build;
mod codetable;
mod dict;
mod intvec;
mod search;
pub mod serial;
mod tail;

pub use bc::{BcStore, RawBc};
pub use bc_bytes::DacsBc;
pub use bc_ptr::PtrBc;
pub use dict::{DacsDict, Dict, PtrDict};
pub use search::{PredictiveIter, PrefixIter};

use thiserror::Error;

/// Errors raised by construction and image loading. Read operations on a
/// built dictionary do not fail; lookup misses are `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// The input keys are not strictly increasing at the given index.
    #[error("keys are not sorted and distinct at index {0}")]
    NotSorted(usize),

    /// The trie outgrew the 31-bit slot id space.
    #[error("trie exceeds the 31-bit slot space")]
    TooLarge,

    /// The serialized image fails a structural check.
    #[error("corrupt image: {0}")]
    Corrupt(&'static str),

    /// A zero-copy load was attempted on an unaligned buffer.
    #[error("image buffer is not 8-byte aligned")]
    Misaligned,

    /// An I/O error during serialization or an owned load.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, Error>;
