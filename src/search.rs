//! Prefix, predictive and enumerative iterators.
//!
//! Iterators are plain owned values: each carries its traversal state and,
//! for predictive search, a reusable decode buffer. `next()` advances to the
//! following match and returns whether one exists; `id()` and `decoded()`
//! read the current match and are valid until the next advance. Once `next()`
//! has returned `false` the iterator stays exhausted.

use crate::bc::BcStore;
use crate::dict::Dict;

/// Iterator over the stored keys that are prefixes of a query, shortest
/// first. Produced by [`Dict::prefix_search`].
pub struct PrefixIter<'k, 'a, B> {
    dict: &'k Dict<'a, B>,
    key: &'k [u8],
    pos: usize,
    node: u32,
    base: u32,
    id: u64,
    matched: usize,
    done: bool,
}

/// Iterator over the stored keys starting with a prefix, in lexicographic
/// order. Produced by [`Dict::predictive_search`] and [`Dict::enumerate`].
pub struct PredictiveIter<'k, 'a, B> {
    dict: &'k Dict<'a, B>,
    buf: Vec<u8>,
    stack: Vec<Visit>,
    id: u64,
}

/// One pending node of the depth-first walk. `keep` is the buffer length to
/// restore before appending `label` (the edge byte into the node; `None` for
/// the walk's seed node, whose bytes are already in the buffer).
struct Visit {
    node: u32,
    base: u32,
    keep: usize,
    label: Option<u8>,
}

impl<'a, B: BcStore<'a>> Dict<'a, B> {
    /// Iterates over every stored key that is a prefix of `key`, in order of
    /// increasing length.
    pub fn prefix_search<'k>(&'k self, key: &'k [u8]) -> PrefixIter<'k, 'a, B> {
        PrefixIter {
            dict: self,
            key,
            pos: 0,
            node: 0,
            base: self.bc.base_at(0),
            id: 0,
            matched: 0,
            done: false,
        }
    }

    /// Iterates over every stored key starting with `prefix`, in
    /// lexicographic byte order.
    pub fn predictive_search(&self, prefix: &[u8]) -> PredictiveIter<'_, 'a, B> {
        let mut it = PredictiveIter {
            dict: self,
            buf: Vec::with_capacity(self.max_length as usize),
            stack: Vec::new(),
            id: 0,
        };
        let mut node: u32 = 0;
        let mut base = self.bc.base_at(0);
        for (i, &b) in prefix.iter().enumerate() {
            if self.leaves.get(node as usize) {
                // The one key below this node must carry the rest of the
                // prefix inside its tail suffix.
                if self.tail.suffix(base as usize).starts_with(&prefix[i..]) {
                    it.buf.extend_from_slice(&prefix[..i]);
                    it.stack.push(Visit {
                        node,
                        base,
                        keep: i,
                        label: None,
                    });
                }
                return it;
            }
            let code = self.table.code(b);
            if code == 0 {
                return it;
            }
            let child = base ^ code;
            if child as u64 >= self.bc.num_slots() || self.bc.check_at(child) != code {
                return it;
            }
            base = self.bc.base_of_child(child, base);
            node = child;
        }
        it.buf.extend_from_slice(prefix);
        it.stack.push(Visit {
            node,
            base,
            keep: prefix.len(),
            label: None,
        });
        it
    }

    /// Iterates over every stored key in lexicographic byte order.
    pub fn enumerate(&self) -> PredictiveIter<'_, 'a, B> {
        self.predictive_search(&[])
    }
}

impl<'a, B: BcStore<'a>> PrefixIter<'_, 'a, B> {
    /// Advances to the next matching key. Returns `false` once exhausted.
    pub fn next(&mut self) -> bool {
        while !self.done {
            if self.dict.leaves.get(self.node as usize) {
                self.done = true;
                let suffix = self.dict.tail.suffix(self.base as usize);
                if self.key[self.pos..].starts_with(suffix) {
                    self.id = self.dict.terms.rank(self.node as usize) as u64;
                    self.matched = self.pos + suffix.len();
                    return true;
                }
                return false;
            }
            let hit = self.dict.terms.get(self.node as usize);
            if hit {
                self.id = self.dict.terms.rank(self.node as usize) as u64;
                self.matched = self.pos;
            }
            if !self.step() {
                self.done = true;
            }
            if hit {
                return true;
            }
        }
        false
    }

    /// Walks one byte deeper along the query.
    fn step(&mut self) -> bool {
        if self.pos == self.key.len() {
            return false;
        }
        let code = self.dict.table.code(self.key[self.pos]);
        if code == 0 {
            return false;
        }
        let child = self.base ^ code;
        if child as u64 >= self.dict.bc.num_slots() || self.dict.bc.check_at(child) != code {
            return false;
        }
        self.base = self.dict.bc.base_of_child(child, self.base);
        self.node = child;
        self.pos += 1;
        true
    }

    /// Id of the current match. Valid after `next()` returned `true`.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Length of the current match in bytes.
    pub fn matched_len(&self) -> usize {
        self.matched
    }

    /// The current match: the query's first [`matched_len`](Self::matched_len)
    /// bytes. Invalidated by the next advance.
    pub fn decoded(&self) -> &[u8] {
        &self.key[..self.matched]
    }
}

impl<'a, B: BcStore<'a>> PredictiveIter<'_, 'a, B> {
    /// Advances to the next matching key. Returns `false` once exhausted.
    pub fn next(&mut self) -> bool {
        while let Some(visit) = self.stack.pop() {
            self.buf.truncate(visit.keep);
            if let Some(b) = visit.label {
                self.buf.push(b);
            }

            if self.dict.leaves.get(visit.node as usize) {
                self.dict.tail.extend_into(visit.base as usize, &mut self.buf);
                self.id = self.dict.terms.rank(visit.node as usize) as u64;
                return true;
            }

            // Queue the children in reverse byte order so the stack pops
            // them lexicographically.
            let keep = self.buf.len();
            for b in (0u8..=255).rev() {
                let code = self.dict.table.code(b);
                if code == 0 {
                    continue;
                }
                let child = visit.base ^ code;
                if child as u64 >= self.dict.bc.num_slots()
                    || self.dict.bc.check_at(child) != code
                {
                    continue;
                }
                self.stack.push(Visit {
                    node: child,
                    base: self.dict.bc.base_of_child(child, visit.base),
                    keep,
                    label: Some(b),
                });
            }

            if self.dict.terms.get(visit.node as usize) {
                self.id = self.dict.terms.rank(visit.node as usize) as u64;
                return true;
            }
        }
        false
    }

    /// Id of the current match. Valid after `next()` returned `true`.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The current match's full key bytes. Borrowed from the iterator's
    /// buffer and invalidated by the next advance.
    pub fn decoded(&self) -> &[u8] {
        &self.buf
    }
}
