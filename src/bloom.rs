//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A dynamic blocked bloom filter, used to avoid re-running trials whose
//! argument tuple has probably already been tested.
//!
//! Loosely based on _Cache Efficient Bloom Filters for Shared Memory
//! Machines_ by Tim Kaler.
//!
//! The low `top_block2` bits of a key's hash choose one of `1 << top_block2`
//! blocks, allocated lazily. A block is a chain of sub-filters; each
//! sub-filter checks HASH_COUNT chunks of `size2` further hash bits. Marking
//! touches only the head (largest) filter of the chain. If a mark sets no
//! new bit the head is saturating, so a filter of double the size is
//! prepended; older filters remain readable, and each generation has a
//! different geometry, so a chain converges to a low false-positive rate
//! even when its early filters fill up.

use bit_vec::BitVec;

use crate::hash::hash_onepass;

/// Default number of bits used to choose a block.
const DEF_TOP_BLOCK_BITS: u8 = 9;

/// Default log2 of the bit count of a block's first filter.
const DEF_MIN_FILTER_BITS: u8 = 9;

/// How many chunks of the hash each sub-filter checks.
const HASH_COUNT: u8 = 4;

struct SubFilter {
    /// log2 of the bit count.
    size2: u8,
    bits: BitVec,
    next: Option<Box<SubFilter>>,
}

impl SubFilter {
    fn new(size2: u8) -> SubFilter {
        SubFilter {
            size2,
            bits: BitVec::from_elem(1 << size2, false),
            next: None,
        }
    }

    /// Bit positions probed for `hash` (the hash already shifted past the
    /// block index bits).
    fn probes(&self, hash: u64) -> impl Iterator<Item = usize> + '_ {
        let block_mask = (1u64 << self.size2) - 1;
        (0..HASH_COUNT).map(move |i| ((hash >> (i * self.size2)) & block_mask) as usize)
    }
}

pub(crate) struct Bloom {
    top_block2: u8,
    min_filter2: u8,
    blocks: Vec<Option<Box<SubFilter>>>,
}

impl Bloom {
    pub(crate) fn new() -> Bloom {
        Bloom::with_geometry(DEF_TOP_BLOCK_BITS, DEF_MIN_FILTER_BITS)
    }

    pub(crate) fn with_geometry(top_block2: u8, min_filter2: u8) -> Bloom {
        let mut blocks = Vec::new();
        blocks.resize_with(1 << top_block2, || None);
        Bloom {
            top_block2,
            min_filter2,
            blocks,
        }
    }

    /// Hash `data` and mark it present.
    pub(crate) fn mark(&mut self, data: &[u8]) {
        let hash = hash_onepass(data);
        let block_id = (hash & ((1u64 << self.top_block2) - 1)) as usize;
        let hash = hash >> self.top_block2;

        let head = &mut self.blocks[block_id];
        if head.is_none() {
            *head = Some(Box::new(SubFilter::new(self.min_filter2)));
        }
        let bf = head.as_mut().expect("block head just ensured");

        // Only mark in the front filter.
        let mut any_set = false;
        for v in bf.probes(hash).collect::<Vec<_>>() {
            if !bf.bits.get(v).unwrap_or(false) {
                any_set = true;
            }
            bf.bits.set(v, true);
        }

        // All bits already set: the head is saturating. Prepend a filter
        // with twice the bits; the old head still matches on checks.
        if !any_set {
            if u32::from(self.top_block2) + u32::from(HASH_COUNT) * u32::from(bf.size2 + 1) > 64 {
                // Not enough hash bits left to index a larger filter.
                eprintln!(
                    "shrinkray: warning: bloom filter block {} cannot grow further",
                    block_id
                );
            } else {
                let mut nbf = Box::new(SubFilter::new(bf.size2 + 1));
                nbf.next = head.take();
                *head = Some(nbf);
            }
        }
    }

    /// Check whether `data` has probably been marked. False positives are
    /// possible; false negatives are not.
    pub(crate) fn check(&self, data: &[u8]) -> bool {
        let hash = hash_onepass(data);
        let block_id = (hash & ((1u64 << self.top_block2) - 1)) as usize;
        let hash = hash >> self.top_block2;

        let mut cur = self.blocks[block_id].as_deref();
        while let Some(bf) = cur {
            if bf.probes(hash).all(|v| bf.bits.get(v).unwrap_or(false)) {
                return true;
            }
            cur = bf.next.as_deref();
        }
        false
    }

    #[cfg(test)]
    fn chain_len(&self, data: &[u8]) -> usize {
        let hash = hash_onepass(data);
        let block_id = (hash & ((1u64 << self.top_block2) - 1)) as usize;
        let mut len = 0;
        let mut cur = self.blocks[block_id].as_deref();
        while let Some(bf) = cur {
            len += 1;
            cur = bf.next.as_deref();
        }
        len
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let mut b = Bloom::new();
        let keys: Vec<Vec<u8>> = (0u32..500).map(|i| i.to_le_bytes().to_vec()).collect();
        for k in &keys {
            b.mark(k);
            assert!(b.check(k));
        }
        // Still all present after everything was marked.
        for k in &keys {
            assert!(b.check(k));
        }
    }

    #[test]
    fn unmarked_keys_mostly_absent() {
        let mut b = Bloom::new();
        for i in 0u32..100 {
            b.mark(&i.to_le_bytes());
        }
        let false_positives = (1000u32..2000)
            .filter(|i| b.check(&i.to_le_bytes()))
            .count();
        assert!(false_positives < 50, "{} false positives", false_positives);
    }

    #[test]
    fn remark_is_idempotent_apart_from_growth() {
        let mut b = Bloom::new();
        b.mark(b"hello");
        assert!(b.check(b"hello"));
        // A second mark finds every bit set and grows the chain.
        let before = b.chain_len(b"hello");
        b.mark(b"hello");
        assert!(b.check(b"hello"));
        assert_eq!(b.chain_len(b"hello"), before + 1);
    }

    #[test]
    fn saturated_chain_keeps_old_filters_readable() {
        // Tiny geometry so saturation happens fast.
        let mut b = Bloom::with_geometry(1, 2);
        for i in 0u32..64 {
            b.mark(&i.to_le_bytes());
        }
        for i in 0u32..64 {
            assert!(b.check(&i.to_le_bytes()));
        }
    }

    #[test]
    fn growth_stops_at_the_hash_bit_budget() {
        let mut b = Bloom::with_geometry(9, 13);
        // Growing to size2 = 14 would need 9 + 4 * 14 = 65 hash bits: a
        // saturated head must stay put instead.
        b.mark(b"stuck");
        let before = b.chain_len(b"stuck");
        for _ in 0..4 {
            b.mark(b"stuck");
        }
        assert_eq!(b.chain_len(b"stuck"), before);
        assert!(b.check(b"stuck"));
    }
}
