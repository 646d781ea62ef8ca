//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The deterministic bit stream that generators draw from.
//!
//! [`RandomSource`] buffers a seedable PRNG and hands out bits a few at a
//! time. [`Gen`] is the handle passed to alloc and shrink callbacks; it
//! hides whether bits come from the PRNG directly or from a replayed
//! [bit pool](crate::pool::BitPool) during autoshrinking.

use rand::RngCore;

use crate::pool::BitPool;
use crate::rng::Xoroshiro128Plus;

fn mask(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// A seedable stream of bits, buffered one PRNG word at a time.
pub struct RandomSource {
    rng: Xoroshiro128Plus,
    buf: u64,
    bits_available: u8,
}

impl RandomSource {
    /// Create a source seeded with `seed`.
    pub fn new(seed: u64) -> RandomSource {
        RandomSource {
            rng: Xoroshiro128Plus::new(seed),
            buf: 0,
            bits_available: 0,
        }
    }

    /// Re-seed the stream. This discards any buffered bits: the next draw
    /// after `set_seed(s)` always sees the same bits as the first draw after
    /// constructing with `s`.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng.reseed(seed);
        self.buf = 0;
        self.bits_available = 0;
    }

    /// Get `bit_count` random bits, little-endian, in the low bits of the
    /// result. At most 64 bits can be requested at once.
    ///
    /// # Panics
    ///
    /// Panics if `bit_count > 64`.
    pub fn bits(&mut self, bit_count: u8) -> u64 {
        assert!(bit_count <= 64, "at most 64 bits per request");
        if bit_count == 0 {
            return 0;
        }

        let mut res = 0;
        let mut shift = 0;
        let mut want = bit_count;

        if self.bits_available < want {
            res |= self.buf & mask(self.bits_available);
            shift = self.bits_available;
            want -= self.bits_available;
            self.buf = self.rng.next_u64();
            self.bits_available = 64;
        }

        res |= (self.buf & mask(want)) << shift;
        self.bits_available -= want;
        self.buf = if want == 64 { 0 } else { self.buf >> want };

        res
    }

    pub(crate) fn raw_rng(&mut self) -> &mut Xoroshiro128Plus {
        &mut self.rng
    }
}

/// Handle passed to alloc and shrink callbacks for drawing random bits.
///
/// When autoshrinking is active the handle reads from (and, while
/// generating, appends to) the argument's bit pool; otherwise it reads the
/// PRNG stream directly. Generators should request only as many bits as
/// they need: autoshrinking works on the recorded requests, and smaller
/// values drawn from [`bits`](Gen::bits) must correspond to simpler
/// instances (if the stream returns 0 forever, generation must produce a
/// minimal instance).
pub struct Gen<'a> {
    source: &'a mut RandomSource,
    pool: Option<&'a mut BitPool>,
    oom: bool,
}

impl<'a> Gen<'a> {
    pub(crate) fn new(source: &'a mut RandomSource) -> Gen<'a> {
        Gen {
            source,
            pool: None,
            oom: false,
        }
    }

    pub(crate) fn with_pool(source: &'a mut RandomSource, pool: &'a mut BitPool) -> Gen<'a> {
        Gen {
            source,
            pool: Some(pool),
            oom: false,
        }
    }

    /// Get `bit_count` random bits as a little-endian integer.
    ///
    /// # Panics
    ///
    /// Panics if `bit_count > 64`; use [`bits_bulk`](Gen::bits_bulk) for
    /// larger requests.
    pub fn bits(&mut self, bit_count: u8) -> u64 {
        assert!(bit_count <= 64, "at most 64 bits per request");
        if bit_count == 0 {
            return 0;
        }
        match &mut self.pool {
            Some(pool) => {
                let mut buf = [0u64; 1];
                if pool
                    .draw(self.source.raw_rng(), u32::from(bit_count), true, &mut buf)
                    .is_err()
                {
                    self.oom = true;
                    return 0;
                }
                buf[0]
            }
            None => self.source.bits(bit_count),
        }
    }

    /// Get `bit_count` random bits in bulk. `buf` must hold at least
    /// `bit_count / 64` words, rounded up; it is zeroed before any bits are
    /// copied in, little-endian.
    pub fn bits_bulk(&mut self, bit_count: u32, buf: &mut [u64]) {
        let words = (bit_count as usize + 63) / 64;
        assert!(buf.len() >= words, "bulk buffer too small");
        for w in buf.iter_mut() {
            *w = 0;
        }
        if bit_count == 0 {
            return;
        }
        match &mut self.pool {
            Some(pool) => {
                if pool
                    .draw(self.source.raw_rng(), bit_count, true, buf)
                    .is_err()
                {
                    self.oom = true;
                }
            }
            None => {
                let mut remaining = bit_count;
                for w in buf[..words].iter_mut() {
                    let chunk = remaining.min(64) as u8;
                    *w = self.source.bits(chunk);
                    remaining -= u32::from(chunk);
                }
            }
        }
    }

    /// Get a uniformly distributed value below `ceil`.
    ///
    /// `choice(5)` returns approximately evenly distributed values from
    /// `[0, 5)`. `choice(0)` and `choice(1)` return 0 without consuming
    /// any bits.
    pub fn choice(&mut self, ceil: u64) -> u64 {
        if ceil < 2 {
            return 0;
        }
        let bits = (64 - (ceil - 1).leading_zeros()) as u8;
        loop {
            let draw = self.bits(bits);
            if draw < ceil {
                return draw;
            }
        }
    }

    pub(crate) fn hit_oom(&self) -> bool {
        self.oom
    }
}
