//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shrinking by mutating the recorded bit pool and replaying generation.
//!
//! One tactic clones the failing instance's pool and either *drops* whole
//! requests from it or applies a handful of weighted bit-level mutations,
//! trims trailing zero bytes, then replays the type's alloc callback against
//! the frozen result. As long as the generator obeys the monotonicity
//! contract, the replayed instance is simpler than the original.

use std::any::Any;
use std::io::{self, Write};

use crate::pool::BitPool;
use crate::random::{Gen, RandomSource};
use crate::types::{AllocError, AutoshrinkConfig, PrintMode, ShrinkError, TypeInfo};

pub(crate) mod model;

use model::{Action, Model, Mutation};

/// Initial size of a request log.
const DEF_REQUESTS_CEIL: usize = 16;

/// Every request survives a drop pass with odds of (1 + threshold) in
/// 2^DROP_BITS, except one mandatory victim.
const DEF_DROP_THRESHOLD: u64 = 0;
const DEF_DROP_BITS: u8 = 5;

/// 32-bit draw disabling the mandatory drop. Test scaffolding: it keeps the
/// drop pass fully under the fake PRNG's control.
pub(crate) const DO_NOT_DROP: u64 = 0xFFFF_FFFF;

/// Why generation failed, as seen by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AllocFailure {
    Skip,
    Fail,
    Memory,
}

impl From<AllocError> for AllocFailure {
    fn from(e: AllocError) -> AllocFailure {
        match e {
            AllocError::Skip => AllocFailure::Skip,
            AllocError::Fail => AllocFailure::Fail,
        }
    }
}

/// Per-argument autoshrink state for one trial: the argument's bit pool
/// plus the adaptive action model.
pub(crate) struct AutoshrinkEnv {
    pool_size: usize,
    pool_limit: usize,
    print_mode: PrintMode,
    max_failed_shrinks: u32,
    drop_threshold: u64,
    drop_bits: u8,
    pub(crate) model: Model,
    pub(crate) pool: Option<BitPool>,
    /// Keep trailing zero bytes instead of truncating. Test scaffolding.
    pub(crate) leave_trailing_zeroes: bool,
    /// Overrides the PRNG during shrinking. Test scaffolding.
    pub(crate) fake_prng: Option<Box<dyn FnMut(u8) -> u64>>,
}

impl AutoshrinkEnv {
    pub(crate) fn new(config: &AutoshrinkConfig) -> AutoshrinkEnv {
        AutoshrinkEnv {
            pool_size: config.pool_size,
            pool_limit: config.pool_limit,
            print_mode: config.print_mode,
            max_failed_shrinks: config.max_failed_shrinks,
            drop_threshold: DEF_DROP_THRESHOLD,
            drop_bits: DEF_DROP_BITS,
            model: Model::new(),
            pool: None,
            leave_trailing_zeroes: false,
            fake_prng: None,
        }
    }
}

/// Generate an instance into a fresh bit pool, recording every request.
/// The pool is stored in the env alongside the instance for later replay.
pub(crate) fn alloc(
    env: &mut AutoshrinkEnv,
    source: &mut RandomSource,
    info: &TypeInfo,
) -> Result<Box<dyn Any>, AllocFailure> {
    let mut pool = BitPool::new(env.pool_size, env.pool_limit, DEF_REQUESTS_CEIL);
    let res = {
        let mut gen = Gen::with_pool(source, &mut pool);
        let res = (info.alloc)(&mut gen);
        if gen.hit_oom() {
            Err(AllocFailure::Memory)
        } else {
            res.map_err(AllocFailure::from)
        }
    };
    env.pool = Some(pool);
    res
}

/// Attempt one shrink tactic: build a smaller candidate pool and replay
/// generation against it. On success the candidate instance and pool are
/// returned; the env keeps the original pool until the caller commits.
pub(crate) fn shrink(
    env: &mut AutoshrinkEnv,
    source: &mut RandomSource,
    info: &TypeInfo,
    tactic: u32,
) -> Result<(Box<dyn Any>, BitPool), ShrinkError> {
    if tactic >= env.max_failed_shrinks {
        return Err(ShrinkError::NoMoreTactics);
    }

    let mut orig = match env.pool.take() {
        Some(pool) => pool,
        None => return Err(ShrinkError::Fail),
    };
    orig.build_index();
    debug_assert_eq!(
        orig.requests.iter().map(|&r| r as usize).sum::<usize>(),
        orig.consumed
    );

    let mut copy = BitPool::new(
        orig.bits_filled,
        orig.limit,
        orig.requests.len().max(DEF_REQUESTS_CEIL),
    );
    copy.generation = orig.generation + 1;

    env.model.start_tactic();

    {
        let model = &mut env.model;
        let drop_threshold = env.drop_threshold;
        let drop_bits = env.drop_bits;
        let mut draw: Box<dyn FnMut(u8) -> u64 + '_> = match &mut env.fake_prng {
            Some(fake) => Box::new(move |bits| fake(bits)),
            None => Box::new(|bits| source.bits(bits)),
        };

        if model.should_drop(&mut *draw, orig.requests.len()) {
            model.cur_set |= Action::DROP;
            drop_from_pool(&mut *draw, drop_threshold, drop_bits, &orig, &mut copy);
        } else {
            mutate_pool(&mut *draw, model, &orig, &mut copy);
        }
    }

    if !env.leave_trailing_zeroes {
        copy.truncate_trailing_zero_bytes();
    }

    copy.shrinking = true;
    let res = {
        let mut gen = Gen::with_pool(source, &mut copy);
        (info.alloc)(&mut gen)
    };
    env.pool = Some(orig);

    match res {
        Ok(instance) => Ok((instance, copy)),
        Err(AllocError::Skip) => Err(ShrinkError::DeadEnd),
        Err(AllocError::Fail) => Err(ShrinkError::Fail),
    }
}

/// Adapt the argument's action weights after a shrink trial.
pub(crate) fn update_model(env: &mut AutoshrinkEnv, result: crate::types::TrialRes, adjustment: u8) {
    env.model.update(result, adjustment);
}

/// Hash an autoshrink argument: with the user's hash callback when there is
/// one, by the consumed prefix of the bit pool otherwise. The pool fallback
/// is what makes bloom deduplication work for arbitrary autoshrink types.
pub(crate) fn hash(env: &AutoshrinkEnv, instance: &dyn Any, info: &TypeInfo) -> u64 {
    match &info.hash {
        Some(h) => h(instance),
        None => env.pool.as_ref().map_or(0, |p| p.hash_consumed()),
    }
}

/// Print an autoshrink argument: the user's print callback when there is
/// one, and the pool itself per the configured print mode.
pub(crate) fn print(
    out: &mut dyn Write,
    env: &AutoshrinkEnv,
    instance: &dyn Any,
    info: &TypeInfo,
) -> io::Result<()> {
    let mut mode = env.print_mode;
    if mode.is_empty() {
        mode = if info.print.is_some() {
            PrintMode::USER
        } else {
            PrintMode::REQUESTS
        };
    }
    if let Some(p) = &info.print {
        p(out, instance)?;
    }
    if let Some(pool) = &env.pool {
        dump_bit_pool(out, pool.consumed, pool, mode)?;
    }
    Ok(())
}

/// Dump a bit pool's raw bytes and/or per-request values.
pub(crate) fn dump_bit_pool(
    f: &mut dyn Write,
    bit_count: usize,
    pool: &BitPool,
    mode: PrintMode,
) -> io::Result<()> {
    writeln!(
        f,
        "\n-- autoshrink [generation: {}, requests: {} -- {}/{} bits consumed]",
        pool.generation,
        pool.requests.len(),
        pool.consumed,
        if pool.limit == usize::MAX {
            pool.bits_filled
        } else {
            pool.limit
        }
    )?;

    if mode.contains(PrintMode::BIT_POOL) {
        write!(f, "raw:  ")?;
        let byte_count = bit_count / 8;
        for i in 0..byte_count {
            write!(f, "{:02x} ", pool.read_at(8 * i, 8) as u8)?;
            if (i & 0x0f) == 0x0f {
                write!(f, "\n      ")?;
            } else if (i & 0x03) == 0x03 {
                write!(f, " ")?;
            }
        }
        let rem = bit_count % 8;
        if rem != 0 {
            write!(f, "{:02x}/{}", pool.read_at(8 * byte_count, rem as u8), rem)?;
        }
        writeln!(f)?;
    }

    if mode.contains(PrintMode::REQUESTS) {
        writeln!(f, "requests: ({})", pool.requests.len())?;
        let mut offset = 0;
        for (i, &req) in pool.requests.iter().enumerate() {
            let req_size = (req as usize).min(pool.bits_filled.saturating_sub(offset));
            if req_size <= 64 {
                let bits = pool.read_at(offset, req_size as u8);
                writeln!(f, "{} -- {} bits: {} ({:#x})", i, req_size, bits, bits)?;
            } else {
                write!(f, "{} -- {} bits: [ ", i, req_size)?;
                for bi in 0..req_size / 8 {
                    write!(f, "{:02x} ", pool.read_at(offset + 8 * bi, 8) as u8)?;
                }
                let rem = req_size % 8;
                if rem > 0 {
                    write!(
                        f,
                        "{:02x}/{} ",
                        pool.read_at(offset + (req_size / 8) * 8, rem as u8),
                        rem
                    )?;
                }
                writeln!(f, "]")?;
            }
            offset += req_size;
        }
    }
    Ok(())
}

/// Copy the original pool into the candidate, dropping a mandatory victim
/// request plus any request whose draw comes in at or under the drop
/// threshold. Requests wider than 64 bits lose a random sub-window instead
/// of the whole request. Surviving bits are compacted.
fn drop_from_pool(
    draw: &mut dyn FnMut(u8) -> u64,
    drop_threshold: u64,
    drop_bits: u8,
    orig: &BitPool,
    copy: &mut BitPool,
) {
    let request_count = orig.requests.len();

    let to_drop = draw(32);
    let forced = if to_drop != DO_NOT_DROP && request_count > 0 {
        Some((to_drop % request_count as u64) as usize)
    } else {
        None
    };

    let mut src_offset = 0;
    let mut dst_offset = 0;
    for (ri, &req) in orig.requests.iter().enumerate() {
        let req_size = req as usize;
        if Some(ri) == forced || draw(drop_bits) <= drop_threshold {
            if req_size > 64 {
                // Too big to drop outright: drop a random sub-window.
                let drop_offset = (draw(32) % req_size as u64) as usize;
                let drop_size = (draw(32) % req_size as u64) as usize;
                for bi in 0..req_size {
                    if bi < drop_offset || bi > drop_offset + drop_size {
                        let bit = orig.read_at(src_offset + bi, 1);
                        copy.write_at(dst_offset, 1, bit);
                        dst_offset += 1;
                    }
                }
            }
            src_offset += req_size;
        } else {
            copy_bits(orig, src_offset, copy, dst_offset, req_size);
            src_offset += req_size;
            dst_offset += req_size;
        }
    }
    copy.bits_filled = dst_offset;
}

/// Copy the original bits and apply a small budget of weighted mutations,
/// then tighten the candidate's limit to half the unconsumed tail.
fn mutate_pool(
    draw: &mut dyn FnMut(u8) -> u64,
    model: &mut Model,
    orig: &BitPool,
    copy: &mut BitPool,
) {
    copy.copy_filled_from(orig);

    let request_count = orig.requests.len();
    let mut max_changes: u8 = 5;
    while (1u64 << max_changes) < request_count as u64 {
        max_changes += 1;
    }

    let mut change_count = draw(max_changes).count_ones() + 1;

    // When there are only a few small requests, several changes at once
    // tend to overshoot near a local minimum.
    if change_count as usize > request_count && orig.requests.iter().all(|&r| r <= 64) {
        change_count = request_count as u32;
    }

    let mut changed = 0;
    for _ in 0..10 * change_count {
        if choose_and_mutate_request(draw, model, orig, copy) {
            changed += 1;
            if changed == change_count {
                break;
            }
        }
    }

    let nsize = orig.consumed + orig.bits_filled.saturating_sub(orig.consumed) / 2;
    copy.limit = copy.limit.min(nsize);
}

fn choose_and_mutate_request(
    draw: &mut dyn FnMut(u8) -> u64,
    model: &mut Model,
    orig: &BitPool,
    pool: &mut BitPool,
) -> bool {
    let mutation = model.weighted_mutation(draw);

    let request_count = orig.requests.len();
    if request_count == 0 {
        return false;
    }

    // The mod biases towards earlier requests.
    let request_bits = log2ceil(request_count as u64);
    let pos = (draw(request_bits) % request_count as u64) as usize;
    let bit_offset = orig.offset_of_request(pos);
    let size = orig.requests[pos];

    match mutation {
        Mutation::Shift => {
            model.cur_tried |= Action::SHIFT;
            let shift = draw(2) as u32 + 1;
            let (win_pos, to_change) = pick_window(draw, size);
            let bits = pool.read_at(bit_offset + win_pos, to_change);
            let nbits = bits >> shift;
            pool.write_at(bit_offset + win_pos, to_change, nbits);
            if bits != nbits {
                model.cur_set |= Action::SHIFT;
                true
            } else {
                false
            }
        }
        Mutation::Mask => {
            model.cur_tried |= Action::MASK;
            // Clear each bit with probability about 1 in 4.
            let mask_size = size.min(64) as u8;
            let mut mask = draw(mask_size) | draw(mask_size);
            if mask == width_mask(mask_size) {
                // Always clear at least one bit.
                let one_bit = draw(8) % u64::from(mask_size);
                mask &= !(1u64 << one_bit);
            }
            let (win_pos, to_change) = pick_window(draw, size);
            let bits = pool.read_at(bit_offset + win_pos, to_change);
            let nbits = bits & mask;
            pool.write_at(bit_offset + win_pos, to_change, nbits);
            if bits != nbits {
                model.cur_set |= Action::MASK;
                true
            } else {
                false
            }
        }
        Mutation::Swap => {
            model.cur_tried |= Action::SWAP;
            if size > 64 {
                // Swap two non-overlapping windows within the request, if
                // that moves a smaller value earlier.
                let mut to_swap = draw(6) as u32;
                while 2 * to_swap >= size {
                    to_swap /= 2;
                }
                if to_swap == 0 {
                    return false;
                }
                let pos_a = (draw(32) % u64::from(size - to_swap)) as usize;
                let pos_b = (draw(32) % u64::from(size - 2 * to_swap)) as usize;
                let w = to_swap as usize;
                if (pos_a < pos_b && pos_a + w > pos_b) || (pos_b < pos_a && pos_b + w > pos_a) {
                    return false;
                }
                let a = pool.read_at(bit_offset + pos_a, to_swap as u8);
                let b = pool.read_at(bit_offset + pos_b, to_swap as u8);
                if b < a {
                    pool.write_at(bit_offset + pos_a, to_swap as u8, b);
                    pool.write_at(bit_offset + pos_b, to_swap as u8, a);
                    model.cur_set |= Action::SWAP;
                    return true;
                }
                false
            } else {
                // Swap with a later request of the same size whose value is
                // strictly smaller, so the exchange makes lexicographic
                // progress.
                let bits = pool.read_at(bit_offset, size as u8);
                for other in pos + 1..request_count {
                    if orig.requests[other] == size {
                        let other_offset = orig.offset_of_request(other);
                        let other_bits = pool.read_at(other_offset, size as u8);
                        if other_bits < bits {
                            pool.write_at(bit_offset, size as u8, other_bits);
                            pool.write_at(other_offset, size as u8, bits);
                            model.cur_set |= Action::SWAP;
                            return true;
                        }
                    }
                }
                false
            }
        }
        Mutation::Sub => {
            model.cur_tried |= Action::SUB;
            let sub_size = size.min(64) as u8;
            let sub = draw(sub_size);
            let (win_pos, to_change) = pick_window(draw, size);
            let bits = pool.read_at(bit_offset + win_pos, to_change);
            if bits > 0 {
                let mut nbits = bits - (sub % bits);
                if nbits == bits {
                    nbits -= 1;
                }
                model.cur_set |= Action::SUB;
                pool.write_at(bit_offset + win_pos, to_change, nbits);
                true
            } else {
                false
            }
        }
    }
}

/// For requests wider than 64 bits, pick a random window of at most 63
/// bits; otherwise operate on the whole request.
fn pick_window(draw: &mut dyn FnMut(u8) -> u64, size: u32) -> (usize, u8) {
    if size > 64 {
        let pos = (draw(32) % u64::from(size)) as u32;
        let mut to_change = draw(6) as u32;
        if to_change > size - pos {
            to_change = size - pos;
        }
        (pos as usize, to_change as u8)
    } else {
        (0, size as u8)
    }
}

fn copy_bits(src: &BitPool, src_off: usize, dst: &mut BitPool, dst_off: usize, count: usize) {
    let mut done = 0;
    while done < count {
        let chunk = (count - done).min(64) as u8;
        let v = src.read_at(src_off + done, chunk);
        dst.write_at(dst_off + done, chunk, v);
        done += chunk as usize;
    }
}

fn width_mask(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn log2ceil(value: u64) -> u8 {
    let mut res = 0;
    while (1u64 << res) < value {
        res += 1;
    }
    res
}
