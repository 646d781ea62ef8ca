//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Built-in type descriptors for common argument types.
//!
//! The scalar descriptors draw exactly the type's width in bits and have
//! autoshrinking enabled, so counter-examples shrink towards zero without
//! any per-type shrinking code.

use std::fmt;
use std::mem;
use std::time::{SystemTime, UNIX_EPOCH};

use num_traits::{AsPrimitive, PrimInt};

use crate::hash::hash_onepass;
use crate::types::{AutoshrinkConfig, TypeInfo};

/// A descriptor for any primitive integer type: `u8` through `u64`,
/// `i8` through `i64`, `usize`/`isize`.
pub fn scalar<T>() -> TypeInfo
where
    T: PrimInt + fmt::Display + AsPrimitive<u64> + 'static,
    u64: AsPrimitive<T>,
{
    scalar_impl::<T>(None)
}

/// Like [`scalar`], but values are reduced modulo `limit`.
///
/// For unsigned types this generates `0 <= x < limit`; for signed types,
/// `-limit < x < limit`.
pub fn scalar_less_than<T>(limit: T) -> TypeInfo
where
    T: PrimInt + fmt::Display + AsPrimitive<u64> + 'static,
    u64: AsPrimitive<T>,
{
    scalar_impl(Some(limit))
}

fn scalar_impl<T>(limit: Option<T>) -> TypeInfo
where
    T: PrimInt + fmt::Display + AsPrimitive<u64> + 'static,
    u64: AsPrimitive<T>,
{
    let bits = (8 * mem::size_of::<T>()) as u8;
    TypeInfo::new(move |gen| {
        let mut value: T = gen.bits(bits).as_();
        if let Some(limit) = limit {
            if limit > T::zero() {
                value = value % limit;
            }
        }
        Ok(Box::new(value))
    })
    .hash(|instance| {
        let value = instance.downcast_ref::<T>().expect("scalar instance");
        hash_onepass(&AsPrimitive::<u64>::as_(*value).to_le_bytes())
    })
    .print(|out, instance| {
        let value = instance.downcast_ref::<T>().expect("scalar instance");
        write!(out, "{}", value)
    })
    .autoshrink(AutoshrinkConfig::default())
}

/// A descriptor for `bool`.
///
/// A boolean has nothing meaningful to shrink, so this descriptor is
/// hashable and printable but not shrinkable.
pub fn boolean() -> TypeInfo {
    TypeInfo::new(|gen| Ok(Box::new(gen.bits(1) == 1)))
        .hash(|instance| {
            let value = instance.downcast_ref::<bool>().expect("bool instance");
            hash_onepass(&[*value as u8])
        })
        .print(|out, instance| {
            let value = instance.downcast_ref::<bool>().expect("bool instance");
            write!(out, "{}", value)
        })
}

/// A descriptor for `Vec<u8>` of unbounded length.
pub fn byte_vec() -> TypeInfo {
    byte_vec_impl(usize::MAX)
}

/// A descriptor for `Vec<u8>` of at most `max_len` elements.
pub fn byte_vec_max_len(max_len: usize) -> TypeInfo {
    byte_vec_impl(max_len)
}

fn byte_vec_impl(max_len: usize) -> TypeInfo {
    TypeInfo::new(move |gen| {
        let mut bytes: Vec<u8> = Vec::new();
        // Each element has a 1 in 8 chance of ending the vector, so zero
        // bits mean an empty vector and the length shrinks with the pool.
        while bytes.len() < max_len && gen.bits(3) != 0 {
            bytes.push(gen.bits(8) as u8);
        }
        Ok(Box::new(bytes))
    })
    .hash(|instance| {
        let bytes = instance.downcast_ref::<Vec<u8>>().expect("byte vec instance");
        hash_onepass(bytes)
    })
    .print(|out, instance| {
        let bytes = instance.downcast_ref::<Vec<u8>>().expect("byte vec instance");
        write!(out, "[")?;
        for byte in bytes {
            write!(out, "{} ", byte)?;
        }
        write!(out, "]")
    })
    .autoshrink(AutoshrinkConfig::default())
}

/// A seed based on the hash of the current timestamp.
pub fn seed_of_time() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    hash_onepass(&now.as_nanos().to_le_bytes())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pool::BitPool;
    use crate::random::{Gen, RandomSource};

    /// A gen whose every draw is zero, as at the far end of shrinking.
    fn with_zero_gen<R>(body: impl FnOnce(&mut Gen) -> R) -> R {
        let mut source = RandomSource::new(0);
        let mut pool = BitPool::new(64, 0, 4);
        pool.shrinking = true;
        let mut gen = Gen::with_pool(&mut source, &mut pool);
        body(&mut gen)
    }

    #[test]
    fn scalars_are_minimal_on_a_zero_stream() {
        with_zero_gen(|gen| {
            let info = scalar::<u16>();
            let instance = (info.alloc)(gen).unwrap();
            assert_eq!(*instance.downcast::<u16>().unwrap(), 0);
        });
        with_zero_gen(|gen| {
            let info = scalar::<i8>();
            let instance = (info.alloc)(gen).unwrap();
            assert_eq!(*instance.downcast::<i8>().unwrap(), 0);
        });
    }

    #[test]
    fn byte_vec_is_empty_on_a_zero_stream() {
        with_zero_gen(|gen| {
            let info = byte_vec();
            let instance = (info.alloc)(gen).unwrap();
            assert!(instance.downcast::<Vec<u8>>().unwrap().is_empty());
        });
    }

    #[test]
    fn limited_scalars_stay_under_the_limit() {
        let mut source = RandomSource::new(0xfeed_f00d);
        let info = scalar_less_than::<u8>(17);
        for _ in 0..200 {
            let mut gen = Gen::new(&mut source);
            let instance = (info.alloc)(&mut gen).unwrap();
            assert!(*instance.downcast::<u8>().unwrap() < 17);
        }
    }

    #[test]
    fn signed_limits_bound_the_magnitude() {
        let mut source = RandomSource::new(0x5eed);
        let info = scalar_less_than::<i16>(100);
        for _ in 0..200 {
            let mut gen = Gen::new(&mut source);
            let value = *(info.alloc)(&mut gen).unwrap().downcast::<i16>().unwrap();
            assert!(value > -100 && value < 100);
        }
    }

    #[test]
    fn scalar_hash_depends_on_the_value() {
        let info = scalar::<u32>();
        let hash = info.hash.as_ref().unwrap();
        assert_ne!(hash(&7u32), hash(&8u32));
        assert_eq!(hash(&7u32), hash(&7u32));
    }

    #[test]
    fn byte_vec_respects_max_len() {
        let mut source = RandomSource::new(1);
        let info = byte_vec_max_len(3);
        for _ in 0..50 {
            let mut gen = Gen::new(&mut source);
            let bytes = (info.alloc)(&mut gen).unwrap();
            assert!(bytes.downcast::<Vec<u8>>().unwrap().len() <= 3);
        }
    }

    #[test]
    fn boolean_prints_and_hashes() {
        let info = boolean();
        let hash = info.hash.as_ref().unwrap();
        assert_ne!(hash(&true), hash(&false));

        let mut buf = Vec::new();
        (info.print.as_ref().unwrap())(&mut buf, &true).unwrap();
        assert_eq!(buf, b"true");
    }
}
