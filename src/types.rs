//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Type descriptors: how to generate, hash, print, and shrink instances of a
//! property's argument types.

use std::any::Any;
use std::fmt;
use std::io;

use crate::random::Gen;

/// Result of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrialRes {
    /// The property held.
    Pass = 0,
    /// The property was contradicted.
    Fail = 1,
    /// This combination of arguments is not applicable.
    Skip = 2,
    /// The arguments were probably already tried. Only the runner produces
    /// this; properties must not return it.
    Dup = 3,
    /// Unrecoverable error; the whole run halts.
    Error = 4,
}

impl TrialRes {
    pub(crate) fn to_byte(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_byte(byte: u8) -> Option<TrialRes> {
        match byte {
            0 => Some(TrialRes::Pass),
            1 => Some(TrialRes::Fail),
            2 => Some(TrialRes::Skip),
            3 => Some(TrialRes::Dup),
            4 => Some(TrialRes::Error),
            _ => None,
        }
    }
}

impl fmt::Display for TrialRes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            TrialRes::Pass => "PASS",
            TrialRes::Fail => "FAIL",
            TrialRes::Skip => "SKIP",
            TrialRes::Dup => "DUP",
            TrialRes::Error => "ERROR",
        })
    }
}

/// Non-success outcomes of an alloc callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// This draw is not applicable; the trial is counted as skipped.
    Skip,
    /// Generation failed; the run halts.
    Fail,
}

/// Result of an alloc callback: a freshly generated instance, or a reason
/// it could not be produced.
pub type AllocResult = Result<Box<dyn Any>, AllocError>;

/// Non-success outcomes of a shrink callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkError {
    /// This tactic cannot simplify the instance; try the next one.
    DeadEnd,
    /// There are no more tactics to try for this instance.
    NoMoreTactics,
    /// Shrinking failed; the run halts.
    Fail,
}

/// Result of a shrink callback: a simpler candidate instance, or a reason
/// none was produced for this tactic.
pub type ShrinkResult = Result<Box<dyn Any>, ShrinkError>;

pub(crate) type AllocFn = Box<dyn Fn(&mut Gen) -> AllocResult>;
pub(crate) type HashFn = Box<dyn Fn(&dyn Any) -> u64>;
pub(crate) type PrintFn = Box<dyn Fn(&mut dyn io::Write, &dyn Any) -> io::Result<()>>;
pub(crate) type ShrinkFn = Box<dyn Fn(&mut Gen, &dyn Any, u32) -> ShrinkResult>;

bitflags! {
    /// What to print when displaying an autoshrink counter-example.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PrintMode: u8 {
        /// The user's print callback, if any.
        const USER = 0x01;
        /// The raw bytes of the bit pool.
        const BIT_POOL = 0x02;
        /// The individual requests and their values.
        const REQUESTS = 0x04;
        /// Everything.
        const ALL = 0x07;
    }
}

/// Configuration for autoshrinking.
#[derive(Debug, Clone)]
pub struct AutoshrinkConfig {
    /// Enable autoshrinking for this type. Mutually exclusive with a
    /// custom shrink callback.
    pub enable: bool,
    /// Initial bit pool allocation, in bits. Generating very large
    /// instances may warrant increasing this.
    pub pool_size: usize,
    /// How many pool bits generation may consume before draws yield zero
    /// forever.
    pub pool_limit: usize,
    /// What to print for counter-examples. Empty selects a default:
    /// the user print callback when present, the request log otherwise.
    pub print_mode: PrintMode,
    /// How many unsuccessful shrink tactics to try in a row before
    /// declaring a local minimum.
    pub max_failed_shrinks: u32,
}

/// Default bit pool allocation: 64 PRNG words. The pool grows on demand,
/// but an overly small start means several reallocations in a row.
pub(crate) const DEF_POOL_SIZE: usize = 64 * 64;

pub(crate) const DEF_MAX_FAILED_SHRINKS: u32 = 100;

impl Default for AutoshrinkConfig {
    fn default() -> Self {
        AutoshrinkConfig {
            enable: true,
            pool_size: DEF_POOL_SIZE,
            pool_limit: usize::MAX,
            print_mode: PrintMode::empty(),
            max_failed_shrinks: DEF_MAX_FAILED_SHRINKS,
        }
    }
}

/// Callbacks describing one argument type: how to generate an instance,
/// and optionally how to hash, print, and shrink it.
///
/// Only `alloc` is required. Instances are `Box<dyn Any>` and are freed by
/// `Drop` when the trial (or a rejected shrink candidate) is done with them.
pub struct TypeInfo {
    pub(crate) alloc: AllocFn,
    pub(crate) hash: Option<HashFn>,
    pub(crate) print: Option<PrintFn>,
    pub(crate) shrink: Option<ShrinkFn>,
    pub(crate) autoshrink: Option<AutoshrinkConfig>,
}

impl TypeInfo {
    /// Describe a type by its generator.
    ///
    /// If autoshrinking is enabled for this type, `alloc` must obey the
    /// monotonicity contract: smaller values drawn from the bit stream
    /// correspond to simpler instances.
    pub fn new(alloc: impl Fn(&mut Gen) -> AllocResult + 'static) -> TypeInfo {
        TypeInfo {
            alloc: Box::new(alloc),
            hash: None,
            print: None,
            shrink: None,
            autoshrink: None,
        }
    }

    /// Attach a hash callback, used to skip argument combinations that
    /// have probably already been tried.
    pub fn hash(mut self, hash: impl Fn(&dyn Any) -> u64 + 'static) -> TypeInfo {
        self.hash = Some(Box::new(hash));
        self
    }

    /// Attach a print callback, used to display counter-examples.
    pub fn print(
        mut self,
        print: impl Fn(&mut dyn io::Write, &dyn Any) -> io::Result<()> + 'static,
    ) -> TypeInfo {
        self.print = Some(Box::new(print));
        self
    }

    /// Attach a custom shrink callback.
    ///
    /// For a given instance there are usually several ways to simplify it;
    /// the `tactic` argument selects which one to attempt. Tactics are
    /// explored lazily, breadth-first. Cannot be combined with
    /// [`autoshrink`](TypeInfo::autoshrink).
    pub fn shrink(
        mut self,
        shrink: impl Fn(&mut Gen, &dyn Any, u32) -> ShrinkResult + 'static,
    ) -> TypeInfo {
        self.shrink = Some(Box::new(shrink));
        self
    }

    /// Enable autoshrinking with the given configuration.
    pub fn autoshrink(mut self, config: AutoshrinkConfig) -> TypeInfo {
        self.autoshrink = Some(config);
        self
    }

    pub(crate) fn uses_autoshrink(&self) -> bool {
        self.autoshrink.as_ref().map_or(false, |c| c.enable)
    }

    pub(crate) fn shrinkable(&self) -> bool {
        self.shrink.is_some() || self.uses_autoshrink()
    }

    pub(crate) fn hashable(&self) -> bool {
        self.hash.is_some() || self.uses_autoshrink()
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("hash", &self.hash.is_some())
            .field("print", &self.print.is_some())
            .field("shrink", &self.shrink.is_some())
            .field("autoshrink", &self.autoshrink)
            .finish()
    }
}
