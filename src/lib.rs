//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Shrinkray
//!
//! A property-based testing engine.
//!
//! A property is a function from one or more generated arguments to a
//! [`TrialRes`](types::TrialRes). Shrinkray runs many randomized trials of the
//! property, skipping argument tuples it has probably already tried, and when
//! a trial fails it shrinks the counter-example towards a local minimum
//! before reporting it. Runs are reproducible from a 64-bit seed.
//!
//! Instances are generated from a stream of random bits. With autoshrinking
//! enabled, those bits are recorded in a *bit pool* alongside the width of
//! every request; shrinking then mutates and truncates the recorded pool and
//! replays generation, so any type whose generator obeys the monotonicity
//! contract (smaller bits mean simpler values) shrinks for free.
//!
//! ```
//! use shrinkray::prelude::*;
//!
//! let config = Config::new()
//!     .trials(500)
//!     .type_info(builtin::scalar::<u16>())
//!     .prop1(|x| {
//!         let x = *x.downcast_ref::<u16>().unwrap();
//!         if (x / 2) * 2 <= x {
//!             TrialRes::Pass
//!         } else {
//!             TrialRes::Fail
//!         }
//!     });
//!
//! assert_eq!(shrinkray::run(config), Ok(RunStatus::Pass));
//! ```

#![forbid(future_incompatible)]
#![deny(missing_docs, bare_trait_objects)]

#[macro_use]
extern crate bitflags;

#[macro_use]
mod macros;

pub mod config;
pub mod hash;
pub mod hooks;
pub mod random;
pub mod rng;
pub mod runner;
pub mod types;

pub mod builtin;

mod autoshrink;
mod bloom;
mod call;
mod pool;
mod shrink;
mod trial;

pub mod prelude;

pub use crate::config::{Config, ForkConfig};
pub use crate::runner::{generate, run, RunError, RunStatus};
pub use crate::types::{TrialRes, TypeInfo};
