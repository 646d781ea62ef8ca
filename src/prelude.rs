//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Re-exports of the most commonly-needed things.
//!
//! ```
//! use shrinkray::prelude::*;
//! ```

pub use crate::builtin;
pub use crate::config::{Config, ForkConfig};
pub use crate::hooks::RunReport;
pub use crate::random::Gen;
pub use crate::runner::{generate, run, GenerateRes, RunError, RunStatus};
pub use crate::types::{
    AllocError, AutoshrinkConfig, PrintMode, ShrinkError, TrialRes, TypeInfo,
};
