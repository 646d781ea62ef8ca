//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration for a run.

use std::any::Any;
use std::fmt;
use std::io;

use crate::hooks;
use crate::types::{TrialRes, TypeInfo};

/// A property can have at most this many arguments.
pub const MAX_ARITY: usize = 7;

/// Default number of trials to run.
pub const DEF_TRIALS: usize = 100;

/// Seed used when the configured seed is 0.
pub(crate) const DEFAULT_SEED: u64 = 0x00a6_00d6_4b17_5eed;

/// For forked workers that were sent a timeout signal, how long to wait (in
/// milliseconds) for them to exit before sending SIGKILL.
pub(crate) const DEF_EXIT_TIMEOUT_MS: u64 = 100;

pub(crate) type PropFn1 = Box<dyn FnMut(&dyn Any) -> TrialRes>;
pub(crate) type PropFn2 = Box<dyn FnMut(&dyn Any, &dyn Any) -> TrialRes>;
pub(crate) type PropFn3 = Box<dyn FnMut(&dyn Any, &dyn Any, &dyn Any) -> TrialRes>;
pub(crate) type PropFn4 = Box<dyn FnMut(&dyn Any, &dyn Any, &dyn Any, &dyn Any) -> TrialRes>;
pub(crate) type PropFn5 =
    Box<dyn FnMut(&dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any) -> TrialRes>;
pub(crate) type PropFn6 =
    Box<dyn FnMut(&dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any) -> TrialRes>;
pub(crate) type PropFn7 = Box<
    dyn FnMut(&dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any) -> TrialRes,
>;

/// The property function under test, of some arity between 1 and 7.
pub(crate) enum Property {
    P1(PropFn1),
    P2(PropFn2),
    P3(PropFn3),
    P4(PropFn4),
    P5(PropFn5),
    P6(PropFn6),
    P7(PropFn7),
}

impl Property {
    pub(crate) fn arity(&self) -> usize {
        match self {
            Property::P1(_) => 1,
            Property::P2(_) => 2,
            Property::P3(_) => 3,
            Property::P4(_) => 4,
            Property::P5(_) => 5,
            Property::P6(_) => 6,
            Property::P7(_) => 7,
        }
    }

    pub(crate) fn call(&mut self, a: &[&dyn Any]) -> TrialRes {
        match self {
            Property::P1(f) => f(a[0]),
            Property::P2(f) => f(a[0], a[1]),
            Property::P3(f) => f(a[0], a[1], a[2]),
            Property::P4(f) => f(a[0], a[1], a[2], a[3]),
            Property::P5(f) => f(a[0], a[1], a[2], a[3], a[4]),
            Property::P6(f) => f(a[0], a[1], a[2], a[3], a[4], a[5]),
            Property::P7(f) => f(a[0], a[1], a[2], a[3], a[4], a[5], a[6]),
        }
    }
}

/// Fork the property into a worker process, in case generated arguments
/// can crash or hang the code under test. Unix only, behind the `fork`
/// feature.
#[derive(Debug, Clone, Default)]
pub struct ForkConfig {
    /// Run each property call in a forked child.
    pub enable: bool,
    /// Milliseconds to wait for the child before signalling it; 0 waits
    /// forever.
    pub timeout: u64,
    /// Signal to send after the timeout; 0 means SIGTERM.
    pub signal: i32,
    /// Milliseconds to wait for a signalled child to exit voluntarily
    /// before SIGKILL; 0 means 100.
    pub exit_timeout: u64,
}

/// Configuration for a run, assembled with builder methods.
///
/// A property and one type descriptor per argument are required;
/// everything else has defaults.
///
/// ```
/// use shrinkray::prelude::*;
///
/// let config = Config::new()
///     .trials(1000)
///     .seed(0xdead_beef)
///     .type_info(builtin::boolean())
///     .prop1(|_| TrialRes::Pass);
/// ```
pub struct Config {
    pub(crate) name: Option<String>,
    pub(crate) trials: usize,
    pub(crate) seed: u64,
    pub(crate) always_seeds: Vec<u64>,
    pub(crate) verbose: u32,
    pub(crate) fork: ForkConfig,
    pub(crate) prop: Option<Property>,
    pub(crate) type_info: Vec<TypeInfo>,
    pub(crate) hooks: hooks::Hooks,
    pub(crate) out: Option<Box<dyn io::Write>>,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("name", &self.name)
            .field("trials", &self.trials)
            .field("seed", &self.seed)
            .field("always_seeds", &self.always_seeds)
            .field("verbose", &self.verbose)
            .field("fork", &self.fork)
            .field("arity", &self.type_info.len())
            .finish()
    }
}

impl Config {
    /// A configuration with the default trial count and seed, no property
    /// and no argument types.
    pub fn new() -> Config {
        Config {
            name: None,
            trials: DEF_TRIALS,
            seed: 0,
            always_seeds: Vec::new(),
            verbose: 0,
            fork: ForkConfig::default(),
            prop: None,
            type_info: Vec::new(),
            hooks: hooks::Hooks::default(),
            out: None,
        }
    }

    /// Set the property name, displayed in runner output.
    pub fn name(mut self, name: impl Into<String>) -> Config {
        self.name = Some(name.into());
        self
    }

    /// Set the number of trials to run; 0 means the default of 100.
    pub fn trials(mut self, trials: usize) -> Config {
        self.trials = trials;
        self
    }

    /// Set the seed for the random number generator; 0 means a default
    /// constant.
    pub fn seed(mut self, seed: u64) -> Config {
        self.seed = seed;
        self
    }

    /// Seeds to always run before any random ones, as regression anchors.
    pub fn always_seeds(mut self, seeds: impl Into<Vec<u64>>) -> Config {
        self.always_seeds = seeds.into();
        self
    }

    /// Set the runner's stderr chattiness.
    pub fn verbose(mut self, verbose: u32) -> Config {
        self.verbose = verbose;
        self
    }

    /// Configure worker-process isolation for property calls.
    pub fn fork(mut self, fork: ForkConfig) -> Config {
        self.fork = fork;
        self
    }

    /// Append the type descriptor for the next argument. Descriptors are
    /// positional: the first call describes the property's first argument.
    pub fn type_info(mut self, info: TypeInfo) -> Config {
        self.type_info.push(info);
        self
    }

    /// Use a one-argument property.
    pub fn prop1(mut self, f: impl FnMut(&dyn Any) -> TrialRes + 'static) -> Config {
        self.prop = Some(Property::P1(Box::new(f)));
        self
    }

    /// Use a two-argument property.
    pub fn prop2(mut self, f: impl FnMut(&dyn Any, &dyn Any) -> TrialRes + 'static) -> Config {
        self.prop = Some(Property::P2(Box::new(f)));
        self
    }

    /// Use a three-argument property.
    pub fn prop3(
        mut self,
        f: impl FnMut(&dyn Any, &dyn Any, &dyn Any) -> TrialRes + 'static,
    ) -> Config {
        self.prop = Some(Property::P3(Box::new(f)));
        self
    }

    /// Use a four-argument property.
    pub fn prop4(
        mut self,
        f: impl FnMut(&dyn Any, &dyn Any, &dyn Any, &dyn Any) -> TrialRes + 'static,
    ) -> Config {
        self.prop = Some(Property::P4(Box::new(f)));
        self
    }

    /// Use a five-argument property.
    pub fn prop5(
        mut self,
        f: impl FnMut(&dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any) -> TrialRes + 'static,
    ) -> Config {
        self.prop = Some(Property::P5(Box::new(f)));
        self
    }

    /// Use a six-argument property.
    pub fn prop6(
        mut self,
        f: impl FnMut(&dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any) -> TrialRes
            + 'static,
    ) -> Config {
        self.prop = Some(Property::P6(Box::new(f)));
        self
    }

    /// Use a seven-argument property.
    pub fn prop7(
        mut self,
        f: impl FnMut(&dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any, &dyn Any) -> TrialRes
            + 'static,
    ) -> Config {
        self.prop = Some(Property::P7(Box::new(f)));
        self
    }

    /// Send runner output (progress, counter-examples) to `out` instead of
    /// stdout.
    pub fn output(mut self, out: impl io::Write + 'static) -> Config {
        self.out = Some(Box::new(out));
        self
    }

    /// Hook called before the run starts.
    pub fn run_pre(
        mut self,
        f: impl FnMut(&hooks::RunPreInfo) -> hooks::RunPreRes + 'static,
    ) -> Config {
        self.hooks.run_pre = Some(Box::new(f));
        self
    }

    /// Hook called after the whole run completes, with overall results.
    pub fn run_post(
        mut self,
        f: impl FnMut(&hooks::RunPostInfo) -> hooks::RunPostRes + 'static,
    ) -> Config {
        self.hooks.run_post = Some(Box::new(f));
        self
    }

    /// Hook called before a trial's arguments are generated.
    pub fn gen_args_pre(
        mut self,
        f: impl FnMut(&hooks::GenArgsPreInfo) -> hooks::GenArgsPreRes + 'static,
    ) -> Config {
        self.hooks.gen_args_pre = Some(Box::new(f));
        self
    }

    /// Hook called before running a trial, with the generated arguments.
    pub fn trial_pre(
        mut self,
        f: impl FnMut(&hooks::TrialPreInfo) -> hooks::TrialPreRes + 'static,
    ) -> Config {
        self.hooks.trial_pre = Some(Box::new(f));
        self
    }

    /// Hook called on the child process after forking.
    pub fn fork_post(
        mut self,
        f: impl FnMut(&hooks::ForkPostInfo) -> hooks::ForkPostRes + 'static,
    ) -> Config {
        self.hooks.fork_post = Some(Box::new(f));
        self
    }

    /// Hook called after each trial, with the arguments and result.
    pub fn trial_post(
        mut self,
        f: impl FnMut(&hooks::TrialPostInfo) -> hooks::TrialPostRes + 'static,
    ) -> Config {
        self.hooks.trial_post = Some(Box::new(f));
        self
    }

    /// Hook called with the minimal failing arguments when a property
    /// fails. The default prints them via each descriptor's print
    /// callback.
    pub fn counterexample(
        mut self,
        f: impl FnMut(&hooks::CounterexampleInfo) -> hooks::CounterexampleRes + 'static,
    ) -> Config {
        self.hooks.counterexample = Some(Box::new(f));
        self
    }

    /// Hook called before each shrink attempt.
    pub fn shrink_pre(
        mut self,
        f: impl FnMut(&hooks::ShrinkPreInfo) -> hooks::ShrinkPreRes + 'static,
    ) -> Config {
        self.hooks.shrink_pre = Some(Box::new(f));
        self
    }

    /// Hook called after each shrink attempt.
    pub fn shrink_post(
        mut self,
        f: impl FnMut(&hooks::ShrinkPostInfo) -> hooks::ShrinkPostRes + 'static,
    ) -> Config {
        self.hooks.shrink_post = Some(Box::new(f));
        self
    }

    /// Hook called after running a trial with shrunken arguments.
    pub fn shrink_trial_post(
        mut self,
        f: impl FnMut(&hooks::ShrinkTrialPostInfo) -> hooks::ShrinkTrialPostRes + 'static,
    ) -> Config {
        self.hooks.shrink_trial_post = Some(Box::new(f));
        self
    }
}
