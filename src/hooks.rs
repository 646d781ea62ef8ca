//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hooks into the runner's behavior.
//!
//! Much of the runner can be customized by hook closures: reporting
//! progress, halting after the first failure, repeating trials with
//! different logging, and so on. Every hook can return its `Error` variant
//! to halt everything, clean up, and fail the run.
//!
//! Hooks capture whatever environment they need; use `Rc<RefCell<..>>` or
//! similar for state shared with the caller.

use std::any::Any;

use crate::types::TrialRes;

/// Overall pass/fail/skip/duplicate counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Trials where the property held.
    pub pass: usize,
    /// Trials where the property was contradicted.
    pub fail: usize,
    /// Trials skipped by the generator or property.
    pub skip: usize,
    /// Trials skipped because the arguments were probably already tried.
    pub dup: usize,
}

/// Result of a pre-run hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPreRes {
    /// Proceed with the run.
    Continue,
    /// Halt everything and fail the run.
    Error,
}

/// Result of a post-run hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPostRes {
    /// Finish normally.
    Continue,
    /// Halt everything and fail the run.
    Error,
}

/// Result of a pre-argument-generation hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenArgsPreRes {
    /// Proceed with this trial.
    Continue,
    /// Don't run any more trials (e.g. stop after N failures).
    Halt,
    /// Halt everything and fail the run.
    Error,
}

/// Result of a pre-trial hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPreRes {
    /// Run the trial.
    Continue,
    /// Don't run any more trials.
    Halt,
    /// Halt everything and fail the run.
    Error,
}

/// Result of a post-fork hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkPostRes {
    /// Proceed to the property.
    Continue,
    /// Halt everything and fail the run.
    Error,
}

/// Result of a post-trial hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPostRes {
    /// Proceed to the next trial.
    Continue,
    /// Run the trial again with the same arguments.
    Repeat,
    /// Same as `Repeat`, but only repeat once.
    RepeatOnce,
    /// Halt everything and fail the run.
    Error,
}

/// Result of a counter-example hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterexampleRes {
    /// Proceed.
    Continue,
    /// Halt everything and fail the run.
    Error,
}

/// Result of a pre-shrink hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkPreRes {
    /// Attempt the shrink.
    Continue,
    /// Don't attempt to shrink any further (e.g. a time limit was hit).
    Halt,
    /// Halt everything and fail the run.
    Error,
}

/// Result of a post-shrink hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkPostRes {
    /// Proceed.
    Continue,
    /// Halt everything and fail the run.
    Error,
}

/// Result of a post-shrink-trial hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkTrialPostRes {
    /// Proceed.
    Continue,
    /// Run the shrink trial again with the same candidate.
    Repeat,
    /// Same as `Repeat`, but only repeat once.
    RepeatOnce,
    /// Halt everything and fail the run.
    Error,
}

/// Did a shrink attempt make any progress, and if not, is shrinking done?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkPostState {
    /// The tactic produced no simpler candidate.
    ShrinkFailed,
    /// A simpler candidate was produced.
    Shrunk,
    /// There are no more tactics for this argument.
    DoneShrinking,
}

/// Info for the pre-run hook.
#[derive(Debug)]
pub struct RunPreInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// The run's base seed.
    pub run_seed: u64,
}

/// Info for the post-run hook.
#[derive(Debug)]
pub struct RunPostInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// The run's base seed.
    pub run_seed: u64,
    /// The final tallies.
    pub report: RunReport,
}

/// Info for the pre-argument-generation hook.
#[derive(Debug)]
pub struct GenArgsPreInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// This trial's index.
    pub trial_id: usize,
    /// Failures so far.
    pub failures: usize,
    /// The run's base seed.
    pub run_seed: u64,
    /// The seed for this trial.
    pub trial_seed: u64,
    /// Number of property arguments.
    pub arity: usize,
}

/// Info for the pre-trial hook.
pub struct TrialPreInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// This trial's index.
    pub trial_id: usize,
    /// Failures so far.
    pub failures: usize,
    /// The run's base seed.
    pub run_seed: u64,
    /// The seed for this trial.
    pub trial_seed: u64,
    /// The generated arguments.
    pub args: &'a [&'a dyn Any],
}

/// Info for the post-fork hook, run on the child process.
pub struct ForkPostInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// Failures so far.
    pub failures: usize,
    /// The run's base seed.
    pub run_seed: u64,
    /// The generated arguments.
    pub args: &'a [&'a dyn Any],
}

/// Info for the post-trial hook.
pub struct TrialPostInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// This trial's index.
    pub trial_id: usize,
    /// Failures so far.
    pub failures: usize,
    /// The run's base seed.
    pub run_seed: u64,
    /// The seed for this trial.
    pub trial_seed: u64,
    /// The trial's arguments (shrunken, if the trial failed).
    pub args: &'a [&'a dyn Any],
    /// The trial's result.
    pub result: TrialRes,
    /// Whether this call is a repeat of the same trial.
    pub repeat: bool,
}

/// Info for the counter-example hook, called with the minimal failing
/// arguments after shrinking finishes.
pub struct CounterexampleInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// The failing trial's index.
    pub trial_id: usize,
    /// The failing trial's seed; re-running with it reproduces the failure.
    pub trial_seed: u64,
    /// The minimal failing arguments.
    pub args: &'a [&'a dyn Any],
}

/// Info for the pre-shrink hook.
pub struct ShrinkPreInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// This trial's index.
    pub trial_id: usize,
    /// Failures so far.
    pub failures: usize,
    /// The run's base seed.
    pub run_seed: u64,
    /// The seed for this trial.
    pub trial_seed: u64,
    /// Shrink attempts so far in this trial.
    pub shrink_count: usize,
    /// Shrink attempts that produced a simpler failing input.
    pub successful_shrinks: usize,
    /// Shrink attempts that did not.
    pub failed_shrinks: usize,
    /// Which argument is being shrunk.
    pub arg_index: usize,
    /// The argument's current instance.
    pub arg: &'a dyn Any,
    /// The tactic about to be attempted.
    pub tactic: u32,
}

/// Info for the post-shrink hook.
pub struct ShrinkPostInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// This trial's index.
    pub trial_id: usize,
    /// The run's base seed.
    pub run_seed: u64,
    /// The seed for this trial.
    pub trial_seed: u64,
    /// Shrink attempts so far in this trial.
    pub shrink_count: usize,
    /// Shrink attempts that produced a simpler failing input.
    pub successful_shrinks: usize,
    /// Shrink attempts that did not.
    pub failed_shrinks: usize,
    /// Which argument is being shrunk.
    pub arg_index: usize,
    /// The candidate instance if the tactic shrunk, the current one
    /// otherwise.
    pub arg: &'a dyn Any,
    /// The tactic just attempted.
    pub tactic: u32,
    /// Whether the attempt made progress.
    pub state: ShrinkPostState,
}

/// Info for the post-shrink-trial hook, called after running a trial with
/// shrunken arguments.
pub struct ShrinkTrialPostInfo<'a> {
    /// The configured property name, if any.
    pub prop_name: Option<&'a str>,
    /// Total number of trials configured.
    pub total_trials: usize,
    /// This trial's index.
    pub trial_id: usize,
    /// Failures so far.
    pub failures: usize,
    /// The run's base seed.
    pub run_seed: u64,
    /// The seed for this trial.
    pub trial_seed: u64,
    /// Shrink attempts so far in this trial.
    pub shrink_count: usize,
    /// Shrink attempts that produced a simpler failing input.
    pub successful_shrinks: usize,
    /// Shrink attempts that did not.
    pub failed_shrinks: usize,
    /// Which argument was shrunk.
    pub arg_index: usize,
    /// The trial's arguments, including the candidate.
    pub args: &'a [&'a dyn Any],
    /// The tactic that produced the candidate.
    pub tactic: u32,
    /// The shrink trial's result.
    pub result: TrialRes,
}

pub(crate) type RunPreFn = Box<dyn FnMut(&RunPreInfo) -> RunPreRes>;
pub(crate) type RunPostFn = Box<dyn FnMut(&RunPostInfo) -> RunPostRes>;
pub(crate) type GenArgsPreFn = Box<dyn FnMut(&GenArgsPreInfo) -> GenArgsPreRes>;
pub(crate) type TrialPreFn = Box<dyn FnMut(&TrialPreInfo) -> TrialPreRes>;
pub(crate) type ForkPostFn = Box<dyn FnMut(&ForkPostInfo) -> ForkPostRes>;
pub(crate) type TrialPostFn = Box<dyn FnMut(&TrialPostInfo) -> TrialPostRes>;
pub(crate) type CounterexampleFn = Box<dyn FnMut(&CounterexampleInfo) -> CounterexampleRes>;
pub(crate) type ShrinkPreFn = Box<dyn FnMut(&ShrinkPreInfo) -> ShrinkPreRes>;
pub(crate) type ShrinkPostFn = Box<dyn FnMut(&ShrinkPostInfo) -> ShrinkPostRes>;
pub(crate) type ShrinkTrialPostFn = Box<dyn FnMut(&ShrinkTrialPostInfo) -> ShrinkTrialPostRes>;

/// The set of configured hooks. A hook left as `None` gets the built-in
/// default behavior: progress printing for `run_pre`, `run_post` and
/// `trial_post`, counter-example printing for `counterexample`, and plain
/// `Continue` for the rest.
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) run_pre: Option<RunPreFn>,
    pub(crate) run_post: Option<RunPostFn>,
    pub(crate) gen_args_pre: Option<GenArgsPreFn>,
    pub(crate) trial_pre: Option<TrialPreFn>,
    pub(crate) fork_post: Option<ForkPostFn>,
    pub(crate) trial_post: Option<TrialPostFn>,
    pub(crate) counterexample: Option<CounterexampleFn>,
    pub(crate) shrink_pre: Option<ShrinkPreFn>,
    pub(crate) shrink_post: Option<ShrinkPostFn>,
    pub(crate) shrink_trial_post: Option<ShrinkTrialPostFn>,
}
