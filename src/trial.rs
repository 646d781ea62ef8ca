//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-trial state and execution: run the property against the generated
//! arguments, update counters, shrink failures, and report.

use std::any::Any;
use std::io::Write;

use crate::autoshrink::{self, AutoshrinkEnv};
use crate::hooks::{CounterexampleInfo, CounterexampleRes, TrialPostRes};
use crate::runner::{RunError, Runner, SHOW_FAILURES};
use crate::types::{TrialRes, TypeInfo};

/// One generated argument: the instance, plus the autoshrink state when
/// the type uses it.
pub(crate) struct TrialArg {
    pub(crate) instance: Option<Box<dyn Any>>,
    pub(crate) kind: ArgKind,
}

pub(crate) enum ArgKind {
    Basic,
    Autoshrink(AutoshrinkEnv),
}

/// State for the trial currently being run. Reset at the end of each
/// trial; dropping it frees the arguments and any bit pools.
pub(crate) struct TrialState {
    pub(crate) trial_id: usize,
    pub(crate) seed: u64,
    pub(crate) shrink_count: usize,
    pub(crate) successful_shrinks: usize,
    pub(crate) failed_shrinks: usize,
    pub(crate) args: Vec<TrialArg>,
}

impl TrialState {
    pub(crate) fn empty() -> TrialState {
        TrialState {
            trial_id: 0,
            seed: 0,
            shrink_count: 0,
            successful_shrinks: 0,
            failed_shrinks: 0,
            args: Vec::new(),
        }
    }

    pub(crate) fn new(trial_id: usize, seed: u64, type_info: &[TypeInfo]) -> TrialState {
        TrialState {
            trial_id,
            seed,
            shrink_count: 0,
            successful_shrinks: 0,
            failed_shrinks: 0,
            args: type_info
                .iter()
                .map(|info| TrialArg {
                    instance: None,
                    kind: match &info.autoshrink {
                        Some(config) if config.enable => {
                            ArgKind::Autoshrink(AutoshrinkEnv::new(config))
                        }
                        _ => ArgKind::Basic,
                    },
                })
                .collect(),
        }
    }

    /// Borrowed views of the generated instances, for the property and
    /// for hooks. Arguments not (yet) generated are omitted.
    pub(crate) fn arg_views(&self) -> Vec<&dyn Any> {
        self.args
            .iter()
            .filter_map(|arg| arg.instance.as_deref())
            .collect()
    }
}

impl Runner {
    /// Run the trial now that all arguments are generated: mark the bloom
    /// filter, call the property, shrink on failure, and fire the
    /// post-trial hook (honoring its repeat requests).
    pub(crate) fn run_trial(&mut self) -> Result<TrialPostRes, RunError> {
        if self.bloom.is_some() {
            self.mark_called();
        }

        let result = self.call_property()?;

        match result {
            TrialRes::Pass => {
                self.counters.pass += 1;
            }
            TrialRes::Skip => {
                self.counters.skip += 1;
            }
            TrialRes::Fail => {
                verbose_message!(
                    self,
                    SHOW_FAILURES,
                    "trial {} failed, shrinking",
                    self.trial.trial_id
                );
                if let Err(err) = self.shrink_failure() {
                    let _ = self.call_trial_post(TrialRes::Error, false);
                    return Err(err);
                }
                self.counters.fail += 1;
                if self.call_counterexample() == CounterexampleRes::Error {
                    return Ok(TrialPostRes::Error);
                }
            }
            // Properties must not return Dup, and an Error halts the run.
            TrialRes::Dup | TrialRes::Error => {
                let _ = self.call_trial_post(TrialRes::Error, false);
                return Err(RunError::Fatal);
            }
        }

        let mut repeated = false;
        loop {
            match self.call_trial_post(result, repeated) {
                TrialPostRes::Continue => return Ok(TrialPostRes::Continue),
                TrialPostRes::Error => return Ok(TrialPostRes::Error),
                TrialPostRes::RepeatOnce if repeated => return Ok(TrialPostRes::Continue),
                TrialPostRes::Repeat | TrialPostRes::RepeatOnce => {
                    repeated = true;
                    let rerun = self.call_property()?;
                    if result == TrialRes::Fail && rerun == TrialRes::Pass {
                        let _ = writeln!(self.out, "Warning: failed property passed when re-run.");
                        return Ok(TrialPostRes::Error);
                    }
                }
            }
        }
    }

    fn call_counterexample(&mut self) -> CounterexampleRes {
        if self.hooks.counterexample.is_some() {
            let views = self.trial.arg_views();
            let info = CounterexampleInfo {
                prop_name: self.name.as_deref(),
                total_trials: self.trials,
                trial_id: self.trial.trial_id,
                trial_seed: self.trial.seed,
                args: &views,
            };
            (self.hooks.counterexample.as_mut().expect("checked above"))(&info)
        } else {
            self.print_counterexample();
            CounterexampleRes::Continue
        }
    }

    /// The default counter-example report: the trial's seed, then every
    /// argument its descriptor knows how to print.
    fn print_counterexample(&mut self) {
        let _ = writeln!(
            self.out,
            "\n\n -- Counter-Example: {}",
            self.name.as_deref().unwrap_or("")
        );
        let _ = writeln!(
            self.out,
            "    Trial {}, Seed {:#018x}",
            self.trial.trial_id, self.trial.seed
        );
        for (i, arg) in self.trial.args.iter().enumerate() {
            let info = &self.type_info[i];
            let instance = match arg.instance.as_deref() {
                Some(instance) => instance,
                None => continue,
            };
            match &arg.kind {
                ArgKind::Autoshrink(env) => {
                    let _ = writeln!(self.out, "    Argument {}:", i);
                    let _ = autoshrink::print(&mut *self.out, env, instance, info);
                    let _ = writeln!(self.out);
                }
                ArgKind::Basic => {
                    if let Some(print) = &info.print {
                        let _ = writeln!(self.out, "    Argument {}:", i);
                        let _ = print(&mut *self.out, instance);
                        let _ = writeln!(self.out);
                    }
                }
            }
        }
    }
}
