//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The trial runner: configuration validation, seed scheduling, argument
//! generation, duplicate skipping, and result tallying.

use std::fmt;
use std::io::{self, Write};

use crate::autoshrink::{self, AllocFailure};
use crate::bloom::Bloom;
use crate::config::{Config, ForkConfig, Property, DEFAULT_SEED, DEF_TRIALS, MAX_ARITY};
use crate::hooks::{
    GenArgsPreInfo, GenArgsPreRes, Hooks, RunPostInfo, RunPostRes, RunPreInfo, RunPreRes,
    RunReport, TrialPostInfo, TrialPostRes, TrialPreInfo, TrialPreRes,
};
use crate::random::{Gen, RandomSource};
use crate::trial::{ArgKind, TrialState};
use crate::types::{AllocError, TrialRes, TypeInfo};

pub(crate) const SHOW_FAILURES: u32 = 1;
pub(crate) const TRACE: u32 = 2;

/// Overall result of a run of trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// At least one trial passed and none failed.
    Pass,
    /// At least one trial found a counter-example.
    Fail,
    /// No trial failed, but none passed either.
    Skip,
}

/// Ways a run can fail without producing a verdict about the property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunError {
    /// The configuration is invalid.
    BadArgs(&'static str),
    /// An internal allocation failed.
    Memory,
    /// A hook, callback, or the property reported an unrecoverable error.
    Fatal,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunError::BadArgs(why) => write!(f, "bad arguments: {}", why),
            RunError::Memory => f.write_str("memory allocation failed"),
            RunError::Fatal => f.write_str("unrecoverable error"),
        }
    }
}

impl std::error::Error for RunError {}

/// Result of generating a single instance with [`generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateRes {
    /// An instance was generated (and printed, if the descriptor can).
    Generated,
    /// The generator skipped this seed.
    Skip,
}

/// Ways [`generate`] can fail.
#[derive(Debug)]
pub enum GenerateError {
    /// The descriptor is invalid.
    BadArgs(&'static str),
    /// The alloc callback reported an error.
    Alloc,
    /// Writing the instance to the output stream failed.
    Io(io::Error),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenerateError::BadArgs(why) => write!(f, "bad arguments: {}", why),
            GenerateError::Alloc => f.write_str("generation failed"),
            GenerateError::Io(err) => write!(f, "write failed: {}", err),
        }
    }
}

impl std::error::Error for GenerateError {}

impl From<io::Error> for GenerateError {
    fn from(err: io::Error) -> GenerateError {
        GenerateError::Io(err)
    }
}

/// Run a series of randomized trials of a property function.
///
/// Returns the overall verdict, or an error if the configuration is
/// invalid or a callback failed.
pub fn run(config: Config) -> Result<RunStatus, RunError> {
    let mut runner = Runner::init(config)?;
    runner.run_trials()
}

/// Generate the instance the descriptor would produce from `seed`, print
/// it to `out` (when the descriptor can print), and drop it. Useful for
/// reproducing a failing trial from a reported seed.
pub fn generate(
    out: &mut dyn Write,
    seed: u64,
    info: &TypeInfo,
) -> Result<GenerateRes, GenerateError> {
    if info.shrink.is_some() && info.uses_autoshrink() {
        return Err(GenerateError::BadArgs(
            "a type may use a shrink callback or autoshrink, not both",
        ));
    }
    let mut source = RandomSource::new(if seed == 0 { DEFAULT_SEED } else { seed });
    let res = {
        let mut gen = Gen::new(&mut source);
        (info.alloc)(&mut gen)
    };
    match res {
        Ok(instance) => {
            if let Some(print) = &info.print {
                writeln!(out, "-- Seed {:#018x}", seed)?;
                print(&mut *out, instance.as_ref())?;
                writeln!(out)?;
            }
            Ok(GenerateRes::Generated)
        }
        Err(AllocError::Skip) => Ok(GenerateRes::Skip),
        Err(AllocError::Fail) => Err(GenerateError::Alloc),
    }
}

pub(crate) enum StepRes {
    Ok,
    Halt,
}

enum AllGen {
    Ok,
    Skip,
    Dup,
    Error(RunError),
}

/// State for one run of trials.
pub(crate) struct Runner {
    pub(crate) name: Option<String>,
    pub(crate) prop: Property,
    pub(crate) type_info: Vec<TypeInfo>,
    pub(crate) trials: usize,
    pub(crate) verbose: u32,
    pub(crate) run_seed: u64,
    pub(crate) always_seeds: Vec<u64>,
    pub(crate) fork: ForkConfig,
    pub(crate) hooks: Hooks,
    pub(crate) out: Box<dyn Write>,
    pub(crate) random: RandomSource,
    pub(crate) bloom: Option<Bloom>,
    pub(crate) counters: RunReport,
    pub(crate) trial: TrialState,
    pub(crate) tally: TallyState,
}

fn fork_supported() -> bool {
    cfg!(all(feature = "fork", unix))
}

impl Runner {
    pub(crate) fn init(config: Config) -> Result<Runner, RunError> {
        let Config {
            name,
            trials,
            seed,
            always_seeds,
            verbose,
            fork,
            prop,
            type_info,
            hooks,
            out,
        } = config;

        let arity = type_info.len();
        if arity == 0 {
            return Err(RunError::BadArgs("at least one type_info is required"));
        }
        if arity > MAX_ARITY {
            return Err(RunError::BadArgs("too many property arguments"));
        }
        let prop = match prop {
            Some(prop) => prop,
            None => return Err(RunError::BadArgs("no property function configured")),
        };
        if prop.arity() != arity {
            return Err(RunError::BadArgs(
                "property arity does not match the type_info count",
            ));
        }

        let mut all_hashable = true;
        for info in &type_info {
            if info.shrink.is_some() && info.uses_autoshrink() {
                return Err(RunError::BadArgs(
                    "a type may use a shrink callback or autoshrink, not both",
                ));
            }
            if !info.hashable() {
                all_hashable = false;
            }
        }

        if fork.enable && !fork_supported() {
            return Err(RunError::BadArgs("fork support is not compiled in"));
        }

        let run_seed = if seed == 0 { DEFAULT_SEED } else { seed };
        let trials = if trials == 0 { DEF_TRIALS } else { trials };

        Ok(Runner {
            name,
            prop,
            type_info,
            trials,
            verbose,
            run_seed,
            always_seeds,
            fork,
            hooks,
            out: out.unwrap_or_else(|| Box::new(io::stdout())),
            random: RandomSource::new(run_seed),
            // Only deduplicate trials when every argument can be hashed.
            bloom: if all_hashable { Some(Bloom::new()) } else { None },
            counters: RunReport::default(),
            trial: TrialState::empty(),
            tally: TallyState::default(),
        })
    }

    pub(crate) fn run_trials(&mut self) -> Result<RunStatus, RunError> {
        let pre = {
            let info = RunPreInfo {
                prop_name: self.name.as_deref(),
                total_trials: self.trials,
                run_seed: self.run_seed,
            };
            match &mut self.hooks.run_pre {
                Some(hook) => hook(&info),
                None => {
                    print_run_pre(&mut *self.out, &info);
                    RunPreRes::Continue
                }
            }
        };
        if pre != RunPreRes::Continue {
            return Err(RunError::Fatal);
        }

        let mut seed = self.run_seed;
        for trial in 0..self.trials {
            let step = self.run_step(trial, &mut seed);
            self.trial = TrialState::empty();
            match step? {
                StepRes::Ok => continue,
                StepRes::Halt => break,
            }
        }

        let post = {
            let info = RunPostInfo {
                prop_name: self.name.as_deref(),
                total_trials: self.trials,
                run_seed: self.run_seed,
                report: self.counters,
            };
            match &mut self.hooks.run_post {
                Some(hook) => hook(&info),
                None => {
                    print_run_post(&mut *self.out, &info);
                    RunPostRes::Continue
                }
            }
        };
        if post != RunPostRes::Continue {
            return Err(RunError::Fatal);
        }

        if self.counters.fail > 0 {
            Ok(RunStatus::Fail)
        } else if self.counters.pass > 0 {
            Ok(RunStatus::Pass)
        } else {
            Ok(RunStatus::Skip)
        }
    }

    fn run_step(&mut self, trial: usize, seed: &mut u64) -> Result<StepRes, RunError> {
        // Any seeds to always run come first, then the base seed, then the
        // seeds chained from the previous trial's PRNG state.
        let always = self.always_seeds.len();
        if trial < always {
            *seed = self.always_seeds[trial];
        } else if always > 0 && trial == always {
            *seed = self.run_seed;
        }

        self.trial = TrialState::new(trial, *seed, &self.type_info);

        let res = {
            let info = GenArgsPreInfo {
                prop_name: self.name.as_deref(),
                total_trials: self.trials,
                trial_id: trial,
                failures: self.counters.fail,
                run_seed: self.run_seed,
                trial_seed: *seed,
                arity: self.type_info.len(),
            };
            match &mut self.hooks.gen_args_pre {
                Some(hook) => hook(&info),
                None => GenArgsPreRes::Continue,
            }
        };
        match res {
            GenArgsPreRes::Continue => {}
            GenArgsPreRes::Halt => return Ok(StepRes::Halt),
            GenArgsPreRes::Error => return Err(RunError::Fatal),
        }

        verbose_message!(self, TRACE, "trial {}: seed {:#018x}", trial, *seed);
        self.random.set_seed(*seed);

        match self.gen_all_args() {
            AllGen::Skip => {
                self.counters.skip += 1;
                if self.call_trial_post(TrialRes::Skip, false) == TrialPostRes::Error {
                    return Err(RunError::Fatal);
                }
            }
            AllGen::Dup => {
                self.counters.dup += 1;
                if self.call_trial_post(TrialRes::Dup, false) == TrialPostRes::Error {
                    return Err(RunError::Fatal);
                }
            }
            AllGen::Error(err) => {
                let _ = self.call_trial_post(TrialRes::Error, false);
                return Err(err);
            }
            AllGen::Ok => {
                let res = {
                    let views = self.trial.arg_views();
                    let info = TrialPreInfo {
                        prop_name: self.name.as_deref(),
                        total_trials: self.trials,
                        trial_id: trial,
                        failures: self.counters.fail,
                        run_seed: self.run_seed,
                        trial_seed: self.trial.seed,
                        args: &views,
                    };
                    match &mut self.hooks.trial_pre {
                        Some(hook) => hook(&info),
                        None => TrialPreRes::Continue,
                    }
                };
                match res {
                    TrialPreRes::Continue => {}
                    TrialPreRes::Halt => return Ok(StepRes::Halt),
                    TrialPreRes::Error => return Err(RunError::Fatal),
                }

                if self.run_trial()? == TrialPostRes::Error {
                    return Err(RunError::Fatal);
                }
            }
        }

        *seed = self.random.bits(64);
        Ok(StepRes::Ok)
    }

    /// Instantiate all arguments from the current seed, then consult the
    /// bloom filter for a probable duplicate.
    fn gen_all_args(&mut self) -> AllGen {
        for i in 0..self.type_info.len() {
            let info = &self.type_info[i];
            let arg = &mut self.trial.args[i];
            let res = match &mut arg.kind {
                ArgKind::Autoshrink(env) => autoshrink::alloc(env, &mut self.random, info),
                ArgKind::Basic => {
                    let mut gen = Gen::new(&mut self.random);
                    (info.alloc)(&mut gen).map_err(AllocFailure::from)
                }
            };
            match res {
                Ok(instance) => arg.instance = Some(instance),
                Err(AllocFailure::Skip) => return AllGen::Skip,
                Err(AllocFailure::Fail) => return AllGen::Error(RunError::Fatal),
                Err(AllocFailure::Memory) => return AllGen::Error(RunError::Memory),
            }
        }

        if self.bloom.is_some() && self.check_called() {
            return AllGen::Dup;
        }
        AllGen::Ok
    }

    pub(crate) fn call_trial_post(&mut self, result: TrialRes, repeat: bool) -> TrialPostRes {
        let views = self.trial.arg_views();
        let info = TrialPostInfo {
            prop_name: self.name.as_deref(),
            total_trials: self.trials,
            trial_id: self.trial.trial_id,
            failures: self.counters.fail,
            run_seed: self.run_seed,
            trial_seed: self.trial.seed,
            args: &views,
            result,
            repeat,
        };
        match &mut self.hooks.trial_post {
            Some(hook) => hook(&info),
            None => {
                print_trial_result(&mut self.tally, &mut *self.out, result);
                TrialPostRes::Continue
            }
        }
    }
}

/// Progress-tally state for the default post-trial hook.
#[derive(Default)]
pub(crate) struct TallyState {
    column: usize,
    scale_pass: usize,
    scale_skip: usize,
    scale_dup: usize,
    consec_pass: usize,
    consec_skip: usize,
    consec_dup: usize,
}

const DEF_MAX_COLUMNS: usize = 72;

/// Append one tally mark, but after `scale_factor` consecutive marks of
/// the same kind, step the scale up by an order of magnitude so long runs
/// stay readable.
fn autoscale_tally(
    buf: &mut String,
    scale_factor: usize,
    name: &str,
    cur_scale: &mut usize,
    tally: char,
    count: &mut usize,
) {
    use std::fmt::Write as _;

    let scale = if *cur_scale == 0 { 1 } else { *cur_scale };
    let nscale = scale_factor * scale;
    if scale > 1 || *count >= nscale {
        if *count == nscale {
            let _ = write!(buf, "({} x {}){}", name, nscale, tally);
            *cur_scale = nscale;
        } else if *count % scale == 0 {
            buf.push(tally);
        }
    } else {
        buf.push(tally);
    }
    *count += 1;
}

pub(crate) fn print_trial_result(tally: &mut TallyState, out: &mut dyn Write, result: TrialRes) {
    let mut buf = String::new();
    match result {
        TrialRes::Pass => autoscale_tally(
            &mut buf,
            100,
            "PASS",
            &mut tally.scale_pass,
            '.',
            &mut tally.consec_pass,
        ),
        TrialRes::Fail => {
            buf.push('F');
            tally.scale_pass = 1;
            tally.consec_pass = 0;
            tally.column = 0;
        }
        TrialRes::Skip => autoscale_tally(
            &mut buf,
            10,
            "SKIP",
            &mut tally.scale_skip,
            's',
            &mut tally.consec_skip,
        ),
        TrialRes::Dup => autoscale_tally(
            &mut buf,
            10,
            "DUP",
            &mut tally.scale_dup,
            'd',
            &mut tally.consec_dup,
        ),
        TrialRes::Error => buf.push('E'),
    }

    if tally.column + buf.len() >= DEF_MAX_COLUMNS {
        let _ = writeln!(out);
        tally.column = 0;
    }
    let _ = write!(out, "{}", buf);
    let _ = out.flush();
    tally.column += buf.len();
}

fn print_run_pre(out: &mut dyn Write, info: &RunPreInfo) {
    let _ = writeln!(
        out,
        "\n== PROP '{}': {} trials, seed {:#018x}",
        info.prop_name.unwrap_or("(anonymous)"),
        info.total_trials,
        info.run_seed
    );
}

fn print_run_post(out: &mut dyn Write, info: &RunPostInfo) {
    let r = &info.report;
    let _ = writeln!(
        out,
        "\n== {} '{}': pass {}, fail {}, skip {}, dup {}",
        if r.fail > 0 { "FAIL" } else { "PASS" },
        info.prop_name.unwrap_or("(anonymous)"),
        r.pass,
        r.fail,
        r.skip,
        r.dup
    );
}
