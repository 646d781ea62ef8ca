//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The shrink driver: explore simplification tactics breadth-first across
//! arguments until the failing input reaches a local minimum.

use std::any::Any;

use crate::autoshrink;
use crate::hooks::{
    ShrinkPostInfo, ShrinkPostRes, ShrinkPostState, ShrinkPreInfo, ShrinkPreRes,
    ShrinkTrialPostInfo, ShrinkTrialPostRes,
};
use crate::pool::BitPool;
use crate::random::Gen;
use crate::runner::{RunError, Runner, TRACE};
use crate::trial::ArgKind;
use crate::types::{ShrinkError, TrialRes};

enum ArgShrinkRes {
    /// A simpler failing input was committed; keep working on this
    /// argument.
    Shrunk,
    /// No tactic made progress on this argument.
    DeadEnd,
    /// A hook asked to stop shrinking entirely.
    Halt,
}

impl Runner {
    /// Attempt to simplify all arguments, breadth first, continuing as
    /// long as any argument makes progress.
    pub(crate) fn shrink_failure(&mut self) -> Result<(), RunError> {
        loop {
            let mut progress = false;
            // Greedily simplify each argument as much as possible before
            // switching to the next.
            for arg_i in 0..self.type_info.len() {
                if !self.type_info[arg_i].shrinkable() {
                    continue;
                }
                loop {
                    match self.attempt_to_shrink_arg(arg_i)? {
                        ArgShrinkRes::Shrunk => progress = true,
                        ArgShrinkRes::Halt => return Ok(()),
                        ArgShrinkRes::DeadEnd => break,
                    }
                }
            }
            if !progress {
                return Ok(());
            }
        }
    }

    /// Try tactics in order against one argument until one of them commits
    /// a simpler failing input, or they run out.
    ///
    /// A candidate only replaces the current instance if the property
    /// still fails on it; when the property passes or skips, the previous
    /// instance is restored. Candidates whose argument tuple the bloom
    /// filter has already seen are skipped outright.
    fn attempt_to_shrink_arg(&mut self, arg_i: usize) -> Result<ArgShrinkRes, RunError> {
        let use_autoshrink = self.type_info[arg_i].uses_autoshrink();

        for tactic in 0..u32::MAX {
            verbose_message!(self, TRACE, "shrinking arg {}, tactic {}", arg_i, tactic);

            match self.call_shrink_pre(arg_i, tactic) {
                ShrinkPreRes::Continue => {}
                ShrinkPreRes::Halt => return Ok(ArgShrinkRes::Halt),
                ShrinkPreRes::Error => return Err(RunError::Fatal),
            }

            let outcome: Result<(Box<dyn Any>, Option<BitPool>), ShrinkError> = if use_autoshrink {
                let info = &self.type_info[arg_i];
                let env = match &mut self.trial.args[arg_i].kind {
                    ArgKind::Autoshrink(env) => env,
                    ArgKind::Basic => unreachable!("autoshrink arg without env"),
                };
                autoshrink::shrink(env, &mut self.random, info, tactic)
                    .map(|(instance, pool)| (instance, Some(pool)))
            } else {
                let info = &self.type_info[arg_i];
                let current = self.trial.args[arg_i]
                    .instance
                    .as_deref()
                    .expect("argument instance missing");
                let shrink_fn = info.shrink.as_ref().expect("shrinkable without autoshrink");
                let mut gen = Gen::new(&mut self.random);
                shrink_fn(&mut gen, current, tactic).map(|instance| (instance, None))
            };

            self.trial.shrink_count += 1;

            let state = match &outcome {
                Ok(_) => ShrinkPostState::Shrunk,
                Err(ShrinkError::NoMoreTactics) => ShrinkPostState::DoneShrinking,
                Err(_) => ShrinkPostState::ShrinkFailed,
            };
            let candidate_view = outcome.as_ref().ok().map(|(instance, _)| instance.as_ref());
            if self.call_shrink_post(arg_i, tactic, state, candidate_view)
                != ShrinkPostRes::Continue
            {
                return Err(RunError::Fatal);
            }

            let (candidate, candidate_pool) = match outcome {
                Ok(pair) => pair,
                Err(ShrinkError::DeadEnd) => continue,
                Err(ShrinkError::NoMoreTactics) => return Ok(ArgShrinkRes::DeadEnd),
                Err(ShrinkError::Fail) => return Err(RunError::Fatal),
            };

            // Install the candidate tentatively; hold on to the previous
            // instance (and pool) in case this shrink has to be reverted.
            let prev_instance = self.trial.args[arg_i].instance.replace(candidate);
            let prev_pool = match &mut self.trial.args[arg_i].kind {
                ArgKind::Autoshrink(env) => {
                    let prev = env.pool.take();
                    env.pool = candidate_pool;
                    prev
                }
                ArgKind::Basic => None,
            };

            if self.bloom.is_some() {
                if self.check_called() {
                    // Probably already tried: revert and move on.
                    self.trial.args[arg_i].instance = prev_instance;
                    if let ArgKind::Autoshrink(env) = &mut self.trial.args[arg_i].kind {
                        env.pool = prev_pool;
                    }
                    continue;
                }
                self.mark_called();
            }

            let mut repeated = false;
            let result = loop {
                let result = self.call_property()?;
                if !repeated {
                    if result == TrialRes::Fail {
                        self.trial.successful_shrinks += 1;
                        self.update_autoshrink_model(arg_i, result, 3);
                    } else {
                        self.trial.failed_shrinks += 1;
                    }
                }
                match self.call_shrink_trial_post(arg_i, tactic, result) {
                    ShrinkTrialPostRes::Continue => break result,
                    ShrinkTrialPostRes::RepeatOnce if repeated => break result,
                    ShrinkTrialPostRes::Repeat | ShrinkTrialPostRes::RepeatOnce => {
                        repeated = true;
                    }
                    ShrinkTrialPostRes::Error => return Err(RunError::Fatal),
                }
            };

            self.update_autoshrink_model(arg_i, result, 8);

            match result {
                TrialRes::Pass | TrialRes::Skip => {
                    // The candidate no longer fails: revert to the
                    // previous baseline and try another tactic.
                    self.trial.args[arg_i].instance = prev_instance;
                    if let ArgKind::Autoshrink(env) = &mut self.trial.args[arg_i].kind {
                        env.pool = prev_pool;
                    }
                }
                TrialRes::Fail => {
                    // Commit: the candidate is the new baseline, and the
                    // previous instance and pool are dropped here.
                    return Ok(ArgShrinkRes::Shrunk);
                }
                TrialRes::Dup | TrialRes::Error => return Err(RunError::Fatal),
            }
        }

        Ok(ArgShrinkRes::DeadEnd)
    }

    fn update_autoshrink_model(&mut self, arg_i: usize, result: TrialRes, adjustment: u8) {
        if let ArgKind::Autoshrink(env) = &mut self.trial.args[arg_i].kind {
            autoshrink::update_model(env, result, adjustment);
        }
    }

    fn call_shrink_pre(&mut self, arg_index: usize, tactic: u32) -> ShrinkPreRes {
        if self.hooks.shrink_pre.is_none() {
            return ShrinkPreRes::Continue;
        }
        let arg = self.trial.args[arg_index]
            .instance
            .as_deref()
            .expect("argument instance missing");
        let info = ShrinkPreInfo {
            prop_name: self.name.as_deref(),
            total_trials: self.trials,
            trial_id: self.trial.trial_id,
            failures: self.counters.fail,
            run_seed: self.run_seed,
            trial_seed: self.trial.seed,
            shrink_count: self.trial.shrink_count,
            successful_shrinks: self.trial.successful_shrinks,
            failed_shrinks: self.trial.failed_shrinks,
            arg_index,
            arg,
            tactic,
        };
        (self.hooks.shrink_pre.as_mut().expect("checked above"))(&info)
    }

    fn call_shrink_post(
        &mut self,
        arg_index: usize,
        tactic: u32,
        state: ShrinkPostState,
        candidate: Option<&dyn Any>,
    ) -> ShrinkPostRes {
        if self.hooks.shrink_post.is_none() {
            return ShrinkPostRes::Continue;
        }
        let arg = match candidate {
            Some(candidate) => candidate,
            None => self.trial.args[arg_index]
                .instance
                .as_deref()
                .expect("argument instance missing"),
        };
        let info = ShrinkPostInfo {
            prop_name: self.name.as_deref(),
            total_trials: self.trials,
            trial_id: self.trial.trial_id,
            run_seed: self.run_seed,
            trial_seed: self.trial.seed,
            shrink_count: self.trial.shrink_count,
            successful_shrinks: self.trial.successful_shrinks,
            failed_shrinks: self.trial.failed_shrinks,
            arg_index,
            arg,
            tactic,
            state,
        };
        (self.hooks.shrink_post.as_mut().expect("checked above"))(&info)
    }

    fn call_shrink_trial_post(
        &mut self,
        arg_index: usize,
        tactic: u32,
        result: TrialRes,
    ) -> ShrinkTrialPostRes {
        if self.hooks.shrink_trial_post.is_none() {
            return ShrinkTrialPostRes::Continue;
        }
        let views = self.trial.arg_views();
        let info = ShrinkTrialPostInfo {
            prop_name: self.name.as_deref(),
            total_trials: self.trials,
            trial_id: self.trial.trial_id,
            failures: self.counters.fail,
            run_seed: self.run_seed,
            trial_seed: self.trial.seed,
            shrink_count: self.trial.shrink_count,
            successful_shrinks: self.trial.successful_shrinks,
            failed_shrinks: self.trial.failed_shrinks,
            arg_index,
            args: &views,
            tactic,
            result,
        };
        (self.hooks.shrink_trial_post.as_mut().expect("checked above"))(&info)
    }
}
