//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The adaptive weight model deciding which shrink action to try next.
//!
//! Five actions mutate a candidate bit pool: dropping requests outright, or
//! shifting, masking, swapping, and subtracting from their bits. Each
//! carries a weight; actions that keep producing failing (still shrinking)
//! trials gain weight, actions that produce passing trials or change
//! nothing lose it.

use crate::types::TrialRes;

bitflags! {
    /// One shrink action, as a flag so sets of attempted/effective actions
    /// can be tracked per tactic.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Action: u8 {
        const DROP = 0x01;
        const SHIFT = 0x02;
        const MASK = 0x04;
        const SWAP = 0x08;
        const SUB = 0x10;
    }
}

/// A mutation pass action (drop is decided separately).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    Shift,
    Mask,
    Swap,
    Sub,
}

const WEIGHT_COUNT: usize = 5;

const W_DROP: usize = 0;
const W_SHIFT: usize = 1;
const W_MASK: usize = 2;
const W_SWAP: usize = 3;
const W_SUB: usize = 4;

pub(crate) const MODEL_MIN: u8 = 0x08;
pub(crate) const MODEL_MAX: u8 = 0x80;

const TWO_EVENLY: u8 = 0x80;
const FOUR_EVENLY: u8 = 0x40;

/// Limits the odds of dropping when there are only a few requests.
const DROP_WEIGHT_REQUEST_MUL: u64 = 8;

fn weight_index(action: Action) -> usize {
    if action == Action::DROP {
        W_DROP
    } else if action == Action::SHIFT {
        W_SHIFT
    } else if action == Action::MASK {
        W_MASK
    } else if action == Action::SWAP {
        W_SWAP
    } else if action == Action::SUB {
        W_SUB
    } else {
        unreachable!("not a single action")
    }
}

const ALL_ACTIONS: [Action; WEIGHT_COUNT] = [
    Action::DROP,
    Action::SHIFT,
    Action::MASK,
    Action::SWAP,
    Action::SUB,
];

pub(crate) struct Model {
    weights: [u8; WEIGHT_COUNT],
    /// Actions attempted during the current tactic.
    pub(crate) cur_tried: Action,
    /// Actions that actually changed the pool during the current tactic.
    pub(crate) cur_set: Action,
    /// Pin the next action instead of drawing one. Test scaffolding only.
    pub(crate) next_action: Option<Action>,
}

impl Model {
    pub(crate) fn new() -> Model {
        Model {
            weights: [
                TWO_EVENLY,
                FOUR_EVENLY,
                FOUR_EVENLY,
                FOUR_EVENLY - 0x10,
                FOUR_EVENLY,
            ],
            cur_tried: Action::empty(),
            cur_set: Action::empty(),
            next_action: None,
        }
    }

    pub(crate) fn start_tactic(&mut self) {
        self.cur_tried = Action::empty();
        self.cur_set = Action::empty();
    }

    /// Decide between a drop pass and a mutation pass.
    pub(crate) fn should_drop(
        &self,
        prng: &mut dyn FnMut(u8) -> u64,
        request_count: usize,
    ) -> bool {
        if let Some(action) = self.next_action {
            return action == Action::DROP;
        }
        let weight =
            u64::from(self.weights[W_DROP]).min(DROP_WEIGHT_REQUEST_MUL * request_count as u64);
        prng(8) < weight
    }

    /// Pick a mutation action by weight. Draws again until a draw lands
    /// below the cumulative total.
    pub(crate) fn weighted_mutation(&self, prng: &mut dyn FnMut(u8) -> u64) -> Mutation {
        if let Some(action) = self.next_action {
            return if action == Action::SHIFT {
                Mutation::Shift
            } else if action == Action::MASK {
                Mutation::Mask
            } else if action == Action::SWAP {
                Mutation::Swap
            } else if action == Action::SUB {
                Mutation::Sub
            } else {
                unreachable!("pinned action is not a mutation")
            };
        }

        let shift = u16::from(self.weights[W_SHIFT]);
        let mask = shift + u16::from(self.weights[W_MASK]);
        let swap = mask + u16::from(self.weights[W_SWAP]);
        let sub = swap + u16::from(self.weights[W_SUB]);

        let mut bit_count = 5;
        while (1u32 << bit_count) < u32::from(sub) {
            bit_count += 1;
        }
        debug_assert!(bit_count <= 16);

        loop {
            let bits = prng(bit_count) as u16;
            if bits < shift {
                return Mutation::Shift;
            } else if bits < mask {
                return Mutation::Mask;
            } else if bits < swap {
                return Mutation::Swap;
            } else if bits < sub {
                return Mutation::Sub;
            }
        }
    }

    /// Adapt the weights after a shrink trial.
    ///
    /// Actions that changed the pool gain `adjustment` when the candidate
    /// still failed (progress) and lose it when the candidate passed.
    /// Actions that were tried but changed nothing only ever lose weight.
    pub(crate) fn update(&mut self, result: TrialRes, adjustment: u8) {
        if self.cur_set.is_empty() {
            return;
        }
        let delta = if result == TrialRes::Fail {
            i16::from(adjustment)
        } else {
            -i16::from(adjustment)
        };

        for &action in &ALL_ACTIONS {
            let w = weight_index(action);
            let nv = if self.cur_set.contains(action) {
                Some(i16::from(self.weights[w]) + delta)
            } else if self.cur_tried.contains(action) && delta > 0 {
                // De-emphasize actions that produced no changes, but don't
                // reward them when the candidate passed.
                Some(i16::from(self.weights[w]) - delta)
            } else {
                None
            };
            if let Some(nv) = nv {
                self.weights[w] = nv.clamp(i16::from(MODEL_MIN), i16::from(MODEL_MAX)) as u8;
            }
        }

        let total: u16 = self.weights.iter().map(|&w| u16::from(w)).sum();
        if total < 0x80 {
            for w in self.weights.iter_mut() {
                *w *= 2;
            }
        } else if total > 0x100 && self.weights.iter().all(|w| w & 0x01 == 0) {
            for w in self.weights.iter_mut() {
                *w /= 2;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn weight_of(&self, action: Action) -> u8 {
        self.weights[weight_index(action)]
    }
}
