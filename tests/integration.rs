//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end runs of the public API.

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;

use assert_matches::assert_matches;

use shrinkray::hooks::{
    CounterexampleRes, GenArgsPreRes, RunPostRes, RunReport, TrialPostRes, TrialPreRes,
};
use shrinkray::prelude::*;
use shrinkray::types::ShrinkError;

fn quiet(config: Config) -> Config {
    config.output(io::sink())
}

#[test]
fn passing_property_passes() {
    let config = quiet(
        Config::new()
            .name("bitmask is idempotent")
            .type_info(builtin::scalar::<u32>())
            .prop1(|x| {
                let x = *x.downcast_ref::<u32>().unwrap();
                if (x & 0xff) == ((x & 0xff) & 0xff) {
                    TrialRes::Pass
                } else {
                    TrialRes::Fail
                }
            }),
    );
    assert_eq!(run(config), Ok(RunStatus::Pass));
}

#[test]
fn squared_upper_bound_fails_and_shrinks() {
    // x^2 <= y does not hold; the reported counter-example must violate
    // it, which pins |x| >= ceil(sqrt(y + 1)).
    let captured: Rc<RefCell<Option<(i8, u16)>>> = Rc::new(RefCell::new(None));
    let capture = Rc::clone(&captured);

    let config = quiet(
        Config::new()
            .trials(500)
            .seed(0x1234_5678)
            .type_info(builtin::scalar::<i8>())
            .type_info(builtin::scalar::<u16>())
            .prop2(|x, y| {
                let x = *x.downcast_ref::<i8>().unwrap();
                let y = *y.downcast_ref::<u16>().unwrap();
                if i32::from(x) * i32::from(x) <= i32::from(y) {
                    TrialRes::Pass
                } else {
                    TrialRes::Fail
                }
            })
            .counterexample(move |info| {
                let x = *info.args[0].downcast_ref::<i8>().unwrap();
                let y = *info.args[1].downcast_ref::<u16>().unwrap();
                *capture.borrow_mut() = Some((x, y));
                CounterexampleRes::Continue
            }),
    );

    assert_eq!(run(config), Ok(RunStatus::Fail));
    let (x, y) = (*captured.borrow()).expect("a counter-example was reported");
    let squared = i32::from(x) * i32::from(x);
    assert!(squared > i32::from(y), "({}, {}) does not fail", x, y);
}

#[test]
fn duplicate_element_lists_shrink_to_a_minimal_pair() {
    let captured: Rc<RefCell<Option<Vec<u8>>>> = Rc::new(RefCell::new(None));
    let capture = Rc::clone(&captured);

    let config = quiet(
        Config::new()
            .trials(1000)
            .seed(12345)
            .type_info(builtin::byte_vec())
            .prop1(|list| {
                let list = list.downcast_ref::<Vec<u8>>().unwrap();
                for i in 0..list.len() {
                    for j in i + 1..list.len() {
                        if list[i] == list[j] {
                            return TrialRes::Fail;
                        }
                    }
                }
                TrialRes::Pass
            })
            .counterexample(move |info| {
                // Later failing trials can stall against tuples the bloom
                // filter already saw; judge the best-shrunk report.
                let list = info.args[0].downcast_ref::<Vec<u8>>().unwrap();
                let mut best = capture.borrow_mut();
                let better = best.as_ref().map_or(true, |b: &Vec<u8>| list.len() < b.len());
                if better {
                    *best = Some(list.clone());
                }
                CounterexampleRes::Continue
            }),
    );

    assert_eq!(run(config), Ok(RunStatus::Fail));
    let list = captured.borrow().clone().expect("a counter-example");
    assert_eq!(list.len(), 2, "not fully shrunk: {:?}", list);
    assert_eq!(list[0], list[1]);
}

#[test]
fn overconstrained_bool_tautology_fails_twice_and_dups_the_rest() {
    // The property fails for both values of a hashable bool, so only the
    // first two distinct trials run: everything else is a duplicate.
    let report: Rc<RefCell<Option<RunReport>>> = Rc::new(RefCell::new(None));
    let capture = Rc::clone(&report);

    let config = quiet(
        Config::new()
            .trials(100)
            .type_info(builtin::boolean())
            .prop1(|_| TrialRes::Fail)
            .run_post(move |info| {
                *capture.borrow_mut() = Some(info.report);
                RunPostRes::Continue
            }),
    );

    assert_eq!(run(config), Ok(RunStatus::Fail));
    let report = (*report.borrow()).expect("run_post fired");
    assert_eq!(report.fail, 2);
    assert_eq!(report.dup, 98);
    assert_eq!(report.pass, 0);
    assert_eq!(report.skip, 0);
}

#[test]
fn overconstrained_generators_mostly_deduplicate() {
    // Only 8 distinct values exist, so at least trials - 8 of the 100
    // trials must be recognized as duplicates.
    let report: Rc<RefCell<Option<RunReport>>> = Rc::new(RefCell::new(None));
    let capture = Rc::clone(&report);

    let config = quiet(
        Config::new()
            .trials(100)
            .type_info(builtin::scalar_less_than::<u8>(8))
            .prop1(|_| TrialRes::Pass)
            .run_post(move |info| {
                *capture.borrow_mut() = Some(info.report);
                RunPostRes::Continue
            }),
    );

    assert_eq!(run(config), Ok(RunStatus::Pass));
    let report = (*report.borrow()).expect("run_post fired");
    assert!(report.dup >= 92, "only {} dups", report.dup);
    assert_eq!(report.pass + report.dup + report.skip, 100);
}

#[test]
fn always_seeds_run_before_the_configured_seed() {
    let seeds: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
    let capture = Rc::clone(&seeds);

    let config = quiet(
        Config::new()
            .trials(5)
            .seed(0x9999)
            .always_seeds(vec![0xaaaa, 0xbbbb])
            .type_info(builtin::scalar::<u64>())
            .prop1(|_| TrialRes::Pass)
            .gen_args_pre(move |info| {
                capture.borrow_mut().push(info.trial_seed);
                GenArgsPreRes::Continue
            }),
    );

    assert_eq!(run(config), Ok(RunStatus::Pass));
    let seeds = seeds.borrow();
    assert_eq!(seeds.len(), 5);
    assert_eq!(seeds[0], 0xaaaa);
    assert_eq!(seeds[1], 0xbbbb);
    assert_eq!(seeds[2], 0x9999);
    // The rest are chained from the PRNG; just make sure they moved on.
    assert_ne!(seeds[3], 0x9999);
}

#[test]
fn runs_are_reproducible_from_the_seed() {
    fn one_run() -> (Vec<u64>, RunReport) {
        let seeds: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
        let report: Rc<RefCell<Option<RunReport>>> = Rc::new(RefCell::new(None));
        let seed_capture = Rc::clone(&seeds);
        let report_capture = Rc::clone(&report);

        let config = quiet(
            Config::new()
                .trials(50)
                .seed(0xfeed_beef)
                .type_info(builtin::scalar::<u16>())
                .prop1(|x| {
                    let x = *x.downcast_ref::<u16>().unwrap();
                    if x & 0x7 == 0 {
                        TrialRes::Fail
                    } else {
                        TrialRes::Pass
                    }
                })
                .gen_args_pre(move |info| {
                    seed_capture.borrow_mut().push(info.trial_seed);
                    GenArgsPreRes::Continue
                })
                .run_post(move |info| {
                    *report_capture.borrow_mut() = Some(info.report);
                    RunPostRes::Continue
                }),
        );
        assert_eq!(run(config), Ok(RunStatus::Fail));

        let seeds = seeds.borrow().clone();
        let report = (*report.borrow()).expect("run_post fired");
        (seeds, report)
    }

    assert_eq!(one_run(), one_run());
}

#[test]
fn custom_shrink_callbacks_converge_to_the_boundary() {
    // Tactic 0 halves, tactic 1 decrements; the smallest value still
    // failing "x < 5" is exactly 5.
    fn halving_u32() -> TypeInfo {
        TypeInfo::new(|gen| Ok(Box::new(gen.bits(32) as u32)))
            .hash(|x| *x.downcast_ref::<u32>().unwrap() as u64)
            .shrink(|_, x, tactic| {
                let x = *x.downcast_ref::<u32>().unwrap();
                if x == 0 {
                    return Err(ShrinkError::NoMoreTactics);
                }
                match tactic {
                    0 => Ok(Box::new(x / 2)),
                    1 => Ok(Box::new(x - 1)),
                    _ => Err(ShrinkError::NoMoreTactics),
                }
            })
    }

    let captured: Rc<RefCell<Option<u32>>> = Rc::new(RefCell::new(None));
    let capture = Rc::clone(&captured);

    let config = quiet(
        Config::new()
            // A single trial: a second failing trial would find the values
            // along the shrink path already marked in the bloom filter.
            .trials(1)
            .seed(0x5eed_1234)
            .type_info(halving_u32())
            .prop1(|x| {
                if *x.downcast_ref::<u32>().unwrap() >= 5 {
                    TrialRes::Fail
                } else {
                    TrialRes::Pass
                }
            })
            .counterexample(move |info| {
                *capture.borrow_mut() = Some(*info.args[0].downcast_ref::<u32>().unwrap());
                CounterexampleRes::Continue
            }),
    );

    assert_eq!(run(config), Ok(RunStatus::Fail));
    assert_eq!((*captured.borrow()).expect("a counter-example"), 5);
}

#[test]
fn gen_args_pre_halt_stops_the_run_cleanly() {
    let calls = Rc::new(Cell::new(0usize));
    let count = Rc::clone(&calls);

    let config = quiet(
        Config::new()
            .trials(100)
            .type_info(builtin::scalar::<u64>())
            .prop1(move |_| {
                count.set(count.get() + 1);
                TrialRes::Pass
            })
            .gen_args_pre(|info| {
                if info.trial_id == 3 {
                    GenArgsPreRes::Halt
                } else {
                    GenArgsPreRes::Continue
                }
            }),
    );

    assert_eq!(run(config), Ok(RunStatus::Pass));
    assert_eq!(calls.get(), 3);
}

#[test]
fn trial_pre_halt_stops_before_the_first_property_call() {
    let calls = Rc::new(Cell::new(0usize));
    let count = Rc::clone(&calls);

    let config = quiet(
        Config::new()
            .type_info(builtin::scalar::<u64>())
            .prop1(move |_| {
                count.set(count.get() + 1);
                TrialRes::Pass
            })
            .trial_pre(|_| TrialPreRes::Halt),
    );

    assert_eq!(run(config), Ok(RunStatus::Skip));
    assert_eq!(calls.get(), 0);
}

#[test]
fn trial_post_repeat_once_reruns_the_trial() {
    let calls = Rc::new(Cell::new(0usize));
    let count = Rc::clone(&calls);

    let config = quiet(
        Config::new()
            .trials(1)
            .type_info(builtin::scalar::<u64>())
            .prop1(move |_| {
                count.set(count.get() + 1);
                TrialRes::Pass
            })
            .trial_post(|info| {
                if info.repeat {
                    TrialPostRes::Continue
                } else {
                    TrialPostRes::RepeatOnce
                }
            }),
    );

    assert_eq!(run(config), Ok(RunStatus::Pass));
    assert_eq!(calls.get(), 2);
}

#[test]
fn skipped_allocations_count_as_skips() {
    let config = quiet(
        Config::new()
            .type_info(TypeInfo::new(|gen| {
                if gen.bits(2) == 0 {
                    Err(AllocError::Skip)
                } else {
                    Ok(Box::new(gen.bits(8)))
                }
            }))
            .prop1(|_| TrialRes::Pass),
    );
    // Some trials pass, some skip, and without hash support there is no
    // dedup to get in the way.
    let report: Rc<RefCell<Option<RunReport>>> = Rc::new(RefCell::new(None));
    let capture = Rc::clone(&report);
    let config = config.run_post(move |info| {
        *capture.borrow_mut() = Some(info.report);
        RunPostRes::Continue
    });

    assert_eq!(run(config), Ok(RunStatus::Pass));
    let report = (*report.borrow()).expect("run_post fired");
    assert!(report.skip > 0);
    assert!(report.pass > 0);
    assert_eq!(report.dup, 0);
    assert_eq!(report.pass + report.skip, 100);
}

#[test]
fn skipping_properties_count_as_skips() {
    let config = quiet(
        Config::new()
            .type_info(TypeInfo::new(|gen| Ok(Box::new(gen.bits(8)))))
            .prop1(|x| {
                if *x.downcast_ref::<u64>().unwrap() & 1 == 0 {
                    TrialRes::Skip
                } else {
                    TrialRes::Pass
                }
            }),
    );
    assert_eq!(run(config), Ok(RunStatus::Pass));
}

#[test]
fn config_without_a_property_is_rejected() {
    let config = Config::new().type_info(builtin::scalar::<u8>());
    assert_matches!(run(config), Err(RunError::BadArgs(_)));
}

#[test]
fn config_without_type_info_is_rejected() {
    let config = Config::new().prop1(|_| TrialRes::Pass);
    assert_matches!(run(config), Err(RunError::BadArgs(_)));
}

#[test]
fn arity_mismatch_is_rejected() {
    let config = Config::new()
        .type_info(builtin::scalar::<u8>())
        .type_info(builtin::scalar::<u8>())
        .prop1(|_| TrialRes::Pass);
    assert_matches!(run(config), Err(RunError::BadArgs(_)));
}

#[test]
fn shrink_callback_and_autoshrink_are_mutually_exclusive() {
    let info = TypeInfo::new(|gen| Ok(Box::new(gen.bits(8))))
        .shrink(|_, _, _| Err(ShrinkError::NoMoreTactics))
        .autoshrink(AutoshrinkConfig::default());
    let config = Config::new().type_info(info).prop1(|_| TrialRes::Pass);
    assert_matches!(run(config), Err(RunError::BadArgs(_)));
}

#[test]
fn erroring_property_halts_the_run() {
    let config = quiet(
        Config::new()
            .type_info(builtin::scalar::<u8>())
            .prop1(|_| TrialRes::Error),
    );
    assert_eq!(run(config), Err(RunError::Fatal));
}

#[test]
fn generate_prints_one_reproducible_instance() {
    let mut first = Vec::new();
    let res = generate(&mut first, 0xabcd, &builtin::scalar::<u32>()).unwrap();
    assert_eq!(res, GenerateRes::Generated);
    let text = String::from_utf8(first).unwrap();
    assert!(text.contains("Seed"), "missing header: {:?}", text);

    let mut second = Vec::new();
    generate(&mut second, 0xabcd, &builtin::scalar::<u32>()).unwrap();
    assert_eq!(text, String::from_utf8(second).unwrap());

    let mut other = Vec::new();
    generate(&mut other, 0xdcba, &builtin::scalar::<u32>()).unwrap();
    assert_ne!(text, String::from_utf8(other).unwrap());
}

struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn default_reporting_prints_the_counterexample() {
    let buf = Rc::new(RefCell::new(Vec::new()));
    let config = Config::new()
        .trials(1)
        .type_info(builtin::scalar::<u8>())
        .prop1(|_| TrialRes::Fail)
        .output(SharedBuf(Rc::clone(&buf)));

    assert_eq!(run(config), Ok(RunStatus::Fail));
    let text = String::from_utf8(buf.borrow().clone()).unwrap();
    assert!(text.contains("PROP"), "{}", text);
    assert!(text.contains("Counter-Example"), "{}", text);
    assert!(text.contains("fail 1"), "{}", text);
}

#[test]
fn autoshrink_reaches_a_local_minimum_for_scalars() {
    // Failing inputs are the odd numbers; the minimal one is 1.
    let captured: Rc<RefCell<Option<u8>>> = Rc::new(RefCell::new(None));
    let capture = Rc::clone(&captured);

    let config = quiet(
        Config::new()
            .trials(50)
            .seed(0xd00d)
            .type_info(builtin::scalar::<u8>())
            .prop1(|x| {
                if *x.downcast_ref::<u8>().unwrap() & 1 == 1 {
                    TrialRes::Fail
                } else {
                    TrialRes::Pass
                }
            })
            .counterexample(move |info| {
                let value = *info.args[0].downcast_ref::<u8>().unwrap();
                let mut best = capture.borrow_mut();
                if best.map_or(true, |b| value < b) {
                    *best = Some(value);
                }
                CounterexampleRes::Continue
            }),
    );

    assert_eq!(run(config), Ok(RunStatus::Fail));
    let minimal = (*captured.borrow()).expect("a counter-example");
    assert_eq!(minimal & 1, 1);
    assert!(minimal <= 15, "poorly shrunk: {}", minimal);
}
