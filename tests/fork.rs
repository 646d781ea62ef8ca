//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Forked-worker dispatch: timeouts, crashes, and zombie reaping.

#![cfg(all(unix, feature = "fork"))]

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use shrinkray::hooks::CounterexampleRes;
use shrinkray::prelude::*;

// The zombie checks below reap with waitpid(-1, ..), which would race
// against another forking test on a sibling thread.
static FORK_LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    FORK_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn assert_no_zombies() {
    let res = unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) };
    let echild = res == -1
        && io::Error::last_os_error().raw_os_error() == Some(libc::ECHILD);
    assert!(res == 0 || echild, "unreaped child: waitpid returned {}", res);
}

#[test]
fn forked_trials_pass_through_worker_results() {
    let _guard = serial();
    let config = Config::new()
        .trials(5)
        .fork(ForkConfig {
            enable: true,
            ..ForkConfig::default()
        })
        .type_info(builtin::scalar::<u32>())
        .prop1(|_| TrialRes::Pass)
        .output(io::sink());

    assert_eq!(run(config), Ok(RunStatus::Pass));
    assert_no_zombies();
}

#[test]
fn hung_property_times_out_as_a_failure() {
    let _guard = serial();
    let config = Config::new()
        .trials(1)
        .fork(ForkConfig {
            enable: true,
            timeout: 50,
            signal: 0, // SIGTERM
            exit_timeout: 10,
        })
        .type_info(builtin::boolean())
        .prop1(|_| loop {
            std::hint::spin_loop();
        })
        .output(io::sink());

    let start = Instant::now();
    assert_eq!(run(config), Ok(RunStatus::Fail));
    // 50ms timeout + 10ms grace, with room for scheduling slop.
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "took {:?}",
        start.elapsed()
    );
    assert_no_zombies();
}

#[test]
fn crashing_property_is_reported_as_a_failure() {
    let _guard = serial();
    let config = Config::new()
        .trials(1)
        .fork(ForkConfig {
            enable: true,
            ..ForkConfig::default()
        })
        .type_info(builtin::boolean())
        .prop1(|_| std::process::abort())
        .output(io::sink());

    assert_eq!(run(config), Ok(RunStatus::Fail));
    assert_no_zombies();
}

#[test]
fn forked_failures_still_shrink() {
    let _guard = serial();
    let captured: Rc<RefCell<Option<u8>>> = Rc::new(RefCell::new(None));
    let capture = Rc::clone(&captured);

    let config = Config::new()
        .trials(30)
        .seed(0xfaceb00c)
        .fork(ForkConfig {
            enable: true,
            ..ForkConfig::default()
        })
        .type_info(builtin::scalar::<u8>())
        .prop1(|x| {
            if *x.downcast_ref::<u8>().unwrap() & 1 == 1 {
                TrialRes::Fail
            } else {
                TrialRes::Pass
            }
        })
        .counterexample(move |info| {
            *capture.borrow_mut() = Some(*info.args[0].downcast_ref::<u8>().unwrap());
            CounterexampleRes::Continue
        })
        .output(io::sink());

    assert_eq!(run(config), Ok(RunStatus::Fail));
    let minimal = (*captured.borrow()).expect("a counter-example");
    assert_eq!(minimal & 1, 1);
    assert_no_zombies();
}
