//-
// Copyright 2026 The shrinkray developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Calling the property: directly, or in a forked worker process.
//!
//! In forked mode the child runs the property and writes a single status
//! byte back through a pipe; the parent polls the pipe with the configured
//! timeout. A child that hangs is signalled, given a grace period to exit,
//! and then killed. The parent reaps children non-blockingly between forks
//! so zombies don't accumulate.

use crate::runner::Runner;
use crate::trial::ArgKind;
use crate::types::TrialRes;

#[cfg(all(feature = "fork", unix))]
use crate::runner::RunError;

impl Runner {
    pub(crate) fn call_property(&mut self) -> Result<TrialRes, crate::runner::RunError> {
        if self.fork.enable {
            #[cfg(all(feature = "fork", unix))]
            {
                return self.fork_call();
            }
            #[cfg(not(all(feature = "fork", unix)))]
            unreachable!("fork mode rejected at init");
        }
        Ok(self.call_inner())
    }

    fn call_inner(&mut self) -> TrialRes {
        let views = self.trial.arg_views();
        self.prop.call(&views)
    }

    /// Hashes of all arguments, packed into one bloom filter key.
    fn arg_hash_buffer(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 * self.type_info.len());
        for (i, arg) in self.trial.args.iter().enumerate() {
            let info = &self.type_info[i];
            let instance = arg.instance.as_deref().expect("argument instance missing");
            let hash = match &arg.kind {
                ArgKind::Autoshrink(env) => crate::autoshrink::hash(env, instance, info),
                ArgKind::Basic => {
                    (info.hash.as_ref().expect("bloom requires hashable args"))(instance)
                }
            };
            buf.extend_from_slice(&hash.to_le_bytes());
        }
        buf
    }

    /// Has this combination of argument instances probably been tried?
    pub(crate) fn check_called(&self) -> bool {
        let buf = self.arg_hash_buffer();
        self.bloom.as_ref().map_or(false, |b| b.check(&buf))
    }

    /// Record this combination of argument instances as tried.
    pub(crate) fn mark_called(&mut self) {
        let buf = self.arg_hash_buffer();
        if let Some(bloom) = &mut self.bloom {
            bloom.mark(&buf);
        }
    }
}

#[cfg(all(feature = "fork", unix))]
mod forked {
    use std::io;
    use std::process;

    use super::*;
    use crate::config::DEF_EXIT_TIMEOUT_MS;
    use crate::hooks::{ForkPostInfo, ForkPostRes};
    use crate::runner::TRACE;

    /// Give up re-forking under EAGAIN once the backoff reaches 2^10 ns.
    const MAX_FORK_RETRIES: u32 = 10;

    /// Milliseconds a SIGKILLed worker gets to actually exit.
    const KILL_TIMEOUT_MS: u64 = 10;

    #[derive(PartialEq)]
    enum WorkerState {
        Active,
        Stopped,
    }

    struct Worker {
        pid: libc::pid_t,
        state: WorkerState,
        wstatus: libc::c_int,
    }

    impl Runner {
        pub(super) fn fork_call(&mut self) -> Result<TrialRes, RunError> {
            let mut fds = [0i32; 2];
            if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
                return Err(RunError::Fatal);
            }

            let mut backoff_ns: i64 = 1;
            let pid = loop {
                let pid = unsafe { libc::fork() };
                if pid != -1 {
                    break pid;
                }
                if last_errno() == Some(libc::EAGAIN) {
                    // Forking is probably failing under RLIMIT_NPROC
                    // pressure: reap terminated children, back off, retry.
                    let mut reaper = Worker {
                        pid: -1,
                        state: WorkerState::Active,
                        wstatus: 0,
                    };
                    if !reap_children(&mut reaper) {
                        close_pipe(&fds);
                        return Err(RunError::Fatal);
                    }
                    nanosleep_ns(backoff_ns);
                    if backoff_ns >= 1 << MAX_FORK_RETRIES {
                        close_pipe(&fds);
                        return Err(RunError::Fatal);
                    }
                    backoff_ns <<= 1;
                } else {
                    close_pipe(&fds);
                    return Err(RunError::Fatal);
                }
            };

            if pid == 0 {
                // Child: run the property, write one status byte, exit.
                unsafe { libc::close(fds[0]) };
                let out_fd = fds[1];
                if self.call_fork_post() == ForkPostRes::Error {
                    write_result_byte(out_fd, TrialRes::Error);
                    process::exit(1);
                }
                let res = self.call_inner();
                let wrote = write_result_byte(out_fd, res);
                process::exit(if wrote && res == TrialRes::Pass { 0 } else { 1 });
            }

            // Parent.
            unsafe { libc::close(fds[1]) };
            let mut worker = Worker {
                pid,
                state: WorkerState::Active,
                wstatus: 0,
            };
            let res = self.handle_child_call(&mut worker, fds[0]);
            unsafe { libc::close(fds[0]) };
            if !reap_children(&mut worker) {
                return Err(RunError::Fatal);
            }
            res
        }

        fn handle_child_call(
            &mut self,
            worker: &mut Worker,
            fd: i32,
        ) -> Result<TrialRes, RunError> {
            let mut pfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            let timeout = if self.fork.timeout == 0 {
                -1
            } else {
                self.fork.timeout as libc::c_int
            };

            let poll_res = loop {
                let res = unsafe { libc::poll(&mut pfd, 1, timeout) };
                if res == -1 {
                    match last_errno() {
                        Some(libc::EAGAIN) | Some(libc::EINTR) => continue,
                        _ => return Err(RunError::Fatal),
                    }
                }
                break res;
            };

            if poll_res == 0 {
                // Timed out. Signal the child, give it a grace period to
                // exit voluntarily, then SIGKILL it.
                let signal = if self.fork.signal == 0 {
                    libc::SIGTERM
                } else {
                    self.fork.signal
                };
                verbose_message!(
                    self,
                    TRACE,
                    "worker {} timed out, sending signal {}",
                    worker.pid,
                    signal
                );
                if unsafe { libc::kill(worker.pid, signal) } == -1 {
                    return Err(RunError::Fatal);
                }

                let exit_timeout = if self.fork.exit_timeout == 0 {
                    DEF_EXIT_TIMEOUT_MS
                } else {
                    self.fork.exit_timeout
                };
                if !wait_for_exit(worker, exit_timeout, KILL_TIMEOUT_MS) {
                    return Err(RunError::Fatal);
                }

                // If the child exited successfully anyway, it just lost a
                // race with the timeout: count it as a pass.
                if worker.state == WorkerState::Stopped {
                    let st = worker.wstatus;
                    if libc::WIFEXITED(st) && libc::WEXITSTATUS(st) == 0 {
                        return Ok(TrialRes::Pass);
                    }
                }
                return Ok(TrialRes::Fail);
            }

            // Readable, or closed: read the status byte.
            let mut byte = 0xffu8;
            let rd = loop {
                let rd =
                    unsafe { libc::read(fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
                if rd == -1 {
                    if last_errno() == Some(libc::EINTR) {
                        continue;
                    }
                    return Err(RunError::Fatal);
                }
                break rd;
            };

            if rd == 0 {
                // Closed without a response: the child crashed.
                return Ok(TrialRes::Fail);
            }
            match TrialRes::from_byte(byte) {
                Some(res) => Ok(res),
                None => Err(RunError::Fatal),
            }
        }

        fn call_fork_post(&mut self) -> ForkPostRes {
            if self.hooks.fork_post.is_none() {
                return ForkPostRes::Continue;
            }
            let views = self.trial.arg_views();
            let info = ForkPostInfo {
                prop_name: self.name.as_deref(),
                total_trials: self.trials,
                failures: self.counters.fail,
                run_seed: self.run_seed,
                args: &views,
            };
            (self.hooks.fork_post.as_mut().expect("checked above"))(&info)
        }
    }

    fn last_errno() -> Option<i32> {
        io::Error::last_os_error().raw_os_error()
    }

    fn close_pipe(fds: &[i32; 2]) {
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    fn write_result_byte(fd: i32, res: TrialRes) -> bool {
        let byte = res.to_byte();
        let wrote = unsafe { libc::write(fd, &byte as *const u8 as *const libc::c_void, 1) };
        wrote == 1
    }

    fn nanosleep_ns(ns: i64) {
        let ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: ns as libc::c_long,
        };
        unsafe { libc::nanosleep(&ts, std::ptr::null_mut()) };
    }

    /// Clean up after any child processes that have changed state, saving
    /// the worker's exit status if it is among them.
    fn reap_children(worker: &mut Worker) -> bool {
        loop {
            let mut wstatus = 0;
            let res = unsafe { libc::waitpid(-1, &mut wstatus, libc::WNOHANG) };
            if res == -1 {
                // ECHILD: no children at all.
                return last_errno() == Some(libc::ECHILD);
            } else if res == 0 {
                // No children have changed state.
                return true;
            } else if res == worker.pid {
                worker.state = WorkerState::Stopped;
                worker.wstatus = wstatus;
            }
        }
    }

    /// Wait up to `timeout` ms for the worker to exit; at the deadline,
    /// SIGKILL it and wait up to `kill_timeout` ms more.
    fn wait_for_exit(worker: &mut Worker, timeout: u64, kill_timeout: u64) -> bool {
        for i in 0..timeout + kill_timeout {
            if !reap_children(worker) {
                return false;
            }
            if worker.state == WorkerState::Stopped {
                break;
            }
            if i == timeout {
                let res = unsafe { libc::kill(worker.pid, libc::SIGKILL) };
                if res == -1 && last_errno() != Some(libc::ESRCH) {
                    // ESRCH means the process just exited on its own;
                    // waitpid will pick it up.
                    return false;
                }
            }
            nanosleep_ns(1_000_000);
        }
        true
    }
}
