//! Keyboard signal routing.
//!
//! The shell's handlers for SIGTSTP and SIGINT only record that the signal
//! arrived. They are installed without `SA_RESTART`, so a blocked `waitpid`
//! returns `EINTR` and the foreground wait reads the flags there. That wait
//! is the one place where a signal can take effect; anything recorded while
//! nothing runs in the foreground is discarded before the next wait begins.

use crate::command::ExitCode;
use crate::error::ShellError;
use crate::jobs::{JobId, JobStatus, JobTable};
use crate::process::{ProcessHandle, ProcessStatus};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SETTLE_POLLS: u32 = 10;
const SETTLE_INTERVAL: Duration = Duration::from_millis(10);
const SLEEP_SLICE: Duration = Duration::from_millis(50);

static SUSPEND_PENDING: AtomicBool = AtomicBool::new(false);
static INTERRUPT_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn record_signal(signal: libc::c_int) {
    match signal {
        libc::SIGTSTP => SUSPEND_PENDING.store(true, Ordering::SeqCst),
        libc::SIGINT => INTERRUPT_PENDING.store(true, Ordering::SeqCst),
        _ => {}
    }
}

/// A keyboard interrupt from the terminal reaches the child too. Give it a
/// moment to act on it; returns true when the child has exited.
fn settle(handle: &mut ProcessHandle) -> bool {
    matches!(
        handle.poll_until_changed(SETTLE_POLLS, SETTLE_INTERVAL),
        ProcessStatus::Exited(_)
    )
}

/// Pass a stop request on to the child and report what it did with it.
fn forward_stop(handle: &mut ProcessHandle) -> ProcessStatus {
    if let Err(e) = handle.signal(Signal::SIGTSTP) {
        warn!(pid = %handle.pid(), error = %e, "could not forward stop");
    }
    handle.poll_until_changed(SETTLE_POLLS, SETTLE_INTERVAL)
}

fn continue_all(handles: &mut [ProcessHandle]) {
    for handle in handles.iter_mut().filter(|h| !h.is_done()) {
        if let Err(e) = handle.resume() {
            warn!(pid = %handle.pid(), error = %e, "could not continue stage");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardSignal {
    Suspend,
    Interrupt,
}

/// Process currently blocking the shell, with the text it was started from.
#[derive(Debug)]
pub struct Foreground {
    pub handle: ProcessHandle,
    pub command_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(ExitCode),
    Suspended(JobId),
}

impl WaitOutcome {
    /// Status recorded for the command line that ended in this outcome.
    pub fn exit_status(self) -> ExitCode {
        match self {
            WaitOutcome::Exited(code) => code,
            WaitOutcome::Suspended(_) => 128 + Signal::SIGTSTP as ExitCode,
        }
    }
}

#[derive(Debug, Default)]
pub struct SignalRouter {
    _private: (),
}

impl SignalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default SIGTSTP and SIGINT dispositions so that keyboard
    /// signals stop or interrupt the foreground child instead of the shell.
    pub fn install(&self) -> Result<(), ShellError> {
        let action = SigAction::new(
            SigHandler::Handler(record_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );
        for signal in [Signal::SIGTSTP, Signal::SIGINT] {
            // SAFETY: the handler only stores to atomics.
            unsafe { sigaction(signal, &action) }.map_err(|e| {
                ShellError::io(format!("installing {signal} handler"), io::Error::from(e))
            })?;
        }
        debug!("keyboard signal handlers installed");
        Ok(())
    }

    /// Drop signals that arrived while nothing was waiting on them.
    pub fn clear(&self) {
        SUSPEND_PENDING.store(false, Ordering::SeqCst);
        INTERRUPT_PENDING.store(false, Ordering::SeqCst);
    }

    /// Consume one pending signal. A pending suspend wins over an interrupt.
    pub fn take(&self) -> Option<KeyboardSignal> {
        if SUSPEND_PENDING.swap(false, Ordering::SeqCst) {
            Some(KeyboardSignal::Suspend)
        } else if INTERRUPT_PENDING.swap(false, Ordering::SeqCst) {
            Some(KeyboardSignal::Interrupt)
        } else {
            None
        }
    }

    /// Sleep for `duration`. Returns true, early, when an interrupt arrives.
    pub fn sleep_unless_interrupted(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if INTERRUPT_PENDING.swap(false, Ordering::SeqCst) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Block on a single foreground process until it exits or is suspended.
    ///
    /// A stop request the process ignores leaves it in the foreground. An
    /// interrupt leaves the process running as a new background job and is
    /// reported as [`ShellError::InterruptedWait`].
    pub fn wait_foreground(
        &self,
        mut fg: Foreground,
        jobs: &mut JobTable,
        out: &mut dyn Write,
    ) -> Result<WaitOutcome, ShellError> {
        out.flush()?;
        self.clear();
        loop {
            match fg.handle.wait(true) {
                Ok(ProcessStatus::Exited(code)) => return Ok(WaitOutcome::Exited(code)),
                Ok(ProcessStatus::Stopped) => {
                    // stopped by the terminal directly; our own flag is stale
                    SUSPEND_PENDING.store(false, Ordering::SeqCst);
                    return self.suspend(fg, jobs, out);
                }
                Ok(ProcessStatus::Running) => continue,
                Err(_) => match self.take() {
                    Some(KeyboardSignal::Suspend) => match forward_stop(&mut fg.handle) {
                        ProcessStatus::Stopped => return self.suspend(fg, jobs, out),
                        ProcessStatus::Exited(code) => return Ok(WaitOutcome::Exited(code)),
                        ProcessStatus::Running => {
                            debug!(pid = %fg.handle.pid(), "stop request ignored");
                            continue;
                        }
                    },
                    Some(KeyboardSignal::Interrupt) => {
                        if settle(&mut fg.handle) {
                            return Err(ShellError::InterruptedWait(Vec::new()));
                        }
                        let id = jobs.add(fg.handle, fg.command_text, JobStatus::Running);
                        debug!(id, "foreground wait interrupted");
                        return Err(ShellError::InterruptedWait(vec![id]));
                    }
                    None => continue,
                },
            }
        }
    }

    /// Wait for every stage of a pipeline and return the last stage's status.
    ///
    /// Pipelines cannot be suspended: a stop request continues every stage
    /// and the wait goes on. An interrupt leaves the unfinished stages
    /// running, each as its own background job.
    pub fn wait_pipeline(
        &self,
        mut handles: Vec<ProcessHandle>,
        texts: Vec<String>,
        jobs: &mut JobTable,
        out: &mut dyn Write,
    ) -> Result<ExitCode, ShellError> {
        out.flush()?;
        self.clear();
        let mut status = 0;
        for i in 0..handles.len() {
            loop {
                match handles[i].wait(true) {
                    Ok(ProcessStatus::Exited(code)) => {
                        status = code;
                        break;
                    }
                    // a stage stopped after the last continue went out
                    Ok(ProcessStatus::Stopped) => continue_all(&mut handles),
                    Ok(ProcessStatus::Running) => continue,
                    Err(_) => match self.take() {
                        Some(KeyboardSignal::Suspend) => {
                            continue_all(&mut handles);
                            writeln!(out, "\npipelines cannot be suspended; continuing")?;
                            out.flush()?;
                        }
                        Some(KeyboardSignal::Interrupt) => {
                            let ids = handles
                                .into_iter()
                                .zip(texts)
                                .filter_map(|(mut handle, text)| {
                                    (!settle(&mut handle))
                                        .then(|| jobs.add(handle, text, JobStatus::Running))
                                })
                                .collect();
                            return Err(ShellError::InterruptedWait(ids));
                        }
                        None => continue,
                    },
                }
            }
        }
        Ok(status)
    }

    fn suspend(
        &self,
        fg: Foreground,
        jobs: &mut JobTable,
        out: &mut dyn Write,
    ) -> Result<WaitOutcome, ShellError> {
        let id = jobs.add(fg.handle, fg.command_text.clone(), JobStatus::Suspended);
        writeln!(out, "\n[{id}] Suspended {}", fg.command_text)?;
        Ok(WaitOutcome::Suspended(id))
    }
}
