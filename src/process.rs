//! Process launcher and the handle that owns one spawned process.

use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::find_command_path;
use crate::redirect::RedirectFiles;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io::ErrorKind;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Last known state of a process, as observed through `waitpid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Stopped,
    Exited(ExitCode),
}

/// Ownership wrapper around one spawned process.
///
/// All reaping goes through `waitpid` on the pid so that stop notifications
/// can be observed; `Child::wait` is never used.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    status: ProcessStatus,
}

impl ProcessHandle {
    fn new(child: Child) -> Self {
        ProcessHandle {
            child,
            status: ProcessStatus::Running,
        }
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, ProcessStatus::Exited(_))
    }

    /// Read end of the pipe bound to this process's standard output, if any.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Non-blocking check that also notices stops and continues caused
    /// from outside the shell.
    pub fn poll(&mut self) -> ProcessStatus {
        if !self.is_done() {
            let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
            match waitpid(self.pid(), Some(flags)) {
                Ok(status) => self.record(status),
                Err(e) => self.record_error(e),
            }
        }
        self.status
    }

    /// Block until the process exits or, with `untraced`, stops.
    ///
    /// Returns `Err(Errno::EINTR)` when a signal delivered to the shell
    /// interrupted the wait; the caller decides whether to wait again.
    pub fn wait(&mut self, untraced: bool) -> Result<ProcessStatus, Errno> {
        if self.is_done() {
            return Ok(self.status);
        }
        let flags = untraced.then_some(WaitPidFlag::WUNTRACED);
        match waitpid(self.pid(), flags) {
            Ok(status) => self.record(status),
            Err(Errno::EINTR) => return Err(Errno::EINTR),
            Err(e) => self.record_error(e),
        }
        Ok(self.status)
    }

    pub fn signal(&self, signal: Signal) -> Result<(), Errno> {
        trace!(pid = %self.pid(), ?signal, "sending signal");
        kill(self.pid(), signal)
    }

    /// Continue a stopped process.
    pub fn resume(&mut self) -> Result<(), Errno> {
        self.signal(Signal::SIGCONT)?;
        if self.status == ProcessStatus::Stopped {
            self.status = ProcessStatus::Running;
        }
        Ok(())
    }

    /// Poll up to `polls` times, `interval` apart, until the process is no
    /// longer running.
    pub fn poll_until_changed(&mut self, polls: u32, interval: Duration) -> ProcessStatus {
        for attempt in 0..polls {
            if self.poll() != ProcessStatus::Running {
                break;
            }
            if attempt + 1 < polls {
                thread::sleep(interval);
            }
        }
        self.status
    }

    fn record(&mut self, status: WaitStatus) {
        self.status = match status {
            WaitStatus::Exited(_, code) => ProcessStatus::Exited(code),
            WaitStatus::Signaled(_, signal, _) => ProcessStatus::Exited(128 + signal as i32),
            WaitStatus::Stopped(..) => ProcessStatus::Stopped,
            WaitStatus::Continued(_) => ProcessStatus::Running,
            _ => self.status,
        };
        trace!(pid = %self.pid(), status = ?self.status, "wait status");
    }

    fn record_error(&mut self, e: Errno) {
        // ECHILD: already reaped, nothing left to observe.
        if e != Errno::ECHILD {
            warn!(pid = %self.pid(), error = %e, "waitpid failed");
        }
        self.status = ProcessStatus::Exited(0);
    }
}

/// Input, output and error endpoints for one launched process.
/// `None` means inherit the shell's own stream.
#[derive(Debug, Default)]
pub struct StageIo {
    pub stdin: Option<Stdio>,
    pub stdout: Option<Stdio>,
    pub stderr: Option<Stdio>,
}

impl StageIo {
    /// Endpoints for a stage whose output goes to a redirection, if any.
    pub fn redirected(files: RedirectFiles) -> Self {
        StageIo {
            stdin: None,
            stdout: files.stdout.map(Stdio::from),
            stderr: files.stderr.map(Stdio::from),
        }
    }
}

/// Result of starting every stage of a pipeline.
///
/// When a stage fails to launch, the stages before it are already running
/// and are returned alongside the error so the caller can still wait on them.
#[derive(Debug)]
pub struct PipelineLaunch {
    pub handles: Vec<ProcessHandle>,
    pub error: Option<ShellError>,
}

/// Starts processes in the context of one environment.
pub struct Launcher<'a> {
    env: &'a Environment,
}

impl<'a> Launcher<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Launcher { env }
    }

    /// Start one process for `argv`.
    ///
    /// With `background`, the process gets its own process group and a null
    /// standard input so that keyboard signals and terminal reads stay with
    /// the foreground.
    pub fn spawn(
        &self,
        argv: &[String],
        io: StageIo,
        background: bool,
    ) -> Result<ProcessHandle, ShellError> {
        let name = argv
            .first()
            .ok_or_else(|| ShellError::Syntax("empty command".into()))?;
        let program = find_command_path(&self.env.search_path(), &self.env.current_dir, Path::new(name))
            .ok_or_else(|| ShellError::CommandNotFound(name.clone()))?;

        // The parent's copies of redirection files belong to `command` and are
        // closed when it drops at the end of this function, on every path.
        let mut command = Command::new(&program);
        command
            .arg0(name)
            .args(&argv[1..])
            .env_clear()
            .envs(&self.env.vars)
            .current_dir(&self.env.current_dir);
        if let Some(stdin) = io.stdin {
            command.stdin(stdin);
        } else if background {
            command.stdin(Stdio::null());
        }
        if let Some(stdout) = io.stdout {
            command.stdout(stdout);
        }
        if let Some(stderr) = io.stderr {
            command.stderr(stderr);
        }
        if background {
            command.process_group(0);
        }

        let child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ShellError::CommandNotFound(name.clone()),
            _ => ShellError::Launch {
                command: name.clone(),
                source: e,
            },
        })?;
        debug!(pid = child.id(), program = %program.display(), background, "launched");
        Ok(ProcessHandle::new(child))
    }

    /// Start every stage, wiring stage `i`'s output to stage `i + 1`'s input.
    ///
    /// Intermediate stages always write into a fresh pipe; the last stage
    /// writes wherever `last` says.
    pub fn spawn_pipeline(&self, stages: &[Vec<String>], last: StageIo) -> PipelineLaunch {
        let mut handles: Vec<ProcessHandle> = Vec::with_capacity(stages.len());
        let mut last = Some(last);
        for (i, argv) in stages.iter().enumerate() {
            let stdin = handles
                .last_mut()
                .and_then(ProcessHandle::take_stdout)
                .map(Stdio::from);
            let io = if i + 1 == stages.len() {
                let last = last.take().unwrap_or_default();
                StageIo { stdin, ..last }
            } else {
                StageIo {
                    stdin,
                    stdout: Some(Stdio::piped()),
                    stderr: None,
                }
            };
            match self.spawn(argv, io, false) {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    return PipelineLaunch {
                        handles,
                        error: Some(error),
                    };
                }
            }
        }
        PipelineLaunch {
            handles,
            error: None,
        }
    }
}
