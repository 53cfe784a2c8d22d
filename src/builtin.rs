use crate::command::{ExecutableCommand, ExitCode};
use crate::error::ShellError;
use crate::external::find_command_path;
use crate::interpreter::ShellState;
use crate::jobs::{JobId, JobStatus};
use crate::process::{Launcher, StageIo};
use crate::signals::{Foreground, WaitOutcome};
use anyhow::{Context, Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. They see the whole argument
/// list, so a builtin never takes part in pipelines or redirection.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "jobs" or "cd".
    fn name() -> &'static str;

    /// One-line description shown by `help`.
    fn summary() -> &'static str;

    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        shell: &mut ShellState,
    ) -> Result<ExitCode, ShellError> {
        match T::execute(*self, stdout, shell) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{e}")?;
                Ok(e.downcast_ref::<ShellError>()
                    .map_or(1, ShellError::exit_status))
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _shell: &mut ShellState,
    ) -> Result<ExitCode, ShellError> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        Ok(if self.is_error { 2 } else { 0 })
    }
}

/// Builds the command for one invocation from its arguments (name excluded).
pub type BuiltinConstructor = fn(&[&str]) -> Box<dyn ExecutableCommand>;

fn construct<T: BuiltinCommand + 'static>(args: &[&str]) -> Box<dyn ExecutableCommand> {
    match T::from_args(&[T::name()], args) {
        Ok(cmd) => Box::new(cmd),
        Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
            output,
            is_error: status.is_err(),
        }),
    }
}

#[derive(Clone, Copy)]
struct Entry {
    construct: BuiltinConstructor,
    summary: &'static str,
}

/// Name to constructor lookup for every builtin.
#[derive(Clone)]
pub struct BuiltinTable {
    entries: BTreeMap<&'static str, Entry>,
}

impl fmt::Debug for BuiltinTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl Default for BuiltinTable {
    fn default() -> Self {
        let mut table = BuiltinTable {
            entries: BTreeMap::new(),
        };
        table.register::<Cd>();
        table.register::<Pwd>();
        table.register::<Exit>();
        table.register::<Help>();
        table.register::<Alias>();
        table.register::<Unalias>();
        table.register::<History>();
        table.register::<Jobs>();
        table.register::<Fg>();
        table.register::<Bg>();
        table.register::<SetEnv>();
        table.register::<GetEnv>();
        table.register::<SetVar>();
        table.register::<GetVar>();
        table.register::<Type>();
        table.register::<Watch>();
        table
    }
}

impl BuiltinTable {
    fn register<T: BuiltinCommand + 'static>(&mut self) {
        self.entries.insert(
            T::name(),
            Entry {
                construct: construct::<T>,
                summary: T::summary(),
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<BuiltinConstructor> {
        self.entries.get(name).map(|entry| entry.construct)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// `(name, summary)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.entries.iter().map(|(name, entry)| (*name, entry.summary))
    }
}

fn split_assignment<'a>(assignment: &'a str, usage: &str) -> Result<(&'a str, &'a str)> {
    match assignment.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => Err(ShellError::Usage(usage.to_owned()).into()),
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn summary() -> &'static str {
        "print the current working directory"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        writeln!(stdout, "{}", shell.env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the home directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn summary() -> &'static str {
        "change the working directory"
    }

    fn execute(self, _stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        let env = &mut shell.env;
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => env
                .home_dir()
                .ok_or_else(|| anyhow!("cd: no target and HOME not set"))?,
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir).with_context(|| {
            format!("cd: no such file or directory: {}", new_dir.display())
        })?;
        if !canonical.is_dir() {
            bail!("cd: not a directory: {}", new_dir.display());
        }
        let previous = env.current_dir.to_string_lossy().into_owned();
        env.set_var("OLDPWD", previous);
        env.set_var("PWD", canonical.to_string_lossy().into_owned());
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell, saving history.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always exits with status 0.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn summary() -> &'static str {
        "leave the shell"
    }

    fn execute(self, _stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        shell.env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the built-in commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn summary() -> &'static str {
        "show this list"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        writeln!(stdout, "Built-in commands:")?;
        for (name, summary) in shell.builtins.iter() {
            writeln!(stdout, "  {name:<8} {summary}")?;
        }
        writeln!(
            stdout,
            "Anything else runs as an external program. Use `|` to pipe, \
             `>`, `>>`, `2>`, `&>` to redirect, and a trailing `&` to run in the background."
        )?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Define aliases, or list them when called without arguments.
pub struct Alias {
    #[argh(positional, greedy)]
    /// definitions of the form name=text, or names to show.
    pub definitions: Vec<String>,
}

impl BuiltinCommand for Alias {
    fn name() -> &'static str {
        "alias"
    }

    fn summary() -> &'static str {
        "define or list aliases"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        if self.definitions.is_empty() {
            for (name, text) in shell.aliases.iter() {
                writeln!(stdout, "{name}='{text}'")?;
            }
            return Ok(0);
        }
        for definition in &self.definitions {
            match definition.split_once('=') {
                Some((name, text)) => shell.aliases.define(name, text)?,
                None => match shell.aliases.get(definition) {
                    Some(text) => writeln!(stdout, "{definition}='{text}'")?,
                    None => bail!(ShellError::Usage(
                        "Usage: alias [name='command'] or alias".into()
                    )),
                },
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Remove aliases.
pub struct Unalias {
    #[argh(positional, greedy)]
    /// names of the aliases to remove.
    pub names: Vec<String>,
}

impl BuiltinCommand for Unalias {
    fn name() -> &'static str {
        "unalias"
    }

    fn summary() -> &'static str {
        "remove aliases"
    }

    fn execute(self, _stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        if self.names.is_empty() {
            bail!(ShellError::Usage("Usage: unalias [name]".into()));
        }
        for name in &self.names {
            if !shell.aliases.remove(name)? {
                bail!("unalias: {name}: not found");
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show the command history.
pub struct History {
    #[argh(switch, short = 'c')]
    /// clear the history, including the history file.
    pub clear: bool,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn summary() -> &'static str {
        "list or clear the command history"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        if self.clear {
            shell.history.clear()?;
            writeln!(stdout, "History cleared.")?;
            return Ok(0);
        }
        for (i, line) in shell.history.entries().iter().enumerate() {
            writeln!(stdout, " {}  {line}", i + 1)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List background and suspended jobs.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn summary() -> &'static str {
        "list background and suspended jobs"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        for report in shell.jobs.list() {
            writeln!(stdout, "{report}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Bring a job to the foreground and wait for it.
pub struct Fg {
    #[argh(positional)]
    /// id of the job, as shown by `jobs`.
    pub id: JobId,
}

impl BuiltinCommand for Fg {
    fn name() -> &'static str {
        "fg"
    }

    fn summary() -> &'static str {
        "wait for a job in the foreground"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        let job = shell.jobs.take_for_foreground(self.id)?;
        writeln!(stdout, "{}", job.command_text)?;
        let mut handle = job.handle;
        if job.status == JobStatus::Suspended {
            handle
                .resume()
                .map_err(|e| ShellError::io(format!("fg: job {}", self.id), io::Error::from(e)))?;
        }
        let foreground = Foreground {
            handle,
            command_text: job.command_text,
        };
        let outcome = shell
            .router
            .wait_foreground(foreground, &mut shell.jobs, stdout)?;
        Ok(outcome.exit_status())
    }
}

#[derive(FromArgs)]
/// Continue a suspended job in the background.
pub struct Bg {
    #[argh(positional)]
    /// id of the job, as shown by `jobs`.
    pub id: JobId,
}

impl BuiltinCommand for Bg {
    fn name() -> &'static str {
        "bg"
    }

    fn summary() -> &'static str {
        "continue a suspended job in the background"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        let job = shell.jobs.resume_in_background(self.id)?;
        writeln!(stdout, "[{}] {} &", job.id, job.command_text)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set an environment variable for commands started from now on.
pub struct SetEnv {
    #[argh(positional)]
    /// assignment of the form VARIABLE=VALUE.
    pub assignment: String,
}

impl BuiltinCommand for SetEnv {
    fn name() -> &'static str {
        "setenv"
    }

    fn summary() -> &'static str {
        "set an exported variable"
    }

    fn execute(self, _stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        let (name, value) = split_assignment(&self.assignment, "Usage: setenv [VARIABLE=VALUE]")?;
        shell.env.set_var(name, value);
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print an environment variable.
pub struct GetEnv {
    #[argh(positional)]
    /// name of the variable.
    pub name: String,
}

impl BuiltinCommand for GetEnv {
    fn name() -> &'static str {
        "getenv"
    }

    fn summary() -> &'static str {
        "print an exported variable"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        match shell.env.get_var(&self.name) {
            Some(value) => {
                writeln!(stdout, "{value}")?;
                Ok(0)
            }
            None => bail!("{} not found in environment", self.name),
        }
    }
}

#[derive(FromArgs)]
/// Set a shell variable. Shell variables are not passed to commands.
pub struct SetVar {
    #[argh(positional)]
    /// assignment of the form VARIABLE=VALUE.
    pub assignment: String,
}

impl BuiltinCommand for SetVar {
    fn name() -> &'static str {
        "setvar"
    }

    fn summary() -> &'static str {
        "set a shell variable"
    }

    fn execute(self, _stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        let (name, value) = split_assignment(&self.assignment, "Usage: setvar [VARIABLE=VALUE]")?;
        shell.env.set_shell_var(name, value);
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print a shell variable.
pub struct GetVar {
    #[argh(positional)]
    /// name of the variable.
    pub name: String,
}

impl BuiltinCommand for GetVar {
    fn name() -> &'static str {
        "getvar"
    }

    fn summary() -> &'static str {
        "print a shell variable"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        match shell.env.get_shell_var(&self.name) {
            Some(value) => {
                writeln!(stdout, "{value}")?;
                Ok(0)
            }
            None => bail!("{} not found in shell variables", self.name),
        }
    }
}

#[derive(FromArgs)]
/// Describe how each name would be run.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn summary() -> &'static str {
        "show whether a name is a builtin, an alias or a program"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        let mut status = 0;
        for name in &self.names {
            if let Some(text) = shell.aliases.get(name) {
                writeln!(stdout, "{name} is aliased to '{text}'")?;
            } else if shell.builtins.contains(name) {
                writeln!(stdout, "{name} is a shell builtin")?;
            } else if let Some(path) = find_command_path(
                &shell.env.search_path(),
                &shell.env.current_dir,
                Path::new(name),
            ) {
                writeln!(stdout, "{name} is {}", path.display())?;
            } else {
                writeln!(stdout, "type: {name}: not found")?;
                status = 1;
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Run a command over and over until interrupted.
pub struct Watch {
    #[argh(option, short = 'n', default = "2")]
    /// seconds to wait between runs.
    pub interval: u64,

    #[argh(option)]
    /// stop after this many runs.
    pub count: Option<u32>,

    #[argh(positional, greedy)]
    /// the command to run and its arguments.
    pub command: Vec<String>,
}

impl Watch {
    fn stopped(stdout: &mut dyn Write) -> Result<ExitCode> {
        writeln!(stdout, "\nWatch stopped.")?;
        Ok(128 + Signal::SIGINT as ExitCode)
    }
}

/// Kill and reap the jobs an interrupted watch left behind.
fn kill_jobs(shell: &mut ShellState, ids: Vec<JobId>) {
    for id in ids {
        let Ok(mut job) = shell.jobs.take_for_foreground(id) else {
            continue;
        };
        if let Err(e) = job.handle.signal(Signal::SIGKILL) {
            warn!(id, error = %e, "could not stop watched command");
        }
        while job.handle.wait(false) == Err(Errno::EINTR) {}
    }
}

impl BuiltinCommand for Watch {
    fn name() -> &'static str {
        "watch"
    }

    fn summary() -> &'static str {
        "run a command every few seconds until ^C"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut ShellState) -> Result<ExitCode> {
        if self.command.is_empty() {
            bail!(ShellError::Usage("Usage: watch [-n <sec>] <command>".into()));
        }
        let text = self.command.join(" ");
        let mut status = 0;
        let mut runs = 0;
        loop {
            writeln!(stdout, "Every {}s: {text}", self.interval)?;
            let handle = Launcher::new(&shell.env).spawn(&self.command, StageIo::default(), false)?;
            let foreground = Foreground {
                handle,
                command_text: text.clone(),
            };
            match shell.router.wait_foreground(foreground, &mut shell.jobs, stdout) {
                Ok(WaitOutcome::Exited(code)) => status = code,
                Ok(outcome) => return Ok(outcome.exit_status()),
                Err(ShellError::InterruptedWait(ids)) => {
                    kill_jobs(shell, ids);
                    return Watch::stopped(stdout);
                }
                Err(e) => return Err(e.into()),
            }
            runs += 1;
            if self.count.is_some_and(|count| runs >= count) {
                return Ok(status);
            }
            if shell.router.sleep_unless_interrupted(Duration::from_secs(self.interval)) {
                return Watch::stopped(stdout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessStatus;
    use crate::signals::tests::{DELIVERY, signal_this_thread};
    use std::sync::atomic::Ordering;

    fn run(shell: &mut ShellState, line: &[&str]) -> (ExitCode, String) {
        let construct = shell.builtins.lookup(line[0]).expect("builtin exists");
        let mut out = Vec::new();
        let status = construct(&line[1..]).execute(&mut out, shell).unwrap();
        (status, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let mut shell = ShellState::ephemeral();
        let cur = shell.env.current_dir.clone();
        let (status, out) = run(&mut shell, &["pwd"]);
        assert_eq!(status, 0);
        assert_eq!(out, format!("{}\n", cur.to_string_lossy()));
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let mut shell = ShellState::ephemeral();

        let target = canonical_temp.to_string_lossy().to_string();
        let (status, _) = run(&mut shell, &["cd", &target]);

        assert_eq!(status, 0);
        assert_eq!(shell.env.current_dir, canonical_temp);
        assert_eq!(shell.env.get_var("PWD"), Some(target.as_str()));
    }

    #[test]
    fn test_cd_relative_and_home() {
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("sub")).unwrap();
        let mut shell = ShellState::ephemeral();
        shell.env.current_dir = canonical_temp.clone();

        run(&mut shell, &["cd", "sub"]);
        assert_eq!(shell.env.current_dir, canonical_temp.join("sub"));

        shell.env.set_var("HOME", canonical_temp.to_string_lossy().to_string());
        run(&mut shell, &["cd"]);
        assert_eq!(shell.env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let mut shell = ShellState::ephemeral();
        let orig = shell.env.current_dir.clone();
        let (status, out) = run(&mut shell, &["cd", "/nonexistent_dir_for_cd_test"]);
        assert_eq!(status, 1);
        assert_eq!(out, "cd: no such file or directory: /nonexistent_dir_for_cd_test\n");
        assert_eq!(shell.env.current_dir, orig);
    }

    #[test]
    fn exit_only_requests_termination() {
        let mut shell = ShellState::ephemeral();
        let (status, _) = run(&mut shell, &["exit", "3"]);
        assert_eq!(status, 0);
        assert!(shell.env.should_exit);
    }

    #[test]
    fn alias_define_list_and_remove() {
        let mut shell = ShellState::ephemeral();
        run(&mut shell, &["alias", "ll=ls -l", "la=ls -a"]);
        let (_, listing) = run(&mut shell, &["alias"]);
        assert_eq!(listing, "la='ls -a'\nll='ls -l'\n");

        let (status, _) = run(&mut shell, &["unalias", "la"]);
        assert_eq!(status, 0);
        let (status, out) = run(&mut shell, &["unalias", "la"]);
        assert_eq!((status, out.as_str()), (1, "unalias: la: not found\n"));
        let (_, listing) = run(&mut shell, &["alias"]);
        assert_eq!(listing, "ll='ls -l'\n");
    }

    #[test]
    fn alias_rejects_bad_names_and_lone_words() {
        let mut shell = ShellState::ephemeral();
        let (status, out) = run(&mut shell, &["alias", "9x=ls"]);
        assert_eq!(status, 2);
        assert_eq!(out, "alias: invalid alias name: 9x\n");
        let (status, out) = run(&mut shell, &["alias", "missing"]);
        assert_eq!(status, 2);
        assert_eq!(out, "Usage: alias [name='command'] or alias\n");
    }

    #[test]
    fn history_lists_and_clears() {
        let mut shell = ShellState::ephemeral();
        shell.history.add("ls");
        shell.history.add("pwd");
        let (_, out) = run(&mut shell, &["history"]);
        assert_eq!(out, " 1  ls\n 2  pwd\n");
        let (_, out) = run(&mut shell, &["history", "-c"]);
        assert_eq!(out, "History cleared.\n");
        assert!(shell.history.entries().is_empty());
        assert!(shell.history.take_cleared());
    }

    #[test]
    fn environment_and_shell_variables() {
        let mut shell = ShellState::ephemeral();
        run(&mut shell, &["setenv", "JOBSH_TEST=1"]);
        run(&mut shell, &["setvar", "LOCAL=two"]);
        assert_eq!(run(&mut shell, &["getenv", "JOBSH_TEST"]).1, "1\n");
        assert_eq!(run(&mut shell, &["getvar", "LOCAL"]).1, "two\n");
        assert_eq!(shell.env.get_var("LOCAL"), None);

        let (status, out) = run(&mut shell, &["getenv", "JOBSH_UNSET_VAR"]);
        assert_eq!((status, out.as_str()), (1, "JOBSH_UNSET_VAR not found in environment\n"));
        let (status, out) = run(&mut shell, &["setenv", "novalue"]);
        assert_eq!((status, out.as_str()), (2, "Usage: setenv [VARIABLE=VALUE]\n"));
    }

    #[test]
    fn type_describes_each_kind_of_name() {
        let mut shell = ShellState::ephemeral();
        shell.aliases.define("ll", "ls -l").unwrap();
        let (status, out) = run(&mut shell, &["type", "ll", "jobs", "sh", "frobnicate123"]);
        assert_eq!(status, 1);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ll is aliased to 'ls -l'");
        assert_eq!(lines[1], "jobs is a shell builtin");
        assert!(lines[2].starts_with("sh is /"));
        assert_eq!(lines[3], "type: frobnicate123: not found");
    }

    #[test]
    fn help_lists_every_builtin() {
        let mut shell = ShellState::ephemeral();
        let (_, out) = run(&mut shell, &["help"]);
        for name in ["cd", "jobs", "fg", "bg", "alias", "history", "type"] {
            assert!(out.contains(&format!("  {name}")), "missing {name}");
        }
    }

    #[test]
    fn bad_arguments_report_usage() {
        let mut shell = ShellState::ephemeral();
        let (status, out) = run(&mut shell, &["fg", "abc"]);
        assert_eq!(status, 2);
        assert!(!out.is_empty());
        let (status, _) = run(&mut shell, &["fg"]);
        assert_eq!(status, 2);
    }

    #[test]
    fn fg_and_bg_report_unknown_jobs() {
        let mut shell = ShellState::ephemeral();
        assert_eq!(run(&mut shell, &["fg", "4"]).1, "fg: job not found: 4\n");
        assert_eq!(run(&mut shell, &["bg", "4"]).1, "bg: job not found: 4\n");
    }

    #[test]
    fn bg_then_fg_a_suspended_job() {
        let mut shell = ShellState::ephemeral();
        let argv = vec!["sleep".to_string(), "0.3".to_string()];
        let mut handle = Launcher::new(&shell.env)
            .spawn(&argv, StageIo::default(), true)
            .unwrap();
        handle.signal(Signal::SIGSTOP).unwrap();
        assert_eq!(
            handle.poll_until_changed(100, Duration::from_millis(10)),
            ProcessStatus::Stopped
        );
        let id = shell.jobs.add(handle, "sleep 0.3".into(), JobStatus::Suspended);

        let (status, out) = run(&mut shell, &["bg", &id.to_string()]);
        assert_eq!((status, out.as_str()), (0, "[1] sleep 0.3 &\n"));
        let (status, out) = run(&mut shell, &["bg", &id.to_string()]);
        assert_eq!(status, 1);
        assert_eq!(out, "bg: job 1 is already running or not suspended\n");

        let (status, out) = run(&mut shell, &["fg", &id.to_string()]);
        assert_eq!((status, out.as_str()), (0, "sleep 0.3\n"));
        assert!(shell.jobs.is_empty());
    }

    #[test]
    fn fg_resumes_a_suspended_job() {
        let mut shell = ShellState::ephemeral();
        let argv = vec!["sleep".to_string(), "0.2".to_string()];
        let mut handle = Launcher::new(&shell.env)
            .spawn(&argv, StageIo::default(), true)
            .unwrap();
        handle.signal(Signal::SIGSTOP).unwrap();
        assert_eq!(
            handle.poll_until_changed(100, Duration::from_millis(10)),
            ProcessStatus::Stopped
        );
        let id = shell.jobs.add(handle, "sleep 0.2".into(), JobStatus::Suspended);

        let (status, _) = run(&mut shell, &["fg", &id.to_string()]);
        assert_eq!(status, 0);
        assert!(shell.jobs.is_empty());
    }

    #[test]
    fn watch_reruns_the_command() {
        let mut shell = ShellState::ephemeral();
        let (status, out) = run(&mut shell, &["watch", "-n", "0", "--count", "2", "true"]);
        assert_eq!(status, 0);
        assert_eq!(out, "Every 0s: true\nEvery 0s: true\n");

        let (status, out) = run(&mut shell, &["watch", "--count", "3", "-n", "0", "sh", "-c", "exit 3"]);
        assert_eq!(status, 3);
        assert_eq!(out.lines().count(), 3);
        assert!(shell.jobs.is_empty());
    }

    #[test]
    fn watch_usage_and_launch_errors() {
        let mut shell = ShellState::ephemeral();
        let (status, out) = run(&mut shell, &["watch"]);
        assert_eq!((status, out.as_str()), (2, "Usage: watch [-n <sec>] <command>\n"));
        let (status, out) = run(&mut shell, &["watch", "--count", "1", "frobnicate123"]);
        assert_eq!(status, 127);
        assert_eq!(out, "Every 2s: frobnicate123\nfrobnicate123: command not found\n");
    }

    #[test]
    fn watch_stops_on_interrupt() {
        let _guard = DELIVERY.lock().unwrap_or_else(|e| e.into_inner());
        let mut shell = ShellState::ephemeral();
        shell.router.install().unwrap();

        let (done, sender) = signal_this_thread(Signal::SIGINT);
        let (status, out) = run(&mut shell, &["watch", "-n", "1", "sleep", "5"]);
        done.store(true, Ordering::SeqCst);
        sender.join().unwrap();

        assert_eq!(status, 130);
        assert!(out.starts_with("Every 1s: sleep 5\n"), "{out}");
        assert!(out.ends_with("\nWatch stopped.\n"), "{out}");
        assert!(shell.jobs.is_empty());
    }
}
