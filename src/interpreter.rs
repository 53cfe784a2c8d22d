use crate::alias::{self, AliasStore};
use crate::builtin::BuiltinTable;
use crate::command::ExitCode;
use crate::config::Config;
use crate::env::Environment;
use crate::error::ShellError;
use crate::history::History;
use crate::jobs::{JobStatus, JobTable};
use crate::lexer::{self, Token};
use crate::parser::{self, Pipeline};
use crate::process::{Launcher, StageIo};
use crate::redirect;
use crate::signals::{Foreground, SignalRouter};
use rustyline::error::ReadlineError;
use rustyline::{Cmd, DefaultEditor, KeyEvent};
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// Everything a command line can read or change.
#[derive(Debug)]
pub struct ShellState {
    pub env: Environment,
    pub aliases: AliasStore,
    pub jobs: JobTable,
    pub history: History,
    pub router: SignalRouter,
    pub builtins: BuiltinTable,
}

impl ShellState {
    pub fn new(env: Environment, aliases: AliasStore, history: History) -> Self {
        ShellState {
            env,
            aliases,
            jobs: JobTable::new(),
            history,
            router: SignalRouter::new(),
            builtins: BuiltinTable::default(),
        }
    }

    /// State over the current process environment with nothing persisted.
    pub fn ephemeral() -> Self {
        Self::new(
            Environment::new(),
            AliasStore::new(),
            History::new(Config::default().history_size),
        )
    }
}

/// Reads command lines and runs them: builtins in-process, everything else
/// as child processes, with job control over the children.
pub struct Interpreter {
    state: ShellState,
    config: Config,
}

impl Interpreter {
    /// Interpreter whose aliases and history live in the files `config` names.
    pub fn new(config: Config) -> Self {
        let aliases = match config.alias_path() {
            Some(path) => AliasStore::load(path).unwrap_or_else(|e| {
                warn!(error = %e, "aliases not loaded");
                AliasStore::new()
            }),
            None => AliasStore::new(),
        };
        let history = match config.history_path() {
            Some(path) => History::load(path, config.history_size).unwrap_or_else(|e| {
                warn!(error = %e, "history not loaded");
                History::new(config.history_size)
            }),
            None => History::new(config.history_size),
        };
        Self::with_state(ShellState::new(Environment::new(), aliases, history), config)
    }

    pub fn with_state(state: ShellState, config: Config) -> Self {
        Interpreter { state, config }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ShellState {
        &mut self.state
    }

    /// Run one line, writing the shell's own messages to standard output.
    pub fn dispatch(&mut self, line: &str) -> ExitCode {
        let mut stdout = io::stdout().lock();
        let status = self.dispatch_with_output(line, &mut stdout);
        if let Err(e) = stdout.flush() {
            warn!(error = %e, "flushing output failed");
        }
        status
    }

    /// Run one line. Errors are reported to `out` and never end the session.
    pub fn dispatch_with_output(&mut self, line: &str, out: &mut dyn Write) -> ExitCode {
        match self.execute_line(line, out) {
            Ok(status) => {
                debug!(status, "command finished");
                status
            }
            Err(e) => {
                debug!(error = ?e, "command failed");
                if let Err(write_error) = writeln!(out, "{e}") {
                    warn!(error = %write_error, "reporting error failed");
                }
                e.exit_status()
            }
        }
    }

    fn execute_line(&mut self, line: &str, out: &mut dyn Write) -> Result<ExitCode, ShellError> {
        let tokens = lexer::split_into_tokens(line)?;
        if tokens.is_empty() {
            return Ok(0);
        }
        let tokens = alias::expand_alias(tokens, &self.state.aliases)?;

        if let Some(Token::Word(first)) = tokens.first() {
            if let Some(construct) = self.state.builtins.lookup(&first.text) {
                let args: Vec<String> = tokens[1..]
                    .iter()
                    .map(|token| match token {
                        Token::Word(word) => word.text.clone(),
                        Token::PipeOp => "|".to_owned(),
                    })
                    .collect();
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                debug!(builtin = %first.text, "running builtin");
                return construct(&args).execute(out, &mut self.state);
            }
        }

        let pipeline = parser::build_pipeline(tokens)?;
        if pipeline.is_single() {
            self.run_single(pipeline, out)
        } else {
            self.run_pipeline(pipeline, out)
        }
    }

    fn run_single(&mut self, pipeline: Pipeline, out: &mut dyn Write) -> Result<ExitCode, ShellError> {
        let stage = &pipeline.stages[0];
        let resolved = redirect::resolve(&stage.words)?;
        if resolved.argv.is_empty() {
            return Err(ShellError::Syntax("missing command before redirection".into()));
        }
        let command_text = stage.command_text();
        let io = match &resolved.redirection {
            Some(redirection) => StageIo::redirected(redirection.open(&self.state.env.current_dir)?),
            None => StageIo::default(),
        };
        let handle = Launcher::new(&self.state.env).spawn(&resolved.argv, io, pipeline.background)?;

        if pipeline.background {
            let id = self.state.jobs.add(handle, command_text.clone(), JobStatus::Running);
            writeln!(out, "[{id}] {command_text} &")?;
            return Ok(0);
        }
        let foreground = Foreground {
            handle,
            command_text,
        };
        let outcome = self
            .state
            .router
            .wait_foreground(foreground, &mut self.state.jobs, out)?;
        Ok(outcome.exit_status())
    }

    fn run_pipeline(&mut self, pipeline: Pipeline, out: &mut dyn Write) -> Result<ExitCode, ShellError> {
        let Some((last, rest)) = pipeline.stages.split_last() else {
            return Err(ShellError::Syntax("empty command".into()));
        };
        if rest.iter().any(|stage| redirect::find_operator(&stage.words).is_some()) {
            return Err(ShellError::Syntax(
                "redirection is only allowed on the last command of a pipeline".into(),
            ));
        }
        let resolved = redirect::resolve(&last.words)?;
        let mut argvs: Vec<Vec<String>> = rest.iter().map(|stage| stage.argv()).collect();
        argvs.push(resolved.argv);
        if argvs.iter().any(|argv| argv.is_empty()) {
            return Err(ShellError::Syntax("missing command in pipeline".into()));
        }
        let texts: Vec<String> = pipeline.stages.iter().map(|stage| stage.command_text()).collect();

        let io = match &resolved.redirection {
            Some(redirection) => StageIo::redirected(redirection.open(&self.state.env.current_dir)?),
            None => StageIo::default(),
        };
        let launch = Launcher::new(&self.state.env).spawn_pipeline(&argvs, io);
        let status = self
            .state
            .router
            .wait_pipeline(launch.handles, texts, &mut self.state.jobs, out)?;
        match launch.error {
            Some(error) => Err(error),
            None => Ok(status),
        }
    }

    /// Interactive Read-Eval-Print Loop on the terminal.
    ///
    /// Returns when `exit` runs or standard input ends; history is saved
    /// either way.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        if let Err(e) = self.state.router.install() {
            warn!(error = %e, "job control signals unavailable");
        }
        let mut rl = DefaultEditor::new()?;
        // ^Z at the prompt has nothing to suspend
        rl.bind_sequence(KeyEvent::ctrl('Z'), Cmd::Noop);
        for entry in self.state.history.entries() {
            rl.add_history_entry(entry.as_str())?;
        }
        info!("interactive session started");

        loop {
            let prompt = self.config.render_prompt(&self.state.env.current_dir);
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line)?;
                    self.state.history.add(line);
                    self.dispatch(line);
                    if self.state.history.take_cleared() {
                        rl.clear_history()?;
                    }
                    if self.state.env.should_exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    println!("Exiting...");
                    break;
                }
                Err(err) => {
                    self.shutdown();
                    return Err(err);
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Persist what has to outlive the session.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.state.history.save() {
            warn!(error = %e, "history not saved");
        }
        if !self.state.jobs.is_empty() {
            info!(jobs = self.state.jobs.len(), "leaving jobs behind");
        }
    }
}

impl Default for Interpreter {
    /// Interpreter with no persisted state and the default configuration.
    fn default() -> Self {
        Self::with_state(ShellState::ephemeral(), Config::default())
    }
}
