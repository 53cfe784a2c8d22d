use crate::command::ExitCode;
use crate::jobs::JobId;
use crate::redirect::RedirectKind;
use std::io;
use thiserror::Error;

/// Everything that can go wrong while dispatching one command line.
///
/// None of these end the session: the dispatch loop prints the message and
/// reads the next line.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Unbalanced quoting, a dangling escape, or a misplaced operator.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A redirection operator was the last word of the command.
    #[error("Error: No file specified for {}.", .0.describe())]
    MissingRedirectTarget(RedirectKind),

    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// The executable exists but the process could not be started.
    #[error("{command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command}: job not found: {id}")]
    JobNotFound { command: &'static str, id: JobId },

    /// The job exists but is in the wrong state for the requested operation.
    #[error("{command}: job {id} is {reason}")]
    JobState {
        command: &'static str,
        id: JobId,
        reason: &'static str,
    },

    /// Keyboard interrupt while blocked on a child. The children keep
    /// running and are registered under the listed job ids.
    #[error("^C{}", continued_note(.0))]
    InterruptedWait(Vec<JobId>),

    #[error("{0}")]
    Usage(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Writing the shell's own output failed.
    #[error(transparent)]
    Output(#[from] io::Error),
}

fn continued_note(ids: &[JobId]) -> String {
    ids.iter()
        .map(|id| format!("\n[{id}] continues in the background"))
        .collect()
}

impl ShellError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ShellError::Io {
            context: context.into(),
            source,
        }
    }

    /// Status recorded as the outcome of a command that failed with this error.
    pub fn exit_status(&self) -> ExitCode {
        match self {
            ShellError::CommandNotFound(_) => 127,
            ShellError::Launch { .. } => 126,
            ShellError::InterruptedWait(_) => 130,
            ShellError::Syntax(_)
            | ShellError::MissingRedirectTarget(_)
            | ShellError::Usage(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_what_the_user_sees() {
        assert_eq!(
            ShellError::CommandNotFound("frobnicate123".into()).to_string(),
            "frobnicate123: command not found"
        );
        assert_eq!(
            ShellError::MissingRedirectTarget(RedirectKind::Append).to_string(),
            "Error: No file specified for appending output."
        );
        assert_eq!(
            ShellError::JobNotFound { command: "fg", id: 7 }.to_string(),
            "fg: job not found: 7"
        );
        assert_eq!(ShellError::InterruptedWait(vec![]).to_string(), "^C");
        assert_eq!(
            ShellError::InterruptedWait(vec![2]).to_string(),
            "^C\n[2] continues in the background"
        );
    }

    #[test]
    fn exit_status_follows_shell_conventions() {
        assert_eq!(ShellError::CommandNotFound("x".into()).exit_status(), 127);
        assert_eq!(ShellError::InterruptedWait(vec![1]).exit_status(), 130);
        assert_eq!(ShellError::Syntax("x".into()).exit_status(), 2);
        assert_eq!(
            ShellError::JobState {
                command: "bg",
                id: 1,
                reason: "already running or not suspended"
            }
            .exit_status(),
            1
        );
    }
}
