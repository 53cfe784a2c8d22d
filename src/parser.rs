use crate::error::ShellError;
use crate::lexer::{Token, Word};

/// The background operator, valid only as the last word of a single-stage command.
pub const BACKGROUND_OP: &str = "&";

/// One program invocation within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub words: Vec<Word>,
}

impl Stage {
    /// Plain argument vector, as handed to the process launcher.
    pub fn argv(&self) -> Vec<String> {
        self.words.iter().map(|w| w.text.clone()).collect()
    }

    /// Re-quoted text of the stage, used as a job's command text.
    pub fn command_text(&self) -> String {
        self.words
            .iter()
            .map(Word::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Ordered chain of stages; stage `i` feeds its output to stage `i + 1`.
///
/// Always holds at least one stage. `background` can only be set on a
/// single-stage pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub background: bool,
}

impl Pipeline {
    pub fn is_single(&self) -> bool {
        self.stages.len() == 1
    }
}

/// Split a token stream on pipe operators into stages, and strip a trailing
/// background operator.
pub fn build_pipeline(tokens: Vec<Token>) -> Result<Pipeline, ShellError> {
    let mut stages = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        match token {
            Token::Word(word) => current.push(word),
            Token::PipeOp => {
                if current.is_empty() {
                    return Err(ShellError::Syntax("syntax error near unexpected token `|'".into()));
                }
                stages.push(Stage {
                    words: std::mem::take(&mut current),
                });
            }
        }
    }

    if current.is_empty() {
        return Err(ShellError::Syntax(if stages.is_empty() {
            "empty command".into()
        } else {
            "syntax error: pipeline ends with `|'".into()
        }));
    }
    stages.push(Stage { words: current });

    let background = match stages.last_mut() {
        Some(last) if last.words.last().is_some_and(|w| w.is_operator(BACKGROUND_OP)) => {
            last.words.pop();
            true
        }
        _ => false,
    };

    if background {
        if stages.len() > 1 {
            return Err(ShellError::Syntax(
                "pipelines cannot be run in the background".into(),
            ));
        }
        if stages[0].words.is_empty() {
            return Err(ShellError::Syntax("syntax error near unexpected token `&'".into()));
        }
    }

    Ok(Pipeline { stages, background })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;

    fn parse(line: &str) -> Result<Pipeline, ShellError> {
        build_pipeline(split_into_tokens(line).unwrap())
    }

    #[test]
    fn no_pipe_is_a_single_stage() {
        let p = parse("ls -l /tmp").unwrap();
        assert!(p.is_single());
        assert!(!p.background);
        assert_eq!(p.stages[0].argv(), vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn n_pipes_make_n_plus_one_stages_in_order() {
        let p = parse("cat f | grep x | sort | uniq -c").unwrap();
        assert_eq!(p.stages.len(), 4);
        let names: Vec<_> = p.stages.iter().map(|s| s.argv()[0].clone()).collect();
        assert_eq!(names, vec!["cat", "grep", "sort", "uniq"]);
    }

    #[test]
    fn quoted_pipe_does_not_split() {
        let p = parse("echo 'a | b'").unwrap();
        assert!(p.is_single());
        assert_eq!(p.stages[0].argv(), vec!["echo", "a | b"]);
    }

    #[test]
    fn empty_stages_are_rejected() {
        assert!(matches!(parse("| wc"), Err(ShellError::Syntax(_))));
        assert!(matches!(parse("ls |"), Err(ShellError::Syntax(_))));
        assert!(matches!(parse("ls || wc"), Err(ShellError::Syntax(_))));
        assert!(matches!(build_pipeline(vec![]), Err(ShellError::Syntax(_))));
    }

    #[test]
    fn trailing_ampersand_marks_background() {
        let p = parse("sleep 5 &").unwrap();
        assert!(p.background);
        assert_eq!(p.stages[0].argv(), vec!["sleep", "5"]);
        assert_eq!(p.stages[0].command_text(), "sleep 5");
    }

    #[test]
    fn quoted_or_inner_ampersand_is_an_argument() {
        let p = parse("echo '&'").unwrap();
        assert!(!p.background);
        let p = parse("echo a & b").unwrap();
        assert!(!p.background);
        assert_eq!(p.stages[0].argv(), vec!["echo", "a", "&", "b"]);
    }

    #[test]
    fn background_pipelines_are_rejected() {
        assert!(matches!(parse("ls | wc &"), Err(ShellError::Syntax(_))));
        assert!(matches!(parse("&"), Err(ShellError::Syntax(_))));
    }

    #[test]
    fn command_text_requotes_words() {
        let p = parse("grep 'two words' file").unwrap();
        assert_eq!(p.stages[0].command_text(), "grep 'two words' file");
    }

    #[test]
    fn command_text_keeps_operators_bare() {
        let p = parse("sleep 5 > out '>' &").unwrap();
        assert_eq!(p.stages[0].command_text(), "sleep 5 > out '>'");
    }
}
