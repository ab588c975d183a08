use std::fmt;

use quiz_core::model::{OptionId, ParseIdError, QuestionId};

/// One line typed by the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Answer {
        question: QuestionId,
        option: OptionId,
    },
    Next,
    Prev,
    Submit,
    Retry,
    Show,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Empty,
    Unknown(String),
    Usage(&'static str),
    BadId(ParseIdError),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Empty => write!(f, "type a command (help lists them)"),
            InputError::Unknown(word) => write!(f, "unknown command: {word}"),
            InputError::Usage(usage) => write!(f, "usage: {usage}"),
            InputError::BadId(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for InputError {}

pub const HELP: &str = "\
commands:
  answer <question> <option>   select an option (alias: a)
  next | prev                  move between questions (aliases: n, p, back)
  show                         print the current question
  submit                       grade the attempt
  retry                        start again after a result
  quit                         leave; an unfinished attempt can be resumed later";

pub fn parse(line: &str) -> Result<Input, InputError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err(InputError::Empty);
    };

    let input = match command.to_ascii_lowercase().as_str() {
        "answer" | "a" => {
            const USAGE: &str = "answer <question> <option>";
            let question = words.next().ok_or(InputError::Usage(USAGE))?;
            let option = words.next().ok_or(InputError::Usage(USAGE))?;
            Input::Answer {
                question: question.parse().map_err(InputError::BadId)?,
                option: option.parse().map_err(InputError::BadId)?,
            }
        }
        "next" | "n" => Input::Next,
        "prev" | "p" | "back" => Input::Prev,
        "submit" => Input::Submit,
        "retry" => Input::Retry,
        "show" | "s" => Input::Show,
        "help" | "h" | "?" => Input::Help,
        "quit" | "q" | "exit" => Input::Quit,
        other => return Err(InputError::Unknown(other.to_string())),
    };

    if words.next().is_some() {
        return Err(InputError::Usage("one command per line"));
    }
    Ok(input)
}
