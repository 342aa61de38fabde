use std::fmt;

use lingua_core::model::{LearnerId, LessonId};

#[derive(Debug)]
pub enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnexpectedArgument(String),
    UnknownArg(String),
    InvalidNumber { name: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidEnv { var: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "no command given"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnexpectedArgument(arg) => write!(f, "unexpected argument: {arg}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { name, raw } => write!(f, "invalid <{name}> value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidEnv { var, raw } => write!(f, "invalid {var} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app <command> [--db <sqlite_url>] [--learner <id>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  steps <lesson>                         show the lesson's steps");
    eprintln!("  complete-step <lesson> <step> [score]  finish one step");
    eprintln!("  complete-lesson <lesson> [xp] [min]    finish the whole lesson");
    eprintln!("  lessons                                list the course");
    eprintln!("  next                                   first unfinished lesson");
    eprintln!("  profile                                learner totals and streak");
    eprintln!("  vocabulary <lesson>                    phrases to learn");
    eprintln!("  practice <lesson>                      practice questions");
    eprintln!("  review <lesson>                        sentence-order exercises");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LINGUA_DB_URL, LINGUA_LEARNER_ID, LINGUA_SHUFFLE, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Steps {
        lesson: LessonId,
    },
    CompleteStep {
        lesson: LessonId,
        step: String,
        score: Option<u32>,
    },
    CompleteLesson {
        lesson: LessonId,
        xp: Option<u32>,
        minutes: Option<u32>,
    },
    Lessons,
    Next,
    Profile,
    Vocabulary {
        lesson: LessonId,
    },
    Practice {
        lesson: LessonId,
    },
    Review {
        lesson: LessonId,
    },
    Help,
}

/// A parsed command line. Flags left as `None` fall back to the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub db_url: Option<String>,
    pub learner_id: Option<LearnerId>,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

struct Positionals(std::vec::IntoIter<String>);

impl Positionals {
    fn required(&mut self, name: &'static str) -> Result<String, ArgsError> {
        self.0.next().ok_or(ArgsError::MissingArgument { name })
    }

    fn lesson(&mut self) -> Result<LessonId, ArgsError> {
        let raw = self.required("lesson")?;
        raw.parse()
            .map_err(|_| ArgsError::InvalidNumber { name: "lesson", raw })
    }

    fn optional_number(&mut self, name: &'static str) -> Result<Option<u32>, ArgsError> {
        self.0
            .next()
            .map(|raw| {
                raw.trim()
                    .parse::<u32>()
                    .map_err(|_| ArgsError::InvalidNumber { name, raw })
            })
            .transpose()
    }

    fn finish(mut self) -> Result<(), ArgsError> {
        match self.0.next() {
            Some(extra) => Err(ArgsError::UnexpectedArgument(extra)),
            None => Ok(()),
        }
    }
}

/// Parses `argv` without the program name.
///
/// # Errors
///
/// Returns `ArgsError` for unknown commands or flags and malformed values.
pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Invocation, ArgsError> {
    let mut args = args.into_iter();
    let mut db_url = None;
    let mut learner_id = None;
    let mut positionals = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(&mut args, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                db_url = Some(value);
            }
            "--learner" => {
                let value = require_value(&mut args, "--learner")?;
                let parsed = value.parse().map_err(|_| ArgsError::InvalidNumber {
                    name: "learner",
                    raw: value.clone(),
                })?;
                learner_id = Some(parsed);
            }
            "--help" | "-h" => positionals.insert(0, "help".to_string()),
            flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
            _ => positionals.push(arg),
        }
    }

    let mut rest = Positionals(positionals.into_iter());
    let name = rest.0.next().ok_or(ArgsError::MissingCommand)?;
    let command = match name.as_str() {
        "help" => {
            return Ok(Invocation {
                command: Command::Help,
                db_url,
                learner_id,
            });
        }
        "steps" => Command::Steps {
            lesson: rest.lesson()?,
        },
        "complete-step" => Command::CompleteStep {
            lesson: rest.lesson()?,
            step: rest.required("step")?,
            score: rest.optional_number("score")?,
        },
        "complete-lesson" => Command::CompleteLesson {
            lesson: rest.lesson()?,
            xp: rest.optional_number("xp")?,
            minutes: rest.optional_number("minutes")?,
        },
        "lessons" => Command::Lessons,
        "next" => Command::Next,
        "profile" => Command::Profile,
        "vocabulary" => Command::Vocabulary {
            lesson: rest.lesson()?,
        },
        "practice" => Command::Practice {
            lesson: rest.lesson()?,
        },
        "review" => Command::Review {
            lesson: rest.lesson()?,
        },
        _ => return Err(ArgsError::UnknownCommand(name)),
    };
    rest.finish()?;

    Ok(Invocation {
        command,
        db_url,
        learner_id,
    })
}
