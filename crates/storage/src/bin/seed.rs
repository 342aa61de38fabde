use std::fmt;

use chrono::{DateTime, Duration, Utc};
use lingua_core::model::{
    LearnerId, LearnerProfile, Lesson, LessonId, LessonStatus, Phrase, PhraseId, Question,
    QuestionId, QuestionKind, ReviewData,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    learner_id: LearnerId,
    language: String,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLearnerId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidLanguage { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLearnerId { raw } => write!(f, "invalid --learner value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLanguage { raw } => write!(f, "invalid --language value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LINGUA_DB_URL").unwrap_or_else(|_| "sqlite://lingua.sqlite3".into());
        let mut learner_id = std::env::var("LINGUA_LEARNER_ID")
            .ok()
            .and_then(|value| value.parse::<LearnerId>().ok())
            .unwrap_or_else(|| LearnerId::new(1));
        let mut language = "es".to_string();

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--learner" => {
                    let value = require_value(&mut args, "--learner")?;
                    learner_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLearnerId { raw: value.clone() })?;
                }
                "--language" => {
                    let value = require_value(&mut args, "--language")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidLanguage { raw: value });
                    }
                    language = value;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            learner_id,
            language,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [--db <sqlite_url>] [--learner <id>] [--language <code>]");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LINGUA_DB_URL, LINGUA_LEARNER_ID");
}

struct DemoLesson {
    title: &'static str,
    status: LessonStatus,
    phrases: &'static [(&'static str, &'static str)],
}

const DEMO_COURSE: &[DemoLesson] = &[
    DemoLesson {
        title: "Greetings",
        status: LessonStatus::Published,
        phrases: &[
            ("hola", "hello"),
            ("buenos días", "good morning"),
            ("¿cómo estás?", "how are you?"),
        ],
    },
    DemoLesson {
        title: "At the café",
        status: LessonStatus::Published,
        phrases: &[
            ("un café por favor", "a coffee please"),
            ("la cuenta por favor", "the bill please"),
        ],
    },
    DemoLesson {
        title: "Numbers",
        status: LessonStatus::Draft,
        phrases: &[("uno dos tres", "one two three")],
    },
];

/// Builds lessons with phrases, one practice question per phrase and a
/// scramble question for every multi-word phrase.
fn build_course(
    language: &str,
    now: DateTime<Utc>,
) -> Result<Vec<(Lesson, Vec<Phrase>, Vec<Question>)>, lingua_core::Error> {
    let mut out = Vec::with_capacity(DEMO_COURSE.len());
    let mut phrase_seq = 0_u64;
    let mut question_seq = 0_u64;

    for (idx, demo) in DEMO_COURSE.iter().enumerate() {
        let order = u32::try_from(idx).unwrap_or(u32::MAX);
        let lesson_id = LessonId::new(u64::from(order) + 1);
        let lesson = Lesson::new(
            lesson_id,
            demo.title,
            None,
            language,
            demo.status,
            order,
            now - Duration::days(7),
        )?;

        let mut phrases = Vec::new();
        let mut questions = Vec::new();
        for (p_idx, (text, translation)) in demo.phrases.iter().enumerate() {
            phrase_seq += 1;
            let p_order = u32::try_from(p_idx).unwrap_or(u32::MAX);
            let phrase = Phrase::new(
                PhraseId::new(phrase_seq),
                lesson_id,
                *text,
                *translation,
                p_order,
            )?;

            question_seq += 1;
            questions.push(
                Question::new(
                    QuestionId::new(question_seq),
                    lesson_id,
                    QuestionKind::Translate,
                    format!("Translate: {text}"),
                    p_order * 2,
                )?
                .with_options(Vec::new(), *translation)
                .with_phrase(phrase.id),
            );

            if phrase.word_count() > 1 {
                question_seq += 1;
                questions.push(
                    Question::new(
                        QuestionId::new(question_seq),
                        lesson_id,
                        QuestionKind::SentenceOrder,
                        "Put the words in order",
                        p_order * 2 + 1,
                    )?
                    .with_phrase(phrase.id)
                    .with_review_data(ReviewData {
                        meaning: Some((*translation).to_owned()),
                        ..ReviewData::default()
                    }),
                );
            }
            phrases.push(phrase);
        }
        out.push((lesson, phrases, questions));
    }

    Ok(out)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = Utc::now();

    let course = build_course(&args.language, now)?;
    for (lesson, phrases, questions) in &course {
        storage.lessons.upsert_lesson(lesson).await?;
        for phrase in phrases {
            storage.phrases.upsert_phrase(phrase).await?;
        }
        for question in questions {
            storage.questions.upsert_question(question).await?;
        }
    }

    if storage.profiles.get_profile(args.learner_id).await?.is_none() {
        let profile = LearnerProfile::new(args.learner_id, args.language.as_str())?;
        storage.profiles.upsert_profile(&profile).await?;
    }

    eprintln!(
        "seeded {} lessons for learner {} into {}",
        course.len(),
        args.learner_id,
        args.db_url
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
