use std::process::ExitCode;

use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lingua_core::model::LearnerId;
use services::{AppServices, Clock, LessonFlowError};

mod cli;
mod config;

use cli::{ArgsError, Command, print_usage};
use config::{AppConfig, normalize_sqlite_url, prepare_sqlite_dir};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app=info,services=info,storage=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

enum Failure {
    Usage(ArgsError),
    Flow(LessonFlowError),
    Startup(Box<dyn std::error::Error>),
}

impl From<LessonFlowError> for Failure {
    fn from(err: LessonFlowError) -> Self {
        Failure::Flow(err)
    }
}

async fn execute(
    services: &AppServices,
    learner: LearnerId,
    command: Command,
) -> Result<Value, Failure> {
    let to_json = |value: Result<Value, serde_json::Error>| {
        value.map_err(|e| Failure::Startup(Box::new(e)))
    };
    let engine = services.progress_engine();
    let catalog = services.catalog();
    let exercises = services.exercises();

    match command {
        Command::Steps { lesson } => {
            to_json(serde_json::to_value(engine.get_lesson_steps(learner, lesson).await?))
        }
        Command::CompleteStep {
            lesson,
            step,
            score,
        } => to_json(serde_json::to_value(
            engine.complete_step(learner, lesson, &step, score).await?,
        )),
        Command::CompleteLesson {
            lesson,
            xp,
            minutes,
        } => to_json(serde_json::to_value(
            engine.complete_lesson(learner, lesson, xp, minutes).await?,
        )),
        Command::Lessons => to_json(serde_json::to_value(catalog.list_lessons(learner).await?)),
        Command::Next => to_json(serde_json::to_value(catalog.next_lesson(learner).await?)),
        Command::Profile => {
            to_json(serde_json::to_value(catalog.profile_overview(learner).await?))
        }
        Command::Vocabulary { lesson } => {
            to_json(serde_json::to_value(exercises.vocabulary(lesson).await?))
        }
        Command::Practice { lesson } => {
            to_json(serde_json::to_value(exercises.practice(lesson).await?))
        }
        Command::Review { lesson } => {
            to_json(serde_json::to_value(exercises.review(lesson).await?))
        }
        Command::Help => Ok(Value::Null),
    }
}

async fn run() -> Result<(), Failure> {
    dotenvy::dotenv().ok();
    let invocation = cli::parse(std::env::args().skip(1)).map_err(Failure::Usage)?;
    if invocation.command == Command::Help {
        print_usage();
        return Ok(());
    }

    let config = AppConfig::from_env().map_err(Failure::Usage)?;
    let db_url = invocation
        .db_url
        .map_or(config.db_url, normalize_sqlite_url);
    let learner = invocation.learner_id.unwrap_or(config.learner_id);

    // Open + migrate SQLite here so services stay storage-agnostic.
    prepare_sqlite_dir(&db_url).map_err(Failure::Startup)?;
    let services = AppServices::new_sqlite(&db_url, Clock::system(), config.shuffle_tiles)
        .await
        .map_err(|e| Failure::Startup(Box::new(e)))?;
    tracing::debug!(%db_url, learner_id = %learner, "services ready");

    let output = execute(&services, learner, invocation.command).await?;
    let rendered =
        serde_json::to_string_pretty(&output).map_err(|e| Failure::Startup(Box::new(e)))?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Usage(err)) => {
            eprintln!("{err}");
            print_usage();
            ExitCode::from(2)
        }
        Err(Failure::Flow(err)) => {
            tracing::info!(error = %err, "request rejected");
            println!("{}", json!({ "error": err.code() }));
            ExitCode::from(1)
        }
        Err(Failure::Startup(err)) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
    }
}
