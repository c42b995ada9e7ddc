mod args;
mod report;

use std::sync::Arc;

use lesson_core::model::Lesson;
use lesson_core::pipeline::PipelineDefinition;
use lesson_core::Clock;
use services::views::assignee_options;
use services::{Command, LessonSession, MutationOutcome, NoticeLevel, SessionEvent};
use storage::demo_records;
use storage::repository::Storage;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::{print_usage, Action, Options};
use crate::report::Report;

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_notice(event: &SessionEvent) {
    if let SessionEvent::Notice(notice) = event {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{tag}] {}", notice.message);
    }
}

fn build_storage(
    options: &Options,
    pipeline: &Arc<PipelineDefinition>,
    clock: Clock,
) -> Result<Storage, Box<dyn std::error::Error>> {
    if options.demo {
        let (storage, backend) = Storage::in_memory(Arc::clone(pipeline));
        backend.seed(demo_records(pipeline, clock.today()))?;
        tracing::info!("using built-in demo lessons");
        return Ok(storage);
    }
    // Parsing guarantees a backend when not in demo mode.
    let config = options.backend.clone().ok_or(args::ArgsError::MissingBackend)?;
    tracing::info!(url = %config.base_url, timeout_secs = config.timeout.as_secs(), "using lesson backend");
    Ok(Storage::http(config, Arc::clone(pipeline))?)
}

fn print_report(session: &LessonSession, options: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let filter = options
        .filter
        .clone()
        .retain_within(&assignee_options(session.lessons()));
    let visible: Vec<Lesson> = filter
        .apply(session.lessons())
        .into_iter()
        .cloned()
        .collect();
    let report = Report::build(
        session.pipeline(),
        &visible,
        session.clock().today(),
        filter,
        options.matrix.map(|phase| (phase, options.sort)),
    );

    if options.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

async fn watch(session: &mut LessonSession, options: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let mut interval = tokio::time::interval(options.poll);
    tracing::info!(poll_secs = options.poll.as_secs(), "watching lessons");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match session.refresh().await {
                    Ok(count) => {
                        let stats = session.review_data().stats;
                        tracing::info!(
                            count,
                            delayed = stats.delay_count,
                            due_soon = stats.warning_count,
                            pending = session.pending_mutations(),
                            "snapshot refreshed"
                        );
                        print_report(session, options)?;
                    }
                    // Already surfaced as a notice; keep the last good snapshot.
                    Err(err) => tracing::debug!(error = %err, "refresh skipped"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping watch");
                return Ok(());
            }
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let options = Options::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let clock = options.today.map_or_else(Clock::default_clock, Clock::fixed);
    let pipeline = Arc::new(PipelineDefinition::standard());
    let storage = build_storage(&options, &pipeline, clock)?;

    let mut session = LessonSession::from_storage(&storage, Arc::clone(&pipeline), clock);
    session.subscribe(print_notice);

    if matches!(options.action, Action::Watch) {
        return watch(&mut session, &options).await;
    }

    session.refresh().await?;

    match options.action.clone() {
        Action::Report | Action::Watch => print_report(&session, &options)?,
        Action::Toggle { row, step, value } => {
            let outcome = session
                .execute(Command::toggle_step(row, step.clone(), value))
                .await?;
            report_outcome(outcome, &format!("row {row} {step}"))?;
        }
        Action::Edit { row, field, value } => {
            let outcome = session
                .execute(Command::edit_field(row, field, value)?)
                .await?;
            report_outcome(outcome, &format!("row {row} {field}"))?;
        }
        Action::Add(draft) => {
            let created = session.create_lesson(draft).await?;
            println!("created lesson at row {}", created.row_index);
            if let Some(url) = created.folder_url {
                println!("folder: {url}");
            }
            if let Some(err) = created.folder_error {
                eprintln!("folder not created: {err}");
            }
        }
        Action::Delete { row } => {
            session.delete_lesson(row).await?;
            println!("deleted row {row}");
        }
        Action::Review { row, step } => {
            session.request_review(row, step.clone()).await?;
            println!("review requested for row {row} {step}");
        }
    }

    Ok(())
}

fn report_outcome(outcome: MutationOutcome, target: &str) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        MutationOutcome::Confirmed => {
            println!("updated {target}");
            Ok(())
        }
        other => Err(format!("update of {target} did not apply ({other:?})").into()),
    }
}

#[tokio::main]
async fn main() {
    setup_logging();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
