use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use exam_core::model::{AnswerSelection, Course, CourseId, Test, TestMode, TestType};
use serde::Deserialize;
use services::{
    AlwaysRetry, ContentBlock, InMemoryQuestionService, NoRetry, PrimaryAction,
    QuestionRenderState, RetryPrompt, SessionBus, SessionConfig, SessionEvent,
    TestSessionController,
};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFixture,
    UnknownArg(String),
    InvalidCourseId { raw: String },
    InvalidTestType { raw: String },
    InvalidMode { raw: String },
    InvalidFailCount { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFixture => write!(f, "--fixture (or EXAM_FIXTURE) is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course-id value: {raw}"),
            ArgsError::InvalidTestType { raw } => write!(f, "invalid --test-type value: {raw}"),
            ArgsError::InvalidMode { raw } => write!(f, "invalid --mode value: {raw}"),
            ArgsError::InvalidFailCount { raw } => write!(f, "invalid --fail-first value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Error)]
enum FixtureError {
    #[error("cannot read fixture {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse fixture {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  cargo run -p app -- --fixture <path> [--course-id <id>] [--test-type <type>] \\"
    );
    eprintln!("                      [--mode <full|exam>] [--subscribed] [--fail-first <n>]");
    eprintln!();
    eprintln!("Test types:");
    eprintln!("  ten-set, failed-set, qotd, random-set, id:<n>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --course-id  the fixture's course");
    eprintln!("  --test-type  ten-set");
    eprintln!("  --mode       full");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_FIXTURE, EXAM_COURSE_ID, EXAM_TEST_TYPE, EXAM_TEST_MODE, RUST_LOG");
}

//
// ─── ARGS ──────────────────────────────────────────────────────────────────────
//

struct Args {
    fixture: PathBuf,
    course_id: Option<CourseId>,
    test_type: TestType,
    mode: TestMode,
    subscribed: bool,
    fail_first: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut fixture = std::env::var("EXAM_FIXTURE").ok().map(PathBuf::from);
        let mut course_id = std::env::var("EXAM_COURSE_ID")
            .ok()
            .and_then(|value| value.parse::<CourseId>().ok());
        let mut test_type = std::env::var("EXAM_TEST_TYPE")
            .ok()
            .and_then(|value| value.parse::<TestType>().ok())
            .unwrap_or(TestType::TenQuestionSet);
        let mut mode = std::env::var("EXAM_TEST_MODE")
            .ok()
            .and_then(|value| parse_mode(&value))
            .unwrap_or(TestMode::FullReview);
        let mut subscribed = false;
        let mut fail_first = 0;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--fixture" => {
                    fixture = Some(PathBuf::from(require_value(args, "--fixture")?));
                }
                "--course-id" => {
                    let value = require_value(args, "--course-id")?;
                    let parsed = value
                        .parse::<CourseId>()
                        .map_err(|_| ArgsError::InvalidCourseId { raw: value.clone() })?;
                    course_id = Some(parsed);
                }
                "--test-type" => {
                    let value = require_value(args, "--test-type")?;
                    test_type = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidTestType { raw: value.clone() })?;
                }
                "--mode" => {
                    let value = require_value(args, "--mode")?;
                    mode = parse_mode(&value).ok_or(ArgsError::InvalidMode { raw: value })?;
                }
                "--subscribed" => subscribed = true,
                "--fail-first" => {
                    let value = require_value(args, "--fail-first")?;
                    fail_first = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidFailCount { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            fixture: fixture.ok_or(ArgsError::MissingFixture)?,
            course_id,
            test_type,
            mode,
            subscribed,
            fail_first,
        })
    }
}

fn parse_mode(raw: &str) -> Option<TestMode> {
    match raw.trim() {
        "full" => Some(TestMode::FullReview),
        "exam" => Some(TestMode::ExamSimulation),
        _ => None,
    }
}

//
// ─── FIXTURE ───────────────────────────────────────────────────────────────────
//

/// A course and the test the in-memory question service should hand out.
#[derive(Debug, Deserialize)]
struct Fixture {
    course: Course,
    test: Test,
}

fn load_fixture(path: &Path) -> Result<Fixture, FixtureError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| FixtureError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Serve `test` under the course the session will ask for.
fn fixture_service(
    course_id: CourseId,
    test_type: TestType,
    test: Test,
    fail_first: u32,
) -> InMemoryQuestionService {
    let service = InMemoryQuestionService::new();
    service.insert_test(course_id, test_type, test);
    service.fail_next_fetches(fail_first);
    service.fail_next_submissions(fail_first);
    service
}

//
// ─── SCRIPTED SESSION ──────────────────────────────────────────────────────────
//

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv)?;

    let fixture = load_fixture(&args.fixture)?;
    let course = Course::new(
        args.course_id.unwrap_or(fixture.course.id),
        fixture.course.name,
    );
    let course_id = course.id;
    let service = fixture_service(course_id, args.test_type, fixture.test, args.fail_first);

    // Without simulated failures a transport error is unexpected; give up on it.
    let prompt: Arc<dyn RetryPrompt> = if args.fail_first > 0 {
        Arc::new(AlwaysRetry)
    } else {
        Arc::new(NoRetry)
    };

    let bus = SessionBus::default();
    let mut events = bus.subscribe();
    let config = SessionConfig::new(course, args.test_type)
        .with_test_mode(args.mode)
        .with_subscription_active(args.subscribed);
    info!(course = %course_id, test_type = %args.test_type, "starting scripted session");

    let session = TestSessionController::spawn(config, Arc::new(service.clone()), prompt, bus);
    drive(&session).await?;
    session.shutdown();

    print_events(&mut events);
    println!(
        "fetch attempts: {}, submit attempts: {}",
        service.fetch_attempts(),
        service.submit_attempts()
    );
    Ok(())
}

/// Answer every reachable question with its first option, then submit.
async fn drive(session: &TestSessionController) -> Result<(), Box<dyn std::error::Error>> {
    let mut loading = session.loading();
    loading.wait_for(|busy| !*busy).await?;

    println!("course: {}", session.course_name().borrow().as_str());
    if session.feed().borrow().is_empty() {
        println!("no questions available");
        return Ok(());
    }
    if *session.needs_payment().borrow() {
        println!("this test requires an active subscription");
        return Ok(());
    }

    let mut focused = session.focused_question();
    let mut pending = session.submission_pending();

    loop {
        let Some(state) = focused.borrow_and_update().clone() else {
            println!("nothing left to answer");
            break;
        };
        if state.is_graded() || state.is_answered {
            break;
        }

        let Some(selection) = first_option(&state) else {
            debug!(question_id = %state.question_id, "question has no options");
            break;
        };
        println!(
            "question {}/{} ({}): choosing {:?}",
            state.position,
            state.total,
            state.question_id,
            selection.answer_ids()
        );
        session.select(selection)?;
        session.confirm()?;

        let graded = wait_focus(&mut focused, |s| {
            s.question_id == state.question_id && s.is_graded()
        })
        .await?;
        if let Some(graded) = graded {
            print_grading(&graded);
        }
        pending.wait_for(|busy| !*busy).await?;

        let has_next = session
            .feed()
            .borrow()
            .iter()
            .any(|s| s.position > state.position && !s.is_answered);
        if !has_next {
            break;
        }
        session.advance()?;
        wait_focus(&mut focused, |s| s.question_id != state.question_id).await?;
    }

    let action = *session.bottom_action().borrow();
    println!("primary action: {action:?}");
    if !*session.is_end_of_test().borrow() {
        println!("test is not finished yet");
        return Ok(());
    }
    if matches!(action, PrimaryAction::SubmitTest | PrimaryAction::GoBack) {
        session.submit()?;
        let mut outcome = session.outcome();
        let submitted = outcome.wait_for(Option::is_some).await?.clone();
        if let Some(submitted) = submitted {
            println!(
                "submitted user test {:?} at {}",
                submitted.user_test_id, submitted.submitted_at
            );
        }
    }
    Ok(())
}

async fn wait_focus(
    rx: &mut watch::Receiver<Option<QuestionRenderState>>,
    mut pred: impl FnMut(&QuestionRenderState) -> bool,
) -> Result<Option<QuestionRenderState>, watch::error::RecvError> {
    let state = rx
        .wait_for(|focused| focused.as_ref().is_some_and(&mut pred))
        .await?
        .clone();
    Ok(state)
}

fn first_option(state: &QuestionRenderState) -> Option<AnswerSelection> {
    state.blocks.iter().find_map(|block| match block {
        ContentBlock::Answers { options, .. } => options
            .first()
            .map(|option| AnswerSelection::new(state.question_id, [option.id])),
        _ => None,
    })
}

fn print_grading(state: &QuestionRenderState) {
    if let Some(results) = state.graded_results() {
        for graded in results {
            println!("  [{:?}] {}", graded.outcome, graded.option.text);
        }
    }
    for block in &state.blocks {
        match block {
            ContentBlock::ExplanationText { text, .. } => println!("  explanation: {text}"),
            ContentBlock::Reference(reference) => println!("  reference: {reference}"),
            _ => {}
        }
    }
}

fn print_events(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        println!("event: {event:?}");
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        if err.is::<ArgsError>() {
            print_usage();
        }
        std::process::exit(2);
    }
}
