//! Composition root for one test session.
//!
//! A controller spawns a single actor task that owns every piece of session
//! state. Inputs and remote results are serialized through one channel, so
//! feed updates and navigation never interleave. Derived values are published
//! on `watch` channels, which always hold the latest value for late readers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use exam_core::Clock;
use exam_core::model::{
    AnswerSelection, Course, DisplaySettings, Question, Test, TestMode, TestType, UserTestId,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::bottom_action::{self, PrimaryAction};
use crate::cursor::{CursorEvent, NavigationCursor};
use crate::error::SessionError;
use crate::events::{SessionBus, SessionEvent};
use crate::feed::{self, QuestionRenderState};
use crate::question_service::QuestionService;
use crate::retry::{RetryPrompt, retry};
use crate::submission::{SubmissionOutcome, SubmissionTicket, SubmissionTracker, submit_answer};

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Everything a session needs to know up front.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    course: Course,
    test_type: TestType,
    subscription_active: bool,
    test_mode: TestMode,
    display_settings: DisplaySettings,
    clock: Clock,
}

impl SessionConfig {
    #[must_use]
    pub fn new(course: Course, test_type: TestType) -> Self {
        Self {
            course,
            test_type,
            subscription_active: false,
            test_mode: TestMode::default(),
            display_settings: DisplaySettings::default(),
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_subscription_active(mut self, active: bool) -> Self {
        self.subscription_active = active;
        self
    }

    #[must_use]
    pub fn with_test_mode(mut self, mode: TestMode) -> Self {
        self.test_mode = mode;
        self
    }

    #[must_use]
    pub fn with_display_settings(mut self, settings: DisplaySettings) -> Self {
        self.display_settings = settings;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

/// Published once the learner submits a finished test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedTest {
    pub user_test_id: Option<UserTestId>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Handle to a running test session.
///
/// Dropping the handle (or calling [`shutdown`](Self::shutdown)) cancels the
/// session and every retry loop it started.
pub struct TestSessionController {
    commands: mpsc::UnboundedSender<Command>,
    outputs: SessionOutputs,
    cancel: CancellationToken,
}

impl TestSessionController {
    /// Start a session and begin fetching its question set.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(
        config: SessionConfig,
        questions: Arc<dyn QuestionService>,
        retry_prompt: Arc<dyn RetryPrompt>,
        bus: SessionBus,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (publishers, outputs) = channels(&config);
        let cancel = CancellationToken::new();
        let span = info_span!(
            "test_session",
            course = %config.course.id,
            test_type = %config.test_type,
        );
        let bus_rx = bus.subscribe();

        let actor = SessionActor {
            started_at: config.clock.now(),
            test_mode: config.test_mode,
            config,
            service: questions,
            prompt: retry_prompt,
            bus,
            commands: commands.clone(),
            cancel: cancel.clone(),
            questions: Vec::new(),
            cursor: NavigationCursor::new(),
            selection: None,
            live_answer: None,
            submissions: SubmissionTracker::new(),
            user_test_id: None,
            out: publishers,
        };
        tokio::spawn(actor.run(command_rx, bus_rx).instrument(span));

        Self {
            commands,
            outputs,
            cancel,
        }
    }

    /// Move focus to the next unanswered question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` once the session has ended.
    pub fn advance(&self) -> Result<(), SessionError> {
        self.send(Command::Advance)
    }

    /// Move focus to the previous unanswered question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` once the session has ended.
    pub fn retreat(&self) -> Result<(), SessionError> {
        self.send(Command::Retreat)
    }

    /// Replace the pending choice for the focused question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` once the session has ended.
    pub fn select(&self, selection: AnswerSelection) -> Result<(), SessionError> {
        self.send(Command::Select(selection))
    }

    /// Grade the pending choice and report it to the judge.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` once the session has ended.
    pub fn confirm(&self) -> Result<(), SessionError> {
        self.send(Command::Confirm)
    }

    /// Submit the finished test. Ignored unless the end-of-test signal is set.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` once the session has ended.
    pub fn submit(&self) -> Result<(), SessionError> {
        self.send(Command::Submit)
    }

    /// Stop the session and cancel outstanding remote work.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    #[must_use]
    pub fn course_name(&self) -> watch::Receiver<String> {
        self.outputs.course_name.clone()
    }

    #[must_use]
    pub fn feed(&self) -> watch::Receiver<Vec<QuestionRenderState>> {
        self.outputs.feed.clone()
    }

    #[must_use]
    pub fn focused_question(&self) -> watch::Receiver<Option<QuestionRenderState>> {
        self.outputs.focused.clone()
    }

    #[must_use]
    pub fn is_end_of_test(&self) -> watch::Receiver<bool> {
        self.outputs.end_of_test.clone()
    }

    #[must_use]
    pub fn bottom_action(&self) -> watch::Receiver<PrimaryAction> {
        self.outputs.bottom_action.clone()
    }

    #[must_use]
    pub fn submission_pending(&self) -> watch::Receiver<bool> {
        self.outputs.submission_pending.clone()
    }

    #[must_use]
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.outputs.loading.clone()
    }

    #[must_use]
    pub fn user_test_id(&self) -> watch::Receiver<Option<UserTestId>> {
        self.outputs.user_test_id.clone()
    }

    #[must_use]
    pub fn needs_payment(&self) -> watch::Receiver<bool> {
        self.outputs.needs_payment.clone()
    }

    #[must_use]
    pub fn outcome(&self) -> watch::Receiver<Option<SubmittedTest>> {
        self.outputs.outcome.clone()
    }

    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}

impl Drop for TestSessionController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

//
// ─── CHANNELS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
enum Command {
    Advance,
    Retreat,
    Select(AnswerSelection),
    Confirm,
    Submit,
    TestFetched(FetchOutcome),
    SubmissionFinished {
        selection: AnswerSelection,
        ticket: SubmissionTicket,
        outcome: SubmissionOutcome,
    },
}

#[derive(Debug)]
enum FetchOutcome {
    Loaded(Test),
    Empty,
    Abandoned,
}

struct Publishers {
    course_name: watch::Sender<String>,
    feed: watch::Sender<Vec<QuestionRenderState>>,
    focused: watch::Sender<Option<QuestionRenderState>>,
    end_of_test: watch::Sender<bool>,
    bottom_action: watch::Sender<PrimaryAction>,
    submission_pending: watch::Sender<bool>,
    loading: watch::Sender<bool>,
    user_test_id: watch::Sender<Option<UserTestId>>,
    needs_payment: watch::Sender<bool>,
    outcome: watch::Sender<Option<SubmittedTest>>,
}

struct SessionOutputs {
    course_name: watch::Receiver<String>,
    feed: watch::Receiver<Vec<QuestionRenderState>>,
    focused: watch::Receiver<Option<QuestionRenderState>>,
    end_of_test: watch::Receiver<bool>,
    bottom_action: watch::Receiver<PrimaryAction>,
    submission_pending: watch::Receiver<bool>,
    loading: watch::Receiver<bool>,
    user_test_id: watch::Receiver<Option<UserTestId>>,
    needs_payment: watch::Receiver<bool>,
    outcome: watch::Receiver<Option<SubmittedTest>>,
}

fn channels(config: &SessionConfig) -> (Publishers, SessionOutputs) {
    let (course_name, course_name_rx) = watch::channel(config.course.name.clone());
    let (feed, feed_rx) = watch::channel(Vec::new());
    let (focused, focused_rx) = watch::channel(None);
    let (end_of_test, end_of_test_rx) = watch::channel(true);
    let (bottom_action, bottom_action_rx) = watch::channel(PrimaryAction::Hidden);
    let (submission_pending, submission_pending_rx) = watch::channel(false);
    let (loading, loading_rx) = watch::channel(true);
    let (user_test_id, user_test_id_rx) = watch::channel(None);
    let (needs_payment, needs_payment_rx) = watch::channel(false);
    let (outcome, outcome_rx) = watch::channel(None);

    (
        Publishers {
            course_name,
            feed,
            focused,
            end_of_test,
            bottom_action,
            submission_pending,
            loading,
            user_test_id,
            needs_payment,
            outcome,
        },
        SessionOutputs {
            course_name: course_name_rx,
            feed: feed_rx,
            focused: focused_rx,
            end_of_test: end_of_test_rx,
            bottom_action: bottom_action_rx,
            submission_pending: submission_pending_rx,
            loading: loading_rx,
            user_test_id: user_test_id_rx,
            needs_payment: needs_payment_rx,
            outcome: outcome_rx,
        },
    )
}

/// Publish `value` unless it equals the current one.
fn publish_changed<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}

//
// ─── ACTOR ─────────────────────────────────────────────────────────────────────
//

enum Wake {
    Cancelled,
    Command(Option<Command>),
    Bus(Result<SessionEvent, broadcast::error::RecvError>),
}

enum Flow {
    Continue,
    Finish,
}

struct SessionActor {
    config: SessionConfig,
    test_mode: TestMode,
    started_at: DateTime<Utc>,
    service: Arc<dyn QuestionService>,
    prompt: Arc<dyn RetryPrompt>,
    bus: SessionBus,
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    questions: Vec<Question>,
    cursor: NavigationCursor,
    /// Pending choice for the focused question.
    selection: Option<AnswerSelection>,
    /// Most recently confirmed answer; cleared when focus moves.
    live_answer: Option<AnswerSelection>,
    submissions: SubmissionTracker,
    user_test_id: Option<UserTestId>,
    out: Publishers,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        bus_rx: broadcast::Receiver<SessionEvent>,
    ) {
        info!("test session started");
        let cancel = self.cancel.clone();
        let mut bus_rx = Some(bus_rx);
        self.start_fetch();

        loop {
            let wake = tokio::select! {
                biased;
                () = cancel.cancelled() => Wake::Cancelled,
                command = commands.recv() => Wake::Command(command),
                event = next_bus_event(&mut bus_rx) => Wake::Bus(event),
            };

            match wake {
                Wake::Cancelled | Wake::Command(None) => break,
                Wake::Command(Some(command)) => {
                    if let Flow::Finish = self.handle(command) {
                        break;
                    }
                }
                Wake::Bus(Ok(event)) => self.handle_bus(event),
                Wake::Bus(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(skipped, "session bus lagged; events dropped");
                }
                Wake::Bus(Err(broadcast::error::RecvError::Closed)) => bus_rx = None,
            }
        }

        self.cancel.cancel();
        info!("test session ended");
    }

    fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Advance => self.navigate(CursorEvent::Advance),
            Command::Retreat => self.navigate(CursorEvent::Retreat),
            Command::Select(selection) => self.select(selection),
            Command::Confirm => self.confirm(),
            Command::Submit => return self.submit(),
            Command::TestFetched(outcome) => self.test_fetched(outcome),
            Command::SubmissionFinished {
                selection,
                ticket,
                outcome,
            } => self.submission_finished(&selection, ticket, outcome),
        }
        Flow::Continue
    }

    fn handle_bus(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::CourseChanged(course) if course.id == self.config.course.id => {
                debug!(name = %course.name, "course renamed");
                publish_changed(&self.out.course_name, course.name.clone());
                self.config.course = course;
            }
            SessionEvent::CourseChanged(course) => {
                debug!(other = %course.id, "change for another course ignored");
            }
            SessionEvent::TestModeChanged(mode) => {
                info!(?mode, "test mode changed");
                self.test_mode = mode;
                if let Some(answer) = self.live_answer.clone() {
                    self.regrade(answer);
                }
            }
            SessionEvent::AnswerGraded { .. }
            | SessionEvent::TestPassed { .. }
            | SessionEvent::TestSubmitted { .. } => {}
        }
    }

    // ─── Remote work ──────────────────────────────────────────────────────────

    fn start_fetch(&mut self) {
        publish_changed(&self.out.loading, true);

        let service = Arc::clone(&self.service);
        let prompt = Arc::clone(&self.prompt);
        let tx = self.commands.clone();
        let cancel = self.cancel.child_token();
        let course_id = self.config.course.id;
        let test_type = self.config.test_type;
        let subscribed = self.config.subscription_active;

        let task = async move {
            let fetch = retry(
                || service.fetch(course_id, test_type, subscribed),
                |error| prompt.retry_trigger(error),
            );
            tokio::select! {
                () = cancel.cancelled() => debug!("question set fetch cancelled"),
                result = fetch => {
                    let outcome = match result {
                        Some(Some(test)) => FetchOutcome::Loaded(test),
                        Some(None) => FetchOutcome::Empty,
                        None => FetchOutcome::Abandoned,
                    };
                    let _ = tx.send(Command::TestFetched(outcome));
                }
            }
        };
        tokio::spawn(task.in_current_span());
    }

    fn start_submission(
        &self,
        selection: AnswerSelection,
        user_test_id: UserTestId,
        ticket: SubmissionTicket,
    ) {
        let service = Arc::clone(&self.service);
        let prompt = Arc::clone(&self.prompt);
        let tx = self.commands.clone();
        let cancel = self.cancel.child_token();

        let task = async move {
            let submission =
                submit_answer(service.as_ref(), prompt.as_ref(), &selection, user_test_id);
            let finished = tokio::select! {
                () = cancel.cancelled() => None,
                outcome = submission => Some(outcome),
            };
            match finished {
                Some(outcome) => {
                    let _ = tx.send(Command::SubmissionFinished {
                        selection,
                        ticket,
                        outcome,
                    });
                }
                None => debug!(question_id = %selection.question_id(), "answer submission cancelled"),
            }
        };
        tokio::spawn(task.in_current_span());
    }

    fn test_fetched(&mut self, outcome: FetchOutcome) {
        publish_changed(&self.out.loading, false);

        let test = match outcome {
            FetchOutcome::Loaded(test) => test,
            FetchOutcome::Empty => {
                info!("question service returned no test");
                return;
            }
            FetchOutcome::Abandoned => {
                info!("question set fetch abandoned");
                return;
            }
        };

        let needs_payment = test.paid && !self.config.subscription_active;
        self.user_test_id = test.user_test_id;
        self.questions = test.questions;
        self.selection = None;
        self.live_answer = None;
        publish_changed(&self.out.user_test_id, self.user_test_id);
        publish_changed(&self.out.needs_payment, needs_payment);

        let feed = feed::reduce(
            &[],
            &self.questions,
            None,
            self.test_mode,
            &self.config.display_settings,
        );
        info!(questions = feed.len(), needs_payment, "question set loaded");
        self.replace_feed(feed);
    }

    fn submission_finished(
        &mut self,
        selection: &AnswerSelection,
        ticket: SubmissionTicket,
        outcome: SubmissionOutcome,
    ) {
        let established = self
            .submissions
            .finish(selection.question_id(), ticket, outcome);
        if established == Some(true) {
            if let Some(user_test_id) = self.user_test_id {
                self.bus.publish(SessionEvent::TestPassed {
                    course_id: self.config.course.id,
                    user_test_id,
                });
            }
        }
        self.publish_submission_state();
    }

    // ─── Learner input ────────────────────────────────────────────────────────

    fn navigate(&mut self, event: CursorEvent) {
        self.cursor.apply(event);
        self.selection = None;
        self.live_answer = None;
        debug!(focused = ?self.cursor.focused_id(), "focus moved");
        self.publish_focus();
    }

    fn select(&mut self, selection: AnswerSelection) {
        if self.cursor.focused_id() != Some(selection.question_id()) {
            debug!(question_id = %selection.question_id(), "selection for unfocused question ignored");
            return;
        }
        self.selection = Some(selection);
        self.refresh_bottom_action();
    }

    fn confirm(&mut self) {
        let Some(selection) = self.selection.clone().filter(|s| !s.is_empty()) else {
            debug!("confirm without a selection ignored");
            return;
        };
        let Some(focused) = self.cursor.focused() else {
            debug!("confirm without a focused question ignored");
            return;
        };
        if focused.question_id != selection.question_id() || focused.is_answered {
            debug!(question_id = %selection.question_id(), "confirm for unavailable question ignored");
            return;
        }

        if let Some(question) = self.questions.iter().find(|q| q.id == selection.question_id()) {
            let is_correct = feed::answer_verdict(question, &selection);
            info!(question_id = %question.id, is_correct, "answer graded");
            self.bus.publish(SessionEvent::AnswerGraded {
                course_name: self.config.course.name.clone(),
                test_type: self.config.test_type,
                question_id: question.id,
                is_correct,
            });
        }
        self.regrade(selection.clone());
        self.report(selection);
    }

    fn submit(&mut self) -> Flow {
        if !self.submissions.is_end_of_test() {
            debug!("submit before end of test ignored");
            return Flow::Continue;
        }
        if self.cursor.feed().is_empty() {
            debug!("submit before questions loaded ignored");
            return Flow::Continue;
        }

        let submitted = SubmittedTest {
            user_test_id: self.user_test_id,
            started_at: self.started_at,
            submitted_at: self.config.clock.now(),
        };
        info!(
            user_test_id = ?submitted.user_test_id,
            elapsed_secs = self.config.clock.elapsed_since(self.started_at).num_seconds(),
            "test submitted"
        );
        self.bus.publish(SessionEvent::TestSubmitted {
            course_id: self.config.course.id,
            user_test_id: self.user_test_id,
        });
        self.out.outcome.send_replace(Some(submitted));
        Flow::Finish
    }

    // ─── Derivations ──────────────────────────────────────────────────────────

    fn regrade(&mut self, answer: AnswerSelection) {
        let feed = feed::reduce(
            self.cursor.feed(),
            &self.questions,
            Some(&answer),
            self.test_mode,
            &self.config.display_settings,
        );
        self.live_answer = Some(answer);
        self.replace_feed(feed);
    }

    fn report(&mut self, selection: AnswerSelection) {
        let Some(user_test_id) = self.user_test_id else {
            warn!("test has no user-test id; answer cannot be reported");
            self.submissions.mark_unreportable();
            self.publish_submission_state();
            return;
        };
        let Some(ticket) = self.submissions.begin(selection.question_id()) else {
            debug!(question_id = %selection.question_id(), "submission already in flight");
            return;
        };
        self.publish_submission_state();
        self.start_submission(selection, user_test_id, ticket);
    }

    fn replace_feed(&mut self, feed: Vec<QuestionRenderState>) {
        self.out.feed.send_replace(feed.clone());
        self.cursor.apply(CursorEvent::FeedLoaded(feed));
        self.publish_focus();
    }

    fn publish_focus(&mut self) {
        // Always notify: the focused state may have new content under the same id.
        self.out.focused.send_replace(self.cursor.focused().cloned());
        self.refresh_bottom_action();
    }

    fn publish_submission_state(&mut self) {
        publish_changed(&self.out.end_of_test, self.submissions.is_end_of_test());
        publish_changed(&self.out.submission_pending, self.submissions.is_pending());
        self.refresh_bottom_action();
    }

    fn refresh_bottom_action(&mut self) {
        let action = bottom_action::resolve(
            self.submissions.is_end_of_test(),
            self.cursor.focused(),
            self.selection.as_ref(),
        );
        publish_changed(&self.out.bottom_action, action);
    }
}

async fn next_bus_event(
    bus: &mut Option<broadcast::Receiver<SessionEvent>>,
) -> Result<SessionEvent, broadcast::error::RecvError> {
    match bus {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
