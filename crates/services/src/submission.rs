//! Bookkeeping for answer submissions and the end-of-test signal.

use std::collections::HashMap;

use exam_core::model::{AnswerSelection, QuestionId, UserTestId};
use tracing::{debug, info};

use crate::question_service::QuestionService;
use crate::retry::{RetryPrompt, retry};

/// Monotonic number given to each submission so late results cannot
/// overwrite the signal produced by a newer answer.
pub type SubmissionTicket = u64;

/// Result of one retried submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The remote judge answered; `None` means it could not tell.
    Completed { is_end_of_test: Option<bool> },
    /// The learner declined to retry.
    Abandoned,
}

/// Tracks in-flight submissions per question and derives the end-of-test signal.
#[derive(Debug, Clone)]
pub struct SubmissionTracker {
    in_flight: HashMap<QuestionId, SubmissionTicket>,
    next_ticket: SubmissionTicket,
    applied_ticket: Option<SubmissionTicket>,
    end_of_test: bool,
}

impl Default for SubmissionTracker {
    fn default() -> Self {
        Self {
            in_flight: HashMap::new(),
            next_ticket: 0,
            applied_ticket: None,
            // Nothing answered yet, nothing blocks the learner.
            end_of_test: true,
        }
    }
}

impl SubmissionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_end_of_test(&self) -> bool {
        self.end_of_test
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Reserve a ticket for `question_id`, or `None` while one is outstanding.
    pub fn begin(&mut self, question_id: QuestionId) -> Option<SubmissionTicket> {
        if self.in_flight.contains_key(&question_id) {
            return None;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight.insert(question_id, ticket);
        Some(ticket)
    }

    /// An answer was confirmed for a test without a user-test id; the remote
    /// side cannot be told, so the test cannot be finished.
    pub fn mark_unreportable(&mut self) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.applied_ticket = Some(ticket);
        self.end_of_test = false;
    }

    /// Record the outcome for `ticket` and return the end-of-test value it
    /// established, if any.
    pub fn finish(
        &mut self,
        question_id: QuestionId,
        ticket: SubmissionTicket,
        outcome: SubmissionOutcome,
    ) -> Option<bool> {
        if self.in_flight.get(&question_id) == Some(&ticket) {
            self.in_flight.remove(&question_id);
        }

        let SubmissionOutcome::Completed {
            is_end_of_test: Some(value),
        } = outcome
        else {
            return None;
        };

        if self.applied_ticket.is_some_and(|applied| applied > ticket) {
            debug!(%question_id, ticket, "stale submission result ignored");
            return None;
        }
        self.applied_ticket = Some(ticket);
        self.end_of_test = value;
        Some(value)
    }
}

/// Report `selection` to the remote judge, retrying through `prompt`.
pub async fn submit_answer(
    service: &dyn QuestionService,
    prompt: &dyn RetryPrompt,
    selection: &AnswerSelection,
    user_test_id: UserTestId,
) -> SubmissionOutcome {
    let answer_ids: Vec<_> = selection.answer_ids().iter().copied().collect();
    let question_id = selection.question_id();

    let result = retry(
        || service.submit_answer(question_id, user_test_id, &answer_ids),
        |error| prompt.retry_trigger(error),
    )
    .await;

    match result {
        Some(is_end_of_test) => {
            info!(%question_id, ?is_end_of_test, "answer submitted");
            SubmissionOutcome::Completed { is_end_of_test }
        }
        None => {
            info!(%question_id, "answer submission abandoned");
            SubmissionOutcome::Abandoned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerId, PossibleAnswer, Question, Test};

    use crate::question_service::InMemoryQuestionService;
    use crate::retry::{AlwaysRetry, NoRetry};

    fn qid(id: u64) -> QuestionId {
        QuestionId::new(id)
    }

    fn done(value: Option<bool>) -> SubmissionOutcome {
        SubmissionOutcome::Completed {
            is_end_of_test: value,
        }
    }

    #[test]
    fn end_of_test_defaults_to_true() {
        let tracker = SubmissionTracker::new();
        assert!(tracker.is_end_of_test());
        assert!(!tracker.is_pending());
    }

    #[test]
    fn same_question_cannot_be_submitted_twice_concurrently() {
        let mut tracker = SubmissionTracker::new();
        let first = tracker.begin(qid(1)).unwrap();
        assert!(tracker.begin(qid(1)).is_none());
        let second = tracker.begin(qid(2)).unwrap();
        assert!(tracker.is_pending());

        tracker.finish(qid(1), first, done(Some(false)));
        assert!(tracker.is_pending());
        assert!(tracker.begin(qid(1)).is_some());
        tracker.finish(qid(2), second, done(Some(false)));
    }

    #[test]
    fn undetermined_result_is_not_cached() {
        let mut tracker = SubmissionTracker::new();
        let ticket = tracker.begin(qid(1)).unwrap();
        assert_eq!(tracker.finish(qid(1), ticket, done(None)), None);
        assert!(tracker.is_end_of_test());
        assert!(!tracker.is_pending());
    }

    #[test]
    fn abandoned_submission_clears_pending_only() {
        let mut tracker = SubmissionTracker::new();
        let ticket = tracker.begin(qid(1)).unwrap();
        assert_eq!(
            tracker.finish(qid(1), ticket, SubmissionOutcome::Abandoned),
            None
        );
        assert!(!tracker.is_pending());
        assert!(tracker.is_end_of_test());
    }

    #[test]
    fn newer_answer_wins_over_late_result() {
        let mut tracker = SubmissionTracker::new();
        let older = tracker.begin(qid(1)).unwrap();
        let newer = tracker.begin(qid(2)).unwrap();

        assert_eq!(tracker.finish(qid(2), newer, done(Some(true))), Some(true));
        assert_eq!(tracker.finish(qid(1), older, done(Some(false))), None);
        assert!(tracker.is_end_of_test());
    }

    #[test]
    fn unreportable_answer_blocks_end_of_test() {
        let mut tracker = SubmissionTracker::new();
        tracker.mark_unreportable();
        assert!(!tracker.is_end_of_test());
    }

    fn service_with_two_questions() -> (InMemoryQuestionService, UserTestId) {
        let user_test_id = UserTestId::new(500);
        let questions = (1..=2)
            .map(|id| {
                Question::new(
                    qid(id),
                    format!("Q{id}"),
                    vec![PossibleAnswer::new(AnswerId::new(id * 10), "A", true)],
                )
            })
            .collect();
        let service = InMemoryQuestionService::new();
        service.register_user_test(user_test_id, &Test::new(user_test_id, questions));
        (service, user_test_id)
    }

    #[tokio::test]
    async fn submit_answer_reports_end_of_test() {
        let (service, user_test_id) = service_with_two_questions();
        let first = AnswerSelection::new(qid(1), [AnswerId::new(10)]);
        let second = AnswerSelection::new(qid(2), [AnswerId::new(20)]);

        let outcome = submit_answer(&service, &NoRetry, &first, user_test_id).await;
        assert_eq!(outcome, done(Some(false)));
        let outcome = submit_answer(&service, &NoRetry, &second, user_test_id).await;
        assert_eq!(outcome, done(Some(true)));
        assert_eq!(service.submissions().len(), 2);
    }

    #[tokio::test]
    async fn submit_answer_retries_and_abandons() {
        let (service, user_test_id) = service_with_two_questions();
        let selection = AnswerSelection::new(qid(1), [AnswerId::new(10)]);

        service.fail_next_submissions(2);
        let outcome = submit_answer(&service, &AlwaysRetry, &selection, user_test_id).await;
        assert_eq!(outcome, done(Some(false)));
        assert_eq!(service.submit_attempts(), 3);

        service.fail_next_submissions(1);
        let outcome = submit_answer(&service, &NoRetry, &selection, user_test_id).await;
        assert_eq!(outcome, SubmissionOutcome::Abandoned);
    }
}
