//! Remote question collaborator and an in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use exam_core::model::{AnswerId, CourseId, QuestionId, Test, TestType, UserTestId};

use crate::error::QuestionServiceError;

/// Contract for fetching question sets and grading answers remotely.
///
/// `Ok(None)` is a legitimate "no data" outcome, distinct from an error.
#[async_trait]
pub trait QuestionService: Send + Sync {
    /// Fetch the question set for `test_type` in `course_id`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError` when the transport fails.
    async fn fetch(
        &self,
        course_id: CourseId,
        test_type: TestType,
        active_subscription: bool,
    ) -> Result<Option<Test>, QuestionServiceError>;

    /// Report an answer. The result tells whether the test is now complete.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError` when the transport fails.
    async fn submit_answer(
        &self,
        question_id: QuestionId,
        user_test_id: UserTestId,
        answer_ids: &[AnswerId],
    ) -> Result<Option<bool>, QuestionServiceError>;
}

/// An answer accepted by [`InMemoryQuestionService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub user_test_id: UserTestId,
    pub answer_ids: Vec<AnswerId>,
}

#[derive(Default)]
struct Inner {
    tests: HashMap<(CourseId, TestType), Test>,
    progress: HashMap<UserTestId, UserTestProgress>,
    fetch_failures: u32,
    submit_failures: u32,
    fetch_attempts: usize,
    submit_attempts: usize,
    fetch_subscription_flags: Vec<bool>,
    submissions: Vec<SubmittedAnswer>,
}

#[derive(Default)]
struct UserTestProgress {
    questions: HashSet<QuestionId>,
    answered: HashSet<QuestionId>,
}

/// In-memory question service for tests and local runs.
///
/// A submission completes the test once every question of its user test has
/// been answered. Failures can be queued to exercise retry paths.
#[derive(Clone, Default)]
pub struct InMemoryQuestionService {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryQuestionService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `test` for `(course_id, test_type)`.
    pub fn insert_test(&self, course_id: CourseId, test_type: TestType, test: Test) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(user_test_id) = test.user_test_id {
                inner
                    .progress
                    .insert(user_test_id, UserTestProgress::for_test(&test));
            }
            inner.tests.insert((course_id, test_type), test);
        }
    }

    /// Track grading progress for `test` without serving it from `fetch`.
    pub fn register_user_test(&self, user_test_id: UserTestId, test: &Test) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .progress
                .insert(user_test_id, UserTestProgress::for_test(test));
        }
    }

    /// Make the next `count` fetches fail with a transport error.
    pub fn fail_next_fetches(&self, count: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fetch_failures = count;
        }
    }

    /// Make the next `count` submissions fail with a transport error.
    pub fn fail_next_submissions(&self, count: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.submit_failures = count;
        }
    }

    #[must_use]
    pub fn fetch_attempts(&self) -> usize {
        self.inner.lock().map(|i| i.fetch_attempts).unwrap_or_default()
    }

    #[must_use]
    pub fn submit_attempts(&self) -> usize {
        self.inner.lock().map(|i| i.submit_attempts).unwrap_or_default()
    }

    /// Subscription flags passed to each fetch, in call order.
    #[must_use]
    pub fn fetch_subscription_flags(&self) -> Vec<bool> {
        self.inner
            .lock()
            .map(|i| i.fetch_subscription_flags.clone())
            .unwrap_or_default()
    }

    /// Answers accepted so far, in arrival order.
    #[must_use]
    pub fn submissions(&self) -> Vec<SubmittedAnswer> {
        self.inner
            .lock()
            .map(|i| i.submissions.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, QuestionServiceError> {
        self.inner
            .lock()
            .map_err(|e| QuestionServiceError::Unavailable(e.to_string()))
    }
}

impl UserTestProgress {
    fn for_test(test: &Test) -> Self {
        Self {
            questions: test.questions.iter().map(|q| q.id).collect(),
            answered: test
                .questions
                .iter()
                .filter(|q| q.is_answered)
                .map(|q| q.id)
                .collect(),
        }
    }
}

#[async_trait]
impl QuestionService for InMemoryQuestionService {
    async fn fetch(
        &self,
        course_id: CourseId,
        test_type: TestType,
        active_subscription: bool,
    ) -> Result<Option<Test>, QuestionServiceError> {
        let mut inner = self.lock()?;
        inner.fetch_attempts += 1;
        inner.fetch_subscription_flags.push(active_subscription);
        if inner.fetch_failures > 0 {
            inner.fetch_failures -= 1;
            return Err(QuestionServiceError::Unavailable("simulated outage".into()));
        }
        Ok(inner.tests.get(&(course_id, test_type)).cloned())
    }

    async fn submit_answer(
        &self,
        question_id: QuestionId,
        user_test_id: UserTestId,
        answer_ids: &[AnswerId],
    ) -> Result<Option<bool>, QuestionServiceError> {
        let mut inner = self.lock()?;
        inner.submit_attempts += 1;
        if inner.submit_failures > 0 {
            inner.submit_failures -= 1;
            return Err(QuestionServiceError::Timeout);
        }

        let Some(progress) = inner.progress.get_mut(&user_test_id) else {
            return Ok(None);
        };
        if !progress.questions.contains(&question_id) {
            return Ok(None);
        }
        progress.answered.insert(question_id);
        let complete = progress.answered.len() == progress.questions.len();

        inner.submissions.push(SubmittedAnswer {
            question_id,
            user_test_id,
            answer_ids: answer_ids.to_vec(),
        });
        Ok(Some(complete))
    }
}
