//! Session event bus.
//!
//! Replaces process-wide mediators: the bus is created by the caller and
//! handed to each controller, which subscribes on start and drops its
//! receiver when the session ends.

use exam_core::model::{Course, CourseId, QuestionId, TestMode, TestType, UserTestId};
use tokio::sync::broadcast;

/// Events exchanged between sessions and the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The selected course was updated elsewhere.
    CourseChanged(Course),
    /// The learner switched between full review and exam simulation.
    TestModeChanged(TestMode),
    /// An answer was graded locally; consumed by analytics.
    AnswerGraded {
        course_name: String,
        test_type: TestType,
        question_id: QuestionId,
        is_correct: bool,
    },
    /// The judge reported that every question of the test is answered.
    TestPassed {
        course_id: CourseId,
        user_test_id: UserTestId,
    },
    /// The learner submitted the finished test.
    TestSubmitted {
        course_id: CourseId,
        user_test_id: Option<UserTestId>,
    },
}

/// Broadcast bus shared by the sessions of one app instance.
#[derive(Debug, Clone)]
pub struct SessionBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to current subscribers; events with no subscriber are dropped.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new(64)
    }
}
