#![forbid(unsafe_code)]

pub mod bottom_action;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod events;
pub mod feed;
pub mod question_service;
pub mod retry;
pub mod submission;

pub use exam_core::Clock;

pub use bottom_action::PrimaryAction;
pub use controller::{SessionConfig, SubmittedTest, TestSessionController};
pub use cursor::{CursorEvent, NavigationCursor};
pub use error::{QuestionServiceError, SessionError};
pub use events::{SessionBus, SessionEvent};
pub use feed::{
    AnswerOption, AnswerOutcome, ContentBlock, GradedAnswer, QuestionRenderState,
};
pub use question_service::{InMemoryQuestionService, QuestionService, SubmittedAnswer};
pub use retry::{AlwaysRetry, NoRetry, RetryPrompt, RetryTrigger, retry};
pub use submission::{SubmissionOutcome, SubmissionTracker};
