use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{TestId, UserTestId};
use crate::model::question::Question;

/// Which question set a session asks the question service for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    ById(TestId),
    TenQuestionSet,
    FailedQuestionsSet,
    QuestionOfTheDay,
    RandomSet,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::ById(id) => write!(f, "id:{id}"),
            TestType::TenQuestionSet => f.write_str("ten-set"),
            TestType::FailedQuestionsSet => f.write_str("failed-set"),
            TestType::QuestionOfTheDay => f.write_str("qotd"),
            TestType::RandomSet => f.write_str("random-set"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown test type: {raw}")]
pub struct ParseTestTypeError {
    raw: String,
}

impl FromStr for TestType {
    type Err = ParseTestTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseTestTypeError { raw: s.to_string() };
        match s {
            "ten-set" => Ok(TestType::TenQuestionSet),
            "failed-set" => Ok(TestType::FailedQuestionsSet),
            "qotd" => Ok(TestType::QuestionOfTheDay),
            "random-set" => Ok(TestType::RandomSet),
            other => other
                .strip_prefix("id:")
                .and_then(|raw| raw.parse::<TestId>().ok())
                .map(TestType::ById)
                .ok_or_else(err),
        }
    }
}

/// How grading is presented after an answer is confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    /// The profile has not reported a mode yet.
    #[default]
    Unset,
    FullReview,
    ExamSimulation,
}

impl TestMode {
    /// Whether correctness and explanations may be revealed for a test of
    /// `question_count` questions. A single-question test always reveals.
    #[must_use]
    pub fn reveals_grading(self, question_count: usize) -> bool {
        question_count == 1 || matches!(self, TestMode::FullReview)
    }
}

/// A question set returned by the question service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    #[serde(default)]
    pub user_test_id: Option<UserTestId>,
    /// Only available with an active subscription.
    #[serde(default)]
    pub paid: bool,
    pub questions: Vec<Question>,
}

impl Test {
    #[must_use]
    pub fn new(user_test_id: UserTestId, questions: Vec<Question>) -> Self {
        Self {
            user_test_id: Some(user_test_id),
            paid: false,
            questions,
        }
    }

    #[must_use]
    pub fn paid(mut self) -> Self {
        self.paid = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parses_cli_names() {
        assert_eq!("ten-set".parse(), Ok(TestType::TenQuestionSet));
        assert_eq!("qotd".parse(), Ok(TestType::QuestionOfTheDay));
        assert_eq!("id:12".parse(), Ok(TestType::ById(TestId::new(12))));
        assert!("id:".parse::<TestType>().is_err());
        assert!("weekly".parse::<TestType>().is_err());
    }

    #[test]
    fn test_type_display_parses_back() {
        for ty in [
            TestType::ById(TestId::new(4)),
            TestType::TenQuestionSet,
            TestType::FailedQuestionsSet,
            TestType::QuestionOfTheDay,
            TestType::RandomSet,
        ] {
            assert_eq!(ty.to_string().parse::<TestType>(), Ok(ty));
        }
    }

    #[test]
    fn grading_reveal_rules() {
        assert!(TestMode::FullReview.reveals_grading(5));
        assert!(!TestMode::ExamSimulation.reveals_grading(5));
        assert!(!TestMode::Unset.reveals_grading(5));
        assert!(TestMode::ExamSimulation.reveals_grading(1));
        assert!(TestMode::Unset.reveals_grading(1));
    }
}
