use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::ids::{AnswerId, QuestionId};

/// The answers a learner picked for one question.
///
/// Immutable once built; a new confirm creates a new selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSelection {
    question_id: QuestionId,
    answer_ids: BTreeSet<AnswerId>,
}

impl AnswerSelection {
    #[must_use]
    pub fn new(question_id: QuestionId, answer_ids: impl IntoIterator<Item = AnswerId>) -> Self {
        Self {
            question_id,
            answer_ids: answer_ids.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn answer_ids(&self) -> &BTreeSet<AnswerId> {
        &self.answer_ids
    }

    #[must_use]
    pub fn contains(&self, id: AnswerId) -> bool {
        self.answer_ids.contains(&id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answer_ids.is_empty()
    }
}
