use serde::{Deserialize, Serialize};

use crate::model::content::QuestionMedia;
use crate::model::ids::{AnswerId, QuestionId};

/// One selectable option of a question.
///
/// `is_correct` is only ever read by the grading step; render states built for
/// ungraded questions never carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleAnswer {
    pub id: AnswerId,
    pub text: String,
    #[serde(default)]
    pub rich_text: Option<String>,
    #[serde(default)]
    pub image: Option<QuestionMedia>,
    pub is_correct: bool,
}

impl PossibleAnswer {
    #[must_use]
    pub fn new(id: AnswerId, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id,
            text: text.into(),
            rich_text: None,
            image: None,
            is_correct,
        }
    }
}

/// Explanation revealed after grading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub rich_text: Option<String>,
    #[serde(default)]
    pub media: Vec<QuestionMedia>,
}

impl Explanation {
    /// True when there is any text (plain or rich) or media to show.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.text.is_some() || self.rich_text.is_some() || !self.media.is_empty()
    }
}

/// A question as delivered by the question service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default)]
    pub rich_text: Option<String>,
    #[serde(default)]
    pub media: Vec<QuestionMedia>,
    #[serde(default)]
    pub is_multiple: bool,
    pub answers: Vec<PossibleAnswer>,
    #[serde(default)]
    pub explanation: Explanation,
    #[serde(default)]
    pub reference: Option<String>,
    /// Server-reported; only used to pre-filter navigation on load.
    #[serde(default)]
    pub is_answered: bool,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, text: impl Into<String>, answers: Vec<PossibleAnswer>) -> Self {
        Self {
            id,
            text: text.into(),
            rich_text: None,
            media: Vec::new(),
            is_multiple: false,
            answers,
            explanation: Explanation::default(),
            reference: None,
            is_answered: false,
        }
    }

    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.is_multiple = true;
        self
    }

    #[must_use]
    pub fn answered(mut self) -> Self {
        self.is_answered = true;
        self
    }

    #[must_use]
    pub fn with_media(mut self, media: QuestionMedia) -> Self {
        self.media.push(media);
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: Explanation) -> Self {
        self.explanation = explanation;
        self
    }

    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Reference text, if present and not blank.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref().filter(|r| !r.is_empty())
    }

    #[must_use]
    pub fn answer(&self, id: AnswerId) -> Option<&PossibleAnswer> {
        self.answers.iter().find(|answer| answer.id == id)
    }
}
