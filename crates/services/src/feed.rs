//! Per-question render states and the reducer that grades them.

use exam_core::model::{
    AnswerId, AnswerSelection, DisplaySettings, PossibleAnswer, Question, QuestionId,
    QuestionMedia, TestMode,
};
use serde::Serialize;
use tracing::debug;

//
// ─── RENDER STATE ──────────────────────────────────────────────────────────────
//

/// How one option is shown after grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Not chosen and not correct, or grading is hidden.
    Neutral,
    Correct,
    Incorrect,
    /// A correct option of a multiple-choice question the learner did not pick.
    Missed,
}

/// An answer option as shown before grading. Carries no correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub id: AnswerId,
    pub text: String,
    pub rich_text: Option<String>,
    pub image: Option<QuestionMedia>,
}

impl From<&PossibleAnswer> for AnswerOption {
    fn from(answer: &PossibleAnswer) -> Self {
        Self {
            id: answer.id,
            text: answer.text.clone(),
            rich_text: answer.rich_text.clone(),
            image: answer.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradedAnswer {
    pub option: AnswerOption,
    pub outcome: AnswerOutcome,
}

/// One renderable block of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ContentBlock {
    Media(Vec<QuestionMedia>),
    Prompt {
        text: String,
        rich_text: Option<String>,
        settings: DisplaySettings,
    },
    Answers {
        options: Vec<AnswerOption>,
        settings: DisplaySettings,
    },
    Graded {
        results: Vec<GradedAnswer>,
        settings: DisplaySettings,
    },
    ExplanationTitle,
    ExplanationMedia(QuestionMedia),
    ExplanationText {
        text: String,
        rich_text: String,
    },
    Reference(String),
}

impl ContentBlock {
    fn is_explanation(&self) -> bool {
        matches!(
            self,
            ContentBlock::ExplanationTitle
                | ContentBlock::ExplanationMedia(_)
                | ContentBlock::ExplanationText { .. }
        )
    }
}

/// Everything the presentation layer needs to draw one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionRenderState {
    pub question_id: QuestionId,
    pub blocks: Vec<ContentBlock>,
    pub is_multiple: bool,
    /// 1-based position within the feed.
    pub position: usize,
    pub total: usize,
    /// Server-reported answered flag; local grading does not change it.
    pub is_answered: bool,
}

impl QuestionRenderState {
    /// True once a graded-results block replaced the answer options.
    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block, ContentBlock::Graded { .. }))
    }

    #[must_use]
    pub fn graded_results(&self) -> Option<&[GradedAnswer]> {
        self.blocks.iter().find_map(|block| match block {
            ContentBlock::Graded { results, .. } => Some(results.as_slice()),
            _ => None,
        })
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.position == self.total
    }
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

/// Outcome of a single option for the given selection, ignoring reveal rules.
#[must_use]
pub fn grade_option(answer: &PossibleAnswer, chosen: bool, is_multiple: bool) -> AnswerOutcome {
    match (chosen, answer.is_correct) {
        (true, true) => AnswerOutcome::Correct,
        (true, false) => AnswerOutcome::Incorrect,
        (false, true) if is_multiple => AnswerOutcome::Missed,
        (false, true) => AnswerOutcome::Correct,
        (false, false) => AnswerOutcome::Neutral,
    }
}

/// Grade every option of `question` against `selection`.
#[must_use]
pub fn grade_answers(question: &Question, selection: &AnswerSelection) -> Vec<GradedAnswer> {
    question
        .answers
        .iter()
        .map(|answer| GradedAnswer {
            option: AnswerOption::from(answer),
            outcome: grade_option(answer, selection.contains(answer.id), question.is_multiple),
        })
        .collect()
}

/// Whether the whole answer counts as correct.
///
/// Multiple choice passes only when no option is incorrect or missed. Single
/// choice passes when at least one chosen option is correct.
#[must_use]
pub fn answer_verdict(question: &Question, selection: &AnswerSelection) -> bool {
    if question.is_multiple {
        grade_answers(question, selection).iter().all(|graded| {
            matches!(
                graded.outcome,
                AnswerOutcome::Correct | AnswerOutcome::Neutral
            )
        })
    } else {
        question
            .answers
            .iter()
            .any(|answer| answer.is_correct && selection.contains(answer.id))
    }
}

//
// ─── REDUCER ───────────────────────────────────────────────────────────────────
//

/// Fold the latest inputs into a new feed.
///
/// An empty `previous` builds a fresh feed from `questions`. Otherwise only the
/// entry answered by `latest` is replaced with its graded form; an answer for
/// a question missing from either side leaves the feed untouched.
#[must_use]
pub fn reduce(
    previous: &[QuestionRenderState],
    questions: &[Question],
    latest: Option<&AnswerSelection>,
    mode: TestMode,
    settings: &DisplaySettings,
) -> Vec<QuestionRenderState> {
    if previous.is_empty() {
        return build_feed(questions, settings);
    }

    let Some(selection) = latest else {
        return previous.to_vec();
    };
    let Some(question) = questions.iter().find(|q| q.id == selection.question_id()) else {
        debug!(question_id = %selection.question_id(), "answer for unknown question ignored");
        return previous.to_vec();
    };
    let Some(index) = previous
        .iter()
        .position(|state| state.question_id == selection.question_id())
    else {
        debug!(question_id = %selection.question_id(), "answer for question outside feed ignored");
        return previous.to_vec();
    };

    let reveal = mode.reveals_grading(questions.len());
    let mut feed = previous.to_vec();
    feed[index] = graded_state(&previous[index], question, selection, reveal, settings);
    feed
}

fn build_feed(questions: &[Question], settings: &DisplaySettings) -> Vec<QuestionRenderState> {
    let total = questions.len();
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let mut blocks = Vec::with_capacity(4);
            if !question.media.is_empty() {
                blocks.push(ContentBlock::Media(question.media.clone()));
            }
            blocks.push(ContentBlock::Prompt {
                text: question.text.clone(),
                rich_text: question.rich_text.clone(),
                settings: settings.clone(),
            });
            blocks.push(ContentBlock::Answers {
                options: question.answers.iter().map(AnswerOption::from).collect(),
                settings: settings.clone(),
            });
            if let Some(reference) = question.reference() {
                blocks.push(ContentBlock::Reference(reference.to_string()));
            }

            QuestionRenderState {
                question_id: question.id,
                blocks,
                is_multiple: question.is_multiple,
                position: index + 1,
                total,
                is_answered: question.is_answered,
            }
        })
        .collect()
}

fn graded_state(
    current: &QuestionRenderState,
    question: &Question,
    selection: &AnswerSelection,
    reveal: bool,
    settings: &DisplaySettings,
) -> QuestionRenderState {
    let mut results = grade_answers(question, selection);
    if !reveal {
        for graded in &mut results {
            graded.outcome = AnswerOutcome::Neutral;
        }
    }

    let mut blocks: Vec<ContentBlock> = current
        .blocks
        .iter()
        .filter(|block| !block.is_explanation() && !matches!(block, ContentBlock::Reference(_)))
        .map(|block| match block {
            ContentBlock::Answers { .. } | ContentBlock::Graded { .. } => ContentBlock::Graded {
                results: results.clone(),
                settings: settings.clone(),
            },
            other => other.clone(),
        })
        .collect();

    if reveal && question.explanation.has_content() {
        blocks.push(ContentBlock::ExplanationTitle);
        blocks.extend(
            question
                .explanation
                .media
                .iter()
                .cloned()
                .map(ContentBlock::ExplanationMedia),
        );
        if question.explanation.text.is_some() || question.explanation.rich_text.is_some() {
            blocks.push(ContentBlock::ExplanationText {
                text: question.explanation.text.clone().unwrap_or_default(),
                rich_text: question.explanation.rich_text.clone().unwrap_or_default(),
            });
        }
    }

    if let Some(reference) = question.reference() {
        blocks.push(ContentBlock::Reference(reference.to_string()));
    }

    QuestionRenderState {
        blocks,
        ..current.clone()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
