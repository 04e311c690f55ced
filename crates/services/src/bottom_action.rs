//! Primary button state derived from the focused question.

use exam_core::model::AnswerSelection;
use serde::Serialize;

use crate::feed::QuestionRenderState;

/// The single primary action offered under the focused question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    #[default]
    Hidden,
    ConfirmSelection,
    GoBack,
    SubmitTest,
}

/// Resolve the primary action for the current inputs.
#[must_use]
pub fn resolve(
    end_of_test: bool,
    focused: Option<&QuestionRenderState>,
    selection: Option<&AnswerSelection>,
) -> PrimaryAction {
    let Some(focused) = focused else {
        return PrimaryAction::Hidden;
    };
    let is_graded = focused.is_graded();

    if focused.is_last() && focused.total > 1 && is_graded {
        if end_of_test {
            PrimaryAction::SubmitTest
        } else {
            PrimaryAction::Hidden
        }
    } else if is_graded && focused.total == 1 {
        PrimaryAction::GoBack
    } else if is_graded {
        PrimaryAction::Hidden
    } else if selection.is_some_and(|s| !s.is_empty()) {
        PrimaryAction::ConfirmSelection
    } else {
        PrimaryAction::Hidden
    }
}
