//! Which question is focused, restricted to questions not yet answered.

use exam_core::model::QuestionId;

use crate::feed::QuestionRenderState;

/// Inputs folded by [`NavigationCursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorEvent {
    FeedLoaded(Vec<QuestionRenderState>),
    Advance,
    Retreat,
}

/// Focus state over the latest feed.
///
/// Focus is kept by identity and resolved against the feed on every read, so a
/// graded replacement of the focused question is observed immediately.
#[derive(Debug, Clone, Default)]
pub struct NavigationCursor {
    focused: Option<QuestionId>,
    feed: Vec<QuestionRenderState>,
}

impl NavigationCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event and return the focused render state.
    pub fn apply(&mut self, event: CursorEvent) -> Option<&QuestionRenderState> {
        match event {
            CursorEvent::FeedLoaded(feed) => self.load(feed),
            CursorEvent::Advance => self.step(Step::Forward),
            CursorEvent::Retreat => self.step(Step::Back),
        }
        self.focused()
    }

    #[must_use]
    pub fn focused(&self) -> Option<&QuestionRenderState> {
        let id = self.focused?;
        self.feed.iter().find(|state| state.question_id == id)
    }

    #[must_use]
    pub fn focused_id(&self) -> Option<QuestionId> {
        self.focused
    }

    #[must_use]
    pub fn feed(&self) -> &[QuestionRenderState] {
        &self.feed
    }

    fn load(&mut self, feed: Vec<QuestionRenderState>) {
        // A lone question stays visible even if it was answered before.
        self.focused = if feed.len() == 1 {
            feed.first().map(|state| state.question_id)
        } else {
            let open = unanswered(&feed);
            open.iter()
                .copied()
                .find(|id| Some(*id) == self.focused)
                .or_else(|| open.first().copied())
        };
        self.feed = feed;
    }

    fn step(&mut self, step: Step) {
        let open = unanswered(&self.feed);
        let target = match self
            .focused
            .and_then(|id| open.iter().position(|candidate| *candidate == id))
        {
            Some(index) => match step {
                Step::Forward => index.checked_add(1),
                Step::Back => index.checked_sub(1),
            },
            None => Some(0),
        };

        if let Some(id) = target.and_then(|index| open.get(index)) {
            self.focused = Some(*id);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Forward,
    Back,
}

fn unanswered(feed: &[QuestionRenderState]) -> Vec<QuestionId> {
    feed.iter()
        .filter(|state| !state.is_answered)
        .map(|state| state.question_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: u64, position: usize, total: usize, answered: bool) -> QuestionRenderState {
        QuestionRenderState {
            question_id: QuestionId::new(id),
            blocks: Vec::new(),
            is_multiple: false,
            position,
            total,
            is_answered: answered,
        }
    }

    fn feed(answered: &[bool]) -> Vec<QuestionRenderState> {
        let total = answered.len();
        answered
            .iter()
            .enumerate()
            .map(|(i, a)| state(i as u64 + 1, i + 1, total, *a))
            .collect()
    }

    fn focus_of(cursor: &NavigationCursor) -> Option<u64> {
        cursor.focused().map(|s| s.question_id.value())
    }

    #[test]
    fn load_focuses_first_unanswered() {
        let mut cursor = NavigationCursor::new();
        cursor.apply(CursorEvent::FeedLoaded(feed(&[true, false, false])));
        assert_eq!(focus_of(&cursor), Some(2));
    }

    #[test]
    fn load_with_everything_answered_focuses_nothing() {
        let mut cursor = NavigationCursor::new();
        cursor.apply(CursorEvent::FeedLoaded(feed(&[true, true])));
        assert_eq!(focus_of(&cursor), None);
        cursor.apply(CursorEvent::Advance);
        assert_eq!(focus_of(&cursor), None);
    }

    #[test]
    fn lone_answered_question_is_still_focused() {
        let mut cursor = NavigationCursor::new();
        cursor.apply(CursorEvent::FeedLoaded(feed(&[true])));
        assert_eq!(focus_of(&cursor), Some(1));
    }

    #[test]
    fn empty_feed_focuses_nothing() {
        let mut cursor = NavigationCursor::new();
        assert!(cursor.apply(CursorEvent::FeedLoaded(Vec::new())).is_none());
    }

    #[test]
    fn reload_keeps_focus_when_still_unanswered() {
        let mut cursor = NavigationCursor::new();
        cursor.apply(CursorEvent::FeedLoaded(feed(&[false, false, false])));
        cursor.apply(CursorEvent::Advance);
        assert_eq!(focus_of(&cursor), Some(2));

        cursor.apply(CursorEvent::FeedLoaded(feed(&[false, false, false])));
        assert_eq!(focus_of(&cursor), Some(2));

        cursor.apply(CursorEvent::FeedLoaded(feed(&[false, true, false])));
        assert_eq!(focus_of(&cursor), Some(1));
    }

    #[test]
    fn advance_skips_answered_and_stops_at_the_end() {
        let mut cursor = NavigationCursor::new();
        cursor.apply(CursorEvent::FeedLoaded(feed(&[false, true, false])));
        assert_eq!(focus_of(&cursor), Some(1));

        cursor.apply(CursorEvent::Advance);
        assert_eq!(focus_of(&cursor), Some(3));

        cursor.apply(CursorEvent::Advance);
        assert_eq!(focus_of(&cursor), Some(3));
    }

    #[test]
    fn retreat_stops_at_the_start() {
        let mut cursor = NavigationCursor::new();
        cursor.apply(CursorEvent::FeedLoaded(feed(&[false, false])));
        cursor.apply(CursorEvent::Retreat);
        assert_eq!(focus_of(&cursor), Some(1));

        cursor.apply(CursorEvent::Advance);
        cursor.apply(CursorEvent::Retreat);
        assert_eq!(focus_of(&cursor), Some(1));
    }

    #[test]
    fn focus_is_always_unanswered_under_navigation() {
        let layouts: [&[bool]; 4] = [
            &[false, false, false, false],
            &[true, false, true, false, false],
            &[false, true, true, true],
            &[true, true, true],
        ];
        let moves = [
            CursorEvent::Advance,
            CursorEvent::Advance,
            CursorEvent::Retreat,
            CursorEvent::Advance,
            CursorEvent::Advance,
            CursorEvent::Advance,
            CursorEvent::Retreat,
            CursorEvent::Retreat,
            CursorEvent::Retreat,
        ];

        for layout in layouts {
            let mut cursor = NavigationCursor::new();
            cursor.apply(CursorEvent::FeedLoaded(feed(layout)));
            for event in moves.iter().cloned() {
                let focused = cursor.apply(event).cloned();
                let any_open = layout.iter().any(|answered| !answered);
                match focused {
                    Some(state) => assert!(!state.is_answered),
                    None => assert!(!any_open),
                }
            }
        }
    }
}
