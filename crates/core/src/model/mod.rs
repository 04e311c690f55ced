mod answer;
pub mod content;
mod course;
mod ids;
mod question;
mod settings;
mod test_set;

pub use content::{MediaUri, MediaValidationError, QuestionMedia};
pub use ids::{AnswerId, CourseId, ParseIdError, QuestionId, TestId, UserTestId};

pub use answer::AnswerSelection;
pub use course::Course;
pub use question::{Explanation, PossibleAnswer, Question};
pub use settings::{DisplaySettings, TextSize};
pub use test_set::{ParseTestTypeError, Test, TestMode, TestType};
