pub mod media;

pub use media::{MediaUri, MediaValidationError, QuestionMedia};
