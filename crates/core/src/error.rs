use thiserror::Error;

use crate::model::{MediaValidationError, ParseIdError, ParseTestTypeError};

/// Validation failures surfaced while building domain values from raw input.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    MediaValidation(#[from] MediaValidationError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
    #[error(transparent)]
    TestType(#[from] ParseTestTypeError),
}
