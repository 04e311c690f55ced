use serde::{Deserialize, Serialize};

use crate::model::ids::CourseId;

/// The course a test session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
}

impl Course {
    #[must_use]
    pub fn new(id: CourseId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
