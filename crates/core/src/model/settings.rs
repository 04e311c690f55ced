use serde::{Deserialize, Serialize};

/// Text scale chosen in the study settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSize {
    Small,
    #[default]
    Normal,
    Big,
}

/// Presentation settings threaded into render states.
///
/// The session engine never reads these fields; it only copies them into the
/// blocks it builds so the presentation layer can size text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default)]
    pub text_size: TextSize,
}
