use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic record. The serialized names are a stable
/// vocabulary consumed by report tooling: `info`, `warning`, `error`, `hint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
    Hint,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
            NoticeLevel::Hint => "hint",
        };
        write!(f, "{}", name)
    }
}

/// A diagnostic record attached to an image, layer, or package.
///
/// Notices accumulate and never interrupt processing; the origin is a
/// free-form provenance string (library file, image ref + layer id, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub origin: String,
    pub message: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn new(origin: impl Into<String>, message: impl Into<String>, level: NoticeLevel) -> Self {
        Self {
            origin: origin.into(),
            message: message.into(),
            level,
        }
    }
}
