use chrono::{DateTime, Utc};

/// A single row in the `images` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: String,
    /// Public location of the stored file, e.g. `/uploads/<uuid>.jpg`.
    pub url: String,
    /// Set when the image had no predecessor at description time.
    pub description: Option<String>,
    /// Set when the image was described relative to its predecessor.
    pub delta: Option<String>,
    /// Issued by the store; unique and the sole ordering key.
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    /// `true` once the description step has written either field.
    pub fn is_processed(&self) -> bool {
        self.description.is_some() || self.delta.is_some()
    }
}

/// Result of the description step. Exactly one of the two columns is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAnalysis {
    /// Standalone description of the first image in the sequence.
    Description(String),
    /// Narrative of what changed since the predecessor.
    Delta(String),
}

impl ImageAnalysis {
    pub fn text(&self) -> &str {
        match self {
            ImageAnalysis::Description(t) | ImageAnalysis::Delta(t) => t,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImageAnalysis::Description(_) => "description",
            ImageAnalysis::Delta(_) => "delta",
        }
    }
}
