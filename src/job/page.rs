use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Words per minute used for the reading-time estimate
pub const READING_WORDS_PER_MINUTE: u64 = 200;

/// An image reference found in page content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Absolute URL
    pub src: String,
    pub alt: Option<String>,
}

/// A code block with its declared language, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

/// Content of one successfully fetched page
///
/// Produced once per URL per run and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPage {
    pub url: String,
    pub depth: u32,
    pub title: String,
    pub description: Option<String>,
    pub markdown: String,
    pub raw_word_count: u64,
    pub reading_time_minutes: u64,
    /// Absolute, normalized outbound links in document order
    pub links: Vec<String>,
    pub images: Vec<ImageRef>,
    pub code_blocks: Vec<CodeBlock>,
    pub http_status: u16,
    pub content_type: String,
    pub fetched_at: DateTime<Utc>,
}

/// `ceil(words / 200)` minutes
pub fn reading_time_minutes(word_count: u64) -> u64 {
    word_count.div_ceil(READING_WORDS_PER_MINUTE)
}
