use crate::PageError;

/// How a popped frontier entry ended
///
/// Every popped URL ends in exactly one outcome, which is what keeps
/// `pagesCrawled = pagesSuccessful + pagesFailed + pagesSkipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageOutcome {
    /// Fetched, extracted and stored
    Success,

    /// Not fetched or not extracted by policy (robots, scope, content type)
    Skipped,

    /// Fetch or parse error
    Failed,
}

impl PageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl From<&PageError> for PageOutcome {
    fn from(error: &PageError) -> Self {
        if error.is_skip() {
            Self::Skipped
        } else {
            Self::Failed
        }
    }
}
