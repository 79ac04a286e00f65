use thiserror::Error;

pub type Result<T, E = PageKitError> = std::result::Result<T, E>;

/// Why a single page range token was rejected by the parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxReason {
    #[error("not a page number or range")]
    NotNumeric,

    #[error("page numbers start at 1")]
    Zero,

    #[error("start {start} > end {end}")]
    Inverted { start: u32, end: u32 },
}

#[derive(Error, Debug)]
pub enum PageKitError {
    #[error("Invalid page range '{token}': {reason}")]
    Syntax { token: String, reason: SyntaxReason },

    #[error("Page {index} does not exist (document has {page_count} pages)")]
    OutOfBounds { index: u32, page_count: u32 },

    #[error("No pages selected: {0}")]
    EmptyResultSet(String),

    #[error("Order must list every page exactly once (missing: {missing:?}, duplicated: {duplicated:?})")]
    PermutationMismatch {
        missing: Vec<u32>,
        duplicated: Vec<u32>,
    },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to read PDF: {0}")]
    CorruptSource(String),

    /// The search reached its quality floor without meeting the budget.
    /// `artifact` is the last encoding produced, at `quality`.
    #[error("Could not reach {target_bytes} bytes: {} bytes at quality {quality}", .artifact.len())]
    SizeTargetUnreachable {
        target_bytes: usize,
        quality: u8,
        artifact: Vec<u8>,
    },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PageKitError {
    /// True for errors caused by the caller's input rather than by the documents themselves.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PageKitError::Syntax { .. }
                | PageKitError::OutOfBounds { .. }
                | PageKitError::EmptyResultSet(_)
                | PageKitError::PermutationMismatch { .. }
                | PageKitError::Configuration(_)
        )
    }
}
