use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForensicsError {
    #[error("Unreadable image: {0}")]
    UnreadableImage(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("ELA computation failed: {0}")]
    ElaComputationFailed(String),

    #[error("Copy-move analysis failed: {0}")]
    CopyMoveAnalysisFailed(String),

    #[error("Splicing analysis failed: {0}")]
    SplicingAnalysisFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ForensicsError {
    /// Loading failures only reject the submitted file; everything else
    /// aborts an analysis that was already under way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ForensicsError::ElaComputationFailed(_)
                | ForensicsError::CopyMoveAnalysisFailed(_)
                | ForensicsError::SplicingAnalysisFailed(_)
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            ForensicsError::UnreadableImage(_) | ForensicsError::UnsupportedFormat(_) => {
                "Cannot analyze this file".into()
            }
            ForensicsError::InvalidParameter(msg) => format!("Invalid analysis settings: {}", msg),
            other => format!("Analysis failed: {}", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForensicsError>;
