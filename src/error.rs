use std::time::Duration;
use thiserror::Error;

pub type ShowcaseResult<T> = Result<T, ShowcaseError>;

#[derive(Debug, Clone, Error)]
pub enum ShowcaseError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Engine initialization failed: {0}")]
    EngineInitialization(String),

    #[error("Session creation failed: {0}")]
    SessionCreation(String),

    #[error("Navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Showcase not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Showcase generation failed for '{key}': {source}")]
    Generation {
        key: String,
        #[source]
        source: Box<ShowcaseError>,
    },
}

impl ShowcaseError {
    pub fn generation(key: impl Into<String>, source: ShowcaseError) -> Self {
        ShowcaseError::Generation {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error, skipping any `Generation` wrappers.
    pub fn root_cause(&self) -> &ShowcaseError {
        match self {
            ShowcaseError::Generation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ShowcaseError::EngineInitialization(_)
            | ShowcaseError::SessionCreation(_)
            | ShowcaseError::NavigationTimeout(_)
            | ShowcaseError::Navigation(_)
            | ShowcaseError::CaptureFailed(_) => true,
            ShowcaseError::Generation { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ShowcaseError::InvalidTarget(_) => ErrorSeverity::Low,
            ShowcaseError::NotFound(_) => ErrorSeverity::Low,
            ShowcaseError::Persistence(_) => ErrorSeverity::Low,
            ShowcaseError::Configuration(_) => ErrorSeverity::High,
            ShowcaseError::EngineInitialization(_) => ErrorSeverity::Critical,
            ShowcaseError::Generation { source, .. } => source.severity(),
            _ => ErrorSeverity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<std::io::Error> for ShowcaseError {
    fn from(err: std::io::Error) -> Self {
        ShowcaseError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ShowcaseError {
    fn from(err: serde_json::Error) -> Self {
        ShowcaseError::Serialization(err.to_string())
    }
}
