use thiserror::Error;

/// Failures a single posting run can hit.
///
/// Everything except [`BotError::Publish`] is recoverable in random mode: the
/// orchestrator draws another word. Curated mode aborts on the first error
/// that survives the fallback page lookup.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("page not found: {title}")]
    NotFound { title: String },

    #[error("unparseable extract for {title}: {reason}")]
    Parse { title: String, reason: String },

    #[error("entry {title} rejected: {reason}")]
    FilterRejected { title: String, reason: String },

    #[error("entry {title} was already posted")]
    AlreadyPosted { title: String },

    #[error("fetch {target} failed: {message}")]
    Fetch { target: String, message: String },

    #[error("publish failed: {0}")]
    Publish(String),
}

impl BotError {
    pub fn parse(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            title: title.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch(target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Fetch {
            target: target.into(),
            message: err.to_string(),
        }
    }

    pub fn publish(err: impl std::fmt::Display) -> Self {
        Self::Publish(err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Publish(_))
    }
}
