use thiserror::Error;

/// Deployment misconfiguration detected while deriving a site artifact.
///
/// These are fatal to the calling operation and deterministic: the same
/// settings always fail the same way, so the memoized facade caches the
/// error alongside successful values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed article path '{path}': {reason}")]
    MalformedArticlePath { path: String, reason: &'static str },

    #[error("thumbnail size '{key}' is not defined in ThumbLimits")]
    MissingThumbSize { key: String },

    #[error("user option '{option}' has no default value")]
    UnsetUserOption { option: String },

    #[error("setting {name} is invalid: expected {expected}")]
    InvalidSetting { name: String, expected: &'static str },

    #[error("failed to compile {what} pattern: {message}")]
    InvalidPattern { what: &'static str, message: String },
}

impl ConfigError {
    pub(crate) fn pattern(what: &'static str, error: regex::Error) -> Self {
        Self::InvalidPattern {
            what,
            message: error.to_string(),
        }
    }
}
