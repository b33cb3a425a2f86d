//! Error types for the CLI

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("{message}")]
    CommandFailed { message: String },

    #[error("Rotation Failed, exiting due to error: {0}")]
    Rotation(#[source] riic::Error),

    #[error(transparent)]
    Core(#[from] riic::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn command_failed(message: impl Into<String>) -> Self {
        Error::CommandFailed {
            message: message.into(),
        }
    }
}
