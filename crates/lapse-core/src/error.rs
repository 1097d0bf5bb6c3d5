use thiserror::Error;

#[derive(Debug, Error)]
pub enum LapseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, LapseError>;
