use crate::models::Stage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PassportError {
    #[error("Image processing error: {0}")]
    ImageProcessingError(String),
    #[error("Could not detect MRZ region: {0}")]
    RegionNotFound(String),
    #[error("Text recognition failed: {0}")]
    RecognitionFailure(String),
    #[error("Could not parse MRZ text: {0}")]
    DecodeFailure(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PassportError {
    /// Pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            PassportError::RegionNotFound(_) => Stage::Locate,
            PassportError::RecognitionFailure(_) => Stage::Recognize,
            PassportError::DecodeFailure(_) => Stage::Decode,
            PassportError::ImageProcessingError(_)
            | PassportError::ConfigError(_)
            | PassportError::IoError(_) => Stage::Input,
        }
    }
}
