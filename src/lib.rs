pub mod config;
pub mod models;
pub mod passport_validator;
pub mod processing;
pub mod utils;
pub mod validation;

pub use config::PipelineConfig;
pub use models::{CountryCodes, DocumentImage, ParsedRecord, ProcessingResult, ValidationVerdict};
pub use passport_validator::PassportValidator;
pub use utils::PassportError;
