use crate::processing::locator::LocatorConfig;
use crate::processing::ocr::{PreprocessConfig, MRZ_ALPHABET};
use crate::utils::PassportError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    TesseractCli,
    TesseractLib,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Executable used by the command-line engine.
    pub binary: PathBuf,
    pub language: String,
    pub tessdata_dir: Option<PathBuf>,
    pub page_seg_mode: u8,
    pub whitelist: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            kind: EngineKind::TesseractCli,
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            tessdata_dir: None,
            // a single uniform block of text
            page_seg_mode: 6,
            whitelist: MRZ_ALPHABET.to_string(),
        }
    }
}

/// Settings for the whole pipeline, usually read from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub locator: LocatorConfig,
    pub preprocess: PreprocessConfig,
    pub engine: EngineConfig,
    pub include_diagnostics: bool,
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PassportError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            PassportError::ConfigError(format!("Invalid pipeline config {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::image::RectKernel;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "locator": {{ "pad_up": 50, "blackhat_kernel": {{ "width": 15, "height": 5 }} }},
                "engine": {{ "kind": "tesseract-lib", "language": "ocrb" }},
                "include_diagnostics": true
            }}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.locator.pad_up, 50);
        assert_eq!(config.locator.blackhat_kernel, RectKernel::new(15, 5));
        assert_eq!(config.locator.pad_down, 6);
        assert_eq!(config.engine.kind, EngineKind::TesseractLib);
        assert_eq!(config.engine.language, "ocrb");
        assert_eq!(config.engine.page_seg_mode, 6);
        assert_eq!(config.preprocess.scale_factor, 3);
        assert!(config.include_diagnostics);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(file.path()),
            Err(PassportError::ConfigError(_))
        ));
    }
}
