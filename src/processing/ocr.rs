use crate::config::{EngineConfig, EngineKind};
use crate::models::{MrzRegion, RawText};
use crate::processing::debug::{DebugSink, NoopSink};
use crate::processing::image::{ImageProcessor, RectKernel};
use crate::utils::PassportError;
use image::GrayImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

/// Characters that may appear in a machine-readable zone.
pub const MRZ_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789<";

/// An optical character recognition engine.
///
/// Implementations receive a single-channel, already binarised image and return
/// UTF-8 text with one recognized line per `\n`. Engine failures must surface as
/// `PassportError::RecognitionFailure`, never as an empty string.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(&self, image: &GrayImage) -> Result<String, PassportError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub clahe_clip_limit: f32,
    pub clahe_grid: u32,
    pub scale_factor: u32,
    pub denoise_radius: u32,
    pub close_kernel: RectKernel,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        PreprocessConfig {
            clahe_clip_limit: 2.5,
            clahe_grid: 8,
            scale_factor: 3,
            denoise_radius: 1,
            close_kernel: RectKernel::new(2, 2),
        }
    }
}

/// Prepares MRZ regions for an OCR engine and filters what it returns.
pub struct TextRecognizer {
    engine: Box<dyn OcrEngine>,
    config: PreprocessConfig,
}

impl TextRecognizer {
    pub fn new(engine: Box<dyn OcrEngine>) -> Self {
        Self::with_config(engine, PreprocessConfig::default())
    }

    pub fn with_config(engine: Box<dyn OcrEngine>, config: PreprocessConfig) -> Self {
        TextRecognizer { engine, config }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn preprocess(&self, region: &MrzRegion, sink: &dyn DebugSink) -> GrayImage {
        let cfg = &self.config;
        let gray = region.image.to_luma();
        let enhanced = ImageProcessor::clahe(&gray, cfg.clahe_clip_limit, cfg.clahe_grid);
        let enlarged = ImageProcessor::upscale(&enhanced, cfg.scale_factor);
        let denoised = ImageProcessor::denoise(&enlarged, cfg.denoise_radius);
        let binary = ImageProcessor::otsu_binarize(&denoised);
        let repaired = ImageProcessor::close_rect(&binary, cfg.close_kernel);
        sink.record("ocr_preprocessed", &repaired);
        repaired
    }

    pub fn recognize(&self, region: &MrzRegion) -> Result<RawText, PassportError> {
        self.recognize_with_sink(region, &NoopSink)
    }

    pub fn recognize_with_sink(
        &self,
        region: &MrzRegion,
        sink: &dyn DebugSink,
    ) -> Result<RawText, PassportError> {
        let prepared = self.preprocess(region, sink);
        let text = self.engine.recognize(&prepared).map_err(|e| match e {
            PassportError::RecognitionFailure(_) => e,
            other => PassportError::RecognitionFailure(other.to_string()),
        })?;
        debug!("{} returned:\n{}", self.engine.name(), text);

        let filtered = filter_mrz_alphabet(&text);
        if filtered.is_blank() {
            return Err(PassportError::RecognitionFailure(format!(
                "{} returned no MRZ characters",
                self.engine.name()
            )));
        }
        info!("Recognized {} candidate MRZ lines", filtered.lines().len());
        Ok(filtered)
    }
}

/// Drops every character outside the MRZ alphabet, and lines left empty.
pub fn filter_mrz_alphabet(text: &str) -> RawText {
    RawText::new(
        text.lines()
            .map(|line| line.chars().filter(|c| MRZ_ALPHABET.contains(*c)).collect::<String>())
            .filter(|line| !line.is_empty())
            .collect(),
    )
}

/// Runs the `tesseract` executable on a temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
    page_seg_mode: u8,
    tessdata_dir: Option<PathBuf>,
    whitelist: String,
}

impl TesseractCli {
    pub fn from_config(config: &EngineConfig) -> Self {
        TesseractCli {
            binary: config.binary.clone(),
            language: config.language.clone(),
            page_seg_mode: config.page_seg_mode,
            tessdata_dir: config.tessdata_dir.clone(),
            whitelist: config.whitelist.clone(),
        }
    }

    fn command_args(&self, image_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            image_path.into(),
            "stdout".into(),
            "-l".into(),
            self.language.clone().into(),
            "--oem".into(),
            "3".into(),
            "--psm".into(),
            self.page_seg_mode.to_string().into(),
            "-c".into(),
            format!("tessedit_char_whitelist={}", self.whitelist).into(),
        ];
        if let Some(dir) = &self.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.into());
        }
        args
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract-cli"
    }

    fn recognize(&self, image: &GrayImage) -> Result<String, PassportError> {
        let temp_file = write_temp_png(image)?;
        let output = Command::new(&self.binary)
            .args(self.command_args(temp_file.path()))
            .output()
            .map_err(|e| {
                PassportError::RecognitionFailure(format!(
                    "Failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(PassportError::RecognitionFailure(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        String::from_utf8(output.stdout).map_err(|e| {
            PassportError::RecognitionFailure(format!("tesseract produced invalid UTF-8: {}", e))
        })
    }
}

fn write_temp_png(image: &GrayImage) -> Result<NamedTempFile, PassportError> {
    let temp_file = tempfile::Builder::new()
        .prefix("mrz-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| PassportError::RecognitionFailure(format!("Failed to create temp file: {}", e)))?;
    image.save(temp_file.path()).map_err(|e| {
        PassportError::RecognitionFailure(format!("Failed to write temp image: {}", e))
    })?;
    Ok(temp_file)
}

#[cfg(feature = "tesseract")]
pub use native::TesseractEngine;

#[cfg(feature = "tesseract")]
mod native {
    use super::{write_temp_png, OcrEngine};
    use crate::config::EngineConfig;
    use crate::utils::PassportError;
    use image::GrayImage;
    use std::sync::Mutex;
    use tesseract::Tesseract;

    // libtesseract handles are not assumed reentrant
    static TESSERACT_LOCK: Mutex<()> = Mutex::new(());

    /// In-process libtesseract adapter.
    #[derive(Debug, Clone)]
    pub struct TesseractEngine {
        language: String,
        tessdata_dir: Option<String>,
        page_seg_mode: u8,
        whitelist: String,
    }

    impl TesseractEngine {
        pub fn from_config(config: &EngineConfig) -> Self {
            TesseractEngine {
                language: config.language.clone(),
                tessdata_dir: config
                    .tessdata_dir
                    .as_ref()
                    .map(|dir| dir.to_string_lossy().into_owned()),
                page_seg_mode: config.page_seg_mode,
                whitelist: config.whitelist.clone(),
            }
        }
    }

    impl OcrEngine for TesseractEngine {
        fn name(&self) -> &str {
            "tesseract-lib"
        }

        fn recognize(&self, image: &GrayImage) -> Result<String, PassportError> {
            let _guard = TESSERACT_LOCK.lock().map_err(|_| {
                PassportError::RecognitionFailure("Tesseract lock poisoned".to_string())
            })?;

            let temp_file = write_temp_png(image)?;
            let image_path_str = temp_file.path().to_str().ok_or_else(|| {
                PassportError::RecognitionFailure("Failed to convert path to string".to_string())
            })?;

            let text = Tesseract::new(self.tessdata_dir.as_deref(), Some(self.language.as_str()))
                .map_err(|e| PassportError::RecognitionFailure(format!("Tesseract init error: {}", e)))?
                .set_image(image_path_str)
                .map_err(|e| {
                    PassportError::RecognitionFailure(format!("Tesseract set image error: {}", e))
                })?
                .set_variable("tessedit_char_whitelist", &self.whitelist)
                .map_err(|e| {
                    PassportError::RecognitionFailure(format!("Tesseract set variable error: {}", e))
                })?
                .set_variable("tessedit_pageseg_mode", &self.page_seg_mode.to_string())
                .map_err(|e| {
                    PassportError::RecognitionFailure(format!("Tesseract set variable error: {}", e))
                })?
                .get_text()
                .map_err(|e| PassportError::RecognitionFailure(format!("Tesseract error: {}", e)))?;
            Ok(text)
        }
    }
}

/// Builds the engine named in the configuration.
pub fn build_engine(config: &EngineConfig) -> Result<Box<dyn OcrEngine>, PassportError> {
    match config.kind {
        EngineKind::TesseractCli => Ok(Box::new(TesseractCli::from_config(config))),
        #[cfg(feature = "tesseract")]
        EngineKind::TesseractLib => Ok(Box::new(TesseractEngine::from_config(config))),
        #[cfg(not(feature = "tesseract"))]
        EngineKind::TesseractLib => Err(PassportError::ConfigError(
            "tesseract-lib engine requires the `tesseract` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, DocumentImage, RegionSource};
    use image::Luma;
    use std::sync::{Arc, Mutex};

    struct FixedText {
        text: String,
        seen: Arc<Mutex<Option<(u32, u32)>>>,
    }

    impl FixedText {
        fn new(text: &str) -> Self {
            FixedText {
                text: text.to_string(),
                seen: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl OcrEngine for FixedText {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, image: &GrayImage) -> Result<String, PassportError> {
            *self.seen.lock().unwrap() = Some(image.dimensions());
            Ok(self.text.clone())
        }
    }

    struct Broken;

    impl OcrEngine for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn recognize(&self, _image: &GrayImage) -> Result<String, PassportError> {
            Err(PassportError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "engine crashed",
            )))
        }
    }

    fn region() -> MrzRegion {
        let image = GrayImage::from_fn(40, 12, |x, _| Luma([if x % 5 == 0 { 20 } else { 230 }]));
        MrzRegion {
            image: DocumentImage::from_gray(image),
            bbox: BoundingBox::new(0, 0, 40, 12),
            source: RegionSource::Fallback,
        }
    }

    #[test]
    fn test_filter_drops_foreign_characters() {
        let raw = filter_mrz_alphabet("P<GBR jennings—X\n\n  \n0123 ?4\n");
        assert_eq!(raw.lines(), &["P<GBRX".to_string(), "01234".to_string()]);
    }

    #[test]
    fn test_preprocess_upscales_and_binarises() {
        let recognizer = TextRecognizer::new(Box::new(FixedText::new("")));
        let prepared = recognizer.preprocess(&region(), &NoopSink);

        assert_eq!(prepared.dimensions(), (120, 36));
        assert!(prepared.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_engine_receives_preprocessed_image() {
        let engine = FixedText::new("P<UTOERIKSSON<<ANNA<MARIA\nL898902C36UTO");
        let seen = Arc::clone(&engine.seen);
        let recognizer = TextRecognizer::new(Box::new(engine));
        let raw = recognizer.recognize(&region()).unwrap();

        assert_eq!(*seen.lock().unwrap(), Some((120, 36)));
        assert_eq!(raw.lines().len(), 2);
        assert_eq!(recognizer.engine_name(), "fixed");
    }

    #[test]
    fn test_engine_errors_become_recognition_failures() {
        let recognizer = TextRecognizer::new(Box::new(Broken));
        let err = recognizer.recognize(&region()).unwrap_err();
        assert!(matches!(err, PassportError::RecognitionFailure(ref msg) if msg.contains("engine crashed")));
    }

    #[test]
    fn test_output_without_mrz_characters_is_a_failure() {
        let recognizer = TextRecognizer::new(Box::new(FixedText::new("  ...\nabc\n")));
        assert!(matches!(
            recognizer.recognize(&region()),
            Err(PassportError::RecognitionFailure(_))
        ));
    }

    #[test]
    fn test_cli_arguments_carry_whitelist() {
        let mut config = EngineConfig::default();
        config.tessdata_dir = Some(PathBuf::from("/opt/tessdata"));
        let args = TesseractCli::from_config(&config).command_args(Path::new("/tmp/mrz.png"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(args[0], "/tmp/mrz.png");
        assert_eq!(args[1], "stdout");
        assert!(args.contains(&format!("tessedit_char_whitelist={}", MRZ_ALPHABET)));
        assert_eq!(&args[args.len() - 2..], &["--tessdata-dir", "/opt/tessdata"]);
    }

    #[test]
    fn test_missing_cli_binary_is_a_recognition_failure() {
        let mut config = EngineConfig::default();
        config.binary = PathBuf::from("/nonexistent/bin/tesseract-mrz");
        let err = TesseractCli::from_config(&config)
            .recognize(&GrayImage::new(8, 8))
            .unwrap_err();
        assert!(matches!(err, PassportError::RecognitionFailure(_)));
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn test_library_engine_requires_feature() {
        let mut config = EngineConfig::default();
        config.kind = EngineKind::TesseractLib;
        assert!(matches!(build_engine(&config), Err(PassportError::ConfigError(_))));
    }
}
