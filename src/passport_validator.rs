use crate::config::PipelineConfig;
use crate::models::{
    CountryCodes, Diagnostics, DocumentImage, ProcessingResult, Stage, ValidationVerdict,
};
use crate::processing::{DebugSink, MrzDecoder, MrzLocator, NoopSink, OcrEngine, TextRecognizer};
use crate::utils::PassportError;
use crate::validation::RecordValidator;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

/// Runs locate, recognize, decode and validate for one document.
///
/// Holds no per-call state, so a single instance can serve concurrent callers
/// as long as its OCR engine is safe to share.
pub struct PassportValidator {
    locator: MrzLocator,
    recognizer: TextRecognizer,
    decoder: MrzDecoder,
    validator: RecordValidator,
    debug_sink: Option<Arc<dyn DebugSink>>,
    include_diagnostics: bool,
}

impl PassportValidator {
    pub fn new(engine: Box<dyn OcrEngine>, countries: Arc<CountryCodes>) -> Self {
        Self::from_config(&PipelineConfig::default(), engine, countries)
    }

    pub fn from_config(
        config: &PipelineConfig,
        engine: Box<dyn OcrEngine>,
        countries: Arc<CountryCodes>,
    ) -> Self {
        PassportValidator {
            locator: MrzLocator::new(config.locator.clone()),
            recognizer: TextRecognizer::with_config(engine, config.preprocess.clone()),
            decoder: MrzDecoder::new(),
            validator: RecordValidator::new(countries),
            debug_sink: None,
            include_diagnostics: config.include_diagnostics,
        }
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.include_diagnostics = enabled;
        self
    }

    /// Validation problems never fail the call; they travel in the verdict.
    pub fn process(&self, image: DocumentImage) -> ProcessingResult {
        match self.run(&image) {
            Ok(result) => result,
            Err(e) => {
                let stage = e.stage();
                warn!("Processing stopped at {} stage: {}", stage, e);
                ProcessingResult::Failure {
                    stage,
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn process_file<P: AsRef<Path>>(&self, path: P) -> ProcessingResult {
        match DocumentImage::open(path) {
            Ok(image) => self.process(image),
            Err(e) => ProcessingResult::Failure {
                stage: Stage::Input,
                reason: e.to_string(),
            },
        }
    }

    /// Tries each candidate in order and returns the first success.
    pub fn process_candidates<I>(&self, images: I) -> ProcessingResult
    where
        I: IntoIterator<Item = DocumentImage>,
    {
        let mut failures = Vec::new();
        for (index, image) in images.into_iter().enumerate() {
            match self.process(image) {
                ProcessingResult::Failure { stage, reason } => {
                    failures.push(format!("candidate {} failed at {}: {}", index + 1, stage, reason));
                }
                success => {
                    info!("Candidate {} produced a record", index + 1);
                    return success;
                }
            }
        }

        let reason = if failures.is_empty() {
            "no candidate images supplied".to_string()
        } else {
            format!("no candidate yielded a usable record ({})", failures.join("; "))
        };
        ProcessingResult::Failure {
            stage: Stage::Candidates,
            reason,
        }
    }

    fn run(&self, image: &DocumentImage) -> Result<ProcessingResult, PassportError> {
        let sink: &dyn DebugSink = self.debug_sink.as_deref().unwrap_or(&NoopSink);

        let region = self.locator.locate_with_sink(image, sink)?;
        let text = self.recognizer.recognize_with_sink(&region, sink)?;
        let record = self.decoder.decode(&text)?;
        let verdict: ValidationVerdict = self.validator.validate(&record);

        if verdict.is_valid {
            info!("Valid passport {} for {}", record.passport_number, record.full_name());
        } else {
            info!("Passport decoded with {} violation(s)", verdict.issues.len());
        }

        let diagnostics = self.include_diagnostics.then(|| Diagnostics {
            region: region.bbox,
            region_source: region.source,
            mrz_text: text.to_text(),
        });
        Ok(ProcessingResult::Success {
            record,
            verdict,
            diagnostics,
        })
    }
}
