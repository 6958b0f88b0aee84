pub mod checksum;
pub mod debug;
pub mod field_correction;
pub mod image;
pub mod locator;
pub mod mrz;
pub mod ocr;

pub use debug::{DebugSink, DirectorySink, NoopSink};
pub use field_correction::FieldCorrection;
pub use self::image::ImageProcessor;
pub use locator::{LocatorConfig, MrzLocator};
pub use mrz::MrzDecoder;
pub use ocr::{build_engine, OcrEngine, PreprocessConfig, TesseractCli, TextRecognizer};
