use crate::utils::PassportError;
use chrono::NaiveDate;
use image::{DynamicImage, GrayImage, ImageBuffer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Channel layout of an 8-bit raster handed to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorOrder {
    Gray,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
}

impl ColorOrder {
    pub fn channels(self) -> usize {
        match self {
            ColorOrder::Gray => 1,
            ColorOrder::Rgb | ColorOrder::Bgr => 3,
            ColorOrder::Rgba | ColorOrder::Bgra => 4,
        }
    }
}

/// A document photo. The pixel buffer is owned and never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentImage {
    width: u32,
    height: u32,
    order: ColorOrder,
    pixels: Vec<u8>,
}

impl DocumentImage {
    pub fn new(
        width: u32,
        height: u32,
        order: ColorOrder,
        pixels: Vec<u8>,
    ) -> Result<Self, PassportError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|area| area.checked_mul(order.channels()))
            .ok_or_else(|| {
                PassportError::ImageProcessingError(format!(
                    "{}x{} {:?} image is too large",
                    width, height, order
                ))
            })?;
        if pixels.len() != expected {
            return Err(PassportError::ImageProcessingError(format!(
                "pixel buffer holds {} bytes, expected {} for {}x{} {:?}",
                pixels.len(),
                expected,
                width,
                height,
                order
            )));
        }
        Ok(DocumentImage {
            width,
            height,
            order,
            pixels,
        })
    }

    pub fn from_gray(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        DocumentImage {
            width,
            height,
            order: ColorOrder::Gray,
            pixels: image.into_raw(),
        }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray(gray),
            other => {
                let rgb = other.into_rgb8();
                let (width, height) = rgb.dimensions();
                DocumentImage {
                    width,
                    height,
                    order: ColorOrder::Rgb,
                    pixels: rgb.into_raw(),
                }
            }
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PassportError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| {
            PassportError::ImageProcessingError(format!(
                "Failed to open image {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_dynamic(image))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color_order(&self) -> ColorOrder {
        self.order
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Single-channel intensity using BT.601 weights.
    pub fn to_luma(&self) -> GrayImage {
        let channels = self.order.channels();
        let luma: Vec<u8> = match self.order {
            ColorOrder::Gray => self.pixels.clone(),
            ColorOrder::Rgb | ColorOrder::Rgba => self
                .pixels
                .chunks_exact(channels)
                .map(|px| weighted_luma(px[0], px[1], px[2]))
                .collect(),
            ColorOrder::Bgr | ColorOrder::Bgra => self
                .pixels
                .chunks_exact(channels)
                .map(|px| weighted_luma(px[2], px[1], px[0]))
                .collect(),
        };
        ImageBuffer::from_raw(self.width, self.height, luma)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    /// Copy of the pixels inside `bbox`, clipped to the image.
    pub fn crop(&self, bbox: &BoundingBox) -> DocumentImage {
        let x0 = bbox.x.min(self.width);
        let y0 = bbox.y.min(self.height);
        let x1 = bbox.right().min(self.width);
        let y1 = bbox.bottom().min(self.height);
        let channels = self.order.channels();
        let row_len = self.width as usize * channels;

        let mut pixels = Vec::with_capacity((x1 - x0) as usize * (y1 - y0) as usize * channels);
        for y in y0..y1 {
            let start = y as usize * row_len + x0 as usize * channels;
            let end = y as usize * row_len + x1 as usize * channels;
            pixels.extend_from_slice(&self.pixels[start..end]);
        }

        DocumentImage {
            width: x1 - x0,
            height: y1 - y0,
            order: self.order,
            pixels,
        }
    }
}

fn weighted_luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        BoundingBox {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// How the locator arrived at a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionSource {
    Contour,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct MrzRegion {
    pub image: DocumentImage,
    pub bbox: BoundingBox,
    pub source: RegionSource,
}

/// Line-oriented text as returned by a recognizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawText {
    lines: Vec<String>,
}

impl RawText {
    pub fn new(lines: Vec<String>) -> Self {
        RawText { lines }
    }

    pub fn from_text(text: &str) -> Self {
        RawText {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True when no line carries a non-whitespace character.
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|line| line.trim().is_empty())
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "X")]
    Unspecified,
}

impl Sex {
    pub fn from_mrz(c: char) -> Self {
        match c {
            'M' => Sex::Male,
            'F' => Sex::Female,
            _ => Sex::Unspecified,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Sex::Male => 'M',
            Sex::Female => 'F',
            Sex::Unspecified => 'X',
        }
    }
}

/// Outcome of each TD3 check digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckDigitResults {
    pub passport_number: bool,
    pub date_of_birth: bool,
    pub date_of_expiry: bool,
    pub personal_number: bool,
    pub composite: bool,
}

impl CheckDigitResults {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        [
            ("passport_number", self.passport_number),
            ("date_of_birth", self.date_of_birth),
            ("date_of_expiry", self.date_of_expiry),
            ("personal_number", self.personal_number),
            ("composite", self.composite),
        ]
        .into_iter()
    }

    /// Names of the failing checks among passport number, birth date and expiry.
    pub fn critical_failures(&self) -> Vec<&'static str> {
        self.iter()
            .take(3)
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn all_valid(&self) -> bool {
        self.iter().all(|(_, ok)| ok)
    }
}

/// Fields decoded from one TD3 line pair. Strings are upper-case with fillers removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub document_type: String,
    pub issuing_country: String,
    pub surname: String,
    pub given_names: String,
    pub passport_number: String,
    pub nationality: String,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Sex,
    pub date_of_expiry: Option<NaiveDate>,
    pub personal_number: Option<String>,
    pub check_digits: CheckDigitResults,
    #[serde(rename = "valid_mrz_checksum")]
    pub checksum_valid: bool,
    pub mrz_lines: Vec<String>,
}

impl ParsedRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_names, self.surname)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssueType {
    DocumentType,
    Country,
    Checksum,
    BirthDate,
    Expiry,
    RequiredField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub issue_type: ValidationIssueType,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(issue_type: ValidationIssueType, message: impl Into<String>) -> Self {
        ValidationIssue {
            issue_type,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationVerdict {
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        ValidationVerdict {
            is_valid: issues.is_empty(),
            issues,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|issue| issue.message.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Input,
    Locate,
    Recognize,
    Decode,
    Candidates,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Locate => "locate",
            Stage::Recognize => "recognize",
            Stage::Decode => "decode",
            Stage::Candidates => "candidates",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub region: BoundingBox,
    pub region_source: RegionSource,
    pub mrz_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingResult {
    Success {
        record: ParsedRecord,
        verdict: ValidationVerdict,
        diagnostics: Option<Diagnostics>,
    },
    Failure {
        stage: Stage,
        reason: String,
    },
}

impl ProcessingResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingResult::Success { .. })
    }

    pub fn is_valid_passport(&self) -> bool {
        match self {
            ProcessingResult::Success { verdict, .. } => verdict.is_valid,
            ProcessingResult::Failure { .. } => false,
        }
    }

    pub fn record(&self) -> Option<&ParsedRecord> {
        match self {
            ProcessingResult::Success { record, .. } => Some(record),
            ProcessingResult::Failure { .. } => None,
        }
    }

    pub fn to_report(&self) -> ProcessingReport<'_> {
        match self {
            ProcessingResult::Success {
                record,
                verdict,
                diagnostics,
            } => ProcessingReport {
                success: true,
                valid_passport: verdict.is_valid,
                record: Some(record),
                validation_errors: verdict.messages(),
                stage: None,
                error: None,
                diagnostics: diagnostics.as_ref(),
            },
            ProcessingResult::Failure { stage, reason } => ProcessingReport {
                success: false,
                valid_passport: false,
                record: None,
                validation_errors: Vec::new(),
                stage: Some(*stage),
                error: Some(reason),
                diagnostics: None,
            },
        }
    }
}

/// Flat, serializable view of a `ProcessingResult`.
#[derive(Debug, Serialize)]
pub struct ProcessingReport<'a> {
    pub success: bool,
    pub valid_passport: bool,
    #[serde(flatten)]
    pub record: Option<&'a ParsedRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<&'a Diagnostics>,
}
