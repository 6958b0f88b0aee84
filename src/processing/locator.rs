use crate::models::{BoundingBox, DocumentImage, MrzRegion, RegionSource};
use crate::processing::debug::{DebugSink, NoopSink};
use crate::processing::image::{ImageProcessor, RectKernel};
use crate::utils::PassportError;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::gradients::horizontal_sobel;
use imageproc::morphology::{close, erode};
use imageproc::rect::Rect;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Tuning for the morphology pipeline and the geometric candidate filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub blur_sigma: f32,
    pub blackhat_kernel: RectKernel,
    pub glyph_close_kernel: RectKernel,
    /// Radius of the square second closing (10 gives a 21x21 element).
    pub band_close_radius: u8,
    /// Number of 3x3 erosion passes.
    pub erode_iterations: u8,
    pub min_top_fraction: f32,
    pub min_bottom_fraction: f32,
    pub min_width_fraction: f32,
    pub min_height_px: u32,
    pub max_height_fraction: f32,
    pub min_aspect_ratio: f32,
    pub pad_horizontal: u32,
    pub pad_up: u32,
    pub pad_down: u32,
    pub fallback_fraction: f32,
    pub fallback_min_height: u32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            blur_sigma: 0.8,
            blackhat_kernel: RectKernel::new(13, 5),
            glyph_close_kernel: RectKernel::new(21, 7),
            band_close_radius: 10,
            erode_iterations: 4,
            min_top_fraction: 0.5,
            min_bottom_fraction: 0.7,
            min_width_fraction: 0.4,
            min_height_px: 15,
            max_height_fraction: 0.2,
            min_aspect_ratio: 4.0,
            pad_horizontal: 10,
            // one MRZ line plus the inter-line gap
            pad_up: 42,
            pad_down: 6,
            fallback_fraction: 0.15,
            fallback_min_height: 40,
        }
    }
}

/// Finds the MRZ band in a document photo with morphology heuristics.
#[derive(Debug, Clone, Default)]
pub struct MrzLocator {
    config: LocatorConfig,
}

impl MrzLocator {
    pub fn new(config: LocatorConfig) -> Self {
        MrzLocator { config }
    }

    pub fn locate(&self, image: &DocumentImage) -> Result<MrzRegion, PassportError> {
        self.locate_with_sink(image, &NoopSink)
    }

    pub fn locate_with_sink(
        &self,
        image: &DocumentImage,
        sink: &dyn DebugSink,
    ) -> Result<MrzRegion, PassportError> {
        let cfg = &self.config;
        let gray = image.to_luma();
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(PassportError::RegionNotFound("image is empty".to_string()));
        }

        let mask = self.text_band_mask(&gray, sink);
        let candidates = self.band_candidates(&mask);
        debug!("{} MRZ band candidates in {}x{} image", candidates.len(), width, height);

        let (bbox, source) = match candidates.into_iter().max_by_key(|b| b.y) {
            Some(line) => (self.expand_to_both_lines(line, width, height), RegionSource::Contour),
            None => {
                let band = (height as f32 * cfg.fallback_fraction) as u32;
                if band < cfg.fallback_min_height {
                    return Err(PassportError::RegionNotFound(format!(
                        "no MRZ band found and bottom {} px band is below the {} px minimum",
                        band, cfg.fallback_min_height
                    )));
                }
                (BoundingBox::new(0, height - band, width, band), RegionSource::Fallback)
            }
        };
        info!("MRZ region {:?} from {:?}", bbox, source);

        let mut marked = gray.clone();
        draw_hollow_rect_mut(
            &mut marked,
            Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width.max(1), bbox.height.max(1)),
            Luma([0u8]),
        );
        sink.record("mrz_detection", &marked);

        let region = image.crop(&bbox);
        sink.record("mrz_roi", &region.to_luma());

        Ok(MrzRegion {
            image: region,
            bbox,
            source,
        })
    }

    // Dark glyphs -> bright strokes -> bridged text blocks -> binary bands
    fn text_band_mask(&self, gray: &GrayImage, sink: &dyn DebugSink) -> GrayImage {
        let cfg = &self.config;
        let smoothed = ImageProcessor::smooth(gray, cfg.blur_sigma);

        let blackhat = ImageProcessor::blackhat(&smoothed, cfg.blackhat_kernel);
        sink.record("blackhat", &blackhat);

        let gradient = ImageProcessor::normalize_gradient(&horizontal_sobel(&blackhat));
        sink.record("gradient", &gradient);

        let closed = ImageProcessor::close_rect(&gradient, cfg.glyph_close_kernel);
        sink.record("closed", &closed);

        let binary = ImageProcessor::otsu_binarize(&closed);
        let bands = close(&binary, Norm::LInf, cfg.band_close_radius);
        let mask = erode(&bands, Norm::LInf, cfg.erode_iterations);
        sink.record("thresh", &mask);
        mask
    }

    fn band_candidates(&self, mask: &GrayImage) -> Vec<BoundingBox> {
        let (width, height) = mask.dimensions();
        find_contours::<u32>(mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|c| {
                let min_x = c.points.iter().map(|p| p.x).min()?;
                let max_x = c.points.iter().map(|p| p.x).max()?;
                let min_y = c.points.iter().map(|p| p.y).min()?;
                let max_y = c.points.iter().map(|p| p.y).max()?;
                Some(BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
            })
            .filter(|b| self.looks_like_mrz_line(b, width, height))
            .collect()
    }

    fn looks_like_mrz_line(&self, b: &BoundingBox, width: u32, height: u32) -> bool {
        let cfg = &self.config;
        let (w, h) = (width as f32, height as f32);
        let (bw, bh) = (b.width as f32, b.height as f32);

        b.y as f32 > h * cfg.min_top_fraction
            && b.bottom() as f32 > h * cfg.min_bottom_fraction
            && bw > w * cfg.min_width_fraction
            && b.height > cfg.min_height_px
            && bh < h * cfg.max_height_fraction
            && bw / bh > cfg.min_aspect_ratio
    }

    fn expand_to_both_lines(&self, line: BoundingBox, width: u32, height: u32) -> BoundingBox {
        let cfg = &self.config;
        let x = line.x.saturating_sub(cfg.pad_horizontal);
        let y = line.y.saturating_sub(cfg.pad_up);
        let w = (line.width + 2 * cfg.pad_horizontal).min(width - x);
        let h = (line.height + cfg.pad_up + cfg.pad_down).min(height - y);
        BoundingBox::new(x, y, w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use std::sync::Mutex;

    fn blank(width: u32, height: u32) -> DocumentImage {
        DocumentImage::from_gray(GrayImage::from_pixel(width, height, Luma([255])))
    }

    // Two rows of 8x20 px dark "glyphs" near the bottom of an 800x600 page.
    fn page_with_mrz() -> DocumentImage {
        let mut page = GrayImage::from_pixel(800, 600, Luma([255]));
        for top in [470, 500] {
            let mut x = 60;
            while x + 8 <= 740 {
                draw_filled_rect_mut(&mut page, Rect::at(x, top).of_size(8, 20), Luma([0u8]));
                x += 12;
            }
        }
        DocumentImage::from_gray(page)
    }

    #[test]
    fn test_finds_mrz_band_from_contours() {
        let region = MrzLocator::default().locate(&page_with_mrz()).unwrap();

        assert_eq!(region.source, RegionSource::Contour);
        assert!(region.bbox.y < 470, "region should start above the first line: {:?}", region.bbox);
        assert!(region.bbox.bottom() >= 520);
        assert!(region.bbox.width > 600);
        assert_eq!(region.image.width(), region.bbox.width);
        assert_eq!(region.image.height(), region.bbox.height);
    }

    #[test]
    fn test_falls_back_to_bottom_band() {
        let region = MrzLocator::default().locate(&blank(300, 267)).unwrap();

        assert_eq!(region.source, RegionSource::Fallback);
        assert_eq!(region.bbox, BoundingBox::new(0, 227, 300, 40));
        assert_eq!(region.image.height(), 40);
    }

    #[test]
    fn test_small_image_has_no_region() {
        let err = MrzLocator::default().locate(&blank(300, 266)).unwrap_err();
        assert!(matches!(err, PassportError::RegionNotFound(_)));
    }

    #[test]
    fn test_expansion_is_clipped_to_image() {
        let locator = MrzLocator::default();
        let bbox = locator.expand_to_both_lines(BoundingBox::new(5, 20, 790, 30), 800, 60);
        assert_eq!(bbox, BoundingBox::new(0, 0, 800, 60));
    }

    #[test]
    fn test_candidate_filter_rejects_upper_half_and_tall_boxes() {
        let locator = MrzLocator::default();
        assert!(locator.looks_like_mrz_line(&BoundingBox::new(40, 480, 700, 40), 800, 600));
        assert!(!locator.looks_like_mrz_line(&BoundingBox::new(40, 200, 700, 40), 800, 600));
        assert!(!locator.looks_like_mrz_line(&BoundingBox::new(40, 400, 700, 130), 800, 600));
        assert!(!locator.looks_like_mrz_line(&BoundingBox::new(40, 480, 100, 20), 800, 600));
    }

    #[test]
    fn test_sink_receives_intermediate_buffers() {
        let names = Mutex::new(Vec::new());
        let sink = |name: &str, _image: &GrayImage| names.lock().unwrap().push(name.to_string());

        MrzLocator::default()
            .locate_with_sink(&blank(300, 300), &sink)
            .unwrap();
        assert_eq!(
            *names.lock().unwrap(),
            vec!["blackhat", "gradient", "closed", "thresh", "mrz_detection", "mrz_roi"]
        );
    }
}
