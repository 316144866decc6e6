use crate::error::CvPdfError;
use crate::planner::ContentBlock;
use crate::reconcile::TextRun;
use crate::snapshot::GeometrySnapshot;
use base64::Engine;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

pub trait RenderSurface {
    fn viewport_width(&self) -> f32;
    fn document_height(&mut self) -> Result<f32, CvPdfError>;
    fn content_blocks(&mut self, selectors: &[String]) -> Result<Vec<ContentBlock>, CvPdfError>;
    fn text_runs(&mut self) -> Result<Vec<TextRun>, CvPdfError>;
    // Scroll to `scroll_y` and capture a viewport `height` pixels tall.
    fn capture(&mut self, scroll_y: f32, height: f32) -> Result<PageImage, CvPdfError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageImage {
    Encoded(Vec<u8>),
    Rgb {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
}

impl PageImage {
    pub fn from_rgb(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        PageImage::Rgb {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    pub fn from_data_uri(uri: &str) -> Result<Self, CvPdfError> {
        let payload = match uri.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    CvPdfError::Image("data URI without payload".to_string())
                })?;
                if !header.contains("base64") {
                    return Ok(PageImage::Encoded(data.as_bytes().to_vec()));
                }
                data
            }
            None => uri,
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|err| CvPdfError::Image(format!("invalid base64 screenshot: {err}")))?;
        Ok(PageImage::Encoded(bytes))
    }

    pub fn dimensions(&self) -> Result<(u32, u32), CvPdfError> {
        match self {
            PageImage::Rgb { width, height, .. } => Ok((*width, *height)),
            PageImage::Encoded(bytes) => Ok(image::load_from_memory(bytes)?.dimensions()),
        }
    }
}

// The screenshot may be taken at a device scale factor above 1; it is derived
// from the image width against the viewport width.
pub struct SnapshotSurface {
    snapshot: GeometrySnapshot,
    screenshot: RgbImage,
    device_scale: f32,
}

impl SnapshotSurface {
    pub fn new(snapshot: GeometrySnapshot, screenshot: &[u8]) -> Result<Self, CvPdfError> {
        let image = image::load_from_memory(screenshot)?;
        Self::from_image(snapshot, image)
    }

    pub fn from_image(snapshot: GeometrySnapshot, image: DynamicImage) -> Result<Self, CvPdfError> {
        let screenshot = image.to_rgb8();
        if screenshot.width() == 0 || !(snapshot.viewport_width > 0.0) {
            return Err(CvPdfError::Surface(
                "screenshot or viewport has zero width".to_string(),
            ));
        }
        let device_scale = screenshot.width() as f32 / snapshot.viewport_width;
        Ok(Self {
            snapshot,
            screenshot,
            device_scale,
        })
    }

    pub fn device_scale(&self) -> f32 {
        self.device_scale
    }
}

impl RenderSurface for SnapshotSurface {
    fn viewport_width(&self) -> f32 {
        self.snapshot.viewport_width
    }

    fn document_height(&mut self) -> Result<f32, CvPdfError> {
        Ok(self.snapshot.document_height)
    }

    fn content_blocks(&mut self, selectors: &[String]) -> Result<Vec<ContentBlock>, CvPdfError> {
        Ok(self.snapshot.blocks_matching(selectors).cloned().collect())
    }

    fn text_runs(&mut self) -> Result<Vec<TextRun>, CvPdfError> {
        Ok(self.snapshot.runs.clone())
    }

    fn capture(&mut self, scroll_y: f32, height: f32) -> Result<PageImage, CvPdfError> {
        if !scroll_y.is_finite() || scroll_y < 0.0 || !(height > 0.0) {
            return Err(CvPdfError::Surface(format!(
                "cannot capture {height}px at offset {scroll_y}"
            )));
        }
        let width = self.screenshot.width();
        let out_height = (height * self.device_scale).round().max(1.0) as u32;
        let top = (scroll_y * self.device_scale).round() as u32;

        // Past the end of the document the page stays white.
        let mut page = RgbImage::from_pixel(width, out_height, Rgb([255, 255, 255]));
        if top < self.screenshot.height() {
            let available = (self.screenshot.height() - top).min(out_height);
            let slice =
                image::imageops::crop_imm(&self.screenshot, 0, top, width, available).to_image();
            image::imageops::replace(&mut page, &slice, 0, 0);
        }
        Ok(PageImage::from_rgb(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn striped_screenshot(width: u32, height: u32) -> RgbImage {
        // Each 100px band gets its own gray level so slices are identifiable.
        RgbImage::from_fn(width, height, |_, y| {
            let level = ((y / 100) * 20).min(250) as u8;
            Rgb([level, level, level])
        })
    }

    fn snapshot(width: f32, height: f32) -> GeometrySnapshot {
        GeometrySnapshot {
            viewport_width: width,
            document_height: height,
            blocks: vec![ContentBlock::new("header", 0.0, 80.0)],
            runs: Vec::new(),
        }
    }

    #[test]
    fn capture_crops_at_scroll_offset() {
        let image = DynamicImage::ImageRgb8(striped_screenshot(100, 500));
        let mut surface = SnapshotSurface::from_image(snapshot(100.0, 500.0), image).unwrap();
        let PageImage::Rgb {
            width,
            height,
            pixels,
        } = surface.capture(200.0, 150.0).unwrap()
        else {
            panic!("expected raw pixels");
        };
        assert_eq!((width, height), (100, 150));
        // First row is band 2 (y=200).
        assert_eq!(pixels[0], 40);
    }

    #[test]
    fn capture_past_end_is_padded_white() {
        let image = DynamicImage::ImageRgb8(striped_screenshot(100, 300));
        let mut surface = SnapshotSurface::from_image(snapshot(100.0, 300.0), image).unwrap();
        let PageImage::Rgb { pixels, height, .. } = surface.capture(200.0, 200.0).unwrap() else {
            panic!("expected raw pixels");
        };
        assert_eq!(height, 200);
        let last_row_start = (199 * 100 * 3) as usize;
        assert_eq!(pixels[last_row_start], 255);
        assert_eq!(pixels[0], 40);
    }

    #[test]
    fn device_scale_is_derived_from_screenshot_width() {
        let image = DynamicImage::ImageRgb8(striped_screenshot(200, 1000));
        let mut surface = SnapshotSurface::from_image(snapshot(100.0, 500.0), image).unwrap();
        assert_eq!(surface.device_scale(), 2.0);
        let captured = surface.capture(100.0, 100.0).unwrap();
        assert_eq!(captured.dimensions().unwrap(), (200, 200));
    }

    #[test]
    fn data_uri_decodes() {
        let png_header = [0x89u8, b'P', b'N', b'G'];
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_header);
        let image = PageImage::from_data_uri(&format!("data:image/png;base64,{encoded}")).unwrap();
        assert_eq!(image, PageImage::Encoded(png_header.to_vec()));
        assert!(PageImage::from_data_uri("data:image/png;base64").is_err());
        assert!(PageImage::from_data_uri("%%%").is_err());
    }

    #[test]
    fn blocks_are_filtered_by_selector() {
        let image = DynamicImage::ImageRgb8(striped_screenshot(10, 10));
        let mut surface = SnapshotSurface::from_image(snapshot(10.0, 10.0), image).unwrap();
        assert_eq!(surface.content_blocks(&["footer".to_string()]).unwrap().len(), 0);
        assert_eq!(surface.content_blocks(&["header".to_string()]).unwrap().len(), 1);
    }
}
