use crate::error::CvPdfError;
use crate::planner::ContentBlock;
use crate::reconcile::{ElementType, TextRun};
use crate::surface::RenderSurface;
use crate::types::BoundingBox;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySnapshot {
    pub viewport_width: f32,
    pub document_height: f32,
    pub blocks: Vec<ContentBlock>,
    pub runs: Vec<TextRun>,
}

impl GeometrySnapshot {
    pub fn capture(
        surface: &mut dyn RenderSurface,
        selectors: &[String],
    ) -> Result<Self, CvPdfError> {
        let viewport_width = surface.viewport_width();
        let document_height = surface.document_height()?;
        if !document_height.is_finite() || document_height < 0.0 {
            return Err(CvPdfError::Surface(format!(
                "document height is not usable: {document_height}"
            )));
        }
        let blocks = surface.content_blocks(selectors)?;
        let runs = surface
            .text_runs()?
            .into_iter()
            .filter_map(normalize_run)
            .collect();
        Ok(Self {
            viewport_width,
            document_height,
            blocks,
            runs,
        })
    }

    // Parses the JSON a browser-side extraction script emits:
    // `{ viewportWidth, documentHeight, blocks: [...], runs: [...] }`.
    pub fn from_json(json: &str) -> Result<Self, CvPdfError> {
        let raw: RawSnapshot =
            serde_json::from_str(json).map_err(|err| CvPdfError::Snapshot(err.to_string()))?;
        if !(raw.viewport_width > 0.0) || !raw.viewport_width.is_finite() {
            return Err(CvPdfError::Snapshot(format!(
                "viewportWidth must be positive, got {}",
                raw.viewport_width
            )));
        }
        if !(raw.document_height >= 0.0) || !raw.document_height.is_finite() {
            return Err(CvPdfError::Snapshot(format!(
                "documentHeight must be >= 0, got {}",
                raw.document_height
            )));
        }
        let runs = raw
            .runs
            .into_iter()
            .map(RawTextRun::into_run)
            .filter_map(normalize_run)
            .collect();
        Ok(Self {
            viewport_width: raw.viewport_width,
            document_height: raw.document_height,
            blocks: raw.blocks,
            runs,
        })
    }

    pub fn blocks_matching<'a>(
        &'a self,
        selectors: &'a [String],
    ) -> impl Iterator<Item = &'a ContentBlock> + 'a {
        self.blocks.iter().filter(move |block| {
            block.selector_class.is_empty()
                || selectors.is_empty()
                || selectors.iter().any(|s| *s == block.selector_class)
        })
    }
}

// Runs must carry visible text. Trimming is skipped when per-character rects
// are present, since they index the untrimmed string.
fn normalize_run(mut run: TextRun) -> Option<TextRun> {
    if run.text.trim().is_empty() || run.rects.is_empty() {
        return None;
    }
    if !(run.font_size > 0.0) || !run.font_size.is_finite() {
        return None;
    }
    if run.char_rects.is_empty() {
        let trimmed = run.text.trim();
        if trimmed.len() != run.text.len() {
            run.text = trimmed.to_string();
        }
    }
    Some(run)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    viewport_width: f32,
    document_height: f32,
    #[serde(default)]
    blocks: Vec<ContentBlock>,
    #[serde(default)]
    runs: Vec<RawTextRun>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTextRun {
    text: String,
    rects: Vec<BoundingBox>,
    #[serde(default)]
    char_rects: Vec<BoundingBox>,
    font_size: f32,
    #[serde(default)]
    font_weight: Option<serde_json::Value>,
    #[serde(default)]
    font_family: String,
    #[serde(default)]
    tag: String,
}

impl RawTextRun {
    fn into_run(self) -> TextRun {
        TextRun {
            text: self.text,
            rects: self.rects,
            char_rects: self.char_rects,
            font_size: self.font_size,
            font_weight: parse_font_weight(self.font_weight.as_ref()),
            font_family: self.font_family,
            element_type: ElementType::from_tag(&self.tag),
        }
    }
}

fn parse_font_weight(value: Option<&serde_json::Value>) -> u16 {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .map(|v| v.clamp(1.0, 1000.0) as u16)
            .unwrap_or(400),
        Some(serde_json::Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "bold" | "bolder" => 700,
            "lighter" => 300,
            "normal" | "" => 400,
            other => other
                .parse::<f32>()
                .map(|v| v.clamp(1.0, 1000.0) as u16)
                .unwrap_or(400),
        },
        _ => 400,
    }
}
