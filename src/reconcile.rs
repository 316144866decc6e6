use crate::config::RehydrationConfig;
use crate::encoding::sanitize;
use crate::font::{OutputFace, TextMeasure};
use crate::planner::SlicePlan;
use crate::types::{BoundingBox, Color, Pt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Heading(u8),
    Body,
}

impl ElementType {
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        match tag.as_bytes() {
            [b'h', level @ b'1'..=b'6'] => ElementType::Heading(level - b'0'),
            _ => ElementType::Body,
        }
    }

    pub fn is_heading(self) -> bool {
        matches!(self, ElementType::Heading(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineStrategy {
    Baseline,
    Bottom,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    BottomLeft,
    TopLeft,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawMode {
    Invisible,
    Debug { color: Color, opacity: f32 },
}

impl DrawMode {
    pub fn debug() -> Self {
        DrawMode::Debug {
            color: Color::rgb(1.0, 0.0, 0.0),
            opacity: 0.35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSplit {
    EqualChars,
    CharRects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMapping {
    Uniform,
    Slices,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub rects: Vec<BoundingBox>,
    // Optional per-character rects, same order as `text.chars()`.
    pub char_rects: Vec<BoundingBox>,
    pub font_size: f32,
    pub font_weight: u16,
    pub font_family: String,
    pub element_type: ElementType,
}

impl TextRun {
    pub fn new(text: impl Into<String>, rects: Vec<BoundingBox>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            rects,
            char_rects: Vec::new(),
            font_size,
            font_weight: 400,
            font_family: String::new(),
            element_type: ElementType::Body,
        }
    }

    pub fn with_element(mut self, element_type: ElementType) -> Self {
        self.element_type = element_type;
        self
    }

    pub fn with_weight(mut self, weight: u16) -> Self {
        self.font_weight = weight;
        self
    }

    pub fn estimated_baseline(&self, rect: &BoundingBox, ascent_ratio: f32) -> f32 {
        rect.top + ascent_ratio * self.font_size
    }

    pub fn estimated_descent(&self, descent_ratio: f32) -> f32 {
        descent_ratio * self.font_size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstruction {
    pub page_index: usize,
    pub x: Pt,
    pub y: Pt,
    pub font_size: Pt,
    pub text: String,
    pub face: OutputFace,
}

#[derive(Debug, Clone)]
pub struct PageFrame {
    pub page_height_px: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub page_count: usize,
    pub page_height_out: Pt,
    pub slice_offsets: Vec<f32>,
}

impl PageFrame {
    pub fn uniform(
        page_height_px: f32,
        scale_x: f32,
        scale_y: f32,
        page_count: usize,
        page_height_out: Pt,
    ) -> Self {
        Self {
            page_height_px,
            scale_x,
            scale_y,
            page_count,
            page_height_out,
            slice_offsets: Vec::new(),
        }
    }

    pub fn from_plan(plan: &SlicePlan, scale_x: f32, scale_y: f32, page_height_out: Pt) -> Self {
        Self {
            page_height_px: plan.page_height,
            scale_x,
            scale_y,
            page_count: plan.slice_count(),
            page_height_out,
            slice_offsets: plan.scroll_positions.clone(),
        }
    }

    pub fn locate(&self, top: f32, mapping: PageMapping) -> Option<(usize, f32)> {
        if !top.is_finite() || !(self.page_height_px > 0.0) {
            return None;
        }
        let (index, relative) = match mapping {
            PageMapping::Slices if !self.slice_offsets.is_empty() => {
                let idx = self
                    .slice_offsets
                    .partition_point(|&offset| offset <= top)
                    .checked_sub(1)?;
                let relative = top - self.slice_offsets[idx];
                if relative >= self.page_height_px {
                    return None;
                }
                (idx, relative)
            }
            _ => {
                let page = (top / self.page_height_px).floor();
                if page < 0.0 {
                    return None;
                }
                let idx = page as usize;
                (idx, top - idx as f32 * self.page_height_px)
            }
        };
        if index >= self.page_count {
            return None;
        }
        Some((index, relative))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileSummary {
    pub runs: usize,
    pub lines: usize,
    pub emitted: usize,
    pub skipped_out_of_bounds: usize,
    pub skipped_empty: usize,
    pub size_corrected: usize,
    pub size_out_of_bounds: usize,
    pub measure_fallbacks: usize,
    pub chars_substituted: usize,
    pub chars_replaced: usize,
}

impl ReconcileSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_out_of_bounds + self.skipped_empty
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub instructions: Vec<DrawInstruction>,
    pub summary: ReconcileSummary,
}

impl Reconciliation {
    pub fn by_page(&self, page_count: usize) -> Vec<Vec<&DrawInstruction>> {
        let mut pages: Vec<Vec<&DrawInstruction>> = vec![Vec::new(); page_count];
        for instruction in &self.instructions {
            if let Some(page) = pages.get_mut(instruction.page_index) {
                page.push(instruction);
            }
        }
        pages
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeCorrection {
    Corrected(Pt),
    OutOfBounds(Pt),
    MeasureFailed(Pt),
}

impl SizeCorrection {
    pub fn size(self) -> Pt {
        match self {
            SizeCorrection::Corrected(v)
            | SizeCorrection::OutOfBounds(v)
            | SizeCorrection::MeasureFailed(v) => v,
        }
    }
}

pub fn correct_font_size(
    fonts: &dyn TextMeasure,
    face: OutputFace,
    nominal: Pt,
    text: &str,
    expected_width: Pt,
    bounds: (f32, f32),
) -> SizeCorrection {
    let measured = match fonts.measure(face, nominal, text) {
        Ok(width) => width.to_f32(),
        Err(_) => return SizeCorrection::MeasureFailed(nominal),
    };
    let expected = expected_width.to_f32();
    if !(measured > 0.0) || !(expected > 0.0) {
        return SizeCorrection::OutOfBounds(nominal);
    }
    let ratio = expected / measured;
    if ratio >= bounds.0 && ratio <= bounds.1 {
        SizeCorrection::Corrected(nominal * ratio)
    } else {
        SizeCorrection::OutOfBounds(nominal)
    }
}

// Divides a run's text between its visual lines. Zero-area rects (collapsed
// whitespace at line ends) are not lines and are dropped first.
pub fn split_lines(run: &TextRun, strategy: LineSplit) -> Vec<(String, BoundingBox)> {
    let rects: Vec<BoundingBox> = run
        .rects
        .iter()
        .copied()
        .filter(|r| r.is_finite() && !r.is_empty())
        .collect();
    match rects.len() {
        0 => Vec::new(),
        1 => vec![(run.text.clone(), rects[0])],
        _ => {
            if strategy == LineSplit::CharRects {
                if let Some(lines) = split_by_char_rects(run, &rects) {
                    return lines;
                }
            }
            split_equal_chars(&run.text, &rects)
        }
    }
}

fn split_equal_chars(text: &str, rects: &[BoundingBox]) -> Vec<(String, BoundingBox)> {
    let chars: Vec<char> = text.chars().collect();
    let lines = rects.len();
    let base = chars.len() / lines;
    let extra = chars.len() % lines;
    let mut out = Vec::with_capacity(lines);
    let mut start = 0usize;
    for (i, rect) in rects.iter().enumerate() {
        let len = base + usize::from(i < extra);
        let segment: String = chars[start..start + len].iter().collect();
        start += len;
        out.push((segment, *rect));
    }
    out
}

fn split_by_char_rects(run: &TextRun, rects: &[BoundingBox]) -> Option<Vec<(String, BoundingBox)>> {
    let chars: Vec<char> = run.text.chars().collect();
    if chars.len() != run.char_rects.len() {
        return None;
    }
    let mut segments: Vec<String> = vec![String::new(); rects.len()];
    for (ch, char_rect) in chars.iter().zip(&run.char_rects) {
        let cy = char_rect.center_y();
        if !cy.is_finite() {
            continue;
        }
        let line = rects
            .iter()
            .position(|r| r.contains_y(cy))
            .or_else(|| {
                rects
                    .iter()
                    .enumerate()
                    .min_by(|a, b| {
                        (a.1.center_y() - cy)
                            .abs()
                            .total_cmp(&(b.1.center_y() - cy).abs())
                    })
                    .map(|(idx, _)| idx)
            })?;
        segments[line].push(*ch);
    }
    Some(segments.into_iter().zip(rects.iter().copied()).collect())
}

pub fn reconcile(
    runs: &[TextRun],
    frame: &PageFrame,
    config: &RehydrationConfig,
    fonts: &dyn TextMeasure,
) -> Reconciliation {
    let mut summary = ReconcileSummary::default();
    let mut instructions = Vec::new();

    for run in runs {
        summary.runs += 1;
        let correction = config.corrections.get(run.element_type);
        let face = OutputFace::for_weight(run.font_weight, config.bold_weight_threshold);

        for (segment, rect) in split_lines(run, config.line_split) {
            summary.lines += 1;

            let Some((page_index, relative_top)) = frame.locate(rect.top, config.page_mapping)
            else {
                summary.skipped_out_of_bounds += 1;
                continue;
            };

            let cleaned = sanitize(&segment);
            summary.chars_substituted += cleaned.substituted;
            summary.chars_replaced += cleaned.replaced;
            if cleaned.text.is_empty() {
                summary.skipped_empty += 1;
                continue;
            }

            let local = BoundingBox {
                top: relative_top,
                ..rect
            };
            let baseline_px = match config.baseline {
                BaselineStrategy::Baseline => {
                    run.estimated_baseline(&local, config.metrics.ascent_ratio)
                }
                BaselineStrategy::Bottom => {
                    local.bottom() - run.estimated_descent(config.metrics.descent_ratio)
                }
                BaselineStrategy::Top => local.top + run.font_size,
            } + correction.y_offset_px;

            let y = match config.origin {
                Origin::BottomLeft => {
                    frame.page_height_out - Pt::from_f32(baseline_px * frame.scale_y)
                }
                Origin::TopLeft => Pt::from_f32(baseline_px * frame.scale_y),
            };
            let x = Pt::from_f32(rect.left * frame.scale_x);

            let nominal = Pt::from_f32(run.font_size * correction.size_factor * frame.scale_y);
            let expected = Pt::from_f32(rect.width * frame.scale_x);
            let sized = correct_font_size(
                fonts,
                face,
                nominal,
                &cleaned.text,
                expected,
                config.width_ratio_bounds,
            );
            match sized {
                SizeCorrection::Corrected(_) => summary.size_corrected += 1,
                SizeCorrection::OutOfBounds(_) => summary.size_out_of_bounds += 1,
                SizeCorrection::MeasureFailed(_) => summary.measure_fallbacks += 1,
            }

            instructions.push(DrawInstruction {
                page_index,
                x,
                y,
                font_size: sized.size(),
                text: cleaned.text,
                face,
            });
            summary.emitted += 1;
        }
    }

    Reconciliation {
        instructions,
        summary,
    }
}
