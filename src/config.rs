use crate::error::CvPdfError;
use crate::font::BaselineMetrics;
use crate::reconcile::{BaselineStrategy, DrawMode, ElementType, LineSplit, Origin, PageMapping};
use crate::types::{Pt, Size};

pub const CSS_DPI: f32 = 96.0;

pub const DEFAULT_BLOCK_SELECTORS: &[&str] = &[
    "header",
    "section > h2",
    ".cv-entry",
    ".experience-item",
    ".education-item",
    ".project-item",
    ".skills-group",
    "footer",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerConfig {
    pub page_height_px: f32,
    pub tolerance_px: f32,
    pub min_section_height_px: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            page_height_px: 794.0 * Size::a4().aspect(),
            tolerance_px: 150.0,
            min_section_height_px: 24.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementCorrection {
    pub y_offset_px: f32,
    pub size_factor: f32,
}

impl Default for ElementCorrection {
    fn default() -> Self {
        Self {
            y_offset_px: 0.0,
            size_factor: 1.0,
        }
    }
}

// Per-element adjustments: index 0..=5 are h1..h6, index 6 is body text.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CorrectionTable {
    entries: [ElementCorrection; 7],
}

impl CorrectionTable {
    pub fn get(&self, element: ElementType) -> ElementCorrection {
        self.entries[Self::slot(element)]
    }

    pub fn set(&mut self, element: ElementType, correction: ElementCorrection) {
        self.entries[Self::slot(element)] = correction;
    }

    fn slot(element: ElementType) -> usize {
        match element {
            ElementType::Heading(level) => (level.clamp(1, 6) - 1) as usize,
            ElementType::Body => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RehydrationConfig {
    pub baseline: BaselineStrategy,
    pub origin: Origin,
    pub metrics: BaselineMetrics,
    pub width_ratio_bounds: (f32, f32),
    pub corrections: CorrectionTable,
    pub draw_mode: DrawMode,
    pub line_split: LineSplit,
    pub page_mapping: PageMapping,
    pub bold_weight_threshold: u16,
}

impl Default for RehydrationConfig {
    fn default() -> Self {
        Self {
            baseline: BaselineStrategy::Baseline,
            origin: Origin::BottomLeft,
            metrics: BaselineMetrics::default(),
            width_ratio_bounds: (0.7, 1.5),
            corrections: CorrectionTable::default(),
            draw_mode: DrawMode::Invisible,
            line_split: LineSplit::EqualChars,
            page_mapping: PageMapping::Uniform,
            bold_weight_threshold: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub page_size: Size,
    pub viewport_width_px: f32,
    pub block_selectors: Vec<String>,
    pub planner: PlannerConfig,
    pub rehydration: RehydrationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let page_size = Size::a4();
        // A4 width at 96 dpi.
        let viewport_width_px = (page_size.width.to_f32() / 72.0 * CSS_DPI).round();
        Self {
            page_size,
            viewport_width_px,
            block_selectors: DEFAULT_BLOCK_SELECTORS.iter().map(|s| s.to_string()).collect(),
            planner: PlannerConfig {
                page_height_px: viewport_width_px * page_size.aspect(),
                ..PlannerConfig::default()
            },
            rehydration: RehydrationConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn page_height_px(&self) -> f32 {
        self.viewport_width_px * self.page_size.aspect()
    }

    pub fn scale(&self) -> (f32, f32) {
        let sx = self.page_size.width.to_f32() / self.viewport_width_px;
        let sy = self.page_size.height.to_f32() / self.page_height_px();
        (sx, sy)
    }

    pub fn validate(&self) -> Result<(), CvPdfError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.page_size.width.to_f32()) || !positive(self.page_size.height.to_f32()) {
            return Err(CvPdfError::InvalidConfiguration(
                "page size must be positive".to_string(),
            ));
        }
        if !positive(self.viewport_width_px) {
            return Err(CvPdfError::InvalidConfiguration(format!(
                "viewport width must be positive, got {}",
                self.viewport_width_px
            )));
        }
        if !positive(self.planner.page_height_px) {
            return Err(CvPdfError::InvalidConfiguration(
                "page height must be positive".to_string(),
            ));
        }
        if !self.planner.tolerance_px.is_finite() || self.planner.tolerance_px < 0.0 {
            return Err(CvPdfError::InvalidConfiguration(format!(
                "tolerance must be >= 0, got {}",
                self.planner.tolerance_px
            )));
        }
        if !self.planner.min_section_height_px.is_finite() {
            return Err(CvPdfError::InvalidConfiguration(
                "minimum section height must be finite".to_string(),
            ));
        }
        let (lo, hi) = self.rehydration.width_ratio_bounds;
        if !(lo > 0.0 && lo <= 1.0 && hi >= 1.0 && hi.is_finite()) {
            return Err(CvPdfError::InvalidConfiguration(format!(
                "width ratio bounds must satisfy 0 < lo <= 1 <= hi, got ({lo}, {hi})"
            )));
        }
        let m = self.rehydration.metrics;
        if !positive(m.ascent_ratio) || !m.descent_ratio.is_finite() || m.descent_ratio < 0.0 {
            return Err(CvPdfError::InvalidConfiguration(
                "baseline metrics must be finite and non-negative".to_string(),
            ));
        }
        if let DrawMode::Debug { opacity, .. } = self.rehydration.draw_mode {
            if !(0.0..=1.0).contains(&opacity) {
                return Err(CvPdfError::InvalidConfiguration(format!(
                    "debug opacity must be within 0..=1, got {opacity}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn page_height_pt(&self) -> Pt {
        self.page_size.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_a4_at_96_dpi() {
        let config = PipelineConfig::default();
        assert_eq!(config.viewport_width_px, 794.0);
        assert!((config.page_height_px() - 1122.9).abs() < 0.5);
        assert!((config.planner.page_height_px - config.page_height_px()).abs() < 1e-3);
        let (sx, sy) = config.scale();
        assert!((sx - 0.7497).abs() < 1e-3);
        assert!((sx - sy).abs() < 1e-3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_ratio_bounds() {
        let mut config = PipelineConfig::default();
        config.rehydration.width_ratio_bounds = (1.2, 0.9);
        assert!(matches!(
            config.validate(),
            Err(CvPdfError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_negative_tolerance() {
        let mut config = PipelineConfig::default();
        config.planner.tolerance_px = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn correction_table_slots() {
        let mut table = CorrectionTable::default();
        table.set(
            ElementType::Heading(2),
            ElementCorrection {
                y_offset_px: -1.5,
                size_factor: 0.95,
            },
        );
        assert_eq!(table.get(ElementType::Heading(2)).y_offset_px, -1.5);
        assert_eq!(table.get(ElementType::Heading(1)), ElementCorrection::default());
        assert_eq!(table.get(ElementType::Body), ElementCorrection::default());
    }
}
