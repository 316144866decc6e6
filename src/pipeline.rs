use crate::compose::{ComposeSummary, compose_pdf};
use crate::config::{ElementCorrection, PipelineConfig};
use crate::debug::DebugLogger;
use crate::error::CvPdfError;
use crate::font::{BaselineMetrics, StandardFonts};
use crate::metrics::RunMetrics;
use crate::perf::{PerfLogger, elapsed_ms};
use crate::planner::{self, SliceDecision, SlicePlan};
use crate::reconcile::{
    self, BaselineStrategy, DrawMode, ElementType, LineSplit, Origin, PageFrame, PageMapping,
    ReconcileSummary, Reconciliation,
};
use crate::snapshot::GeometrySnapshot;
use crate::surface::{PageImage, RenderSurface};
use crate::types::Size;
use std::path::PathBuf;
use std::time::Instant;

const DEFAULT_JOB: &str = "default";

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub pdf: Vec<u8>,
    pub plan: SlicePlan,
    pub summary: ReconcileSummary,
    pub compose: ComposeSummary,
    pub metrics: RunMetrics,
}

pub struct CvPdf {
    config: PipelineConfig,
    fonts: StandardFonts,
    debug: Option<DebugLogger>,
    perf: Option<PerfLogger>,
}

pub struct CvPdfBuilder {
    config: PipelineConfig,
    font_bytes: Option<Vec<u8>>,
    debug_path: Option<PathBuf>,
    perf_path: Option<PathBuf>,
}

impl Default for CvPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CvPdfBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            font_bytes: None,
            debug_path: None,
            perf_path: None,
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn viewport_width(mut self, width_px: f32) -> Self {
        self.config.viewport_width_px = width_px;
        self
    }

    pub fn block_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.block_selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn tolerance(mut self, tolerance_px: f32) -> Self {
        self.config.planner.tolerance_px = tolerance_px;
        self
    }

    pub fn min_section_height(mut self, height_px: f32) -> Self {
        self.config.planner.min_section_height_px = height_px;
        self
    }

    pub fn baseline_strategy(mut self, strategy: BaselineStrategy) -> Self {
        self.config.rehydration.baseline = strategy;
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.config.rehydration.origin = origin;
        self
    }

    pub fn draw_mode(mut self, mode: DrawMode) -> Self {
        self.config.rehydration.draw_mode = mode;
        self
    }

    pub fn element_correction(mut self, element: ElementType, correction: ElementCorrection) -> Self {
        self.config.rehydration.corrections.set(element, correction);
        self
    }

    pub fn width_ratio_bounds(mut self, lo: f32, hi: f32) -> Self {
        self.config.rehydration.width_ratio_bounds = (lo, hi);
        self
    }

    pub fn line_split(mut self, split: LineSplit) -> Self {
        self.config.rehydration.line_split = split;
        self
    }

    pub fn page_mapping(mut self, mapping: PageMapping) -> Self {
        self.config.rehydration.page_mapping = mapping;
        self
    }

    pub fn bold_weight_threshold(mut self, weight: u16) -> Self {
        self.config.rehydration.bold_weight_threshold = weight;
        self
    }

    pub fn baseline_metrics_from_font(mut self, ttf: Vec<u8>) -> Self {
        self.font_bytes = Some(ttf);
        self
    }

    pub fn baseline_metrics(mut self, metrics: BaselineMetrics) -> Self {
        self.config.rehydration.metrics = metrics;
        self.font_bytes = None;
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<CvPdf, CvPdfError> {
        let mut config = self.config;
        config.planner.page_height_px = config.page_height_px();
        if let Some(bytes) = &self.font_bytes {
            config.rehydration.metrics = BaselineMetrics::from_font_bytes(bytes)?;
        }
        config.validate()?;

        let debug = if let Some(path) = self.debug_path {
            Some(DebugLogger::new(path)?)
        } else {
            None
        };
        let perf = if let Some(path) = self.perf_path {
            Some(PerfLogger::new(path)?)
        } else {
            None
        };
        Ok(CvPdf {
            config,
            fonts: StandardFonts,
            debug,
            perf,
        })
    }
}

impl CvPdf {
    pub fn builder() -> CvPdfBuilder {
        CvPdfBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn plan_document(&self, snapshot: &GeometrySnapshot) -> SlicePlan {
        self.plan_for_job(snapshot, DEFAULT_JOB)
    }

    pub fn rehydrate(&self, snapshot: &GeometrySnapshot, plan: &SlicePlan) -> Reconciliation {
        let (scale_x, scale_y) = self.config.scale();
        let frame = PageFrame::from_plan(plan, scale_x, scale_y, self.config.page_height_pt());
        reconcile::reconcile(&snapshot.runs, &frame, &self.config.rehydration, &self.fonts)
    }

    pub fn render(&self, surface: &mut dyn RenderSurface) -> Result<RenderOutput, CvPdfError> {
        self.render_job(DEFAULT_JOB, surface)
    }

    pub fn render_variants<S>(
        &self,
        jobs: Vec<(String, S)>,
    ) -> Vec<(String, Result<RenderOutput, CvPdfError>)>
    where
        S: RenderSurface + Send,
    {
        use rayon::prelude::*;

        jobs.into_par_iter()
            .map(|(key, mut surface)| {
                let result = self.render_job(&key, &mut surface);
                (key, result)
            })
            .collect()
    }

    fn render_job(
        &self,
        job: &str,
        surface: &mut dyn RenderSurface,
    ) -> Result<RenderOutput, CvPdfError> {
        let viewport = surface.viewport_width();
        if (viewport - self.config.viewport_width_px).abs() > 0.5 {
            return Err(CvPdfError::Surface(format!(
                "surface is laid out at {viewport}px, expected {}px",
                self.config.viewport_width_px
            )));
        }

        let t_plan = Instant::now();
        let snapshot = GeometrySnapshot::capture(surface, &self.config.block_selectors)?;
        let plan = self.plan_for_job(&snapshot, job);
        let plan_ms = elapsed_ms(t_plan);
        self.span("plan", job, plan_ms);

        let t_capture = Instant::now();
        let mut pages: Vec<PageImage> = Vec::with_capacity(plan.slice_count());
        for offset in &plan.scroll_positions {
            pages.push(surface.capture(*offset, plan.page_height)?);
        }
        let capture_ms = elapsed_ms(t_capture);
        self.span("capture", job, capture_ms);

        let t_reconcile = Instant::now();
        let reconciliation = self.rehydrate(&snapshot, &plan);
        let reconcile_ms = elapsed_ms(t_reconcile);
        self.span("reconcile", job, reconcile_ms);
        self.log_reconcile(job, &reconciliation.summary);

        let t_compose = Instant::now();
        let rehydration = &self.config.rehydration;
        let (pdf, compose) = compose_pdf(
            &pages,
            self.config.page_size,
            &reconciliation.instructions,
            rehydration.draw_mode,
            rehydration.origin,
        )?;
        let compose_ms = elapsed_ms(t_compose);
        self.span("compose", job, compose_ms);

        let mut metrics = RunMetrics::record(&plan, &reconciliation.summary, &compose, pdf.len());
        metrics.plan_ms = plan_ms;
        metrics.capture_ms = capture_ms;
        metrics.reconcile_ms = reconcile_ms;
        metrics.compose_ms = compose_ms;

        if let Some(debug) = &self.debug {
            if compose.ignored_instructions > 0 {
                debug.increment(job, "compose.ignored", compose.ignored_instructions as u64);
            }
            debug.emit_summary(job);
            debug.flush();
        }
        if let Some(perf) = &self.perf {
            perf.log_counts(
                "render",
                Some(job),
                &[
                    ("pages", metrics.pages as u64),
                    ("pdf_bytes", metrics.pdf_bytes as u64),
                ],
            );
            perf.flush();
        }

        Ok(RenderOutput {
            pdf,
            plan,
            summary: reconciliation.summary,
            compose,
            metrics,
        })
    }

    fn plan_for_job(&self, snapshot: &GeometrySnapshot, job: &str) -> SlicePlan {
        let blocks: Vec<_> = snapshot
            .blocks_matching(&self.config.block_selectors)
            .cloned()
            .collect();
        let plan = planner::plan(&blocks, snapshot.document_height, &self.config.planner);
        if let Some(debug) = &self.debug {
            for (slice, decision) in plan.decisions.iter().enumerate() {
                if let SliceDecision::Forced { ideal } = decision {
                    debug.event(
                        "plan.forced_cut",
                        job,
                        serde_json::json!({
                            "slice": slice,
                            "ideal": ideal,
                            "tolerance": self.config.planner.tolerance_px,
                        }),
                    );
                }
            }
        }
        plan
    }

    fn log_reconcile(&self, job: &str, summary: &ReconcileSummary) {
        if let Some(debug) = &self.debug {
            debug.increment(job, "reconcile.out_of_bounds", summary.skipped_out_of_bounds as u64);
            debug.increment(job, "reconcile.empty", summary.skipped_empty as u64);
            debug.increment(job, "reconcile.size_out_of_bounds", summary.size_out_of_bounds as u64);
            debug.increment(job, "reconcile.measure_fallback", summary.measure_fallbacks as u64);
            debug.increment(job, "encoding.substituted", summary.chars_substituted as u64);
            debug.increment(job, "encoding.replaced", summary.chars_replaced as u64);
        }
        if let Some(perf) = &self.perf {
            perf.log_counts(
                "reconcile",
                Some(job),
                &[
                    ("runs", summary.runs as u64),
                    ("lines", summary.lines as u64),
                    ("emitted", summary.emitted as u64),
                    ("skipped", summary.skipped() as u64),
                ],
            );
        }
    }

    fn span(&self, name: &str, job: &str, ms: f64) {
        if let Some(perf) = &self.perf {
            perf.log_span_ms(name, Some(job), ms);
        }
    }
}
