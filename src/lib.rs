mod compose;
mod config;
mod debug;
mod encoding;
mod error;
mod font;
mod locale;
mod metrics;
mod perf;
mod pipeline;
mod planner;
mod reconcile;
mod snapshot;
mod surface;
mod types;

pub use compose::{ComposeSummary, compose_pdf};
pub use config::{
    CSS_DPI, CorrectionTable, DEFAULT_BLOCK_SELECTORS, ElementCorrection, PipelineConfig,
    PlannerConfig, RehydrationConfig,
};
pub use encoding::{PLACEHOLDER, Sanitized, sanitize, to_win_ansi_bytes, win_ansi_byte};
pub use error::CvPdfError;
pub use font::{BaselineMetrics, MeasureError, OutputFace, StandardFonts, TextMeasure};
pub use locale::{LocalizeOptions, Localized, Translations, localize_html};
pub use metrics::RunMetrics;
pub use pipeline::{CvPdf, CvPdfBuilder, RenderOutput};
pub use planner::{ContentBlock, SliceDecision, SlicePlan, cut_points, plan, plan_slices};
pub use reconcile::{
    BaselineStrategy, DrawInstruction, DrawMode, ElementType, LineSplit, Origin, PageFrame,
    PageMapping, ReconcileSummary, Reconciliation, SizeCorrection, TextRun, correct_font_size,
    reconcile, split_lines,
};
pub use snapshot::GeometrySnapshot;
pub use surface::{PageImage, RenderSurface, SnapshotSurface};
pub use types::{BoundingBox, Color, Pt, Size};
