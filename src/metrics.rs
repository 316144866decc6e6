use crate::compose::ComposeSummary;
use crate::planner::SlicePlan;
use crate::reconcile::ReconcileSummary;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    pub pages: usize,
    pub slices_snapped: usize,
    pub slices_forced: usize,
    pub lines_emitted: usize,
    pub lines_skipped: usize,
    pub plan_ms: f64,
    pub capture_ms: f64,
    pub reconcile_ms: f64,
    pub compose_ms: f64,
    pub pdf_bytes: usize,
}

impl RunMetrics {
    pub(crate) fn record(
        plan: &SlicePlan,
        summary: &ReconcileSummary,
        compose: &ComposeSummary,
        pdf_bytes: usize,
    ) -> Self {
        Self {
            pages: compose.pages_written,
            slices_snapped: plan.snapped_count(),
            slices_forced: plan.forced_count(),
            lines_emitted: summary.emitted,
            lines_skipped: summary.skipped() + compose.ignored_instructions,
            pdf_bytes,
            ..Self::default()
        }
    }
}
