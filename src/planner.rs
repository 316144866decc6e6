use crate::config::PlannerConfig;

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    #[serde(default, alias = "selector")]
    pub selector_class: String,
    #[serde(alias = "top")]
    pub top_y: f32,
    pub height: f32,
}

impl ContentBlock {
    pub fn new(selector_class: impl Into<String>, top_y: f32, height: f32) -> Self {
        Self {
            selector_class: selector_class.into(),
            top_y,
            height,
        }
    }

    pub fn bottom(&self) -> f32 {
        self.top_y + self.height
    }

    fn strictly_contains(&self, y: f32) -> bool {
        y > self.top_y && y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SliceDecision {
    Start,
    Snapped { ideal: f32, cut: f32 },
    Forced { ideal: f32 },
}

impl SliceDecision {
    pub fn offset(&self) -> f32 {
        match *self {
            SliceDecision::Start => 0.0,
            SliceDecision::Snapped { cut, .. } => cut,
            SliceDecision::Forced { ideal } => ideal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlicePlan {
    pub scroll_positions: Vec<f32>,
    pub decisions: Vec<SliceDecision>,
    pub page_height: f32,
    pub total_height: f32,
}

impl SlicePlan {
    pub fn slice_count(&self) -> usize {
        self.scroll_positions.len()
    }

    pub fn forced_count(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| matches!(d, SliceDecision::Forced { .. }))
            .count()
    }

    pub fn snapped_count(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| matches!(d, SliceDecision::Snapped { .. }))
            .count()
    }

    // Index of the slice whose captured viewport `[offset, offset + page_height)`
    // contains `y`. `None` past the last viewport, and for the band between a
    // viewport's bottom and a snapped cut that no screenshot covers.
    pub fn slice_for(&self, y: f32) -> Option<usize> {
        if !y.is_finite() || y < 0.0 {
            return None;
        }
        let idx = self
            .scroll_positions
            .partition_point(|&offset| offset <= y)
            .checked_sub(1)?;
        let start = self.scroll_positions[idx];
        if y < start + self.page_height {
            Some(idx)
        } else {
            None
        }
    }
}

pub fn cut_points(blocks: &[ContentBlock], min_height: f32) -> Vec<f32> {
    let eligible = eligible_blocks(blocks, min_height);
    let mut points = Vec::with_capacity(eligible.len() + 1);
    points.push(0.0f32);
    for pair in eligible.windows(2) {
        let mid = (pair[0].bottom() + pair[1].top_y) / 2.0;
        if !mid.is_finite() || mid <= 0.0 {
            continue;
        }
        // Only overlapping blocks can push a midpoint into content.
        if eligible.iter().any(|block| block.strictly_contains(mid)) {
            continue;
        }
        points.push(mid);
    }
    points.sort_by(|a, b| a.total_cmp(b));
    points.dedup();
    points
}

fn eligible_blocks(blocks: &[ContentBlock], min_height: f32) -> Vec<&ContentBlock> {
    let mut eligible: Vec<&ContentBlock> = blocks
        .iter()
        .filter(|b| b.top_y.is_finite() && b.height.is_finite())
        .filter(|b| b.height > 0.0 && b.height >= min_height)
        .collect();
    eligible.sort_by(|a, b| a.top_y.total_cmp(&b.top_y));
    eligible
}

pub fn plan_slices(
    blocks: &[ContentBlock],
    total_height: f32,
    page_height: f32,
    tolerance: f32,
    min_section_height: f32,
) -> Vec<f32> {
    let config = PlannerConfig {
        page_height_px: page_height,
        tolerance_px: tolerance,
        min_section_height_px: min_section_height,
    };
    plan(blocks, total_height, &config).scroll_positions
}

pub fn plan(blocks: &[ContentBlock], total_height: f32, config: &PlannerConfig) -> SlicePlan {
    let page_height = config.page_height_px;
    let tolerance = config.tolerance_px.max(0.0);
    let mut positions = vec![0.0f32];
    let mut decisions = vec![SliceDecision::Start];

    if !(page_height > 0.0) || !page_height.is_finite() || !total_height.is_finite() {
        return SlicePlan {
            scroll_positions: positions,
            decisions,
            page_height,
            total_height,
        };
    }

    let points = cut_points(blocks, config.min_section_height_px);
    let mut current = 0.0f32;
    loop {
        let ideal = next_boundary(current, page_height);
        if ideal >= total_height {
            break;
        }
        // Points are sorted: the first one at or past `ideal` is the closest.
        let start = points.partition_point(|&p| p < ideal);
        let snapped = points
            .get(start)
            .copied()
            .filter(|&p| p <= ideal + tolerance);
        let (next, decision) = match snapped {
            Some(cut) => (cut, SliceDecision::Snapped { ideal, cut }),
            None => (ideal, SliceDecision::Forced { ideal }),
        };
        debug_assert!(next - current >= page_height);
        positions.push(next);
        decisions.push(decision);
        current = next;
    }

    SlicePlan {
        scroll_positions: positions,
        decisions,
        page_height,
        total_height,
    }
}

// `current + page_height` rounds to the nearest f32, which far down a document
// can land short of a full page. Step up until the gap is at least one page.
fn next_boundary(current: f32, page_height: f32) -> f32 {
    let mut ideal = current + page_height;
    while ideal.is_finite() && ideal - current < page_height {
        ideal = f32::from_bits(ideal.to_bits() + 1);
    }
    ideal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(top: f32, height: f32) -> ContentBlock {
        ContentBlock::new("section", top, height)
    }

    fn assert_no_overlap(positions: &[f32], page_height: f32) {
        assert_eq!(positions.first().copied(), Some(0.0));
        for pair in positions.windows(2) {
            assert!(
                pair[1] - pair[0] >= page_height,
                "offsets {} -> {} closer than {}",
                pair[0],
                pair[1],
                page_height
            );
        }
    }

    #[test]
    fn even_split_without_blocks() {
        let positions = plan_slices(&[], 3000.0, 1000.0, 100.0, 20.0);
        assert_eq!(positions, vec![0.0, 1000.0, 2000.0]);
    }

    #[test]
    fn snaps_to_gap_midpoint_near_page_break() {
        let blocks = vec![block(100.0, 880.0), block(1040.0, 900.0)];
        let positions = plan_slices(&blocks, 2500.0, 1000.0, 100.0, 20.0);
        assert_eq!(positions[1], 1010.0);
        assert_no_overlap(&positions, 1000.0);
    }

    #[test]
    fn cut_beyond_tolerance_falls_back_to_even_split() {
        let blocks = vec![block(0.0, 1200.0), block(1300.0, 500.0)];
        let plan = plan(
            &blocks,
            1900.0,
            &PlannerConfig {
                page_height_px: 1000.0,
                tolerance_px: 100.0,
                min_section_height_px: 20.0,
            },
        );
        assert_eq!(plan.scroll_positions, vec![0.0, 1000.0]);
        assert_eq!(plan.forced_count(), 1);
        assert_eq!(plan.decisions[1], SliceDecision::Forced { ideal: 1000.0 });
    }

    #[test]
    fn never_chooses_point_before_ideal() {
        // Midpoint 990 sits before the ideal boundary and must be ignored.
        let blocks = vec![block(0.0, 970.0), block(1010.0, 300.0), block(1400.0, 900.0)];
        let positions = plan_slices(&blocks, 2600.0, 1000.0, 200.0, 20.0);
        assert_eq!(positions[1], 1000.0);
        assert_no_overlap(&positions, 1000.0);

        // A wider window reaches the next gap (midpoint 1355) instead.
        let positions = plan_slices(&blocks, 2600.0, 1000.0, 400.0, 20.0);
        assert_eq!(positions[1], 1355.0);
        assert_no_overlap(&positions, 1000.0);
    }

    #[test]
    fn small_blocks_do_not_create_cut_points() {
        let blocks = vec![
            block(0.0, 990.0),
            block(1000.0, 8.0),
            block(1030.0, 600.0),
        ];
        let points = cut_points(&blocks, 24.0);
        assert_eq!(points, vec![0.0, 1010.0]);
    }

    #[test]
    fn cut_points_are_sorted_and_unique() {
        let blocks = vec![
            block(500.0, 100.0),
            block(0.0, 100.0),
            block(200.0, 100.0),
            block(200.0, 100.0),
        ];
        let points = cut_points(&blocks, 10.0);
        for pair in points.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(points[0], 0.0);
    }

    #[test]
    fn overlapping_blocks_never_yield_cut_inside_content() {
        // Second block overlaps the first; the naive midpoint (950) lies inside block one.
        let blocks = vec![block(0.0, 1000.0), block(900.0, 50.0), block(1100.0, 400.0)];
        let points = cut_points(&blocks, 10.0);
        for p in &points {
            for b in &blocks {
                assert!(!(*p > b.top_y && *p < b.bottom()), "cut {p} inside {b:?}");
            }
        }
    }

    #[test]
    fn snapped_offsets_avoid_block_interiors() {
        let blocks: Vec<ContentBlock> = (0..12)
            .map(|i| block(40.0 + i as f32 * 420.0, 360.0))
            .collect();
        let total = 4700.0;
        let plan = plan(
            &blocks,
            total,
            &PlannerConfig {
                page_height_px: 1000.0,
                tolerance_px: 450.0,
                min_section_height_px: 20.0,
            },
        );
        assert_eq!(plan.forced_count(), 0);
        assert_eq!(plan.scroll_positions, vec![0.0, 1270.0, 2530.0, 3790.0]);
        assert_no_overlap(&plan.scroll_positions, 1000.0);
        for offset in &plan.scroll_positions {
            for b in &blocks {
                assert!(!(*offset > b.top_y && *offset < b.bottom()));
            }
        }
    }

    #[test]
    fn planning_is_idempotent() {
        let blocks = vec![block(100.0, 880.0), block(1040.0, 900.0), block(2000.0, 700.0)];
        let config = PlannerConfig {
            page_height_px: 1000.0,
            tolerance_px: 150.0,
            min_section_height_px: 24.0,
        };
        assert_eq!(plan(&blocks, 3100.0, &config), plan(&blocks, 3100.0, &config));
    }

    #[test]
    fn short_document_is_a_single_slice() {
        assert_eq!(plan_slices(&[], 1000.0, 1000.0, 100.0, 0.0), vec![0.0]);
        assert_eq!(plan_slices(&[], 0.0, 1000.0, 100.0, 0.0), vec![0.0]);
    }

    #[test]
    fn degenerate_page_height_does_not_loop() {
        assert_eq!(plan_slices(&[], 5000.0, 0.0, 100.0, 0.0), vec![0.0]);
        assert_eq!(plan_slices(&[], 5000.0, f32::NAN, 100.0, 0.0), vec![0.0]);
    }

    #[test]
    fn no_overlap_across_many_layouts() {
        for seed in 1..40u32 {
            let mut blocks = Vec::new();
            let mut y = 0.0f32;
            for i in 0..30u32 {
                let h = 30.0 + ((seed * 37 + i * 91) % 400) as f32;
                let gap = ((seed * 13 + i * 7) % 60) as f32;
                blocks.push(block(y + gap, h));
                y += gap + h;
            }
            for tolerance in [0.0f32, 100.0, 200.0] {
                let positions = plan_slices(&blocks, y + 20.0, 1123.0, tolerance, 24.0);
                assert_no_overlap(&positions, 1123.0);
                assert!(positions.last().copied().unwrap_or(0.0) < y + 20.0);
            }
        }
    }

    #[test]
    fn tall_documents_keep_full_page_gaps() {
        // Past 2^22 px the f32 grid is coarser than 1122.9 rounds to.
        let page = 1122.9f32;
        let positions = plan_slices(&[], 6.0e6, page, 150.0, 24.0);
        assert!(positions.len() > 5000);
        assert_no_overlap(&positions, page);

        let far = 1.7e10f32;
        let ideal = next_boundary(far, 1123.0);
        assert!(ideal - far >= 1123.0);
        assert!(ideal > far);
        assert_eq!(next_boundary(1000.0, 1000.0), 2000.0);
    }

    #[test]
    fn slice_lookup_follows_offsets() {
        let blocks = vec![block(100.0, 880.0), block(1040.0, 900.0)];
        let plan = plan(
            &blocks,
            2500.0,
            &PlannerConfig {
                page_height_px: 1000.0,
                tolerance_px: 100.0,
                min_section_height_px: 20.0,
            },
        );
        assert_eq!(plan.scroll_positions, vec![0.0, 1010.0, 2010.0]);
        assert_eq!(plan.slice_for(0.0), Some(0));
        assert_eq!(plan.slice_for(999.0), Some(0));
        assert_eq!(plan.slice_for(1005.0), None);
        assert_eq!(plan.slice_for(1010.0), Some(1));
        assert_eq!(plan.slice_for(2400.0), Some(2));
        assert_eq!(plan.slice_for(3100.0), None);
        assert_eq!(plan.slice_for(-1.0), None);
    }
}
