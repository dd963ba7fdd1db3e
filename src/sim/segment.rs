//! Constant-SoC segmenter: finds windows where the baseline leaves the
//! battery idle, which are the windows available for arbitrage.

use std::ops::Range;

use serde::Serialize;
use tracing::{debug, info, instrument};

use super::band::BandPoint;

/// A contiguous interval range `[start, end)` with flat projected SoC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// 1-based position in the segment list.
    pub id: usize,
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn overlaps(&self, other: &Segment) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Thresholds controlling segment detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentRules {
    /// Largest SoC change between neighbours still counted as flat (kWh).
    pub soc_tolerance_kwh: f64,
    /// Shortest usable run (intervals).
    pub min_steps: usize,
    /// Longest segment; longer runs are split (intervals).
    pub max_steps: usize,
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self {
            soc_tolerance_kwh: 0.01,
            min_steps: 6,
            max_steps: 24,
        }
    }
}

/// Finds all constant-SoC segments in chronological order.
///
/// An interval is idle when its projected SoC differs from the SoC entering
/// it by less than the tolerance; the first interval is compared with
/// `start_soc_kwh`. Segments are maximal runs of idle intervals, so the
/// interval whose baseline action moves the SoC onto a plateau is never part
/// of it. Runs shorter than `min_steps` are dropped. Runs longer than
/// `max_steps` are cut into `ceil(len / max_steps)` chunks of near-equal
/// size, the first chunks taking one extra step when the length does not
/// divide evenly.
#[instrument(skip_all, fields(points = band.len()))]
pub fn find_segments(
    start_soc_kwh: f64,
    band: &[BandPoint],
    rules: &SegmentRules,
) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut run_start = 0;
    let mut prev_soc = start_soc_kwh;

    for i in 0..=band.len() {
        let idle = band.get(i).is_some_and(|p| {
            let moved = (p.projected_soc_kwh - prev_soc).abs();
            prev_soc = p.projected_soc_kwh;
            moved < rules.soc_tolerance_kwh
        });
        if idle {
            continue;
        }
        let run_len = i - run_start;
        if run_len >= rules.min_steps {
            for (start, end) in split_run(run_start, run_len, rules.max_steps) {
                segments.push(Segment {
                    id: segments.len() + 1,
                    start,
                    end,
                });
            }
        } else if run_len > 1 {
            debug!(start = run_start, len = run_len, "flat run too short; skipped");
        }
        run_start = i + 1;
    }

    info!(count = segments.len(), "constant-SoC segments found");
    segments
}

fn split_run(start: usize, len: usize, max_steps: usize) -> Vec<(usize, usize)> {
    let chunks = len.div_ceil(max_steps.max(1));
    let base = len / chunks;
    let extra = len % chunks;

    let mut out = Vec::with_capacity(chunks);
    let mut cursor = start;
    for k in 0..chunks {
        let size = base + usize::from(k < extra);
        out.push((cursor, cursor + size));
        cursor += size;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(socs: &[f64]) -> Vec<BandPoint> {
        socs.iter()
            .map(|&s| BandPoint {
                charge_potential_kw: 0.0,
                discharge_potential_kw: 0.0,
                projected_soc_kwh: s,
            })
            .collect()
    }

    #[test]
    fn flat_horizon_is_one_segment() {
        let segs = find_segments(300.0, &band(&[300.0; 8]), &SegmentRules::default());
        assert_eq!(
            segs,
            vec![Segment {
                id: 1,
                start: 0,
                end: 8
            }]
        );
    }

    #[test]
    fn short_runs_are_dropped() {
        let mut socs = vec![300.0; 5];
        socs.extend([400.0; 7]);
        let segs = find_segments(300.0, &band(&socs), &SegmentRules::default());
        assert_eq!(segs.len(), 1);
        // interval 5 lifts the SoC to 400 and is not idle itself
        assert_eq!(segs[0].range(), 6..12);
    }

    #[test]
    fn drift_below_tolerance_counts_as_flat() {
        let socs: Vec<f64> = (0..10).map(|i| 300.0 + 0.001 * f64::from(i)).collect();
        let segs = find_segments(300.0, &band(&socs), &SegmentRules::default());
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].len(), 10);
    }

    #[test]
    fn move_onto_plateau_is_left_out() {
        // the first interval charges 100 kWh, then the SoC holds
        let segs = find_segments(300.0, &band(&[400.0; 8]), &SegmentRules::default());
        assert_eq!(
            segs,
            vec![Segment {
                id: 1,
                start: 1,
                end: 8
            }]
        );
    }

    #[test]
    fn plateau_after_a_ramp_starts_past_the_last_move() {
        let mut socs = vec![350.0, 400.0, 450.0];
        socs.extend([450.0; 6]);
        let segs = find_segments(300.0, &band(&socs), &SegmentRules::default());
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].range(), 3..9);
    }

    #[test]
    fn long_runs_split_evenly() {
        let segs = find_segments(300.0, &band(&[300.0; 50]), &SegmentRules::default());
        let lens: Vec<usize> = segs.iter().map(Segment::len).collect();
        assert_eq!(lens, vec![17, 17, 16]);
        assert_eq!(segs[0].start, 0);
        assert_eq!(segs[2].end, 50);
        assert!(segs.windows(2).all(|w| w[0].end == w[1].start));
    }

    #[test]
    fn split_of_exact_multiple() {
        assert_eq!(split_run(10, 48, 24), vec![(10, 34), (34, 58)]);
    }

    #[test]
    fn ramping_soc_yields_nothing() {
        let socs: Vec<f64> = (0..30).map(|i| 100.0 + 10.0 * f64::from(i)).collect();
        assert!(find_segments(300.0, &band(&socs), &SegmentRules::default()).is_empty());
    }

    #[test]
    fn overlap_check() {
        let a = Segment { id: 1, start: 0, end: 6 };
        let b = Segment { id: 2, start: 6, end: 12 };
        let c = Segment { id: 3, start: 5, end: 8 };
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }
}
