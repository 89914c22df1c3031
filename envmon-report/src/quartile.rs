//! Five-number summaries and Tukey fences over monitor value series.

use envmon_core::{Quartile, QuartileReport};
use ordered_float::NotNan;
use serde::Serialize;

use crate::batch::Omission;

/// Below this many values the quartiles collapse onto the median.
pub const MIN_SAMPLES: usize = 4;

/// Multiplier of the interquartile range for the outlier fences.
pub const FENCE_FACTOR: f64 = 1.5;

/// Linear interpolation between closest ranks at index `p * (n - 1)`.
///
/// `sorted` must be ascending. Returns `None` for an empty slice.
pub fn interpolate(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = p.clamp(0.0, 1.0) * last as f64;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

fn fences(q1: f64, q3: f64) -> (f64, f64) {
    let iqr = q3 - q1;
    (q1 - FENCE_FACTOR * iqr, q3 + FENCE_FACTOR * iqr)
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<NotNan<f64>> = values
        .iter()
        .filter(|v| v.is_finite())
        .filter_map(|v| NotNan::new(*v).ok())
        .collect();
    sorted.sort_unstable();
    sorted.into_iter().map(NotNan::into_inner).collect()
}

/// Summarises `values`, ignoring non-finite entries.
///
/// Returns `None` when no finite value remains. Outliers are listed in
/// ascending order; `min` and `max` are the extreme non-outlier values.
pub fn analyze(name: impl Into<String>, values: &[f64]) -> Option<QuartileReport> {
    let sorted = sorted_finite(values);
    let q2 = interpolate(&sorted, 0.5)?;

    if sorted.len() < MIN_SAMPLES {
        return Some(QuartileReport {
            name: name.into(),
            quartile: Quartile {
                min: q2,
                q1: q2,
                q2,
                q3: q2,
                max: q2,
            },
            outlier: Vec::new(),
            away: None,
        });
    }

    let q1 = interpolate(&sorted, 0.25)?;
    let q3 = interpolate(&sorted, 0.75)?;
    let (lower, upper) = fences(q1, q3);

    let (inliers, outlier): (Vec<f64>, Vec<f64>) = sorted
        .iter()
        .copied()
        .partition(|v| (lower..=upper).contains(v));

    let min = inliers.first().copied().unwrap_or(q1).min(q1);
    let max = inliers.last().copied().unwrap_or(q3).max(q3);

    Some(QuartileReport {
        name: name.into(),
        quartile: Quartile {
            min,
            q1,
            q2,
            q3,
            max,
        },
        outlier,
        away: None,
    })
}

/// Flags every report whose median falls outside the fences computed over
/// all the medians in the peer set.
///
/// A lone report keeps `away: None`; a peer set too small to fence marks
/// everyone as not away.
pub fn with_away(reports: Vec<QuartileReport>) -> Vec<QuartileReport> {
    if reports.len() < 2 {
        return reports;
    }

    let medians: Vec<f64> = reports.iter().map(|r| r.quartile.q2).collect();
    let sorted = sorted_finite(&medians);

    let bounds = match (interpolate(&sorted, 0.25), interpolate(&sorted, 0.75)) {
        (Some(q1), Some(q3)) if sorted.len() >= MIN_SAMPLES => Some(fences(q1, q3)),
        _ => None,
    };

    reports
        .into_iter()
        .map(|report| {
            let away = bounds
                .map(|(lower, upper)| !(lower..=upper).contains(&report.quartile.q2))
                .unwrap_or(false);
            QuartileReport {
                away: Some(away),
                ..report
            }
        })
        .collect()
}

/// Peer quartile reports together with the peers that produced none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuartileReportSet {
    pub reports: Vec<QuartileReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub omissions: Vec<Omission>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, values: &[f64]) -> QuartileReport {
        analyze(name, values).unwrap()
    }

    #[test]
    fn test_outlier_is_fenced_out() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 100.0];
        let result = report("m1", &values);

        assert_eq!(result.quartile.q1, 3.5);
        assert_eq!(result.quartile.q2, 6.0);
        assert_eq!(result.quartile.q3, 8.5);
        assert_eq!(result.quartile.min, 1.0);
        assert_eq!(result.quartile.max, 10.0);
        assert_eq!(result.outlier, vec![100.0]);
        assert_eq!(result.away, None);
    }

    #[test]
    fn test_order_of_input_does_not_matter() {
        let a = report("m", &[10.0, 1.0, 100.0, 5.0, 7.0]);
        let b = report("m", &[1.0, 5.0, 7.0, 10.0, 100.0]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_small_samples_collapse_to_median() {
        let result = report("m", &[2.0, 4.0, 9.0]);
        let q = result.quartile;
        assert_eq!((q.min, q.q1, q.q2, q.q3, q.max), (4.0, 4.0, 4.0, 4.0, 4.0));
        assert!(result.outlier.is_empty());
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        assert!(analyze("m", &[]).is_none());
        assert!(analyze("m", &[f64::NAN, f64::INFINITY]).is_none());

        let result = report("m", &[f64::NAN, 3.0]);
        assert_eq!(result.quartile.q2, 3.0);
    }

    #[test]
    fn test_five_numbers_are_ordered() {
        let result = report("m", &[-50.0, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 40.0]);
        let q = result.quartile;
        assert!(q.min <= q.q1 && q.q1 <= q.q2 && q.q2 <= q.q3 && q.q3 <= q.max);
        assert_eq!(result.outlier, vec![-50.0, 40.0]);
    }

    #[test]
    fn test_away_flags_peer_outside_fences() {
        let peers = vec![
            report("a", &[10.0]),
            report("b", &[11.0]),
            report("c", &[12.0]),
            report("d", &[11.5]),
            report("e", &[80.0]),
        ];

        let flagged = with_away(peers);
        let away: Vec<Option<bool>> = flagged.iter().map(|r| r.away).collect();
        assert_eq!(
            away,
            vec![Some(false), Some(false), Some(false), Some(false), Some(true)]
        );
    }

    #[test]
    fn test_away_with_few_peers() {
        assert_eq!(with_away(vec![report("a", &[1.0])])[0].away, None);

        let pair = with_away(vec![report("a", &[1.0]), report("b", &[100.0])]);
        assert!(pair.iter().all(|r| r.away == Some(false)));
    }

    #[test]
    fn test_set_lists_omissions_only_when_present() {
        let set = QuartileReportSet {
            reports: vec![report("a", &[1.0])],
            omissions: Vec::new(),
        };
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.get("omissions").is_none());

        let set = QuartileReportSet {
            omissions: vec![Omission::new("ghost".into(), "missing metadata")],
            ..set
        };
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["omissions"][0]["monitorId"], "ghost");
    }
}
