// Trapezoidal integration, end-time matching, and the four-window AUC bias
// report that ties the pipeline together.

use serde::{Deserialize, Serialize};

use crate::interp::{clip, value_at};
use crate::{Curve, Params, Point, TacError};

/// AUC of a sample sequence by the trapezoidal rule. Sequences shorter than
/// two samples enclose no area. Negative activities integrate as-is.
pub fn trapezoidal_auc(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .windows(2)
        .map(|w| 0.5 * (w[0].activity + w[1].activity) * (w[1].time - w[0].time))
        .sum()
}

/// AUC of a curve restricted to the window [start, end].
pub fn auc_in_window(curve: &Curve, start: f64, end: f64) -> Result<f64, TacError> {
    if start >= end {
        return Err(TacError::InvalidWindow { start, end });
    }
    Ok(trapezoidal_auc(clip(curve, start, end)?.points()))
}

/// Two curves adjusted to share a final sample time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchedCurvePair {
    pub real: Curve,
    pub combined: Curve,
    pub common_end_time: f64,
}

/// Reconcile two curves whose last sample times differ.
///
/// The common end time is the earlier of the two last sample times. The
/// longer curve is truncated there and capped with an interpolated sample at
/// exactly the common end time; the other curve passes through unchanged.
pub fn match_end_times(real: &Curve, combined: &Curve) -> Result<MatchedCurvePair, TacError> {
    let common_end_time = real.end_time().min(combined.end_time());
    Ok(MatchedCurvePair {
        real: cap_at(real, common_end_time)?,
        combined: cap_at(combined, common_end_time)?,
        common_end_time,
    })
}

fn cap_at(curve: &Curve, end: f64) -> Result<Curve, TacError> {
    if curve.end_time() == end {
        return Ok(curve.clone());
    }
    // end is the min of both curves' spans, so truncation is the only live
    // branch; the append below still extends correctly if that ever changes.
    debug_assert!(
        curve.end_time() > end,
        "common end time cannot exceed a curve's span"
    );
    let points = curve.points();
    let mut capped: Vec<Point> = points.iter().copied().filter(|p| p.time <= end).collect();
    if capped.last().map_or(true, |p| p.time != end) {
        capped.push(Point::new(end, value_at(points, end)?));
    }
    capped.sort_by(|a, b| a.time.total_cmp(&b.time));
    Curve::from_sorted(capped)
}

/// One row of the four-window report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub label: String,
    pub combined_auc: f64,
    pub real_auc: f64,
    /// Percentage deviation of the Combined AUC from the Real AUC; `None`
    /// when the Real AUC is zero (hosts render it as "-").
    pub bias_percent: Option<f64>,
}

/// Compute the four fixed analysis windows in report order: the full matched
/// span, 0..cutoff_a, 0..cutoff_b, and cutoff_b..end.
///
/// Fails with [`TacError::IncompatibleEndTime`] when the matched span does
/// not reach past `cutoff_b`, since the final window would be empty. Any
/// error discards the whole report; there are no partial results.
pub fn build_report(
    real: &Curve,
    combined: &Curve,
    params: &Params,
) -> Result<Vec<WindowResult>, TacError> {
    let matched = match_end_times(real, combined)?;
    let end = matched.common_end_time;
    if end <= params.cutoff_b {
        return Err(TacError::IncompatibleEndTime {
            common_end: end,
            cutoff: params.cutoff_b,
        });
    }

    let windows = [
        ("Combined".to_string(), 0.0, end),
        (
            format!("0-{}", label_value(params.cutoff_a)),
            0.0,
            params.cutoff_a,
        ),
        (
            format!("0-{}", label_value(params.cutoff_b)),
            0.0,
            params.cutoff_b,
        ),
        (
            format!("{}-end", label_value(params.cutoff_b)),
            params.cutoff_b,
            end,
        ),
    ];

    let mut rows = Vec::with_capacity(windows.len());
    for (label, start, stop) in windows {
        let combined_auc = auc_in_window(&matched.combined, start, stop)?;
        let real_auc = auc_in_window(&matched.real, start, stop)?;
        let bias_percent = if real_auc != 0.0 {
            Some((combined_auc - real_auc) / real_auc * 100.0)
        } else {
            None
        };
        rows.push(WindowResult {
            label,
            combined_auc,
            real_auc,
            bias_percent,
        });
    }
    Ok(rows)
}

fn label_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        v.to_string()
    }
}
