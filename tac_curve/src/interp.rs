// Linear interpolation over sample sequences and clipping of curves to a
// closed time interval. Both operate on the sorted output of the parser;
// `value_at` also accepts raw (possibly unsorted) display points.

use crate::{Curve, Point, TacError};

/// Evaluate a sample sequence at an arbitrary time.
///
/// Times equal to a sample time return the stored activity directly, with no
/// arithmetic in between. Times outside the sampled range extrapolate
/// linearly along the slope of the two nearest boundary samples.
pub fn value_at(points: &[Point], t: f64) -> Result<f64, TacError> {
    let first = *points.first().ok_or(TacError::EmptyCurve)?;
    let last = *points.last().ok_or(TacError::EmptyCurve)?;
    if t == first.time {
        return Ok(first.activity);
    }
    if t == last.time {
        return Ok(last.activity);
    }
    if points.len() < 2 {
        // Single sample: no slope to extend, hold the value.
        return Ok(first.activity);
    }
    if t < first.time {
        return Ok(extend(points[0], points[1], t));
    }
    if t > last.time {
        return Ok(extend(points[points.len() - 2], last, t));
    }
    for pair in points.windows(2) {
        let (p0, p1) = (pair[0], pair[1]);
        if p0.time <= t && t <= p1.time {
            if t == p0.time {
                return Ok(p0.activity);
            }
            if t == p1.time {
                return Ok(p1.activity);
            }
            if p1.time == p0.time {
                return Ok(p0.activity);
            }
            let frac = (t - p0.time) / (p1.time - p0.time);
            return Ok(p0.activity + (p1.activity - p0.activity) * frac);
        }
    }
    // The sequence starts below t and ends above it, so some adjacent pair
    // crosses t even when the input was never sorted.
    unreachable!("in-range time not bracketed by any sample pair");
}

fn extend(p0: Point, p1: Point, t: f64) -> f64 {
    if p1.time == p0.time {
        return p0.activity;
    }
    let slope = (p1.activity - p0.activity) / (p1.time - p0.time);
    p0.activity + slope * (t - p0.time)
}

/// Restrict a curve to the closed interval [a, b].
///
/// The result always carries samples at exactly `a` and `b`: existing first
/// or last samples are reused when they land on a boundary, anything else is
/// synthesized through [`value_at`] (interpolating or extrapolating as
/// needed). Samples strictly inside the interval are kept as-is. The caller
/// guarantees `a < b`; the integrator rejects inverted windows upstream.
pub fn clip(curve: &Curve, a: f64, b: f64) -> Result<Curve, TacError> {
    debug_assert!(a < b, "clip interval must be non-empty");
    let points = curve.points();
    let first = *points.first().ok_or(TacError::EmptyCurve)?;
    let last = *points.last().ok_or(TacError::EmptyCurve)?;

    let mut clipped = Vec::with_capacity(points.len() + 2);
    if a == first.time {
        clipped.push(first);
    } else {
        clipped.push(Point::new(a, value_at(points, a)?));
    }
    clipped.extend(points.iter().copied().filter(|p| p.time > a && p.time < b));
    if b == last.time {
        clipped.push(last);
    } else {
        clipped.push(Point::new(b, value_at(points, b)?));
    }

    clipped.sort_by(|x, y| x.time.total_cmp(&y.time));
    clipped.dedup_by(|x, y| x.time == y.time);
    Curve::from_sorted(clipped)
}
