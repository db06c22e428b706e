//! Core time-activity curve analysis library.
//!
//! Parses delimited (time, activity) text into normalized curves and compares
//! a measured ("Real") curve against a reconstructed ("Combined") curve by
//! integrating both over fixed analysis windows.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod interp;
mod report;

pub use interp::{clip, value_at};
pub use report::{
    auc_in_window, build_report, match_end_times, trapezoidal_auc, MatchedCurvePair, WindowResult,
};

#[derive(Error, Debug)]
pub enum TacError {
    #[error("insufficient data: parsed {count} numeric point(s), need at least 2")]
    InsufficientPoints { count: usize },
    #[error("curve must start at time 0, first sample is at {0}")]
    StartTime(f64),
    #[error("curve has no samples")]
    EmptyCurve,
    #[error("invalid AUC window: start {start} is not below end {end}")]
    InvalidWindow { start: f64, end: f64 },
    #[error("common end time {common_end} does not exceed the {cutoff} cutoff")]
    IncompatibleEndTime { common_end: f64, cutoff: f64 },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// One (time, activity) sample. Time is in minutes; activity is the measured
/// value at that time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub time: f64,
    pub activity: f64,
}

impl Point {
    pub fn new(time: f64, activity: f64) -> Self {
        Self { time, activity }
    }
}

/// An ordered sequence of samples with strictly increasing times.
///
/// Analysis-ready curves (from [`parse`] or [`Curve::from_samples`]) also
/// start at time 0 and hold at least two samples. Curves produced by
/// clipping start at the window start instead; the zero-start rule applies
/// only at the parsing boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    points: Vec<Point>,
}

impl Curve {
    /// Build an analysis-ready curve from caller-held samples: normalize
    /// (sort, dedup, collect warnings) and validate the parser invariants.
    pub fn from_samples(points: Vec<Point>) -> Result<ParsedCurve, TacError> {
        let (points, warnings) = normalize(&points);
        let curve = validate(points)?;
        Ok(ParsedCurve { curve, warnings })
    }

    pub(crate) fn from_sorted(points: Vec<Point>) -> Result<Self, TacError> {
        if points.is_empty() {
            return Err(TacError::EmptyCurve);
        }
        debug_assert!(
            points.windows(2).all(|w| w[0].time < w[1].time),
            "curve times must be strictly increasing"
        );
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Time of the first sample.
    pub fn start_time(&self) -> f64 {
        self.points.first().map_or(0.0, |p| p.time)
    }

    /// Time of the last sample.
    pub fn end_time(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.time)
    }

    /// Evaluate the curve at an arbitrary time, extrapolating past either
    /// end along the boundary slope.
    pub fn value_at(&self, t: f64) -> Result<f64, TacError> {
        interp::value_at(&self.points, t)
    }
}

/// Parser output: the validated curve plus any normalization warnings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedCurve {
    pub curve: Curve,
    pub warnings: Vec<String>,
}

/// Input shape selector. Never auto-detected; hosts choose explicitly.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CurveLayout {
    /// One curve per text block; Real and Combined arrive separately.
    Separate,
    /// Historical 4-numbers-per-line format: tokens 1-2 feed the Real
    /// curve, tokens 3-4 the Combined curve.
    Interleaved,
}

impl Default for CurveLayout {
    fn default() -> Self {
        CurveLayout::Separate
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Params {
    pub cutoff_a: f64,
    pub cutoff_b: f64,
    pub layout: CurveLayout,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            cutoff_a: 5.0,
            cutoff_b: 10.0,
            layout: CurveLayout::Separate,
        }
    }
}

/// Parse one curve from delimited text, normalizing and validating it.
pub fn parse(text: &str) -> Result<ParsedCurve, TacError> {
    Curve::from_samples(parse_raw(text))
}

/// Non-validating parse for display/editing hosts. Every line contributing
/// at least two numeric tokens yields a point, in input order; nothing is
/// sorted, deduplicated, or checked.
pub fn parse_raw(text: &str) -> Vec<Point> {
    let mut points = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let tokens = numeric_tokens(line);
        if tokens.len() >= 2 {
            points.push(Point::new(tokens[0], tokens[1]));
        }
    }
    points
}

/// Parse the historical interleaved two-curve layout from a single text
/// block. Lines with at least four numeric tokens feed both curves; shorter
/// lines feed only the Real curve. Each curve is validated independently.
pub fn parse_interleaved(text: &str) -> Result<(ParsedCurve, ParsedCurve), TacError> {
    let mut real = Vec::new();
    let mut combined = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let tokens = numeric_tokens(line);
        if tokens.len() >= 2 {
            real.push(Point::new(tokens[0], tokens[1]));
        }
        if tokens.len() >= 4 {
            combined.push(Point::new(tokens[2], tokens[3]));
        }
    }
    Ok((Curve::from_samples(real)?, Curve::from_samples(combined)?))
}

/// Parse a Real/Combined pair according to the configured layout.
pub fn parse_pair(
    primary: &str,
    secondary: Option<&str>,
    params: &Params,
) -> Result<(ParsedCurve, ParsedCurve), TacError> {
    match params.layout {
        CurveLayout::Separate => {
            let combined_text = secondary.ok_or_else(|| {
                TacError::InvalidParameter(
                    "separate layout needs a second text block for the Combined curve".to_string(),
                )
            })?;
            Ok((parse(primary)?, parse(combined_text)?))
        }
        CurveLayout::Interleaved => {
            if secondary.is_some() {
                return Err(TacError::InvalidParameter(
                    "interleaved layout takes a single text block".to_string(),
                ));
            }
            parse_interleaved(primary)
        }
    }
}

/// Sort, deduplicate, and repair a raw sample sequence. Recoverable
/// anomalies (duplicate times, out-of-order input) become warnings, never
/// errors; the returned sequence has strictly increasing times.
pub fn normalize(points: &[Point]) -> (Vec<Point>, Vec<String>) {
    let mut warnings = Vec::new();

    let mut counts: BTreeMap<OrderedFloat<f64>, usize> = BTreeMap::new();
    for point in points {
        *counts.entry(OrderedFloat(point.time)).or_insert(0) += 1;
    }
    let duplicates: Vec<String> = counts
        .iter()
        .filter(|(_, &count)| count > 1)
        .map(|(time, _)| time.0.to_string())
        .collect();
    if !duplicates.is_empty() {
        warnings.push(format!(
            "duplicate sample times {} collapsed, keeping the last value for each",
            duplicates.join(", ")
        ));
    }

    let ordered = points.windows(2).all(|w| w[0].time <= w[1].time);
    if !ordered {
        warnings.push("samples were not in time order and have been sorted".to_string());
    }

    // Stable sort keeps equal times in input order, so the map insert below
    // leaves the last original occurrence as the survivor.
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut by_time: BTreeMap<OrderedFloat<f64>, f64> = BTreeMap::new();
    for point in sorted {
        by_time.insert(OrderedFloat(point.time), point.activity);
    }

    let normalized = by_time
        .into_iter()
        .map(|(time, activity)| Point::new(time.0, activity))
        .collect();
    (normalized, warnings)
}

fn validate(points: Vec<Point>) -> Result<Curve, TacError> {
    if points.len() < 2 {
        return Err(TacError::InsufficientPoints {
            count: points.len(),
        });
    }
    let start = points[0].time;
    if start != 0.0 {
        return Err(TacError::StartTime(start));
    }
    Curve::from_sorted(points)
}

fn numeric_tokens(line: &str) -> Vec<f64> {
    let fields: Vec<&str> = line.split('\t').collect();
    let fields = if fields.len() < 2 {
        line.split_whitespace().collect()
    } else {
        fields
    };
    fields
        .into_iter()
        .filter_map(|field| field.trim().parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().map(|&(t, a)| Point::new(t, a)).collect()
    }

    #[test]
    fn parse_tab_delimited() {
        let parsed = parse("0\t1.5\n5\t2.0\n10\t0.5\n").unwrap();
        assert_eq!(parsed.curve.points().len(), 3);
        assert_eq!(parsed.curve.points()[1], Point::new(5.0, 2.0));
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn parse_falls_back_to_whitespace_split() {
        let parsed = parse("0 1.5\n5    2.0\n").unwrap();
        assert_eq!(
            parsed.curve.points(),
            points(&[(0.0, 1.5), (5.0, 2.0)]).as_slice()
        );
    }

    #[test]
    fn parse_discards_non_numeric_tokens() {
        let parsed = parse("time activity\nx 0 1\n5 banana 7.5\n").unwrap();
        assert_eq!(
            parsed.curve.points(),
            points(&[(0.0, 1.0), (5.0, 7.5)]).as_slice()
        );
    }

    #[test]
    fn parse_raw_skips_short_and_blank_lines() {
        let raw = parse_raw("0 1\n\n5\n7 3 9\n");
        assert_eq!(raw, points(&[(0.0, 1.0), (7.0, 3.0)]));
    }

    #[test]
    fn parse_rejects_single_point() {
        match parse("0 1\n") {
            Err(TacError::InsufficientPoints { count }) => assert_eq!(count, 1),
            other => panic!("expected InsufficientPoints, got {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_nonzero_start() {
        match parse("1 1\n5 2\n") {
            Err(TacError::StartTime(t)) => assert_eq!(t, 1.0),
            other => panic!("expected StartTime, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_times_keep_last_value() {
        let (normalized, warnings) = normalize(&points(&[(0.0, 1.0), (5.0, 2.0), (5.0, 3.0)]));
        assert_eq!(normalized, points(&[(0.0, 1.0), (5.0, 3.0)]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains('5'));
    }

    #[test]
    fn duplicate_resolution_follows_input_order_not_sort_order() {
        let (normalized, warnings) = normalize(&points(&[(5.0, 2.0), (0.0, 1.0), (5.0, 3.0)]));
        assert_eq!(normalized, points(&[(0.0, 1.0), (5.0, 3.0)]));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn out_of_order_input_is_sorted_with_warning() {
        let (normalized, warnings) = normalize(&points(&[(5.0, 2.0), (0.0, 1.0)]));
        assert_eq!(normalized, points(&[(0.0, 1.0), (5.0, 2.0)]));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn normalization_is_idempotent() {
        let (once, _) = normalize(&points(&[(5.0, 2.0), (0.0, 1.0), (5.0, 3.0)]));
        let (twice, warnings) = normalize(&once);
        assert_eq!(once, twice);
        assert!(warnings.is_empty());
    }

    #[test]
    fn from_samples_normalizes_before_validating() {
        let parsed = Curve::from_samples(points(&[(5.0, 2.0), (0.0, 1.0)])).unwrap();
        assert_eq!(parsed.curve.start_time(), 0.0);
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn interleaved_layout_splits_token_pairs() {
        let (real, combined) = parse_interleaved("0 1 0 2\n5 3 5 4\n").unwrap();
        assert_eq!(real.curve.points(), points(&[(0.0, 1.0), (5.0, 3.0)]).as_slice());
        assert_eq!(
            combined.curve.points(),
            points(&[(0.0, 2.0), (5.0, 4.0)]).as_slice()
        );
    }

    #[test]
    fn interleaved_short_lines_feed_only_real_curve() {
        let result = parse_interleaved("0 1 0 2\n5 3\n10 4 10 6\n");
        let (real, combined) = result.unwrap();
        assert_eq!(real.curve.len(), 3);
        assert_eq!(combined.curve.len(), 2);
    }

    #[test]
    fn parse_pair_dispatches_on_layout() {
        let params = Params::default();
        let (real, combined) = parse_pair("0 1\n5 2\n", Some("0 3\n5 4\n"), &params).unwrap();
        assert_eq!(real.curve.len(), 2);
        assert_eq!(combined.curve.len(), 2);

        assert!(matches!(
            parse_pair("0 1\n5 2\n", None, &params),
            Err(TacError::InvalidParameter(_))
        ));

        let interleaved = Params {
            layout: CurveLayout::Interleaved,
            ..Params::default()
        };
        assert!(matches!(
            parse_pair("0 1 0 2\n5 3 5 4\n", Some("extra"), &interleaved),
            Err(TacError::InvalidParameter(_))
        ));
        assert!(parse_pair("0 1 0 2\n5 3 5 4\n", None, &interleaved).is_ok());
    }
}
