use crate::series::{TimePoint, Timestamped};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slack on the segment parameters so endpoint touches survive rounding
const PARAM_TOLERANCE: f64 = 1e-9;

/// Relative bound on |r x s| / (|r| |s|) below which segments count as parallel
const PARALLEL_TOLERANCE: f64 = 1e-12;

/// Which way the fast line went through the slow line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossDirection {
    BelowToAbove,
    AboveToBelow,
}

impl fmt::Display for CrossDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossDirection::BelowToAbove => f.write_str("below-to-above"),
            CrossDirection::AboveToBelow => f.write_str("above-to-below"),
        }
    }
}

/// Point where the fast and slow lines met
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossPoint {
    pub ts: i64,
    pub value: f64,
    pub direction: CrossDirection,
}

impl Timestamped for CrossPoint {
    fn timestamp(&self) -> i64 {
        self.ts
    }
}

/// Vector from `from` to `to` in the (time, value) plane
fn vector(from: TimePoint, to: TimePoint) -> (f64, f64) {
    ((to.ts - from.ts) as f64, to.value - from.value)
}

fn cross((x1, y1): (f64, f64), (x2, y2): (f64, f64)) -> f64 {
    x1 * y2 - x2 * y1
}

fn norm((x, y): (f64, f64)) -> f64 {
    x.hypot(y)
}

fn within_segment(param: f64) -> bool {
    (-PARAM_TOLERANCE..=1.0 + PARAM_TOLERANCE).contains(&param)
}

/// Intersect fast segment `a -> b` with slow segment `c -> d`
///
/// Parallel and collinear pairs never intersect unless the two segments are exactly
/// the same, in which case the crossing sits on `a`. Direction compares the segment
/// starts: fast starting below slow is a below-to-above crossing.
pub fn intersect(a: TimePoint, b: TimePoint, c: TimePoint, d: TimePoint) -> Option<CrossPoint> {
    let direction = if a.value < c.value {
        CrossDirection::BelowToAbove
    } else {
        CrossDirection::AboveToBelow
    };

    let r = vector(a, b);
    let s = vector(c, d);
    let denom = cross(r, s);

    if denom.abs() <= PARALLEL_TOLERANCE * norm(r) * norm(s) {
        if a == c && b == d {
            return Some(CrossPoint {
                ts: a.ts,
                value: a.value,
                direction,
            });
        }
        return None;
    }

    // a + t * r == c + u * s, both parameters inside [0, 1]
    let ac = vector(a, c);
    let t = cross(ac, s) / denom;
    let u = cross(ac, r) / denom;
    if !(within_segment(t) && within_segment(u)) {
        return None;
    }

    let ts = a.ts as f64 + t * r.0;
    let value = a.value + t * r.1;

    Some(CrossPoint {
        ts: ts.round() as i64,
        value,
        direction,
    })
}
