//! The static registry of physical actuators and the geometric queries the
//! phantom synthesizer needs: distances, nearest neighbours, and whether a
//! point lies on the segment between (or inside the triangle of) actuators.

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::HashSet, fmt::Display};

use crate::error::{ConfigError, EmptyLayoutError};

/// Actuator addresses, as wired on the device.
pub type ActuatorId = usize;

/// A position in the layout's coordinate system (millimetres, in practice).
#[derive(Debug, PartialEq, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Make a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Self) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Linear interpolation towards `other`, `t = 0` being `self`.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            x: self.x + t * (other.x - self.x),
            y: self.y + t * (other.y - self.y),
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Euclidean distance between two points.
pub fn distance(p1: Point, p2: Point) -> f64 {
    p1.distance(&p2)
}

/// A physical actuator. Identity is the id.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Actuator {
    /// Device address
    pub id: ActuatorId,
    /// Where it sits on the skin
    pub position: Point,
}

impl Actuator {
    /// Make a new actuator at `(x, y)`.
    pub fn new(id: ActuatorId, x: f64, y: f64) -> Self {
        Self {
            id,
            position: Point::new(x, y),
        }
    }
}

/// An immutable set of actuators, kept sorted by id.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorLayout {
    actuators: Vec<Actuator>,
}

impl ActuatorLayout {
    /// Build a layout, rejecting duplicate ids and non-finite positions.
    /// An empty layout is allowed here; queries on it fail.
    pub fn new(mut actuators: Vec<Actuator>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for actuator in &actuators {
            if !seen.insert(actuator.id) {
                return Err(ConfigError::DuplicateActuatorId(actuator.id));
            }
            if !actuator.position.is_finite() {
                return Err(ConfigError::NonFinitePosition(actuator.id));
            }
        }
        actuators.sort_by_key(|a| a.id);
        Ok(Self { actuators })
    }

    /// All actuators, ascending by id.
    pub fn actuators(&self) -> &[Actuator] {
        &self.actuators
    }

    /// Number of actuators.
    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    /// Whether there are no actuators at all.
    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    /// Look an actuator up by id.
    pub fn get(&self, id: ActuatorId) -> Option<&Actuator> {
        self.actuators
            .binary_search_by_key(&id, |a| a.id)
            .ok()
            .map(|i| &self.actuators[i])
    }

    /// The `k` actuators closest to `position`, ascending by distance, ties
    /// going to the lower id. Returns every actuator if `k` exceeds the
    /// layout size.
    pub fn k_nearest(
        &self,
        position: Point,
        k: usize,
    ) -> Result<Vec<(Actuator, f64)>, EmptyLayoutError> {
        if self.actuators.is_empty() {
            return Err(EmptyLayoutError);
        }
        let mut by_distance: Vec<(Actuator, f64)> = self
            .actuators
            .iter()
            .map(|a| (*a, a.position.distance(&position)))
            .collect();
        // The layout is already id-sorted and the sort is stable, so equal
        // distances keep ascending id order.
        by_distance.sort_by(|(_, l), (_, r)| l.partial_cmp(r).unwrap_or(Ordering::Equal));
        by_distance.truncate(k);
        Ok(by_distance)
    }

    /// Every unordered pair of actuators, lower id first.
    pub(crate) fn pairs(&self) -> impl Iterator<Item = (Actuator, Actuator)> + '_ {
        self.actuators.iter().enumerate().flat_map(move |(i, a)| {
            self.actuators[i + 1..].iter().map(move |b| (*a, *b))
        })
    }

    /// Every unordered triple of actuators, ascending by id.
    pub(crate) fn triples(&self) -> impl Iterator<Item = [Actuator; 3]> + '_ {
        let n = self.actuators.len();
        (0..n).flat_map(move |i| {
            (i + 1..n).flat_map(move |j| {
                (j + 1..n).map(move |k| [self.actuators[i], self.actuators[j], self.actuators[k]])
            })
        })
    }
}

/// If `position` is within `tolerance` of the segment from `a` to `b`,
/// returns the interpolation weight `t` in `[0, 1]` of its projection
/// (`0` at `a`, `1` at `b`).
pub fn is_on_segment(position: Point, a: &Actuator, b: &Actuator, tolerance: f64) -> Option<f64> {
    let (pa, pb) = (a.position, b.position);
    let (dx, dy) = (pb.x - pa.x, pb.y - pa.y);
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        return (position.distance(&pa) <= tolerance).then_some(0.0);
    }

    let t = ((position.x - pa.x) * dx + (position.y - pa.y) * dy) / len_sq;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }

    let perpendicular = position.distance(&pa.lerp(&pb, t));
    (perpendicular <= tolerance).then_some(t)
}

/// Twice the signed area of the triangle `abc`.
fn cross(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Area of the triangle spanned by three actuators.
pub fn triangle_area(tri: &[Actuator; 3]) -> f64 {
    cross(tri[0].position, tri[1].position, tri[2].position).abs() / 2.0
}

/// Whether `p` lies inside or on the edge of the triangle `tri`.
pub fn point_in_triangle(p: Point, tri: &[Actuator; 3]) -> bool {
    let [a, b, c] = tri.map(|t| t.position);
    let d1 = cross(a, b, p);
    let d2 = cross(b, c, p);
    let d3 = cross(c, a, p);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;

    !(has_neg && has_pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_layout() -> ActuatorLayout {
        ActuatorLayout::new(vec![
            Actuator::new(0, 0.0, 0.0),
            Actuator::new(1, 60.0, 0.0),
            Actuator::new(2, 120.0, 0.0),
            Actuator::new(3, 180.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)), 5.0);
        assert_eq!(distance(Point::new(7.0, 7.0), Point::new(7.0, 7.0)), 0.0);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let res = ActuatorLayout::new(vec![Actuator::new(4, 0.0, 0.0), Actuator::new(4, 1.0, 0.0)]);
        assert!(matches!(res, Err(ConfigError::DuplicateActuatorId(4))));
    }

    #[test]
    fn nan_positions_are_rejected() {
        let res = ActuatorLayout::new(vec![Actuator::new(2, f64::NAN, 0.0)]);
        assert!(matches!(res, Err(ConfigError::NonFinitePosition(2))));
    }

    #[test]
    fn empty_layout_queries_fail() {
        let layout = ActuatorLayout::new(vec![]).unwrap();
        assert_eq!(layout.k_nearest(Point::new(0.0, 0.0), 3), Err(EmptyLayoutError));
    }

    #[test]
    fn nearest_is_sorted_and_truncated() {
        let layout = line_layout();
        let nearest = layout.k_nearest(Point::new(100.0, 0.0), 2).unwrap();
        let ids: Vec<_> = nearest.iter().map(|(a, _)| a.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!((nearest[0].1 - 20.0).abs() < 1e-9);
    }

    #[test]
    fn nearest_ties_break_on_id() {
        // Listed out of order on purpose
        let layout = ActuatorLayout::new(vec![
            Actuator::new(9, 10.0, 0.0),
            Actuator::new(3, -10.0, 0.0),
            Actuator::new(5, 0.0, 10.0),
        ])
        .unwrap();
        let ids: Vec<_> = layout
            .k_nearest(Point::new(0.0, 0.0), 3)
            .unwrap()
            .iter()
            .map(|(a, _)| a.id)
            .collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }

    #[test]
    fn oversized_k_returns_everything() {
        let layout = line_layout();
        assert_eq!(layout.k_nearest(Point::new(0.0, 0.0), 10).unwrap().len(), 4);
    }

    #[test]
    fn segment_membership() {
        let a = Actuator::new(0, 0.0, 0.0);
        let b = Actuator::new(1, 60.0, 0.0);

        let t = is_on_segment(Point::new(15.0, 0.5), &a, &b, 1.0).unwrap();
        assert!((t - 0.25).abs() < 1e-9);

        assert_eq!(is_on_segment(Point::new(15.0, 3.0), &a, &b, 1.0), None);
        assert_eq!(is_on_segment(Point::new(70.0, 0.0), &a, &b, 1.0), None);
        assert_eq!(is_on_segment(Point::new(60.0, 0.0), &a, &b, 1.0), Some(1.0));
    }

    #[test]
    fn degenerate_segment() {
        let a = Actuator::new(0, 5.0, 5.0);
        let b = Actuator::new(1, 5.0, 5.0);
        assert_eq!(is_on_segment(Point::new(5.5, 5.0), &a, &b, 1.0), Some(0.0));
        assert_eq!(is_on_segment(Point::new(9.0, 5.0), &a, &b, 1.0), None);
    }

    #[test]
    fn triangle_containment() {
        let tri = [
            Actuator::new(0, 0.0, 0.0),
            Actuator::new(1, 60.0, 0.0),
            Actuator::new(2, 0.0, 60.0),
        ];
        assert!(point_in_triangle(Point::new(10.0, 10.0), &tri));
        assert!(point_in_triangle(Point::new(30.0, 0.0), &tri));
        assert!(!point_in_triangle(Point::new(50.0, 50.0), &tri));
        assert!((triangle_area(&tri) - 1800.0).abs() < 1e-9);
    }

    #[test]
    fn pairs_and_triples_are_exhaustive() {
        let layout = line_layout();
        assert_eq!(layout.pairs().count(), 6);
        assert_eq!(layout.triples().count(), 4);
        assert!(layout.pairs().all(|(a, b)| a.id < b.id));
    }
}
