// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection routing strategies.
//!
//! A strategy is a pure function from the two endpoints plus some metadata to
//! a [`PathDescription`]. Strategies are looked up by name in a
//! [`PathRegistry`]; the engine never knows the formulas.

use crate::geometry::{Point, Rect};
use indexmap::IndexMap;
use std::fmt::Write as _;

/// Orthogonal routing: distance kept before turning back past the source
const CROSSING_BUFFER: f64 = 40.0;
/// Orthogonal routing: assumed target height when the target is unknown
const FALLBACK_TARGET_HEIGHT: f64 = 50.0;
/// Step routing: length of the first leg
const STEP_OFFSET: f64 = 40.0;

/// One drawing instruction, absolute coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    /// Start a new sub-path
    MoveTo(Point),
    /// Straight line
    LineTo(Point),
    /// Cubic bezier with two control points
    CubicTo(Point, Point, Point),
}

/// A computed route
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathDescription {
    /// Segments in drawing order
    pub segments: Vec<PathSegment>,
}

impl PathDescription {
    /// Start a path at `p`
    pub fn starting_at(p: Point) -> Self {
        Self {
            segments: vec![PathSegment::MoveTo(p)],
        }
    }

    /// Append a line
    pub fn line_to(mut self, p: Point) -> Self {
        self.segments.push(PathSegment::LineTo(p));
        self
    }

    /// Append a cubic curve
    pub fn cubic_to(mut self, c1: Point, c2: Point, end: Point) -> Self {
        self.segments.push(PathSegment::CubicTo(c1, c2, end));
        self
    }

    /// Last point of the path
    pub fn end(&self) -> Option<Point> {
        self.segments.last().map(|s| match *s {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) | PathSegment::CubicTo(_, _, p) => p,
        })
    }

    /// SVG `d` attribute
    pub fn to_svg(&self) -> String {
        let mut d = String::new();
        for segment in &self.segments {
            if !d.is_empty() {
                d.push(' ');
            }
            // Writing into a String cannot fail
            let _ = match segment {
                PathSegment::MoveTo(p) => write!(d, "M {} {}", p.x, p.y),
                PathSegment::LineTo(p) => write!(d, "L {} {}", p.x, p.y),
                PathSegment::CubicTo(c1, c2, p) => {
                    write!(d, "C {} {} {} {} {} {}", c1.x, c1.y, c2.x, c2.y, p.x, p.y)
                }
            };
        }
        d
    }

    /// Approximate the path with a polyline, `curve_segments` samples per curve
    pub fn flatten(&self, curve_segments: usize) -> Vec<Point> {
        let mut points = Vec::new();
        let mut cursor = Point::ZERO;
        for segment in &self.segments {
            match *segment {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => {
                    points.push(p);
                    cursor = p;
                }
                PathSegment::CubicTo(c1, c2, p) => {
                    points.extend(bezier_points(cursor, c1, c2, p, curve_segments.max(1)).into_iter().skip(1));
                    cursor = p;
                }
            }
        }
        points
    }
}

/// Which side of a node an endpoint leaves from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Leaves to the right
    #[default]
    Right,
    /// Leaves to the left
    Left,
    /// Leaves downward
    Down,
    /// Leaves upward
    Up,
}

/// Extra inputs to a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct PathMeta {
    /// Bounds of the source node
    pub source_bounds: Option<Rect>,
    /// Bounds of the target node, absent for the temp connection
    pub target_bounds: Option<Rect>,
    /// Direction the path leaves the source
    pub source_dir: Direction,
    /// Direction the path enters the target
    pub target_dir: Direction,
    /// Bezier control factor
    pub curvature: f64,
    /// Orthogonal clearance
    pub clearance: f64,
    /// Orthogonal vertical routing
    pub vertical: bool,
}

impl Default for PathMeta {
    fn default() -> Self {
        Self {
            source_bounds: None,
            target_bounds: None,
            source_dir: Direction::Right,
            target_dir: Direction::Left,
            curvature: 0.7,
            clearance: 60.0,
            vertical: false,
        }
    }
}

/// Signature of a routing strategy
pub type PathStrategy = fn(Point, Point, &PathMeta) -> PathDescription;

/// Straight segment between the endpoints
pub fn straight(p1: Point, p2: Point, _meta: &PathMeta) -> PathDescription {
    PathDescription::starting_at(p1).line_to(p2)
}

/// Horizontal-tangent cubic curve
pub fn bezier(p1: Point, p2: Point, meta: &PathMeta) -> PathDescription {
    let reach = (p2.x - p1.x).abs() * meta.curvature;
    PathDescription::starting_at(p1).cubic_to(
        Point::new(p1.x + reach, p1.y),
        Point::new(p2.x - reach, p2.y),
        p2,
    )
}

/// Axis-aligned route that clears the source before turning
pub fn orthogonal(p1: Point, p2: Point, meta: &PathMeta) -> PathDescription {
    let target_height = meta
        .target_bounds
        .map(|b| b.h)
        .filter(|h| *h > 0.0)
        .unwrap_or(FALLBACK_TARGET_HEIGHT);
    let gap = meta.clearance;
    let pxg = p1.x + gap;
    let pyg = p1.y + gap;

    let below = if meta.vertical {
        p2.y > pyg + CROSSING_BUFFER
    } else {
        p2.y + 1.0 > p1.y
    };
    let right = if meta.vertical {
        p2.x + 1.0 > p1.x
    } else {
        p2.x > pxg + CROSSING_BUFFER
    };
    let sign = if below { 1.0 } else { -1.0 };

    let hy = (p2.y - p1.y).abs();
    let lx = (p1.x - p2.x).abs();

    let mut path = PathDescription::starting_at(p1).line_to(Point::new(pxg, p1.y));
    if right {
        let y = p1.y + sign * hy;
        path = path
            .line_to(Point::new(pxg, y))
            .line_to(Point::new(pxg + lx - gap, y));
    } else {
        // Loop back around the target node
        let hy1 = (hy - target_height) * 0.9;
        let hy2 = hy - hy1;
        let lx1 = (pxg + CROSSING_BUFFER - p2.x).abs();
        let y1 = p1.y + sign * hy1;
        let x1 = pxg - lx1;
        path = path
            .line_to(Point::new(pxg, y1))
            .line_to(Point::new(x1, y1))
            .line_to(Point::new(x1, y1 + sign * hy2))
            .line_to(p2);
    }
    path
}

/// Two right-angle turns at a fixed offset from the source
pub fn step(p1: Point, p2: Point, meta: &PathMeta) -> PathDescription {
    let (a, b) = match meta.source_dir {
        Direction::Right => (
            Point::new(p1.x + STEP_OFFSET, p1.y),
            Point::new(p1.x + STEP_OFFSET, p2.y),
        ),
        Direction::Left => (
            Point::new(p1.x - STEP_OFFSET, p1.y),
            Point::new(p1.x - STEP_OFFSET, p2.y),
        ),
        Direction::Down => (
            Point::new(p1.x, p1.y + STEP_OFFSET),
            Point::new(p2.x, p1.y + STEP_OFFSET),
        ),
        Direction::Up => (
            Point::new(p1.x, p1.y - STEP_OFFSET),
            Point::new(p2.x, p1.y - STEP_OFFSET),
        ),
    };
    PathDescription::starting_at(p1).line_to(a).line_to(b).line_to(p2)
}

/// Name → strategy table
#[derive(Debug, Clone)]
pub struct PathRegistry {
    strategies: IndexMap<String, PathStrategy>,
}

impl PathRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            strategies: IndexMap::new(),
        }
    }

    /// Registry with the built-in strategies
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("straight", straight);
        registry.register("line", straight);
        registry.register("bezier", bezier);
        registry.register("orthogonal", orthogonal);
        registry.register("step", step);
        registry
    }

    /// Register (or replace) a strategy
    pub fn register(&mut self, name: impl Into<String>, strategy: PathStrategy) {
        self.strategies.insert(name.into(), strategy);
    }

    /// Look up a strategy
    pub fn get(&self, name: &str) -> Option<PathStrategy> {
        self.strategies.get(name).copied()
    }

    /// Whether a strategy exists
    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    /// Compute a route by name
    pub fn route(&self, name: &str, p1: Point, p2: Point, meta: &PathMeta) -> Option<PathDescription> {
        self.get(name).map(|strategy| strategy(p1, p2, meta))
    }
}

impl Default for PathRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Generate points along a cubic bezier curve
fn bezier_points(p0: Point, p1: Point, p2: Point, p3: Point, segments: usize) -> Vec<Point> {
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f64 / segments as f64;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x;
        let y = mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y;

        points.push(Point::new(x, y));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_svg() {
        let path = straight(Point::new(1.0, 2.0), Point::new(3.0, 4.0), &PathMeta::default());
        assert_eq!(path.to_svg(), "M 1 2 L 3 4");
    }

    #[test]
    fn test_bezier_control_points() {
        let path = bezier(Point::new(0.0, 0.0), Point::new(100.0, 50.0), &PathMeta::default());
        assert_eq!(path.to_svg(), "M 0 0 C 70 0 30 50 100 50");
        let flat = path.flatten(8);
        assert_eq!(flat.len(), 9);
        assert_eq!(flat.first(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(flat.last(), Some(&Point::new(100.0, 50.0)));
    }

    #[test]
    fn test_orthogonal_target_right_and_below() {
        let path = orthogonal(Point::new(0.0, 0.0), Point::new(300.0, 100.0), &PathMeta::default());
        assert_eq!(
            path.flatten(1),
            vec![
                Point::new(0.0, 0.0),
                Point::new(60.0, 0.0),
                Point::new(60.0, 100.0),
                Point::new(300.0, 100.0),
            ]
        );
    }

    #[test]
    fn test_orthogonal_target_behind_loops_back() {
        let meta = PathMeta {
            target_bounds: Some(Rect { x: -200.0, y: 150.0, w: 100.0, h: 50.0 }),
            ..PathMeta::default()
        };
        let path = orthogonal(Point::new(0.0, 0.0), Point::new(-200.0, 200.0), &meta);
        assert_eq!(path.end(), Some(Point::new(-200.0, 200.0)));
        assert_eq!(path.segments.len(), 6);
    }

    #[test]
    fn test_step_directions() {
        let meta = PathMeta {
            source_dir: Direction::Down,
            ..PathMeta::default()
        };
        let path = step(Point::new(0.0, 0.0), Point::new(50.0, 100.0), &meta);
        assert_eq!(path.to_svg(), "M 0 0 L 0 40 L 50 40 L 50 100");
    }

    #[test]
    fn test_registry_defaults() {
        let registry = PathRegistry::with_defaults();
        for name in ["straight", "line", "bezier", "orthogonal", "step"] {
            assert!(registry.contains(name), "{name} missing");
        }
        assert!(registry
            .route("zigzag", Point::ZERO, Point::ZERO, &PathMeta::default())
            .is_none());
    }
}
