//! Pure geometry helpers: grid and orbit snapping, viewport culling bounds,
//! hit tests and connection curve control points.

use crate::types::{GridSettings, Point, PositionOrbit, WebSettings};
use std::f64::consts::PI;

/// Rounds `value` to the nearest multiple of `grid_size`.
///
/// Halves round toward positive infinity. A non-positive grid size leaves the
/// value untouched.
pub fn snap_to_grid(value: f64, grid_size: f64) -> f64 {
    if grid_size <= 0.0 {
        return value;
    }
    (value / grid_size + 0.5).floor() * grid_size
}

/// Rotates `point` about the origin by `radians`.
fn rotate(point: Point, radians: f64) -> Point {
    let (sin, cos) = radians.sin_cos();
    Point::new(point.x * cos - point.y * sin, point.x * sin + point.y * cos)
}

/// Snaps a point to a square grid rotated by `rotation_degrees` about the origin.
///
/// The point is rotated into the grid frame, snapped per axis and rotated back.
/// A zero rotation is plain per-axis [`snap_to_grid`].
pub fn snap_to_rotated_grid(x: f64, y: f64, grid_size: f64, rotation_degrees: f64) -> Point {
    if rotation_degrees == 0.0 {
        return Point::new(snap_to_grid(x, grid_size), snap_to_grid(y, grid_size));
    }
    let radians = rotation_degrees.to_radians();
    let local = rotate(Point::new(x, y), -radians);
    let snapped = Point::new(snap_to_grid(local.x, grid_size), snap_to_grid(local.y, grid_size));
    rotate(snapped, radians)
}

/// World-space rectangle visible through the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRect {
    /// Left edge
    pub x1: f64,
    /// Top edge
    pub y1: f64,
    /// Right edge
    pub x2: f64,
    /// Bottom edge
    pub y2: f64,
}

/// Converts a stage offset, stage size and zoom into the visible world rectangle.
///
/// # Arguments
///
/// * `stage_pos` - Screen-space offset of the stage
/// * `stage_size` - Width and height of the stage in screen pixels
/// * `scale` - Current zoom factor
pub fn visible_rect(stage_pos: Point, stage_size: (f64, f64), scale: f64) -> VisibleRect {
    VisibleRect {
        x1: -stage_pos.x / scale,
        y1: -stage_pos.y / scale,
        x2: (-stage_pos.x + stage_size.0) / scale,
        y2: (-stage_pos.y + stage_size.1) / scale,
    }
}

/// Grid-aligned bounds covering a visible rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRange {
    /// First grid column at or left of the rectangle
    pub start_x: f64,
    /// Last grid column at or right of the rectangle
    pub end_x: f64,
    /// First grid row at or above the rectangle
    pub start_y: f64,
    /// Last grid row at or below the rectangle
    pub end_y: f64,
}

/// Expands a visible rectangle outwards to whole grid cells.
pub fn grid_range(rect: &VisibleRect, grid_size: f64) -> GridRange {
    GridRange {
        start_x: (rect.x1 / grid_size).floor() * grid_size,
        end_x: (rect.x2 / grid_size).ceil() * grid_size,
        start_y: (rect.y1 / grid_size).floor() * grid_size,
        end_y: (rect.y2 / grid_size).ceil() * grid_size,
    }
}

/// All snap points of an orbit: the center first, then the ring points.
pub fn orbit_points(orbit: &PositionOrbit) -> Vec<Point> {
    let count = orbit.point_count as usize;
    let mut points = Vec::with_capacity(count + 1);
    points.push(Point::new(orbit.x, orbit.y));

    if count == 0 {
        return points;
    }
    let rotation = orbit.rotation.unwrap_or(0.0).to_radians();
    let step = 2.0 * PI / count as f64;
    for i in 0..count {
        let angle = i as f64 * step + rotation;
        points.push(Point::new(
            orbit.x + orbit.radius * angle.cos(),
            orbit.y + orbit.radius * angle.sin(),
        ));
    }
    points
}

/// Finds the orbit point closest to `position` that lies strictly within `threshold`.
///
/// Points are scanned orbit by orbit; on an exact tie the first point seen wins.
pub fn find_closest_orbit_snap_point<'a>(
    position: Point,
    orbits: impl IntoIterator<Item = &'a PositionOrbit>,
    threshold: f64,
) -> Option<Point> {
    let mut closest = None;
    let mut min_distance = threshold;

    for orbit in orbits {
        for point in orbit_points(orbit) {
            let distance = point.distance_to(position);
            if distance < min_distance {
                min_distance = distance;
                closest = Some(point);
            }
        }
    }
    closest
}

/// Final position of a dragged node.
///
/// An orbit point within `threshold` wins; otherwise the rotated grid applies
/// when enabled; otherwise the raw position is kept.
pub fn snap_drag_position<'a>(
    position: Point,
    orbits: impl IntoIterator<Item = &'a PositionOrbit>,
    grid: &GridSettings,
    threshold: f64,
) -> Point {
    if let Some(point) = find_closest_orbit_snap_point(position, orbits, threshold) {
        return point;
    }
    if grid.enabled {
        return snap_to_rotated_grid(position.x, position.y, grid.size, grid.rotation);
    }
    position
}

/// True if `point` lies inside or on the circle.
pub fn is_point_in_circle(point: Point, center: Point, radius: f64) -> bool {
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    dx * dx + dy * dy <= radius * radius
}

/// True if `point` lies inside or on the axis-aligned rectangle.
pub fn is_point_in_rect(point: Point, x: f64, y: f64, width: f64, height: f64) -> bool {
    point.x >= x && point.x <= x + width && point.y >= y && point.y <= y + height
}

/// Like [`is_point_in_rect`] for a rectangle rotated about its own center.
pub fn is_point_in_rotated_rect(
    point: Point,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    rotation_degrees: f64,
) -> bool {
    if rotation_degrees == 0.0 {
        return is_point_in_rect(point, x, y, width, height);
    }
    let center = Point::new(x + width / 2.0, y + height / 2.0);
    let offset = Point::new(point.x - center.x, point.y - center.y);
    let local = rotate(offset, -rotation_degrees.to_radians());
    is_point_in_rect(
        Point::new(local.x + center.x, local.y + center.y),
        x,
        y,
        width,
        height,
    )
}

/// Control point of the quadratic Bézier drawn for a connection.
///
/// The midpoint of the segment is pushed `curvature` units along the segment's
/// left-hand normal. Coincident endpoints yield the midpoint.
pub fn connection_control_point(from: Point, to: Point, curvature: f64) -> Point {
    let mid = Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = dx.hypot(dy);
    if length == 0.0 || curvature == 0.0 {
        return mid;
    }
    Point::new(mid.x - dy / length * curvature, mid.y + dx / length * curvature)
}

/// Line work of the decorative web overlay, centered on the world origin.
#[derive(Debug, Clone, PartialEq)]
pub struct WebOverlay {
    /// Spokes from the inner circle to the outer circle
    pub spokes: Vec<(Point, Point)>,
    /// Radii of every circle to stroke, outer circle first
    pub circles: Vec<f64>,
}

/// Computes the web overlay geometry for the given settings.
pub fn web_overlay(settings: &WebSettings) -> WebOverlay {
    let rotation = settings.rotation.to_radians();
    let mut spokes = Vec::with_capacity(settings.spokes as usize);
    if settings.spokes > 0 {
        let step = 2.0 * PI / f64::from(settings.spokes);
        for i in 0..settings.spokes {
            let angle = step * f64::from(i) + rotation;
            let (sin, cos) = angle.sin_cos();
            spokes.push((
                Point::new(cos * settings.inner_radius, sin * settings.inner_radius),
                Point::new(cos * settings.size, sin * settings.size),
            ));
        }
    }

    let mut circles = vec![settings.size];
    let radius_step =
        (settings.size - settings.inner_radius) / f64::from(settings.concentric_circles + 1);
    for i in 1..=settings.concentric_circles {
        circles.push(settings.inner_radius + radius_step * f64::from(i));
    }
    if settings.inner_radius > 0.0 {
        circles.push(settings.inner_radius);
    }

    WebOverlay { spokes, circles }
}
