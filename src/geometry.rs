// Copyright (c) 2017 Ivo Wetzel

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! 2-D points, affine matrices and angle arithmetic shared by every module.

use std::f64::consts::PI;
use std::ops::{Add, Mul, Neg, Sub};

use nalgebra::Matrix3;

/// A 2-D affine transform in homogeneous coordinates.
pub type Matrix = Matrix3<f64>;

// Point ------------------------------------------------------------------

#[derive(Debug, Default, Copy, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn len(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, k: f64) -> Point {
        Point::new(self.x * k, self.y * k)
    }
}

impl Mul<Point> for f64 {
    type Output = Point;
    fn mul(self, p: Point) -> Point {
        Point::new(self * p.x, self * p.y)
    }
}

// Angle ranges / constraints ----------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AngleRange {
    pub start: f64,
    pub span: f64,
}

impl AngleRange {
    pub fn new(start: f64, span: f64) -> Self {
        Self { start, span }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RotConstraint {
    pub relative_to_parent: bool,
    pub start: f64,
    pub span: f64,
}

impl RotConstraint {
    pub fn range(&self) -> AngleRange {
        AngleRange::new(self.start, self.span)
    }
}

// Matrix construction ------------------------------------------------------

pub fn identity_matrix() -> Matrix {
    Matrix3::identity()
}

pub fn scale_matrix(x_scale: f64, y_scale: f64) -> Matrix {
    Matrix3::new(
        x_scale, 0.0, 0.0,
        0.0, y_scale, 0.0,
        0.0, 0.0, 1.0,
    )
}

pub fn uniform_scale_matrix(scale: f64) -> Matrix {
    scale_matrix(scale, scale)
}

pub fn rotation_matrix(theta: f64) -> Matrix {
    rotation_matrix_cos_sin(theta.cos(), theta.sin())
}

pub fn rotation_matrix_cos_sin(cos_theta: f64, sin_theta: f64) -> Matrix {
    Matrix3::new(
        cos_theta, -sin_theta, 0.0,
        sin_theta, cos_theta, 0.0,
        0.0, 0.0, 1.0,
    )
}

pub fn translation_matrix(x: f64, y: f64) -> Matrix {
    Matrix3::new(
        1.0, 0.0, x,
        0.0, 1.0, y,
        0.0, 0.0, 1.0,
    )
}

pub fn translation_matrix_pt(pt: Point) -> Matrix {
    translation_matrix(pt.x, pt.y)
}

pub fn rotate_about_point_matrix(pt: Point, theta: f64) -> Matrix {
    translation_matrix_pt(pt) * rotation_matrix(theta) * translation_matrix_pt(-pt)
}

pub fn transform(pt: Point, mat: &Matrix) -> Point {
    let v = mat * nalgebra::Vector3::new(pt.x, pt.y, 1.0);
    Point::new(v[0], v[1])
}

// Angle arithmetic ----------------------------------------------------------

pub fn distance(u: Point, v: Point) -> f64 {
    let dx = u.x - v.x;
    let dy = u.y - v.y;
    (dx * dx + dy * dy).sqrt()
}

/// Wraps `theta` into `(-pi, pi]`.
pub fn normalize_angle(theta: f64) -> f64 {
    theta.sin().atan2(theta.cos())
}

/// Signed shortest angular distance from `from` to `to`, in `(-pi, pi]`.
pub fn angular_distance(from: f64, to: f64) -> f64 {
    let diff = to - from;
    diff.sin().atan2(diff.cos())
}

pub fn angle_from_u_to_v(u: Point, v: Point) -> f64 {
    let diff = v - u;
    diff.y.atan2(diff.x)
}

pub fn point_on_line_at_distance(from: Point, to: Point, dist: f64) -> Point {
    let len = distance(from, to);
    if len == 0.0 {
        return from;
    }
    from + (to - from) * (dist / len)
}

/// True iff `theta` lies on the arc `[range.start, range.start + range.span]`
/// measured modulo `2*pi`, matching the wrap-around-at-pi handling of the
/// normalized-angle representation used throughout this crate.
pub fn angle_in_range(theta: f64, range: &AngleRange) -> bool {
    let end_angle = range.start + range.span;
    if end_angle <= PI {
        return theta >= range.start && theta <= end_angle;
    }
    if theta >= range.start && theta <= PI {
        return true;
    }
    let wrap_around = end_angle - 2.0 * PI;
    theta >= -PI && theta <= wrap_around
}

/// Intersects two angle ranges on the unit circle, returning 0, 1 or 2
/// disjoint ranges (two when the intersection itself straddles the
/// `+-pi` seam).
pub fn intersect_angle_ranges(a: &AngleRange, b: &AngleRange) -> Vec<AngleRange> {
    const TWO_PI: f64 = 2.0 * PI;
    let mut intersections = Vec::new();

    let (origin_angle, origin_sweep, greater_angle, greater_sweep) = if a.start < b.start {
        (a.start, a.span, b.start, b.span)
    } else {
        (b.start, b.span, a.start, a.span)
    };

    let greater_angle_rel = greater_angle - origin_angle;
    if greater_angle_rel < origin_sweep {
        intersections.push(AngleRange::new(
            greater_angle,
            greater_sweep.min(origin_sweep - greater_angle_rel),
        ));
    }

    let rouno = greater_angle_rel + greater_sweep;
    if rouno > TWO_PI {
        intersections.push(AngleRange::new(origin_angle, (rouno - TWO_PI).min(origin_sweep)));
    }

    intersections
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_wraps_into_principal_range() {
        assert_relative_eq!(normalize_angle(3.0 * PI), normalize_angle(PI), epsilon = 1e-9);
    }

    #[test]
    fn angular_distance_is_shortest_signed_path() {
        assert_relative_eq!(angular_distance(0.0, PI / 2.0), PI / 2.0, epsilon = 1e-9);
        assert_relative_eq!(angular_distance(PI / 2.0, 0.0), -PI / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn intersect_is_commutative() {
        let a = AngleRange::new(0.0, 1.0);
        let b = AngleRange::new(0.5, 1.0);
        let ab = intersect_angle_ranges(&a, &b);
        let ba = intersect_angle_ranges(&b, &a);
        assert_eq!(ab.len(), ba.len());
        for (x, y) in ab.iter().zip(ba.iter()) {
            assert_relative_eq!(x.start, y.start, epsilon = 1e-9);
            assert_relative_eq!(x.span, y.span, epsilon = 1e-9);
        }
    }

    #[test]
    fn disjoint_ranges_intersect_to_nothing() {
        let a = AngleRange::new(0.0, 0.2);
        let b = AngleRange::new(3.0, 0.2);
        assert!(intersect_angle_ranges(&a, &b).is_empty());
    }

    #[test]
    fn rotate_about_point_matrix_fixes_pivot() {
        let pivot = Point::new(2.0, 3.0);
        let m = rotate_about_point_matrix(pivot, PI / 2.0);
        let result = transform(pivot, &m);
        assert_relative_eq!(result.x, pivot.x, epsilon = 1e-9);
        assert_relative_eq!(result.y, pivot.y, epsilon = 1e-9);
    }

    #[test]
    fn point_on_line_at_distance_matches_euclidean_distance() {
        let from = Point::new(0.0, 0.0);
        let to = Point::new(10.0, 0.0);
        let p = point_on_line_at_distance(from, to, 4.0);
        assert_relative_eq!(distance(from, p), 4.0, epsilon = 1e-9);
    }
}
