use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Placement record carried by reference and text elements: reflect about the
/// X axis, rotate counter-clockwise (degrees), then magnify.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Strans {
    pub reflect: bool,
    pub angle: f64,
    pub mag: f64,
}

impl Default for Strans {
    fn default() -> Self {
        Self {
            reflect: false,
            angle: 0.0,
            mag: 1.0,
        }
    }
}

impl Strans {
    pub fn new(reflect: bool, angle: f64, mag: f64) -> Self {
        Self {
            reflect,
            angle,
            mag,
        }
    }
}

/// A 2D affine transform.
///
/// Stored as the linear part plus translation:
/// `x' = a*x + b*y + tx`, `y' = c*x + d*y + ty`.
///
/// Built from placement records with the fixed order
/// reflect → rotate → magnify → translate, and composed by matrix
/// multiplication with identity as the neutral element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            tx: x,
            ty: y,
            ..Self::IDENTITY
        }
    }

    /// Build an instance transform from a placement record and its position.
    pub fn from_placement(strans: &Strans, origin: Point) -> Self {
        let rad = strans.angle.to_radians();
        let (sin, cos) = rad.sin_cos();
        let m = strans.mag;
        // reflect about X (y -> -y), rotate, magnify; column order matters
        // only through the sign of the second column.
        let refl = if strans.reflect { -1.0 } else { 1.0 };
        Self {
            a: m * cos,
            b: m * -sin * refl,
            c: m * sin,
            d: m * cos * refl,
            tx: origin.x,
            ty: origin.y,
        }
    }

    /// Compose `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Transform) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            tx: self.a * other.tx + self.b * other.ty + self.tx,
            ty: self.c * other.tx + self.d * other.ty + self.ty,
        }
    }

    pub fn apply(&self, p: &Point) -> Point {
        Point::new(
            self.a * p.x + self.b * p.y + self.tx,
            self.c * p.x + self.d * p.y + self.ty,
        )
    }

    pub fn apply_all(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|p| self.apply(p)).collect()
    }

    /// Uniform scale factor of the linear part.
    ///
    /// Placement transforms are built from uniform magnifications, so the
    /// determinant's square root recovers |mag| through any composition.
    pub fn scale_factor(&self) -> f64 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }

    pub fn is_identity(&self) -> bool {
        const EPS: f64 = 1e-12;
        (self.a - 1.0).abs() < EPS
            && self.b.abs() < EPS
            && self.c.abs() < EPS
            && (self.d - 1.0).abs() < EPS
            && self.tx.abs() < EPS
            && self.ty.abs() < EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_point(p: Point, x: f64, y: f64) {
        assert!((p.x - x).abs() < 1e-9, "x: {} != {}", p.x, x);
        assert!((p.y - y).abs() < 1e-9, "y: {} != {}", p.y, y);
    }

    #[test]
    fn test_translate() {
        let t = Transform::translate(10.0, 20.0);
        assert_point(t.apply(&Point::new(5.0, 5.0)), 15.0, 25.0);
    }

    #[test]
    fn test_rotate_magnify_translate() {
        // (1,1) rotated 90° -> (-1,1); magnified x2 -> (-2,2);
        // translated by (100,100) -> (98,102).
        let t = Transform::from_placement(
            &Strans::new(false, 90.0, 2.0),
            Point::new(100.0, 100.0),
        );
        assert_point(t.apply(&Point::new(1.0, 1.0)), 98.0, 102.0);
    }

    #[test]
    fn test_reflect_applies_before_rotation() {
        // Reflect (1,1) about X -> (1,-1); rotate 90° -> (1,1).
        let t = Transform::from_placement(&Strans::new(true, 90.0, 1.0), Point::new(0.0, 0.0));
        assert_point(t.apply(&Point::new(1.0, 1.0)), 1.0, 1.0);
    }

    #[test]
    fn test_compose_order() {
        let parent = Transform::translate(100.0, 0.0);
        let child = Transform::from_placement(&Strans::new(false, 90.0, 1.0), Point::new(0.0, 0.0));
        // parent ∘ child: rotate first, then translate.
        let combined = parent.compose(&child);
        assert_point(combined.apply(&Point::new(1.0, 0.0)), 100.0, 1.0);
    }

    #[test]
    fn test_identity() {
        assert!(Transform::IDENTITY.is_identity());
        let t = Transform::from_placement(&Strans::default(), Point::new(0.0, 0.0));
        assert!(t.is_identity());
        assert!(!Transform::translate(1.0, 0.0).is_identity());
    }

    #[test]
    fn test_scale_factor() {
        let t = Transform::from_placement(&Strans::new(true, 37.0, 2.5), Point::new(4.0, 5.0));
        assert!((t.scale_factor() - 2.5).abs() < 1e-9);
    }
}
