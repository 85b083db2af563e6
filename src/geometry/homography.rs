//! Planar projective transforms.
//!
//! [`Matrix3`] is row-major and maps `(x, y, 1)` to `(x', y', w')`:
//!
//! ```text
//! x' = m0 * x + m1 * y + m2
//! y' = m3 * x + m4 * y + m5
//! w' = m6 * x + m7 * y + m8
//! ```
//!
//! The projected point is `(x' / w', y' / w')`.

use crate::foundation::core::Point;
use crate::foundation::error::Degenerate;
use crate::geometry::quad::Quad;

const DET_EPSILON: f64 = 1e-10;
const W_EPSILON: f64 = 1e-12;

/// Row-major 3x3 homogeneous transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix3(pub [f64; 9]);

impl Matrix3 {
    /// Identity transform.
    pub const IDENTITY: Self = Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    /// Axis-aligned scale.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self([sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0])
    }

    /// Determinant.
    pub fn determinant(&self) -> f64 {
        let [a, b, c, d, e, f, g, h, i] = self.0;
        a * (e * i - f * h) - b * (d * i - f * g) + c * (d * h - e * g)
    }

    /// Closed-form inverse through the adjugate.
    pub fn invert(&self) -> Result<Self, Degenerate> {
        let [a, b, c, d, e, f, g, h, i] = self.0;
        let det = self.determinant();
        if !det.is_finite() || det.abs() < DET_EPSILON {
            return Err(Degenerate);
        }
        let inv = 1.0 / det;
        let m = [
            (e * i - f * h) * inv,
            (c * h - b * i) * inv,
            (b * f - c * e) * inv,
            (f * g - d * i) * inv,
            (a * i - c * g) * inv,
            (c * d - a * f) * inv,
            (d * h - e * g) * inv,
            (b * g - a * h) * inv,
            (a * e - b * d) * inv,
        ];
        if m.iter().all(|v| v.is_finite()) {
            Ok(Self(m))
        } else {
            Err(Degenerate)
        }
    }

    /// Matrix product `self * other` (applies `other` first).
    pub fn multiply(&self, other: &Self) -> Self {
        let a = &self.0;
        let b = &other.0;
        let mut out = [0.0; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        Self(out)
    }

    /// Map a point, dividing by the third row.
    ///
    /// A numerically zero divisor returns `p` unchanged.
    pub fn transform_point(&self, p: Point) -> Point {
        let m = &self.0;
        let w = m[6] * p.x + m[7] * p.y + m[8];
        if !w.is_finite() || w.abs() < W_EPSILON {
            return p;
        }
        Point::new(
            (m[0] * p.x + m[1] * p.y + m[2]) / w,
            (m[3] * p.x + m[4] * p.y + m[5]) / w,
        )
    }
}

/// Transform mapping `(0,0), (1,0), (1,1), (0,1)` onto the quad corners in order.
pub fn unit_square_to_quad(quad: &Quad) -> Result<Matrix3, Degenerate> {
    let [p0, p1, p2, p3] = quad.corners();
    let dx1 = p1.x - p2.x;
    let dx2 = p3.x - p2.x;
    let dx3 = p0.x - p1.x + p2.x - p3.x;
    let dy1 = p1.y - p2.y;
    let dy2 = p3.y - p2.y;
    let dy3 = p0.y - p1.y + p2.y - p3.y;

    let m = if dx3 == 0.0 && dy3 == 0.0 {
        [
            p1.x - p0.x,
            p2.x - p1.x,
            p0.x,
            p1.y - p0.y,
            p2.y - p1.y,
            p0.y,
            0.0,
            0.0,
            1.0,
        ]
    } else {
        let den = dx1 * dy2 - dx2 * dy1;
        if !den.is_finite() || den.abs() < DET_EPSILON {
            return Err(Degenerate);
        }
        let a13 = (dx3 * dy2 - dx2 * dy3) / den;
        let a23 = (dx1 * dy3 - dx3 * dy1) / den;
        [
            p1.x - p0.x + a13 * p1.x,
            p3.x - p0.x + a23 * p3.x,
            p0.x,
            p1.y - p0.y + a13 * p1.y,
            p3.y - p0.y + a23 * p3.y,
            p0.y,
            a13,
            a23,
            1.0,
        ]
    };

    if m.iter().all(|v| v.is_finite()) {
        Ok(Matrix3(m))
    } else {
        Err(Degenerate)
    }
}

/// Transform mapping `src` onto `dst` (src -> unit square -> dst).
///
/// Either quad having three collinear corners yields [`Degenerate`].
pub fn quad_to_quad_matrix(src: &Quad, dst: &Quad) -> Result<Matrix3, Degenerate> {
    src.validate()?;
    dst.validate()?;
    let from_unit_src = unit_square_to_quad(src)?;
    let to_unit = from_unit_src.invert()?;
    let from_unit_dst = unit_square_to_quad(dst)?;
    let m = from_unit_dst.multiply(&to_unit);
    m.invert()?;
    Ok(m)
}

/// Transform mapping the rectangle `[0, 0, w, h]` onto `dst`.
pub fn rect_to_quad_matrix(w: f64, h: f64, dst: &Quad) -> Result<Matrix3, Degenerate> {
    if !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
        return Err(Degenerate);
    }
    dst.validate()?;
    let from_unit = unit_square_to_quad(dst)?;
    Ok(from_unit.multiply(&Matrix3::scale(1.0 / w, 1.0 / h)))
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/homography.rs"]
mod tests;
