use crate::foundation::core::{Affine, Point};
use crate::foundation::error::Degenerate;
use crate::foundation::math::near_zero;

/// Exact affine map sending the three `src` points onto the three `dst` points.
///
/// Fails when `src` spans no area.
pub fn triangle_affine(src: [Point; 3], dst: [Point; 3]) -> Result<Affine, Degenerate> {
    let u1 = src[1] - src[0];
    let u2 = src[2] - src[0];
    let v1 = dst[1] - dst[0];
    let v2 = dst[2] - dst[0];

    let det = u1.x * u2.y - u2.x * u1.y;
    let scale = u1.hypot2().max(u2.hypot2());
    if !det.is_finite() || near_zero(det, scale) {
        return Err(Degenerate);
    }

    let m00 = (v1.x * u2.y - v2.x * u1.y) / det;
    let m01 = (v2.x * u1.x - v1.x * u2.x) / det;
    let m10 = (v1.y * u2.y - v2.y * u1.y) / det;
    let m11 = (v2.y * u1.x - v1.y * u2.x) / det;
    let tx = dst[0].x - (m00 * src[0].x + m01 * src[0].y);
    let ty = dst[0].y - (m10 * src[0].x + m11 * src[0].y);

    let coeffs = [m00, m10, m01, m11, tx, ty];
    if coeffs.iter().all(|v| v.is_finite()) {
        Ok(Affine::new(coeffs))
    } else {
        Err(Degenerate)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/affine.rs"]
mod tests;
