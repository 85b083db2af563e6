//! Perspective drawing of one design image onto one destination quad.
//!
//! [`PerspectiveMode::Mesh`] evaluates the exact homography for every covered pixel.
//! [`PerspectiveMode::Subdivide`] splits the unit square into an `N x N` grid whose corners are
//! placed by bilinear interpolation of the quad edges; each cell becomes two affine triangles
//! that the rasterizer fills with the whole design under the triangle's own paint transform. It
//! approximates the homography and converges to it as `N` grows.

use crate::assets::store::PreparedImage;
use crate::foundation::core::{Affine, Point, Rect};
use crate::foundation::error::{Degenerate, MockupError};
use crate::geometry::affine::triangle_affine;
use crate::geometry::homography::rect_to_quad_matrix;
use crate::geometry::quad::Quad;

/// Default grid size of [`PerspectiveMode::Subdivide`].
pub const DEFAULT_SUBDIVISIONS: u32 = 8;

/// Largest grid size of [`PerspectiveMode::Subdivide`].
pub const MAX_SUBDIVISIONS: u32 = 256;

/// Outward offset of every triangle edge, in output pixels.
///
/// Neighbouring triangles overlap by this much so anti-aliased shared edges leave no seams.
pub(crate) const SEAM_OVERLAP: f64 = 0.75;

/// Perspective drawing backend, chosen once per renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PerspectiveMode {
    /// Exact per-pixel inverse homography.
    #[default]
    Mesh,
    /// Affine triangle subdivision of an `grid x grid` bilinear grid.
    Subdivide {
        /// Cells per side, clamped to `1..=MAX_SUBDIVISIONS`.
        grid: u32,
    },
}

impl std::str::FromStr for PerspectiveMode {
    type Err = MockupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mesh" | "exact" => Ok(Self::Mesh),
            "subdivide" | "triangles" => Ok(Self::Subdivide {
                grid: DEFAULT_SUBDIVISIONS,
            }),
            other => Err(MockupError::validation(format!(
                "unknown perspective mode '{other}' (expected mesh|subdivide)"
            ))),
        }
    }
}

/// Mutable premultiplied RGBA8 target.
pub(crate) struct Target<'a> {
    pub(crate) data: &'a mut [u8],
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Target<'_> {
    fn put(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 4].copy_from_slice(&px);
    }

    /// Pixel rows and columns whose centers may fall inside `r`.
    fn pixel_span(&self, r: Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = r.x0.floor().max(0.0);
        let y0 = r.y0.floor().max(0.0);
        let x1 = r.x1.ceil().min(f64::from(self.width));
        let y1 = r.y1.ceil().min(f64::from(self.height));
        (x0 < x1 && y0 < y1).then(|| (x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

fn check_inputs(src: Rect, dst: &Quad) -> Result<(), Degenerate> {
    dst.validate()?;
    if src.width() > 0.0 && src.height() > 0.0 {
        Ok(())
    } else {
        Err(Degenerate)
    }
}

/// Draw the `src` region of `image` onto `dst` by exact inverse homography, replacing the
/// pixels whose centers fall inside the quad. Returns the number of pixels written.
///
/// Fails only when the whole quad is degenerate.
pub(crate) fn draw_mesh(
    target: &mut Target<'_>,
    image: &PreparedImage,
    src: Rect,
    dst: &Quad,
) -> Result<usize, Degenerate> {
    check_inputs(src, dst)?;
    let inv = rect_to_quad_matrix(src.width(), src.height(), dst)?.invert()?;
    let m = inv.0;
    let w_at = |p: Point| m[6] * p.x + m[7] * p.y + m[8];

    // Points beyond the vanishing line map back with a flipped homogeneous sign.
    let c = dst.corners();
    let center = Point::new(
        (c[0].x + c[1].x + c[2].x + c[3].x) * 0.25,
        (c[0].y + c[1].y + c[2].y + c[3].y) * 0.25,
    );
    let w_sign = w_at(center).signum();

    let mut written = 0;
    let Some((x0, y0, x1, y1)) = target.pixel_span(dst.bounding_box()) else {
        return Ok(written);
    };
    let eps = 1e-9 * src.width().max(src.height());
    for y in y0..y1 {
        for x in x0..x1 {
            let p = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if w_at(p) * w_sign <= 0.0 {
                continue;
            }
            let s = inv.transform_point(p);
            if s.x < -eps || s.y < -eps || s.x > src.width() + eps || s.y > src.height() + eps {
                continue;
            }
            let px = sample_bilinear(image, &src, Point::new(s.x + src.x0, s.y + src.y0));
            target.put(x, y, px);
            written += 1;
        }
    }
    Ok(written)
}

/// One cell triangle of [`PerspectiveMode::Subdivide`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MeshTriangle {
    /// Destination corners with every edge pushed outward by [`SEAM_OVERLAP`].
    pub(crate) dst: [Point; 3],
    /// Places source image coordinates onto the destination.
    pub(crate) paint_transform: Affine,
}

/// Triangles of a subdivided quad.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TriangleMesh {
    pub(crate) triangles: Vec<MeshTriangle>,
    /// Cell triangles dropped because they collapse to a line.
    pub(crate) skipped: usize,
}

/// Split `dst` into a `grid x grid` bilinear grid of affine triangles mapping `src` onto it.
///
/// Fails only when the whole quad is degenerate.
pub(crate) fn subdivide(src: Rect, dst: &Quad, grid: u32) -> Result<TriangleMesh, Degenerate> {
    check_inputs(src, dst)?;
    let n = grid.clamp(1, MAX_SUBDIVISIONS);
    let step = 1.0 / f64::from(n);
    let src_at = |u: f64, v: f64| Point::new(src.x0 + u * src.width(), src.y0 + v * src.height());

    let mut mesh = TriangleMesh {
        triangles: Vec::with_capacity(2 * (n as usize).pow(2)),
        skipped: 0,
    };
    for j in 0..n {
        for i in 0..n {
            let (u0, v0) = (f64::from(i) * step, f64::from(j) * step);
            let (u1, v1) = (u0 + step, v0 + step);
            let s = [
                src_at(u0, v0),
                src_at(u1, v0),
                src_at(u1, v1),
                src_at(u0, v1),
            ];
            let d = [
                dst.bilinear(u0, v0),
                dst.bilinear(u1, v0),
                dst.bilinear(u1, v1),
                dst.bilinear(u0, v1),
            ];
            for (a, b, c) in [(0, 1, 2), (0, 2, 3)] {
                let (from, to) = ([s[a], s[b], s[c]], [d[a], d[b], d[c]]);
                match (triangle_affine(to, from), triangle_affine(from, to)) {
                    (Ok(_), Ok(paint_transform)) => mesh.triangles.push(MeshTriangle {
                        dst: expand_triangle(to, SEAM_OVERLAP),
                        paint_transform,
                    }),
                    _ => mesh.skipped += 1,
                }
            }
        }
    }
    Ok(mesh)
}

/// Move every edge of `tri` outward by `d`, keeping its direction.
///
/// Corners are mitered; very sharp ones are capped at `4 * d`.
pub(crate) fn expand_triangle(tri: [Point; 3], d: f64) -> [Point; 3] {
    let centroid = Point::new(
        (tri[0].x + tri[1].x + tri[2].x) / 3.0,
        (tri[0].y + tri[1].y + tri[2].y) / 3.0,
    );
    // Outward unit normal of the edge from `tri[i]` to `tri[i + 1]`.
    let normal = |i: usize| {
        let a = tri[i];
        let n = (tri[(i + 1) % 3] - a).turn_90().normalize();
        if n.dot(centroid - a) > 0.0 { -n } else { n }
    };
    let n = [normal(0), normal(1), normal(2)];
    std::array::from_fn(|i| {
        let (before, after) = (n[(i + 2) % 3], n[i]);
        tri[i] + (before + after) * (d / (1.0 + before.dot(after)).max(0.125))
    })
}

/// Bilinear sample of premultiplied pixels at continuous source position `p`, clamped to `src`.
fn sample_bilinear(image: &PreparedImage, src: &Rect, p: Point) -> [u8; 4] {
    let clamp = |v: f64, lo: f64, hi: f64| v.clamp(lo + 0.5, (hi - 0.5).max(lo + 0.5)) - 0.5;
    let x = clamp(p.x, src.x0, src.x1);
    let y = clamp(p.y, src.y0, src.y1);

    let (fx0, fy0) = (x.floor(), y.floor());
    let (tx, ty) = (x - fx0, y - fy0);
    let max_x = i64::from(image.width) - 1;
    let max_y = i64::from(image.height) - 1;
    let xi = (fx0 as i64).clamp(0, max_x);
    let yi = (fy0 as i64).clamp(0, max_y);
    let xj = (xi + 1).min(max_x);
    let yj = (yi + 1).min(max_y);

    let p00 = image.pixel(xi, yi);
    let p10 = image.pixel(xj, yi);
    let p01 = image.pixel(xi, yj);
    let p11 = image.pixel(xj, yj);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = f64::from(p00[c]) * (1.0 - tx) + f64::from(p10[c]) * tx;
        let bottom = f64::from(p01[c]) * (1.0 - tx) + f64::from(p11[c]) * tx;
        out[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/perspective.rs"]
mod tests;
