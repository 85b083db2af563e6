use crate::foundation::core::{BezPath, Point, Rect, Size};
use crate::foundation::error::Degenerate;
use crate::foundation::math::{lerp, near_zero};

/// Destination surface patch: four corners in clockwise order starting at the top left.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quad {
    /// Corner mapped from unit `(0, 0)`.
    pub top_left: Point,
    /// Corner mapped from unit `(1, 0)`.
    pub top_right: Point,
    /// Corner mapped from unit `(1, 1)`.
    pub bottom_right: Point,
    /// Corner mapped from unit `(0, 1)`.
    pub bottom_left: Point,
}

impl Quad {
    /// Build a quad from corners in `top_left, top_right, bottom_right, bottom_left` order.
    pub fn from_corners(c: [Point; 4]) -> Self {
        Self {
            top_left: c[0],
            top_right: c[1],
            bottom_right: c[2],
            bottom_left: c[3],
        }
    }

    /// Axis-aligned quad covering `rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self::from_corners([
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ])
    }

    /// Read 8 values as `x0, y0, x1, y1, ...` in corner order.
    pub fn from_flat(v: &[f64; 8]) -> Self {
        Self::from_corners([
            Point::new(v[0], v[1]),
            Point::new(v[2], v[3]),
            Point::new(v[4], v[5]),
            Point::new(v[6], v[7]),
        ])
    }

    /// Corners in `top_left, top_right, bottom_right, bottom_left` order.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Apply `f` to every corner.
    pub fn map(&self, f: impl Fn(Point) -> Point) -> Self {
        Self::from_corners(self.corners().map(f))
    }

    /// Reject non-finite corners and quads with any three collinear corners.
    pub fn validate(&self) -> Result<(), Degenerate> {
        let c = self.corners();
        if !c.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
            return Err(Degenerate);
        }
        let extent = self.bounding_box();
        let scale = extent.width().max(extent.height());
        if scale <= 0.0 {
            return Err(Degenerate);
        }
        for skip in 0..4 {
            let tri: Vec<Point> = (0..4).filter(|&i| i != skip).map(|i| c[i]).collect();
            let cross = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
            if near_zero(cross, scale * scale) {
                return Err(Degenerate);
            }
        }
        Ok(())
    }

    /// Smallest axis-aligned rectangle containing all corners.
    pub fn bounding_box(&self) -> Rect {
        let c = self.corners();
        let (mut x0, mut y0) = (c[0].x, c[0].y);
        let (mut x1, mut y1) = (c[0].x, c[0].y);
        for p in &c[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Rect::new(x0, y0, x1, y1)
    }

    /// Closed polygon through the four corners.
    pub fn to_path(&self) -> BezPath {
        let c = self.corners();
        let mut path = BezPath::new();
        path.move_to(c[0]);
        for p in &c[1..] {
            path.line_to(*p);
        }
        path.close_path();
        path
    }

    /// Bilinear interpolation of the quad's edges at unit coordinates `(u, v)`.
    pub fn bilinear(&self, u: f64, v: f64) -> Point {
        let top = Point::new(
            lerp(self.top_left.x, self.top_right.x, u),
            lerp(self.top_left.y, self.top_right.y, u),
        );
        let bottom = Point::new(
            lerp(self.bottom_left.x, self.bottom_right.x, u),
            lerp(self.bottom_left.y, self.bottom_right.y, u),
        );
        Point::new(lerp(top.x, bottom.x, v), lerp(top.y, bottom.y, v))
    }

    /// Mean lengths of opposite edges, as an approximate placed size.
    pub fn mean_edge_size(&self) -> Size {
        let top = self.top_left.distance(self.top_right);
        let bottom = self.bottom_left.distance(self.bottom_right);
        let left = self.top_left.distance(self.bottom_left);
        let right = self.top_right.distance(self.bottom_right);
        Size::new((top + bottom) * 0.5, (left + right) * 0.5)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/quad.rs"]
mod tests;
