use crate::foundation::error::{MockupError, MockupResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Scene canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a validated canvas with non-zero dimensions.
    pub fn new(width: u32, height: u32) -> MockupResult<Self> {
        if width == 0 || height == 0 {
            return Err(MockupError::validation("canvas dimensions must be > 0"));
        }
        Ok(Self { width, height })
    }

    /// Pixel dimensions after uniform scaling, rounded and clamped to at least one pixel.
    pub fn scaled(self, scale: f64) -> MockupResult<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(MockupError::validation("render scale must be finite and > 0"));
        }
        let w = (f64::from(self.width) * scale).round().max(1.0);
        let h = (f64::from(self.height) * scale).round().max(1.0);
        if w > f64::from(u16::MAX) || h > f64::from(u16::MAX) {
            return Err(MockupError::validation(
                "scaled canvas exceeds 65535 pixels on one side",
            ));
        }
        Ok(Self {
            width: w as u32,
            height: h as u32,
        })
    }

    /// Full canvas as a rectangle anchored at the origin.
    pub fn rect(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// Width/height pair in floating point (placed content size of a smart object).
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Size {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Size {
    /// Construct a size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Return `true` when both sides are finite and strictly positive.
    pub fn is_usable(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Width divided by height, when usable.
    pub fn aspect(self) -> Option<f64> {
        self.is_usable().then(|| self.width / self.height)
    }
}

/// Integer layer bounds in scene space (`right`/`bottom` exclusive).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl Bounds {
    /// Construct bounds from edges.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width in pixels; zero for inverted bounds.
    pub fn width(self) -> u32 {
        (i64::from(self.right) - i64::from(self.left)).max(0) as u32
    }

    /// Height in pixels; zero for inverted bounds.
    pub fn height(self) -> u32 {
        (i64::from(self.bottom) - i64::from(self.top)).max(0) as u32
    }

    /// Return `true` when the bounds cover no pixels.
    pub fn is_empty(self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Return `true` when integer pixel `(x, y)` lies inside.
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Floating-point rectangle of the same area.
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.right),
            f64::from(self.bottom),
        )
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Channels as a `[r, g, b, a]` array.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
