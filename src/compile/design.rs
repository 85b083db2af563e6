use crate::assets::decode::{decode_base64, decode_image, prepare_straight_rgba};
use crate::assets::store::{ContentKey, PreparedImage};
use crate::foundation::core::{Point, Rect, Size};
use crate::foundation::error::{Degenerate, MockupError, MockupResult};
use crate::geometry::homography::unit_square_to_quad;
use crate::geometry::quad::Quad;
use crate::scene::model::LayerId;

/// How a design is fitted into its insertion area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Stretch the whole design onto the quad.
    #[default]
    Fill,
    /// Letterbox the whole design inside the area's aspect.
    Contain,
    /// Center-crop the design to the area's aspect.
    Cover,
}

impl std::str::FromStr for FitMode {
    type Err = MockupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fill" | "stretch" => Ok(Self::Fill),
            "contain" | "fit" => Ok(Self::Contain),
            "cover" | "crop" => Ok(Self::Cover),
            other => Err(MockupError::validation(format!("unknown fit mode '{other}'"))),
        }
    }
}

/// Pixels of one design, in any of the accepted encodings.
#[derive(Clone, Debug)]
pub enum DesignSource {
    /// Already decoded.
    Image(PreparedImage),
    /// Straight-alpha RGBA8 buffer.
    Rgba {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// `width * height * 4` bytes.
        data: Vec<u8>,
    },
    /// Any encoded raster `image` understands (PNG, JPEG, ...).
    Encoded(Vec<u8>),
    /// Base64 text of an encoded raster, optionally as a `data:` URL.
    Base64(String),
}

impl DesignSource {
    /// Stable cache key of the source content.
    pub fn content_key(&self) -> ContentKey {
        match self {
            Self::Image(img) => img.key,
            Self::Rgba {
                width,
                height,
                data,
            } => ContentKey::for_pixels(data, *width, *height),
            Self::Encoded(bytes) => ContentKey::for_blob(bytes),
            Self::Base64(text) => ContentKey::for_blob(text.as_bytes()),
        }
    }

    /// Decode into premultiplied RGBA8.
    pub fn decode(&self) -> MockupResult<PreparedImage> {
        match self {
            Self::Image(img) => Ok(img.clone()),
            Self::Rgba {
                width,
                height,
                data,
            } => prepare_straight_rgba(*width, *height, data),
            Self::Encoded(bytes) => decode_image(bytes),
            Self::Base64(text) => decode_image(&decode_base64(text)?),
        }
    }
}

/// One design supplied to a render call.
#[derive(Clone, Debug)]
pub struct DesignInput {
    /// Insertion-area id or (part of) its name; empty targets any single area.
    pub target_id: String,
    /// Design pixels.
    pub source: DesignSource,
    /// Fit mode.
    pub fit: FitMode,
}

impl DesignInput {
    /// Design for `target_id` using [`FitMode::Fill`].
    pub fn new(target_id: impl Into<String>, source: DesignSource) -> Self {
        Self {
            target_id: target_id.into(),
            source,
            fit: FitMode::Fill,
        }
    }

    /// Set the fit mode.
    pub fn with_fit(mut self, fit: FitMode) -> Self {
        self.fit = fit;
        self
    }
}

/// Pick the design for an insertion area.
///
/// Order: exact id, then case-insensitive substring between area name and target (either
/// direction), then the only supplied design when it is untargeted or the template has a
/// single insertion area.
pub(crate) fn resolve_design(
    designs: &[DesignInput],
    area_id: LayerId,
    area_name: &str,
    area_count: usize,
) -> Option<usize> {
    let id = area_id.to_string();
    if let Some(i) = designs.iter().position(|d| d.target_id == id) {
        return Some(i);
    }

    let name = area_name.to_lowercase();
    if let Some(i) = designs.iter().position(|d| {
        let target = d.target_id.to_lowercase();
        !target.is_empty() && !name.is_empty() && (name.contains(&target) || target.contains(&name))
    }) {
        return Some(i);
    }

    match designs {
        [only] if only.target_id.is_empty() || area_count == 1 => Some(0),
        _ => None,
    }
}

/// Source crop and destination quad after applying a fit mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FitPlacement {
    /// Region of the design image to draw, in source pixels.
    pub(crate) src: Rect,
    /// Destination quad for `src`.
    pub(crate) dst: Quad,
}

/// Fit a `img_w x img_h` design into `quad`, whose intended aspect is `placed_size` (or the quad's
/// mean edge lengths when unknown).
pub(crate) fn fit_design(
    fit: FitMode,
    img_w: u32,
    img_h: u32,
    quad: &Quad,
    placed_size: Size,
) -> Result<FitPlacement, Degenerate> {
    let full = Rect::new(0.0, 0.0, f64::from(img_w), f64::from(img_h));
    let img_aspect = Size::new(full.width(), full.height())
        .aspect()
        .ok_or(Degenerate)?;
    let area_aspect = placed_size
        .aspect()
        .or_else(|| quad.mean_edge_size().aspect())
        .ok_or(Degenerate)?;

    match fit {
        FitMode::Fill => Ok(FitPlacement {
            src: full,
            dst: *quad,
        }),
        FitMode::Cover => {
            let src = if img_aspect > area_aspect {
                let w = full.height() * area_aspect;
                let x0 = (full.width() - w) * 0.5;
                Rect::new(x0, 0.0, x0 + w, full.height())
            } else {
                let h = full.width() / area_aspect;
                let y0 = (full.height() - h) * 0.5;
                Rect::new(0.0, y0, full.width(), y0 + h)
            };
            Ok(FitPlacement { src, dst: *quad })
        }
        FitMode::Contain => {
            let (u0, v0, u1, v1) = if img_aspect > area_aspect {
                let h = area_aspect / img_aspect;
                (0.0, (1.0 - h) * 0.5, 1.0, (1.0 + h) * 0.5)
            } else {
                let w = img_aspect / area_aspect;
                ((1.0 - w) * 0.5, 0.0, (1.0 + w) * 0.5, 1.0)
            };
            let m = unit_square_to_quad(quad)?;
            let dst = Quad::from_corners(
                [
                    Point::new(u0, v0),
                    Point::new(u1, v0),
                    Point::new(u1, v1),
                    Point::new(u0, v1),
                ]
                .map(|p| m.transform_point(p)),
            );
            Ok(FitPlacement { src: full, dst })
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/design.rs"]
mod tests;
