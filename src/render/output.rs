use std::io::Cursor;
use std::path::Path;

use crate::assets::decode::unpremultiply_rgba8_in_place;
use crate::foundation::error::{MockupError, MockupResult};
use crate::render::backend::Surface;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encoded output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless, keeps alpha.
    Png,
    /// Lossy, flattened onto white.
    Jpeg,
}

impl ImageFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Canonical file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// MIME type of the encoded bytes.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = MockupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(MockupError::validation(format!(
                "unknown image format '{other}' (expected png|jpeg)"
            ))),
        }
    }
}

/// What a render call hands back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputKind {
    /// Raw premultiplied RGBA8 surface.
    #[default]
    Surface,
    /// Encoded image bytes.
    Encoded {
        /// Container format.
        format: ImageFormat,
        /// JPEG quality in `1..=100`; ignored for PNG.
        quality: u8,
    },
}

impl OutputKind {
    /// PNG output.
    pub fn png() -> Self {
        Self::Encoded {
            format: ImageFormat::Png,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// JPEG output at `quality` (clamped to `1..=100`).
    pub fn jpeg(quality: u8) -> Self {
        Self::Encoded {
            format: ImageFormat::Jpeg,
            quality: quality.clamp(1, 100),
        }
    }
}

/// Straight-alpha copy of a surface's pixels.
pub fn surface_to_straight_rgba(surface: &Surface) -> Vec<u8> {
    let mut data = surface.data.clone();
    if surface.premultiplied {
        unpremultiply_rgba8_in_place(&mut data);
    }
    data
}

/// Encode `surface` as `format`.
///
/// PNG keeps alpha (un-premultiplied). JPEG has no alpha channel, so pixels are flattened onto
/// opaque white first.
#[tracing::instrument(skip(surface), fields(width = surface.width, height = surface.height))]
pub fn encode_surface(
    surface: &Surface,
    format: ImageFormat,
    quality: u8,
) -> MockupResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Png => {
            let img = image::RgbaImage::from_raw(
                surface.width,
                surface.height,
                surface_to_straight_rgba(surface),
            )
            .ok_or_else(|| MockupError::render("surface buffer does not match its size"))?;
            image::DynamicImage::ImageRgba8(img)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|e| MockupError::render(format!("png encode failed: {e}")))?;
        }
        ImageFormat::Jpeg => {
            let img = image::RgbImage::from_raw(
                surface.width,
                surface.height,
                flatten_onto_white(surface),
            )
            .ok_or_else(|| MockupError::render("surface buffer does not match its size"))?;
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
                .encode_image(&image::DynamicImage::ImageRgb8(img))
                .map_err(|e| MockupError::render(format!("jpeg encode failed: {e}")))?;
        }
    }
    Ok(buf)
}

fn flatten_onto_white(surface: &Surface) -> Vec<u8> {
    let mut out = Vec::with_capacity(surface.data.len() / 4 * 3);
    for px in surface.data.chunks_exact(4) {
        let a = px[3];
        for &c in &px[..3] {
            let v = if surface.premultiplied {
                // premultiplied c over white: c + 255 * (1 - a)
                c.saturating_add(255 - a)
            } else {
                let c = u16::from(c);
                let a = u16::from(a);
                ((c * a + 255 * (255 - a) + 127) / 255) as u8
            };
            out.push(v);
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/output.rs"]
mod tests;
