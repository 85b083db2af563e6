use anyhow::Context;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};

use crate::assets::store::PreparedImage;
use crate::foundation::error::{MockupError, MockupResult};
use crate::foundation::math::mul_div255_u8;

/// Decode any format `image` recognizes into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> MockupResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    PreparedImage::from_premul(width, height, rgba8_premul)
}

/// Wrap a straight-alpha RGBA8 buffer.
pub fn prepare_straight_rgba(width: u32, height: u32, data: &[u8]) -> MockupResult<PreparedImage> {
    let mut rgba = data.to_vec();
    premultiply_rgba8_in_place(&mut rgba);
    PreparedImage::from_premul(width, height, rgba)
}

/// Decode base64 text, accepting an optional `data:<mime>;base64,` prefix and embedded whitespace.
pub fn decode_base64(text: &str) -> MockupResult<Vec<u8>> {
    let payload = match text.find(";base64,") {
        Some(i) if text.starts_with("data:") => &text[i + ";base64,".len()..],
        _ => text,
    };
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    BASE64_STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| MockupError::decode(format!("invalid base64 image data: {e}")))
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

pub(crate) fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
