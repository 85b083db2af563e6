use std::sync::Arc;

use xxhash_rust::xxh3::Xxh3;

use crate::foundation::error::{MockupError, MockupResult};

/// Stable content key: xxh3-64 of the source bytes plus pixel dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentKey {
    hash: u64,
    width: u32,
    height: u32,
}

impl ContentKey {
    /// Key for raw pixels of known dimensions.
    pub fn for_pixels(bytes: &[u8], width: u32, height: u32) -> Self {
        Self {
            hash: xxhash_rust::xxh3::xxh3_64(bytes),
            width,
            height,
        }
    }

    /// Key for an encoded blob whose dimensions are not known yet.
    pub fn for_blob(bytes: &[u8]) -> Self {
        let mut h = Xxh3::new();
        h.update(b"blob");
        h.update(bytes);
        Self {
            hash: h.digest(),
            width: 0,
            height: 0,
        }
    }

    /// 64-bit hash part.
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

/// Decoded raster in premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
    /// Content key of the pixels.
    pub key: ContentKey,
}

impl PreparedImage {
    /// Wrap premultiplied pixels, validating the buffer length.
    pub fn from_premul(width: u32, height: u32, rgba8_premul: Vec<u8>) -> MockupResult<Self> {
        if width == 0 || height == 0 {
            return Err(MockupError::validation("image dimensions must be > 0"));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| MockupError::validation("image dimensions overflow"))?;
        if rgba8_premul.len() != expected {
            return Err(MockupError::validation(format!(
                "image buffer has {} bytes, expected {expected} for {width}x{height}",
                rgba8_premul.len()
            )));
        }
        let key = ContentKey::for_pixels(&rgba8_premul, width, height);
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
            key,
        })
    }

    /// Premultiplied pixel at `(x, y)`; transparent outside the image.
    pub fn pixel(&self, x: i64, y: i64) -> [u8; 4] {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return [0, 0, 0, 0];
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let d = &self.rgba8_premul;
        [d[i], d[i + 1], d[i + 2], d[i + 3]]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
