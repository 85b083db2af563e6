use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::store::PreparedImage;
use crate::foundation::core::Bounds;
use crate::scene::model::LayerId;

/// Decoded grayscale mask raster.
#[derive(Clone, Debug)]
pub struct MaskRaster {
    /// Scene-space area covered by `gray`.
    pub bounds: Bounds,
    /// Intensity outside `bounds`.
    pub default_color: u8,
    /// One byte per pixel, row-major over `bounds`.
    pub gray: Arc<Vec<u8>>,
}

impl MaskRaster {
    /// Mask intensity at scene pixel `(x, y)`.
    pub fn sample(&self, x: i32, y: i32) -> u8 {
        if !self.bounds.contains(x, y) {
            return self.default_color;
        }
        let w = self.bounds.width() as usize;
        let i = (y - self.bounds.top) as usize * w + (x - self.bounds.left) as usize;
        self.gray.get(i).copied().unwrap_or(self.default_color)
    }
}

/// Per-layer pixels extracted at import time, keyed by layer id.
///
/// Layer rasters are positioned at their layer's bounds; mask rasters carry their own bounds.
#[derive(Clone, Debug, Default)]
pub struct RasterSnapshots {
    /// Layer pixel data.
    pub layers: HashMap<LayerId, PreparedImage>,
    /// Mask pixel data, keyed by the layer owning the mask.
    pub masks: HashMap<LayerId, MaskRaster>,
}

impl RasterSnapshots {
    /// Empty snapshot map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raster of `id`.
    pub fn layer(&self, id: LayerId) -> Option<&PreparedImage> {
        self.layers.get(&id)
    }

    /// Mask raster owned by `id`.
    pub fn mask(&self, id: LayerId) -> Option<&MaskRaster> {
        self.masks.get(&id)
    }

    /// Return `true` when neither layers nor masks were extracted.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.masks.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/snapshot.rs"]
mod tests;
