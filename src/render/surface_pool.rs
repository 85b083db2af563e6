use std::collections::HashMap;

use crate::foundation::error::{MockupError, MockupResult};

/// Pool configuration for cached surfaces.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SurfacePoolOpts {
    /// Maximum bytes retained across all buckets.
    pub(crate) max_pool_bytes: usize,
    /// Maximum number of retained surfaces per size bucket.
    pub(crate) max_surfaces_per_bucket: usize,
}

impl Default for SurfacePoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 256 * 1024 * 1024,
            max_surfaces_per_bucket: 8,
        }
    }
}

/// Pixel size of a pooled surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SurfaceSize {
    pub(crate) width: u16,
    pub(crate) height: u16,
}

impl SurfaceSize {
    pub(crate) fn new(width: u32, height: u32) -> MockupResult<Self> {
        let width: u16 = width
            .try_into()
            .map_err(|_| MockupError::render("surface width exceeds u16"))?;
        let height: u16 = height
            .try_into()
            .map_err(|_| MockupError::render("surface height exceeds u16"))?;
        if width == 0 || height == 0 {
            return Err(MockupError::render("surface dimensions must be > 0"));
        }
        Ok(Self { width, height })
    }

    fn byte_len(self) -> usize {
        usize::from(self.width) * usize::from(self.height) * 4
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct SurfacePoolStats {
    pub(crate) retained_surfaces: usize,
    pub(crate) retained_bytes: usize,
    pub(crate) alloc_surfaces: u64,
    pub(crate) dropped_on_release: u64,
}

/// Bounded pool of premultiplied RGBA8 pixmaps keyed by size.
///
/// Borrow/release happens per plan op, never per pixel. Borrowed pixmaps keep stale content;
/// callers clear them.
pub(crate) struct SurfacePool {
    opts: SurfacePoolOpts,
    stats: SurfacePoolStats,
    buckets: HashMap<SurfaceSize, Vec<vello_cpu::Pixmap>>,
}

impl SurfacePool {
    pub(crate) fn new(opts: SurfacePoolOpts) -> Self {
        Self {
            opts,
            stats: SurfacePoolStats::default(),
            buckets: HashMap::new(),
        }
    }

    pub(crate) fn stats(&self) -> SurfacePoolStats {
        self.stats.clone()
    }

    pub(crate) fn borrow(&mut self, size: SurfaceSize) -> vello_cpu::Pixmap {
        if let Some(p) = self.buckets.get_mut(&size).and_then(Vec::pop) {
            self.stats.retained_surfaces = self.stats.retained_surfaces.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(size.byte_len());
            return p;
        }

        self.stats.alloc_surfaces = self.stats.alloc_surfaces.saturating_add(1);
        vello_cpu::Pixmap::new(size.width, size.height)
    }

    pub(crate) fn release(&mut self, pixmap: vello_cpu::Pixmap) {
        let size = SurfaceSize {
            width: pixmap.width(),
            height: pixmap.height(),
        };
        let bytes = size.byte_len();
        let bucket = self.buckets.entry(size).or_default();

        if bucket.len() >= self.opts.max_surfaces_per_bucket
            || self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.push(pixmap);
        self.stats.retained_surfaces = self.stats.retained_surfaces.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface_pool.rs"]
mod tests;
