use std::collections::HashSet;
use std::time::Instant;

use rayon::prelude::*;

use crate::assets::cache::{ImageCache, ImageCacheStats};
use crate::assets::store::{ContentKey, PreparedImage};
use crate::compile::design::{DesignInput, DesignSource};
use crate::compile::plan::{PlanOp, compile_plan};
use crate::foundation::error::{MockupResult, Warning, WarningKind};
use crate::render::backend::{PlanBackend, PlanInputs, Surface, execute_plan};
use crate::render::cpu::{CpuBackend, CpuBackendOpts};
use crate::render::output::{ImageFormat, OutputKind, encode_surface};
use crate::render::perspective::{DEFAULT_SUBDIVISIONS, PerspectiveMode};
use crate::scene::model::MockupTemplate;
use crate::scene::snapshot::RasterSnapshots;

/// Default capacity of the decoded-design cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Renderer configuration, fixed for the lifetime of a [`Renderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RendererOpts {
    /// Perspective drawing backend.
    pub perspective: PerspectiveMode,
    /// Straight-alpha RGBA8 background; transparent when `None`.
    pub clear_rgba: Option<[u8; 4]>,
    /// Maximum decoded designs (and prepared paints) kept in memory.
    pub cache_capacity: usize,
}

impl Default for RendererOpts {
    fn default() -> Self {
        Self {
            perspective: PerspectiveMode::default(),
            clear_rgba: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl RendererOpts {
    /// Defaults overridden by `MOCKUP_PERSPECTIVE`, `MOCKUP_SUBDIVISIONS` and
    /// `MOCKUP_IMAGE_CACHE_CAPACITY`. Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut opts = Self::default();
        if let Some(mode) = lookup("MOCKUP_PERSPECTIVE").and_then(|v| v.parse().ok()) {
            opts.perspective = mode;
        }
        if let PerspectiveMode::Subdivide { grid } = &mut opts.perspective {
            *grid = lookup("MOCKUP_SUBDIVISIONS")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_SUBDIVISIONS);
        }
        opts.cache_capacity = lookup("MOCKUP_IMAGE_CACHE_CAPACITY")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CACHE_CAPACITY);
        opts
    }

    /// Set the perspective backend.
    pub fn with_perspective(mut self, perspective: PerspectiveMode) -> Self {
        self.perspective = perspective;
        self
    }

    /// Set the background color.
    pub fn with_clear_rgba(mut self, rgba: Option<[u8; 4]>) -> Self {
        self.clear_rgba = rgba;
        self
    }

    /// Set the cache capacity (at least 1).
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }
}

/// Per-call render options.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOpts {
    /// Uniform output scale relative to the canvas.
    pub scale: f64,
    /// Output form.
    pub output: OutputKind,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            scale: 1.0,
            output: OutputKind::Surface,
        }
    }
}

impl RenderOpts {
    /// Set the output scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the output form.
    pub fn with_output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }
}

/// Composite handed back by [`Renderer::render`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderedImage {
    /// Raw premultiplied pixels.
    Surface(Surface),
    /// Encoded image.
    Encoded {
        /// Container format.
        format: ImageFormat,
        /// Encoded bytes.
        bytes: Vec<u8>,
    },
}

impl RenderedImage {
    /// The surface, when the output was not encoded.
    pub fn as_surface(&self) -> Option<&Surface> {
        match self {
            Self::Surface(s) => Some(s),
            Self::Encoded { .. } => None,
        }
    }

    /// The encoded bytes, when the output was encoded.
    pub fn encoded_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Surface(_) => None,
            Self::Encoded { bytes, .. } => Some(bytes),
        }
    }
}

/// Outcome of one render call.
#[derive(Clone, Debug)]
pub struct RenderResult {
    /// `true` when `image` holds a composite.
    pub success: bool,
    /// The composite.
    pub image: Option<RenderedImage>,
    /// Wall time of the call.
    pub render_time_ms: f64,
    /// Non-fatal conditions met while rendering.
    pub warnings: Vec<Warning>,
    /// Reason of failure when `success` is `false`.
    pub error: Option<String>,
}

/// Composites designs into imported templates.
///
/// One instance owns one CPU backend, one surface pool and one decode cache. Renders take
/// `&mut self`; use one renderer per concurrent job.
pub struct Renderer {
    opts: RendererOpts,
    backend: CpuBackend,
    cache: ImageCache,
}

impl Renderer {
    /// Create a renderer.
    pub fn new(opts: RendererOpts) -> Self {
        let backend = CpuBackend::new(CpuBackendOpts {
            perspective: opts.perspective,
            clear_rgba: opts.clear_rgba,
            paint_cache_capacity: opts.cache_capacity,
            ..CpuBackendOpts::default()
        });
        Self {
            opts,
            backend,
            cache: ImageCache::new(opts.cache_capacity),
        }
    }

    /// Options the renderer was built with.
    pub fn opts(&self) -> &RendererOpts {
        &self.opts
    }

    /// Hit/miss counters of the decode cache.
    pub fn cache_stats(&self) -> ImageCacheStats {
        self.cache.stats()
    }

    /// Number of decoded designs currently cached.
    pub fn cached_images(&self) -> usize {
        self.cache.len()
    }

    /// Decode uncached `sources` in parallel and keep them for later renders.
    #[tracing::instrument(skip_all, fields(sources = sources.len()))]
    pub fn preload(&mut self, sources: &[DesignSource]) -> Vec<Warning> {
        let mut seen = HashSet::new();
        let pending: Vec<(ContentKey, &DesignSource)> = sources
            .iter()
            .map(|s| (s.content_key(), s))
            .filter(|(key, _)| !self.cache.contains(key) && seen.insert(*key))
            .collect();

        let decoded: Vec<_> = pending
            .par_iter()
            .map(|(key, source)| (*key, source.decode()))
            .collect();

        let mut warnings = Vec::new();
        for (key, res) in decoded {
            match res {
                Ok(img) => self.cache.insert(key, img),
                Err(e) => {
                    let w =
                        Warning::new(WarningKind::DecodeFailure, format!("preload failed: {e}"));
                    tracing::warn!(kind = ?w.kind, "{}", w.message);
                    warnings.push(w);
                }
            }
        }
        tracing::debug!(
            decoded = pending.len(),
            cached = self.cache.len(),
            "preload finished"
        );
        warnings
    }

    /// Composite `designs` into `template`.
    ///
    /// Never panics on bad input: fatal problems come back as `success = false` with `error`
    /// set, everything else as `warnings`.
    #[tracing::instrument(
        skip_all,
        fields(template = %template.name, designs = designs.len(), scale = opts.scale)
    )]
    pub fn render(
        &mut self,
        template: &MockupTemplate,
        designs: &[DesignInput],
        snapshots: &RasterSnapshots,
        opts: &RenderOpts,
    ) -> RenderResult {
        let started = Instant::now();
        let mut warnings = Vec::new();
        let outcome = self.render_inner(template, designs, snapshots, opts, &mut warnings);
        let render_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(image) => RenderResult {
                success: true,
                image: Some(image),
                render_time_ms,
                warnings,
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "render failed");
                RenderResult {
                    success: false,
                    image: None,
                    render_time_ms,
                    warnings,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn render_inner(
        &mut self,
        template: &MockupTemplate,
        designs: &[DesignInput],
        snapshots: &RasterSnapshots,
        opts: &RenderOpts,
        warnings: &mut Vec<Warning>,
    ) -> MockupResult<RenderedImage> {
        let (plan, plan_warnings) = compile_plan(template, designs, snapshots);
        warnings.extend(plan_warnings);

        let mut decoded: Vec<Option<PreparedImage>> = vec![None; designs.len()];
        let mut attempted = vec![false; designs.len()];
        for op in &plan.ops {
            let PlanOp::DrawDesign { draw, .. } = op else {
                continue;
            };
            let Some(input) = designs.get(draw.design) else {
                continue;
            };
            if std::mem::replace(&mut attempted[draw.design], true) {
                continue;
            }
            match self.decode_cached(&input.source) {
                Ok(img) => decoded[draw.design] = Some(img),
                Err(e) => {
                    let w = Warning::for_layer(
                        WarningKind::DecodeFailure,
                        draw.area,
                        format!("design for '{}' cannot be decoded: {e}", input.target_id),
                    );
                    tracing::warn!(kind = ?w.kind, layer = %draw.area, "{}", w.message);
                    warnings.push(w);
                }
            }
        }

        let inputs = PlanInputs {
            snapshots,
            designs: &decoded,
        };
        let executed = execute_plan(&mut self.backend, &plan, opts.scale, inputs);
        warnings.extend(self.backend.take_warnings());
        let surface = executed?;

        match opts.output {
            OutputKind::Surface => Ok(RenderedImage::Surface(surface)),
            OutputKind::Encoded { format, quality } => Ok(RenderedImage::Encoded {
                format,
                bytes: encode_surface(&surface, format, quality)?,
            }),
        }
    }

    fn decode_cached(&mut self, source: &DesignSource) -> MockupResult<PreparedImage> {
        let key = source.content_key();
        if let Some(img) = self.cache.get(&key) {
            return Ok(img);
        }
        tracing::debug!(key = key.hash(), "design cache miss");
        let img = source.decode()?;
        self.cache.insert(key, img.clone());
        Ok(img)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RendererOpts::default())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
