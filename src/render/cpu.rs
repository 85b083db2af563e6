use std::sync::Arc;

use crate::assets::cache::ImageCache;
use crate::assets::store::PreparedImage;
use crate::compile::design::fit_design;
use crate::compile::plan::{DesignDraw, LayerPaint};
use crate::foundation::core::{Affine, BezPath, Bounds, Canvas, Point, Rect, Rgba8Premul};
use crate::foundation::error::{
    Degenerate, MockupError, MockupResult, Warning, WarningKind, Warnings,
};
use crate::geometry::quad::Quad;
use crate::render::backend::{PlanBackend, PlanInputs, Surface};
use crate::render::composite::{MaskChannel, composite_rgba8_premul, mask_apply_rgba8_premul};
use crate::render::mask::mask_coverage;
use crate::render::perspective::{MeshTriangle, PerspectiveMode, Target, draw_mesh, subdivide};
use crate::render::surface_pool::{SurfacePool, SurfacePoolOpts, SurfaceSize};
use crate::scene::model::LayerId;

/// Options for the CPU backend.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CpuBackendOpts {
    pub(crate) perspective: PerspectiveMode,
    pub(crate) clear_rgba: Option<[u8; 4]>,
    pub(crate) paint_cache_capacity: usize,
    pub(crate) pool: SurfacePoolOpts,
}

impl Default for CpuBackendOpts {
    fn default() -> Self {
        Self {
            perspective: PerspectiveMode::default(),
            clear_rgba: None,
            paint_cache_capacity: 64,
            pool: SurfacePoolOpts::default(),
        }
    }
}

struct Frame {
    /// `None` for the root surface.
    layer: Option<LayerId>,
    paint: LayerPaint,
    pixmap: vello_cpu::Pixmap,
}

enum FillPaint {
    Image(vello_cpu::Image),
    Color(vello_cpu::peniko::Color),
}

struct ExecState {
    /// Scene canvas (before scaling).
    canvas: Canvas,
    size: SurfaceSize,
    scale: f64,
    stack: Vec<Frame>,
}

/// `vello_cpu` executor of render plans.
///
/// Every layer renders into a pooled transparent surface which is masked (or clipped to its quad)
/// and then merged into the innermost open group with the layer's blend mode and opacity.
pub(crate) struct CpuBackend {
    opts: CpuBackendOpts,
    pool: SurfacePool,
    ctx: Option<vello_cpu::RenderContext>,
    paints: ImageCache<vello_cpu::Image>,
    coverage: Vec<u8>,
    state: Option<ExecState>,
    warnings: Warnings,
}

impl CpuBackend {
    pub(crate) fn new(opts: CpuBackendOpts) -> Self {
        Self {
            opts,
            pool: SurfacePool::new(opts.pool),
            ctx: None,
            paints: ImageCache::new(opts.paint_cache_capacity),
            coverage: Vec::new(),
            state: None,
            warnings: Warnings::new(),
        }
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> MockupResult<R>,
    ) -> MockupResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }

    fn state_mut(&mut self) -> MockupResult<&mut ExecState> {
        self.state
            .as_mut()
            .ok_or_else(|| MockupError::render("no render in progress"))
    }

    fn warn(&mut self, kind: WarningKind, layer: LayerId, message: String) {
        self.warnings.push(Warning::for_layer(kind, layer, message));
    }

    fn paint_for(&mut self, image: &PreparedImage) -> MockupResult<vello_cpu::Image> {
        if let Some(p) = self.paints.get(&image.key) {
            return Ok(p);
        }
        let pixmap = pixmap_from_premul_bytes(&image.rgba8_premul, image.width, image.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.paints.insert(image.key, paint.clone());
        Ok(paint)
    }

    /// Borrow a transparent surface of the output size.
    fn layer_surface(&mut self) -> MockupResult<(vello_cpu::Pixmap, f64)> {
        let (size, scale) = {
            let s = self.state_mut()?;
            (s.size, s.scale)
        };
        let mut pixmap = self.pool.borrow(size);
        clear_pixmap(&mut pixmap, [0, 0, 0, 0]);
        Ok((pixmap, scale))
    }

    /// Mask `pixmap` (or clip it to `clip`), merge it into the innermost group and recycle it.
    fn merge_layer(
        &mut self,
        mut pixmap: vello_cpu::Pixmap,
        paint: &LayerPaint,
        inputs: PlanInputs<'_>,
        clip: Option<&Quad>,
    ) -> MockupResult<()> {
        let scale = self.state_mut()?.scale;
        let mask = paint.mask.and_then(|m| {
            let raster = inputs.snapshots.mask(m.image_ref);
            if raster.is_none() {
                tracing::debug!(mask = %m.image_ref, "mask raster missing; mask ignored");
            }
            raster
        });

        if let Some(raster) = mask {
            let mut coverage = std::mem::take(&mut self.coverage);
            mask_coverage(
                raster,
                u32::from(pixmap.width()),
                u32::from(pixmap.height()),
                scale,
                &mut coverage,
            );
            let applied = mask_apply_rgba8_premul(
                pixmap.data_as_u8_slice_mut(),
                &coverage,
                MaskChannel::Gray,
            );
            self.coverage = coverage;
            applied?;
        } else if let Some(quad) = clip {
            self.clip_to_quad(&mut pixmap, quad)?;
        }

        let top = self
            .state_mut()?
            .stack
            .last_mut()
            .ok_or_else(|| MockupError::render("surface stack is empty"))?;
        composite_rgba8_premul(
            top.pixmap.data_as_u8_slice_mut(),
            pixmap.data_as_u8_slice(),
            paint.opacity,
            paint.blend,
            paint.clipped,
        )?;
        self.pool.release(pixmap);
        Ok(())
    }

    /// Keep `pixmap` only inside the anti-aliased polygon of `quad`.
    fn clip_to_quad(&mut self, pixmap: &mut vello_cpu::Pixmap, quad: &Quad) -> MockupResult<()> {
        let size = SurfaceSize {
            width: pixmap.width(),
            height: pixmap.height(),
        };
        let mut coverage = self.pool.borrow(size);
        let path = bezpath_to_cpu(&quad.to_path());
        self.with_ctx_mut(size.width, size.height, |_, ctx| {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
            ctx.fill_path(&path);
            ctx.flush();
            ctx.render_to_pixmap(&mut coverage);
            Ok(())
        })?;
        let applied = mask_apply_rgba8_premul(
            pixmap.data_as_u8_slice_mut(),
            coverage.data_as_u8_slice(),
            MaskChannel::Alpha,
        );
        self.pool.release(coverage);
        applied
    }

    fn fill_rect_scaled(
        &mut self,
        pixmap: &mut vello_cpu::Pixmap,
        transform: Affine,
        rect: vello_cpu::kurbo::Rect,
        paint: FillPaint,
    ) -> MockupResult<()> {
        let (w, h) = (pixmap.width(), pixmap.height());
        self.with_ctx_mut(w, h, |_, ctx| {
            ctx.set_transform(affine_to_cpu(transform));
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            match paint {
                FillPaint::Image(image) => ctx.set_paint(image),
                FillPaint::Color(color) => ctx.set_paint(color),
            }
            ctx.fill_rect(&rect);
            ctx.flush();
            ctx.render_to_pixmap(pixmap);
            Ok(())
        })
    }

    /// Warp `image` onto `dst` in output space with the configured perspective mode.
    ///
    /// The inner result is the number of cell triangles left blank, or [`Degenerate`] when
    /// nothing could be drawn.
    fn draw_warped(
        &mut self,
        pixmap: &mut vello_cpu::Pixmap,
        image: &PreparedImage,
        src: Rect,
        dst: &Quad,
    ) -> MockupResult<Result<usize, Degenerate>> {
        match self.opts.perspective {
            PerspectiveMode::Mesh => {
                let (width, height) = (u32::from(pixmap.width()), u32::from(pixmap.height()));
                let mut target = Target {
                    data: pixmap.data_as_u8_slice_mut(),
                    width,
                    height,
                };
                Ok(draw_mesh(&mut target, image, src, dst).map(|pixels| {
                    tracing::debug!(pixels, "design drawn");
                    0
                }))
            }
            PerspectiveMode::Subdivide { grid } => {
                let mesh = match subdivide(src, dst, grid) {
                    Ok(mesh) => mesh,
                    Err(e) => return Ok(Err(e)),
                };
                self.fill_triangles(pixmap, image, &mesh.triangles)?;
                tracing::debug!(triangles = mesh.triangles.len(), "design drawn");
                Ok(Ok(mesh.skipped))
            }
        }
    }

    /// Fill every triangle with the whole design placed by the triangle's paint transform.
    fn fill_triangles(
        &mut self,
        pixmap: &mut vello_cpu::Pixmap,
        image: &PreparedImage,
        triangles: &[MeshTriangle],
    ) -> MockupResult<()> {
        let paint = self.paint_for(image)?;
        let (w, h) = (pixmap.width(), pixmap.height());
        self.with_ctx_mut(w, h, |_, ctx| {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(paint);
            for tri in triangles {
                let mut path = vello_cpu::kurbo::BezPath::new();
                path.move_to(point_to_cpu(tri.dst[0]));
                path.line_to(point_to_cpu(tri.dst[1]));
                path.line_to(point_to_cpu(tri.dst[2]));
                path.close_path();
                ctx.set_paint_transform(affine_to_cpu(tri.paint_transform));
                ctx.fill_path(&path);
            }
            ctx.flush();
            ctx.render_to_pixmap(pixmap);
            Ok(())
        })
    }

    fn release_state(&mut self) {
        if let Some(state) = self.state.take() {
            for frame in state.stack {
                self.pool.release(frame.pixmap);
            }
        }
    }
}

impl PlanBackend for CpuBackend {
    fn begin(&mut self, canvas: Canvas, scale: f64) -> MockupResult<()> {
        self.release_state();
        self.warnings = Warnings::new();

        let out = canvas.scaled(scale)?;
        let size = SurfaceSize::new(out.width, out.height)?;
        let mut root = self.pool.borrow(size);
        let clear = self
            .opts
            .clear_rgba
            .map(|[r, g, b, a]| Rgba8Premul::from_straight_rgba(r, g, b, a).to_array())
            .unwrap_or([0, 0, 0, 0]);
        clear_pixmap(&mut root, clear);

        self.state = Some(ExecState {
            canvas,
            size,
            scale,
            stack: vec![Frame {
                layer: None,
                paint: LayerPaint::default(),
                pixmap: root,
            }],
        });
        Ok(())
    }

    fn push_group(&mut self, layer: LayerId, paint: &LayerPaint) -> MockupResult<()> {
        let (pixmap, _) = self.layer_surface()?;
        self.state_mut()?.stack.push(Frame {
            layer: Some(layer),
            paint: *paint,
            pixmap,
        });
        Ok(())
    }

    fn pop_group(&mut self, layer: LayerId, inputs: PlanInputs<'_>) -> MockupResult<()> {
        let state = self.state_mut()?;
        if state.stack.len() <= 1 || state.stack.last().and_then(|f| f.layer) != Some(layer) {
            return Err(MockupError::render(format!(
                "group {layer} popped without a matching push"
            )));
        }
        let frame = state
            .stack
            .pop()
            .ok_or_else(|| MockupError::render("surface stack is empty"))?;
        self.merge_layer(frame.pixmap, &frame.paint, inputs, None)
    }

    fn draw_raster(
        &mut self,
        layer: LayerId,
        bounds: Bounds,
        paint: &LayerPaint,
        inputs: PlanInputs<'_>,
    ) -> MockupResult<()> {
        let Some(image) = inputs.snapshots.layer(layer) else {
            return Ok(());
        };
        let image_paint = self.paint_for(image)?;
        let (mut pixmap, scale) = self.layer_surface()?;
        let transform = Affine::scale(scale)
            * Affine::translate((f64::from(bounds.left), f64::from(bounds.top)));
        let rect = vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(image.width),
            f64::from(image.height),
        );
        self.fill_rect_scaled(&mut pixmap, transform, rect, FillPaint::Image(image_paint))?;
        self.merge_layer(pixmap, paint, inputs, None)
    }

    fn fill_color(
        &mut self,
        _layer: LayerId,
        bounds: Bounds,
        color: [u8; 3],
        paint: &LayerPaint,
        inputs: PlanInputs<'_>,
    ) -> MockupResult<()> {
        let (mut pixmap, scale) = self.layer_surface()?;
        let area = if bounds.is_empty() {
            self.state_mut()?.canvas.rect()
        } else {
            bounds.to_rect()
        };
        let rect = vello_cpu::kurbo::Rect::new(area.x0, area.y0, area.x1, area.y1);
        let [r, g, b] = color;
        let fill = FillPaint::Color(vello_cpu::peniko::Color::from_rgba8(r, g, b, 255));
        self.fill_rect_scaled(&mut pixmap, Affine::scale(scale), rect, fill)?;
        self.merge_layer(pixmap, paint, inputs, None)
    }

    #[tracing::instrument(skip_all, fields(area = %draw.area, design = draw.design))]
    fn draw_design(
        &mut self,
        draw: &DesignDraw,
        paint: &LayerPaint,
        inputs: PlanInputs<'_>,
    ) -> MockupResult<()> {
        let Some(image) = inputs.designs.get(draw.design).and_then(Option::as_ref) else {
            return Ok(());
        };
        let Ok(placement) = fit_design(
            draw.fit,
            image.width,
            image.height,
            &draw.quad,
            draw.placed_size,
        ) else {
            self.warn(
                WarningKind::GeometryDegenerate,
                draw.area,
                "design cannot be fitted into its area".to_string(),
            );
            return Ok(());
        };

        let (mut pixmap, scale) = self.layer_surface()?;
        let dst = placement.dst.map(|p| Point::new(p.x * scale, p.y * scale));
        let drawn = match self.draw_warped(&mut pixmap, image, placement.src, &dst) {
            Ok(drawn) => drawn,
            Err(e) => {
                self.pool.release(pixmap);
                return Err(e);
            }
        };

        match drawn {
            Ok(skipped) => {
                if skipped > 0 {
                    self.warn(
                        WarningKind::GeometryDegenerate,
                        draw.area,
                        format!("{skipped} degenerate triangle(s) left blank"),
                    );
                }
                self.merge_layer(pixmap, paint, inputs, Some(&dst))
            }
            Err(_) => {
                self.pool.release(pixmap);
                self.warn(
                    WarningKind::GeometryDegenerate,
                    draw.area,
                    "destination quad degenerates at output scale".to_string(),
                );
                Ok(())
            }
        }
    }

    fn finish(&mut self) -> MockupResult<Surface> {
        let unbalanced = self.state.as_ref().is_some_and(|s| s.stack.len() != 1);
        if unbalanced {
            self.release_state();
            return Err(MockupError::render("plan left groups open"));
        }
        let mut state = self
            .state
            .take()
            .ok_or_else(|| MockupError::render("no render in progress"))?;
        let root = state
            .stack
            .pop()
            .ok_or_else(|| MockupError::render("surface stack is empty"))?;
        let surface = Surface {
            width: u32::from(state.size.width),
            height: u32::from(state.size.height),
            data: root.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        };
        self.pool.release(root.pixmap);
        let pool = self.pool.stats();
        tracing::debug!(
            retained = pool.retained_surfaces,
            retained_bytes = pool.retained_bytes,
            allocated = pool.alloc_surfaces,
            dropped = pool.dropped_on_release,
            "surface pool"
        );
        Ok(surface)
    }

    fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings).into_vec()
    }
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    for px in pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn pixmap_from_premul_bytes(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> MockupResult<vello_cpu::Pixmap> {
    let size = SurfaceSize::new(width, height)?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(MockupError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let pixels: Vec<_> = rgba8_premul
        .chunks_exact(4)
        .map(|px| {
            may_have_opacities |= px[3] != 255;
            vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
        })
        .collect();

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        size.width,
        size.height,
        may_have_opacities,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
