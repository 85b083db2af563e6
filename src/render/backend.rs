use crate::assets::store::PreparedImage;
use crate::compile::plan::{DesignDraw, LayerPaint, PlanOp, RenderPlan};
use crate::foundation::core::{Bounds, Canvas};
use crate::foundation::error::{MockupResult, Warning};
use crate::scene::model::LayerId;
use crate::scene::snapshot::RasterSnapshots;

/// A finished composite as RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha (always `true` for renderer output).
    pub premultiplied: bool,
}

impl Surface {
    /// RGBA8 at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }
}

/// Pixel inputs a plan refers to.
#[derive(Clone, Copy)]
pub struct PlanInputs<'a> {
    /// Layer and mask rasters from import.
    pub snapshots: &'a RasterSnapshots,
    /// Decoded designs by index; `None` marks a design that failed to decode.
    pub designs: &'a [Option<PreparedImage>],
}

/// A rasterizer that can execute a compiled [`RenderPlan`].
pub trait PlanBackend {
    /// Start a composite of `canvas` scaled by `scale`.
    fn begin(&mut self, canvas: Canvas, scale: f64) -> MockupResult<()>;

    /// Open an isolated group surface.
    fn push_group(&mut self, layer: LayerId, paint: &LayerPaint) -> MockupResult<()>;

    /// Merge the innermost group surface into its parent.
    fn pop_group(&mut self, layer: LayerId, inputs: PlanInputs<'_>) -> MockupResult<()>;

    /// Draw a layer snapshot at `bounds`.
    fn draw_raster(
        &mut self,
        layer: LayerId,
        bounds: Bounds,
        paint: &LayerPaint,
        inputs: PlanInputs<'_>,
    ) -> MockupResult<()>;

    /// Fill `bounds` (whole canvas when empty) with a color.
    fn fill_color(
        &mut self,
        layer: LayerId,
        bounds: Bounds,
        color: [u8; 3],
        paint: &LayerPaint,
        inputs: PlanInputs<'_>,
    ) -> MockupResult<()>;

    /// Perspective-draw a design.
    fn draw_design(
        &mut self,
        draw: &DesignDraw,
        paint: &LayerPaint,
        inputs: PlanInputs<'_>,
    ) -> MockupResult<()>;

    /// Read back the finished composite.
    fn finish(&mut self) -> MockupResult<Surface>;

    /// Drain non-fatal conditions met while drawing.
    fn take_warnings(&mut self) -> Vec<Warning> {
        Vec::new()
    }
}

/// Execute `plan` on `backend` and read back the composite.
pub fn execute_plan<B: PlanBackend + ?Sized>(
    backend: &mut B,
    plan: &RenderPlan,
    scale: f64,
    inputs: PlanInputs<'_>,
) -> MockupResult<Surface> {
    backend.begin(plan.canvas, scale)?;

    for op in &plan.ops {
        match op {
            PlanOp::PushGroup { layer, paint } => backend.push_group(*layer, paint)?,
            PlanOp::PopGroup { layer } => backend.pop_group(*layer, inputs)?,
            PlanOp::DrawRaster {
                layer,
                bounds,
                paint,
            } => backend.draw_raster(*layer, *bounds, paint, inputs)?,
            PlanOp::FillColor {
                layer,
                bounds,
                color,
                paint,
            } => backend.fill_color(*layer, *bounds, *color, paint, inputs)?,
            PlanOp::DrawDesign { draw, paint } => backend.draw_design(draw, paint, inputs)?,
        }
    }

    backend.finish()
}

#[cfg(test)]
#[path = "../../tests/unit/render/backend.rs"]
mod tests;
