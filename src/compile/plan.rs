use crate::compile::design::{DesignInput, FitMode, resolve_design};
use crate::foundation::core::{Bounds, Canvas, Size};
use crate::foundation::error::{Warning, WarningKind, Warnings};
use crate::geometry::quad::Quad;
use crate::scene::model::{BlendMode, LayerId, Mask, MockupTemplate, RenderLayer};
use crate::scene::snapshot::RasterSnapshots;

/// Backend-agnostic draw list for one render call.
///
/// Coordinates are in scene space; backends apply the output scale.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderPlan {
    /// Scene canvas.
    pub canvas: Canvas,
    /// Strategy the plan was compiled with.
    pub strategy: RenderStrategy,
    /// Ops in paint order.
    pub ops: Vec<PlanOp>,
}

/// Compositing strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Base raster, then insertion areas, then overlay raster.
    Sandwich,
    /// Full layer-tree traversal.
    Recursive,
}

/// How a drawn layer (or isolated group) is merged into its parent surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerPaint {
    /// Opacity in `[0, 1]`, already multiplied by pass-through ancestors.
    pub opacity: f32,
    /// Blend mode; [`BlendMode::PassThrough`] only appears on non-isolated groups.
    pub blend: BlendMode,
    /// Mask applied before merging.
    pub mask: Option<Mask>,
    /// Merge with source-atop so the parent's alpha is preserved (clipping masks).
    pub clipped: bool,
}

impl Default for LayerPaint {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            blend: BlendMode::Normal,
            mask: None,
            clipped: false,
        }
    }
}

/// Perspective placement of one design.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DesignDraw {
    /// Insertion area being filled.
    pub area: LayerId,
    /// Index into the render call's design list.
    pub design: usize,
    /// Fit mode of the design.
    pub fit: FitMode,
    /// Destination quad.
    pub quad: Quad,
    /// Placed content size (aspect for `Contain`/`Cover`).
    pub placed_size: Size,
}

/// One step of a [`RenderPlan`].
#[derive(Clone, Debug, PartialEq)]
pub enum PlanOp {
    /// Start an isolated group surface.
    PushGroup {
        /// Group (or clipping base) layer.
        layer: LayerId,
        /// Merge parameters used at the matching [`PlanOp::PopGroup`].
        paint: LayerPaint,
    },
    /// Merge the innermost group surface into its parent.
    PopGroup {
        /// Layer of the matching [`PlanOp::PushGroup`].
        layer: LayerId,
    },
    /// Draw a layer's raster snapshot with its top-left corner at `bounds`.
    DrawRaster {
        /// Layer whose snapshot is drawn.
        layer: LayerId,
        /// Layer bounds.
        bounds: Bounds,
        /// Merge parameters.
        paint: LayerPaint,
    },
    /// Fill `bounds` (the whole canvas when empty) with a straight-alpha RGB color.
    FillColor {
        /// Fill layer.
        layer: LayerId,
        /// Fill area.
        bounds: Bounds,
        /// Fill color.
        color: [u8; 3],
        /// Merge parameters.
        paint: LayerPaint,
    },
    /// Perspective-draw a design into an insertion area.
    DrawDesign {
        /// Placement.
        draw: DesignDraw,
        /// Merge parameters.
        paint: LayerPaint,
    },
}

impl PlanOp {
    /// Layer the op belongs to.
    pub fn layer(&self) -> LayerId {
        match self {
            Self::PushGroup { layer, .. }
            | Self::PopGroup { layer }
            | Self::DrawRaster { layer, .. }
            | Self::FillColor { layer, .. } => *layer,
            Self::DrawDesign { draw, .. } => draw.area,
        }
    }
}

/// Compile `template` into a draw list and collect the warnings found on the way.
///
/// The sandwich strategy is chosen only when both hinted layers have a raster snapshot.
#[tracing::instrument(skip_all, fields(template = %template.name, designs = designs.len()))]
pub fn compile_plan(
    template: &MockupTemplate,
    designs: &[DesignInput],
    snapshots: &RasterSnapshots,
) -> (RenderPlan, Vec<Warning>) {
    let mut warnings = Warnings::new();
    let hints = template.render_layers;
    let sandwich = match (hints.base_layer_id, hints.overlay_layer_id) {
        (Some(base), Some(overlay)) => {
            snapshots.layer(base).is_some() && snapshots.layer(overlay).is_some()
        }
        _ => false,
    };

    let mut c = Compiler {
        designs,
        snapshots,
        area_count: template.insert_areas.len(),
        ops: Vec::new(),
        warnings: &mut warnings,
        adjustments: 0,
    };

    let strategy = if sandwich {
        tracing::debug!("compiling sandwich plan");
        c.sandwich(template);
        RenderStrategy::Sandwich
    } else {
        tracing::debug!("compiling recursive plan");
        c.siblings(&template.layers, 1.0);
        RenderStrategy::Recursive
    };

    let (ops, adjustments) = (c.ops, c.adjustments);
    if adjustments > 0 {
        warnings.push(Warning::new(
            WarningKind::UnsupportedFeature,
            format!("{adjustments} adjustment layer(s) are not applied"),
        ));
    }

    (
        RenderPlan {
            canvas: template.canvas,
            strategy,
            ops,
        },
        warnings.into_vec(),
    )
}

struct Compiler<'a> {
    designs: &'a [DesignInput],
    snapshots: &'a RasterSnapshots,
    area_count: usize,
    ops: Vec<PlanOp>,
    warnings: &'a mut Warnings,
    adjustments: usize,
}

impl Compiler<'_> {
    fn sandwich(&mut self, template: &MockupTemplate) {
        let hints = template.render_layers;
        if let Some(base) = hints.base_layer_id.and_then(|id| template.find_layer(id)) {
            self.raster(base, own_paint(base, 1.0, false));
        }

        for area in template.insert_areas.iter().filter(|a| a.visible) {
            let paint = LayerPaint {
                opacity: area.opacity,
                blend: leaf_blend(area.blend_mode),
                mask: area.mask,
                clipped: false,
            };
            self.design(area.id, &area.name, (area.quad, area.placed_size), paint);
        }

        if let Some(overlay) = hints.overlay_layer_id.and_then(|id| template.find_layer(id)) {
            self.raster(overlay, own_paint(overlay, 1.0, false));
        }
    }

    /// Emit `layers` in ascending `z_index`, grouping clipping runs with their base.
    fn siblings(&mut self, layers: &[RenderLayer], opacity: f32) {
        let mut sorted: Vec<&RenderLayer> = layers.iter().collect();
        sorted.sort_by_key(|l| l.common().z_index);

        let mut i = 0;
        while i < sorted.len() {
            let base = sorted[i];
            let mut end = i + 1;
            while end < sorted.len() && sorted[end].common().clips_to_parent {
                end += 1;
            }
            let run = &sorted[i + 1..end];
            i = end;

            if !base.common().visible {
                continue;
            }
            let clipped: Vec<&RenderLayer> =
                run.iter().copied().filter(|l| l.common().visible).collect();
            if clipped.is_empty() {
                self.layer(base, own_paint(base, opacity, false));
                continue;
            }

            // The run is isolated and merged with the base's blend and opacity.
            let group_paint = LayerPaint {
                opacity: base.common().opacity * opacity,
                blend: leaf_blend(base.common().blend_mode),
                mask: None,
                clipped: false,
            };
            self.ops.push(PlanOp::PushGroup {
                layer: base.id(),
                paint: group_paint,
            });
            let base_blend = match base.common().blend_mode {
                BlendMode::PassThrough => BlendMode::PassThrough,
                _ => BlendMode::Normal,
            };
            self.layer(
                base,
                LayerPaint {
                    opacity: 1.0,
                    blend: base_blend,
                    mask: base.common().mask,
                    clipped: false,
                },
            );
            for layer in clipped {
                self.layer(layer, own_paint(layer, 1.0, true));
            }
            self.ops.push(PlanOp::PopGroup { layer: base.id() });
        }
    }

    fn layer(&mut self, layer: &RenderLayer, paint: LayerPaint) {
        let common = layer.common();
        match layer {
            RenderLayer::Group { children, .. } => {
                let isolated =
                    paint.blend != BlendMode::PassThrough || paint.mask.is_some() || paint.clipped;
                if isolated {
                    self.ops.push(PlanOp::PushGroup {
                        layer: common.id,
                        paint: LayerPaint {
                            blend: leaf_blend(paint.blend),
                            ..paint
                        },
                    });
                    self.siblings(children, 1.0);
                    self.ops.push(PlanOp::PopGroup { layer: common.id });
                } else {
                    self.siblings(children, paint.opacity);
                }
            }
            RenderLayer::SmartObject { placement, .. } => {
                self.design(
                    common.id,
                    &common.name,
                    (placement.perspective_quad, placement.placed_size),
                    LayerPaint {
                        blend: leaf_blend(paint.blend),
                        ..paint
                    },
                );
            }
            RenderLayer::RasterImage { .. } | RenderLayer::Shape { .. } => {
                self.raster(layer, paint);
            }
            RenderLayer::SolidColor { color, .. } => {
                if self.snapshots.layer(common.id).is_some() && !common.bounds.is_empty() {
                    self.raster(layer, paint);
                } else {
                    self.ops.push(PlanOp::FillColor {
                        layer: common.id,
                        bounds: common.bounds,
                        color: *color,
                        paint: LayerPaint {
                            blend: leaf_blend(paint.blend),
                            ..paint
                        },
                    });
                }
            }
            RenderLayer::Adjustment { .. } => self.adjustments += 1,
        }
    }

    fn raster(&mut self, layer: &RenderLayer, paint: LayerPaint) {
        let id = layer.id();
        if self.snapshots.layer(id).is_none() {
            tracing::debug!(layer = %id, kind = layer.kind_name(), "no raster snapshot; skipped");
            return;
        }
        self.ops.push(PlanOp::DrawRaster {
            layer: id,
            bounds: layer.common().bounds,
            paint: LayerPaint {
                blend: leaf_blend(paint.blend),
                ..paint
            },
        });
    }

    fn design(
        &mut self,
        area: LayerId,
        name: &str,
        (quad, placed_size): (Quad, Size),
        paint: LayerPaint,
    ) {
        let Some(design) = resolve_design(self.designs, area, name, self.area_count) else {
            self.warnings.push(Warning::for_layer(
                WarningKind::DesignUnresolved,
                area,
                format!("no design matches insertion area '{name}'"),
            ));
            return;
        };
        if quad.validate().is_err() {
            self.warnings.push(Warning::for_layer(
                WarningKind::GeometryDegenerate,
                area,
                format!("perspective quad of '{name}' is degenerate"),
            ));
            return;
        }
        self.ops.push(PlanOp::DrawDesign {
            draw: DesignDraw {
                area,
                design,
                fit: self.designs[design].fit,
                quad,
                placed_size,
            },
            paint,
        });
    }
}

fn own_paint(layer: &RenderLayer, opacity: f32, clipped: bool) -> LayerPaint {
    let common = layer.common();
    LayerPaint {
        opacity: common.opacity * opacity,
        blend: common.blend_mode,
        mask: common.mask,
        clipped,
    }
}

fn leaf_blend(blend: BlendMode) -> BlendMode {
    match blend {
        BlendMode::PassThrough => BlendMode::Normal,
        other => other,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/plan.rs"]
mod tests;
