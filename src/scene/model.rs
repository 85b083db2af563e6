use serde::{Deserialize, Serialize};

use crate::foundation::core::{Bounds, Canvas, Size};
use crate::foundation::error::{MockupError, MockupResult};
use crate::geometry::quad::Quad;

/// Stable layer identifier inside one template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u32);

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-layer rule for combining a layer's color with the content beneath it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// Group children composite directly into the parent (groups only).
    PassThrough,
    /// Source over.
    #[default]
    Normal,
    /// Product of both colors; never lighter.
    Multiply,
    /// Inverted product of the inverses; never darker.
    Screen,
    /// Multiply or screen, chosen by the backdrop.
    Overlay,
    /// Per-channel minimum.
    Darken,
    /// Per-channel maximum.
    Lighten,
    /// Brighten the backdrop by the source.
    ColorDodge,
    /// Darken the backdrop by the source.
    ColorBurn,
    /// Sum, clamped (Photoshop "add").
    LinearDodge,
    /// Sum minus one, clamped.
    LinearBurn,
    /// Gentle overlay.
    SoftLight,
    /// Multiply or screen, chosen by the source.
    HardLight,
    /// Absolute difference.
    Difference,
    /// Difference with lower contrast.
    Exclusion,
    /// Backdrop minus source, clamped.
    Subtract,
    /// Backdrop divided by source, clamped.
    Divide,
}

/// Grayscale raster gating the visibility of the layer it is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mask {
    /// Scene-space area covered by the mask raster.
    pub bounds: Bounds,
    /// Intensity used outside `bounds` (0 hides, 255 shows).
    pub default_color: u8,
    /// Key of the raster in [`crate::RasterSnapshots::masks`]: the layer that owns the mask.
    pub image_ref: LayerId,
}

/// Fields shared by every layer variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerCommon {
    /// Layer id.
    pub id: LayerId,
    /// Display name.
    pub name: String,
    /// Pixel bounds in scene space.
    pub bounds: Bounds,
    /// Draw order among siblings; lower paints first.
    pub z_index: i32,
    /// Invisible layers are skipped together with their subtree.
    pub visible: bool,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Blend mode.
    pub blend_mode: BlendMode,
    /// Clip to the alpha of the nearest non-clipping sibling below.
    pub clips_to_parent: bool,
    /// Own layer mask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Mask>,
}

impl LayerCommon {
    /// Visible, opaque, normal-blend layer with no mask.
    pub fn new(id: LayerId, name: impl Into<String>, bounds: Bounds, z_index: i32) -> Self {
        Self {
            id,
            name: name.into(),
            bounds,
            z_index,
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            clips_to_parent: false,
            mask: None,
        }
    }

    /// Set the opacity, clamped to `[0, 1]`.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Set the blend mode.
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// Set visibility.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set the clipping flag.
    pub fn with_clips_to_parent(mut self, clips: bool) -> Self {
        self.clips_to_parent = clips;
        self
    }

    /// Attach a mask.
    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Placement data of a smart object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Destination quad in scene space.
    pub perspective_quad: Quad,
    /// Size of the placed content before transformation; zero when unknown.
    pub placed_size: Size,
}

/// One node of the layer tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderLayer {
    /// Container whose children are ordered by `z_index`.
    Group {
        /// Shared fields.
        #[serde(flatten)]
        common: LayerCommon,
        /// Child layers.
        children: Vec<RenderLayer>,
    },
    /// Placeholder for externally supplied content.
    SmartObject {
        /// Shared fields.
        #[serde(flatten)]
        common: LayerCommon,
        /// Where the supplied content lands.
        #[serde(flatten)]
        placement: Placement,
    },
    /// Pixel layer.
    RasterImage {
        /// Shared fields.
        #[serde(flatten)]
        common: LayerCommon,
    },
    /// Flat color fill over the layer bounds.
    SolidColor {
        /// Shared fields.
        #[serde(flatten)]
        common: LayerCommon,
        /// Straight-alpha RGB fill.
        color: [u8; 3],
    },
    /// Vector or gradient/pattern fill, drawn from its raster snapshot.
    Shape {
        /// Shared fields.
        #[serde(flatten)]
        common: LayerCommon,
    },
    /// Adjustment layer; recorded but not applied.
    Adjustment {
        /// Shared fields.
        #[serde(flatten)]
        common: LayerCommon,
        /// Source key naming the adjustment kind.
        kind: String,
    },
}

impl RenderLayer {
    /// Shared fields.
    pub fn common(&self) -> &LayerCommon {
        match self {
            Self::Group { common, .. }
            | Self::SmartObject { common, .. }
            | Self::RasterImage { common }
            | Self::SolidColor { common, .. }
            | Self::Shape { common }
            | Self::Adjustment { common, .. } => common,
        }
    }

    /// Shared fields, mutably.
    pub fn common_mut(&mut self) -> &mut LayerCommon {
        match self {
            Self::Group { common, .. }
            | Self::SmartObject { common, .. }
            | Self::RasterImage { common }
            | Self::SolidColor { common, .. }
            | Self::Shape { common }
            | Self::Adjustment { common, .. } => common,
        }
    }

    /// Layer id.
    pub fn id(&self) -> LayerId {
        self.common().id
    }

    /// Layer name.
    pub fn name(&self) -> &str {
        &self.common().name
    }

    /// Own mask, on any variant.
    pub fn mask(&self) -> Option<&Mask> {
        self.common().mask.as_ref()
    }

    /// Children of a group; empty for leaves.
    pub fn children(&self) -> &[RenderLayer] {
        match self {
            Self::Group { children, .. } => children,
            _ => &[],
        }
    }

    /// Short variant name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Group { .. } => "group",
            Self::SmartObject { .. } => "smart-object",
            Self::RasterImage { .. } => "raster",
            Self::SolidColor { .. } => "solid-color",
            Self::Shape { .. } => "shape",
            Self::Adjustment { .. } => "adjustment",
        }
    }
}

/// Flattened view of one smart object, with the inherited mask resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartObjectInfo {
    /// Smart-object layer id.
    pub id: LayerId,
    /// Layer name.
    pub name: String,
    /// Layer bounds.
    pub bounds: Bounds,
    /// Destination quad.
    pub quad: Quad,
    /// Placed content size.
    pub placed_size: Size,
    /// Own mask, or the nearest masked ancestor group's mask.
    pub mask: Option<Mask>,
    /// `true` when `mask` came from an ancestor group.
    pub mask_inherited: bool,
    /// Own opacity.
    pub opacity: f32,
    /// Own blend mode.
    pub blend_mode: BlendMode,
    /// Effective visibility (false when the layer or any ancestor is hidden).
    pub visible: bool,
}

/// Fast-path hint naming the flattened base and overlay layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderLayerHints {
    /// Layer containing everything beneath the insertion areas.
    pub base_layer_id: Option<LayerId>,
    /// Layer containing everything above the insertion areas.
    pub overlay_layer_id: Option<LayerId>,
}

/// Root aggregate of an imported scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockupTemplate {
    /// Template name.
    pub name: String,
    /// Free-form category.
    pub category: String,
    /// Canvas size.
    pub canvas: Canvas,
    /// Top-level layers.
    pub layers: Vec<RenderLayer>,
    /// Every smart object in the tree, in tree order.
    pub insert_areas: Vec<SmartObjectInfo>,
    /// Sandwich fast-path hint.
    #[serde(default)]
    pub render_layers: RenderLayerHints,
}

impl MockupTemplate {
    /// Build a template and derive `insert_areas` from the tree.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        canvas: Canvas,
        layers: Vec<RenderLayer>,
    ) -> Self {
        let insert_areas = collect_insert_areas(&layers);
        Self {
            name: name.into(),
            category: category.into(),
            canvas,
            layers,
            insert_areas,
            render_layers: RenderLayerHints::default(),
        }
    }

    /// Set the fast-path hint.
    pub fn with_render_layers(mut self, hints: RenderLayerHints) -> Self {
        self.render_layers = hints;
        self
    }

    /// Depth-first lookup by id.
    pub fn find_layer(&self, id: LayerId) -> Option<&RenderLayer> {
        fn walk(layers: &[RenderLayer], id: LayerId) -> Option<&RenderLayer> {
            for l in layers {
                if l.id() == id {
                    return Some(l);
                }
                if let Some(found) = walk(l.children(), id) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.layers, id)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> MockupResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MockupError::serde(e.to_string()))
    }

    /// Parse a template previously written by [`MockupTemplate::to_json`].
    pub fn from_json(s: &str) -> MockupResult<Self> {
        serde_json::from_str(s).map_err(|e| MockupError::serde(e.to_string()))
    }
}

/// Flatten every smart object in the tree, resolving group-mask inheritance.
///
/// While descending into a masked group its mask becomes the ambient mask; a smart object
/// without its own mask takes the nearest ambient one.
pub fn collect_insert_areas(layers: &[RenderLayer]) -> Vec<SmartObjectInfo> {
    fn walk(
        layers: &[RenderLayer],
        ambient: Option<Mask>,
        parent_visible: bool,
        out: &mut Vec<SmartObjectInfo>,
    ) {
        for layer in layers {
            let common = layer.common();
            let visible = parent_visible && common.visible;
            match layer {
                RenderLayer::Group { children, .. } => {
                    let next = common.mask.or(ambient);
                    walk(children, next, visible, out);
                }
                RenderLayer::SmartObject { placement, .. } => {
                    let (mask, mask_inherited) = match (common.mask, ambient) {
                        (Some(own), _) => (Some(own), false),
                        (None, Some(inherited)) => (Some(inherited), true),
                        (None, None) => (None, false),
                    };
                    out.push(SmartObjectInfo {
                        id: common.id,
                        name: common.name.clone(),
                        bounds: common.bounds,
                        quad: placement.perspective_quad,
                        placed_size: placement.placed_size,
                        mask,
                        mask_inherited,
                        opacity: common.opacity,
                        blend_mode: common.blend_mode,
                        visible,
                    });
                }
                _ => {}
            }
        }
    }

    let mut out = Vec::new();
    walk(layers, None, true, &mut out);
    out
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
