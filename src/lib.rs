//! Mockup is a perspective compositing engine for layered design templates.
//!
//! The public API has two stages:
//!
//! - Import a layered PSD/PSB document with [`parse_layered_scene`] into a [`MockupTemplate`]
//!   plus per-layer [`RasterSnapshots`]
//! - Create a [`Renderer`] and [`Renderer::render`] user designs into the template's
//!   smart-object quads, getting back a [`Surface`] or encoded PNG/JPEG bytes
//!
//! Conditions that spoil one layer or area are reported as [`Warning`]s; only conditions that
//! make a whole stage unusable fail it.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod assets;
mod foundation;

pub(crate) mod compile;
pub(crate) mod geometry;
pub(crate) mod import;
pub(crate) mod render;
pub(crate) mod scene;

pub use crate::foundation::core::{
    Affine, BezPath, Bounds, Canvas, Point, Rect, Rgba8Premul, Size, Vec2,
};
pub use crate::foundation::error::{Degenerate, MockupError, MockupResult, Warning, WarningKind};

pub use crate::assets::cache::ImageCacheStats;
pub use crate::assets::decode::{decode_base64, decode_image, prepare_straight_rgba};
pub use crate::assets::store::{ContentKey, PreparedImage};
pub use crate::compile::{
    DesignDraw, DesignInput, DesignSource, FitMode, LayerPaint, PlanOp, RenderPlan,
    RenderStrategy, compile_plan,
};
pub use crate::geometry::affine::triangle_affine;
pub use crate::geometry::homography::{
    Matrix3, quad_to_quad_matrix, rect_to_quad_matrix, unit_square_to_quad,
};
pub use crate::geometry::quad::Quad;
pub use crate::import::importer::{ImportOpts, ImportResult, parse_layered_scene};
pub use crate::render::backend::{PlanBackend, PlanInputs, Surface, execute_plan};
pub use crate::render::output::{
    DEFAULT_JPEG_QUALITY, ImageFormat, OutputKind, encode_surface, surface_to_straight_rgba,
};
pub use crate::render::perspective::{DEFAULT_SUBDIVISIONS, MAX_SUBDIVISIONS, PerspectiveMode};
pub use crate::render::renderer::{
    DEFAULT_CACHE_CAPACITY, RenderOpts, RenderResult, RenderedImage, Renderer, RendererOpts,
};
pub use crate::scene::model::{
    BlendMode, LayerCommon, LayerId, Mask, MockupTemplate, Placement, RenderLayer,
    RenderLayerHints, SmartObjectInfo, collect_insert_areas,
};
pub use crate::scene::snapshot::{MaskRaster, RasterSnapshots};
