//! Template-to-plan compilation: design resolution, fit and draw ordering.

pub(crate) mod design;
pub(crate) mod plan;

pub use design::{DesignInput, DesignSource, FitMode};
pub use plan::{DesignDraw, LayerPaint, PlanOp, RenderPlan, RenderStrategy, compile_plan};
