use super::*;
use crate::assets::store::PreparedImage;
use crate::compile::design::DesignSource;
use crate::foundation::core::{Point, Rect};
use crate::scene::model::{LayerCommon, Placement, RenderLayerHints};

fn common(id: u32, z: i32) -> LayerCommon {
    LayerCommon::new(
        LayerId(id),
        format!("layer {id}"),
        Bounds::new(0, 0, 4, 4),
        z,
    )
}

fn raster(id: u32, z: i32) -> RenderLayer {
    RenderLayer::RasterImage {
        common: common(id, z),
    }
}

fn group(id: u32, z: i32, children: Vec<RenderLayer>) -> RenderLayer {
    RenderLayer::Group {
        common: common(id, z).with_blend_mode(BlendMode::PassThrough),
        children,
    }
}

fn smart(id: u32, z: i32, name: &str) -> RenderLayer {
    let mut c = common(id, z);
    c.name = name.to_string();
    RenderLayer::SmartObject {
        common: c,
        placement: Placement {
            perspective_quad: Quad::from_rect(Rect::new(1.0, 1.0, 3.0, 3.0)),
            placed_size: Size::new(2.0, 2.0),
        },
    }
}

fn snapshots_for(ids: &[u32]) -> RasterSnapshots {
    let mut s = RasterSnapshots::new();
    for &id in ids {
        let img = PreparedImage::from_premul(4, 4, vec![255; 64]).unwrap();
        s.layers.insert(LayerId(id), img);
    }
    s
}

fn canvas() -> Canvas {
    Canvas::new(4, 4).unwrap()
}

fn design(target: &str) -> DesignInput {
    DesignInput::new(
        target,
        DesignSource::Rgba {
            width: 1,
            height: 1,
            data: vec![0, 0, 255, 255],
        },
    )
}

fn layer_order(plan: &RenderPlan) -> Vec<u32> {
    plan.ops
        .iter()
        .filter(|op| !matches!(op, PlanOp::PopGroup { .. }))
        .map(|op| op.layer().0)
        .collect()
}

fn set_common(layer: &mut RenderLayer, f: impl FnOnce(&mut LayerCommon)) {
    f(layer.common_mut());
}

#[test]
fn recursive_order_is_ascending_z_at_every_level() {
    let layers = vec![
        raster(4, 3),
        group(10, 1, vec![raster(12, 2), raster(11, 0), raster(13, 1)]),
        raster(1, 0),
        group(20, 2, vec![raster(22, 5), raster(21, -1)]),
    ];
    let t = MockupTemplate::new("t", "", canvas(), layers);
    let snaps = snapshots_for(&[1, 4, 11, 12, 13, 21, 22]);

    let (plan, warnings) = compile_plan(&t, &[], &snaps);
    assert_eq!(plan.strategy, RenderStrategy::Recursive);
    assert!(warnings.is_empty());
    assert_eq!(layer_order(&plan), vec![1, 11, 13, 12, 21, 22, 4]);
}

#[test]
fn hidden_group_skips_its_subtree() {
    let mut g = group(10, 0, vec![raster(11, 0), smart(12, 1, "Screen")]);
    set_common(&mut g, |c| c.visible = false);
    let t = MockupTemplate::new("t", "", canvas(), vec![g, raster(2, 1)]);

    let (plan, warnings) = compile_plan(&t, &[design("Screen")], &snapshots_for(&[2, 11]));
    assert_eq!(layer_order(&plan), vec![2]);
    assert!(warnings.is_empty());
}

#[test]
fn pass_through_group_multiplies_opacity_into_children() {
    let mut g = group(10, 0, vec![raster(11, 0)]);
    set_common(&mut g, |c| c.opacity = 0.5);
    let mut child = g.children()[0].clone();
    set_common(&mut child, |c| c.opacity = 0.5);
    if let RenderLayer::Group { children, .. } = &mut g {
        children[0] = child;
    }
    let t = MockupTemplate::new("t", "", canvas(), vec![g]);

    let (plan, _) = compile_plan(&t, &[], &snapshots_for(&[11]));
    assert_eq!(plan.ops.len(), 1);
    let PlanOp::DrawRaster { paint, .. } = &plan.ops[0] else {
        panic!("expected raster draw, got {:?}", plan.ops[0]);
    };
    assert!((paint.opacity - 0.25).abs() < 1e-6);
    assert_eq!(paint.blend, BlendMode::Normal);
}

#[test]
fn blended_group_is_isolated() {
    let mut g = group(10, 0, vec![raster(11, 0)]);
    set_common(&mut g, |c| {
        c.blend_mode = BlendMode::Multiply;
        c.opacity = 0.5;
    });
    let t = MockupTemplate::new("t", "", canvas(), vec![g]);

    let (plan, _) = compile_plan(&t, &[], &snapshots_for(&[11]));
    assert_eq!(plan.ops.len(), 3);
    let PlanOp::PushGroup { layer, paint } = &plan.ops[0] else {
        panic!("expected group push");
    };
    assert_eq!(*layer, LayerId(10));
    assert_eq!(paint.blend, BlendMode::Multiply);
    assert!((paint.opacity - 0.5).abs() < 1e-6);
    let PlanOp::DrawRaster { paint, .. } = &plan.ops[1] else {
        panic!("expected raster draw");
    };
    assert_eq!(paint.opacity, 1.0);
    assert_eq!(plan.ops[2], PlanOp::PopGroup { layer: LayerId(10) });
}

#[test]
fn clipping_run_is_grouped_with_its_base() {
    let mut base = raster(1, 0);
    set_common(&mut base, |c| {
        c.opacity = 0.5;
        c.blend_mode = BlendMode::Screen;
    });
    let mut clip = raster(2, 1);
    set_common(&mut clip, |c| c.clips_to_parent = true);
    let mut hidden_clip = raster(3, 2);
    set_common(&mut hidden_clip, |c| {
        c.clips_to_parent = true;
        c.visible = false;
    });
    let t = MockupTemplate::new(
        "t",
        "",
        canvas(),
        vec![raster(4, 3), hidden_clip, clip, base],
    );

    let (plan, _) = compile_plan(&t, &[], &snapshots_for(&[1, 2, 3, 4]));
    assert_eq!(plan.ops.len(), 5);
    let PlanOp::PushGroup { layer, paint } = &plan.ops[0] else {
        panic!("expected clip group");
    };
    assert_eq!(*layer, LayerId(1));
    assert_eq!(paint.blend, BlendMode::Screen);
    assert!((paint.opacity - 0.5).abs() < 1e-6);

    let PlanOp::DrawRaster { layer, paint, .. } = &plan.ops[1] else {
        panic!("expected base draw");
    };
    assert_eq!(
        (*layer, paint.opacity, paint.blend),
        (LayerId(1), 1.0, BlendMode::Normal)
    );
    assert!(!paint.clipped);

    let PlanOp::DrawRaster { layer, paint, .. } = &plan.ops[2] else {
        panic!("expected clipped draw");
    };
    assert_eq!(*layer, LayerId(2));
    assert!(paint.clipped);

    assert_eq!(plan.ops[3], PlanOp::PopGroup { layer: LayerId(1) });
    assert_eq!(plan.ops[4].layer(), LayerId(4));
}

#[test]
fn hidden_base_hides_its_clipping_run() {
    let mut base = raster(1, 0);
    set_common(&mut base, |c| c.visible = false);
    let mut clip = raster(2, 1);
    set_common(&mut clip, |c| c.clips_to_parent = true);
    let t = MockupTemplate::new("t", "", canvas(), vec![base, clip, raster(3, 2)]);

    let (plan, _) = compile_plan(&t, &[], &snapshots_for(&[1, 2, 3]));
    assert_eq!(layer_order(&plan), vec![3]);
}

#[test]
fn unmatched_design_leaves_every_area_blank() {
    let t = MockupTemplate::new(
        "t",
        "",
        canvas(),
        vec![smart(1, 0, "Front"), smart(2, 1, "Back")],
    );

    let (plan, warnings) = compile_plan(&t, &[design("Spine")], &RasterSnapshots::new());
    assert!(plan.ops.is_empty());
    let unresolved: Vec<_> = warnings
        .iter()
        .filter(|w| w.kind == WarningKind::DesignUnresolved)
        .map(|w| w.layer)
        .collect();
    assert_eq!(unresolved, vec![Some(LayerId(1)), Some(LayerId(2))]);
}

#[test]
fn smart_object_draws_resolved_design() {
    let t = MockupTemplate::new(
        "t",
        "",
        canvas(),
        vec![smart(1, 0, "Front Cover"), smart(2, 1, "Back Cover")],
    );
    let designs = vec![design("back"), design("1")];

    let (plan, warnings) = compile_plan(&t, &designs, &RasterSnapshots::new());
    assert!(warnings.is_empty());
    let picked: Vec<(LayerId, usize)> = plan
        .ops
        .iter()
        .filter_map(|op| match op {
            PlanOp::DrawDesign { draw, .. } => Some((draw.area, draw.design)),
            _ => None,
        })
        .collect();
    assert_eq!(picked, vec![(LayerId(1), 1), (LayerId(2), 0)]);
}

#[test]
fn degenerate_quad_is_skipped_with_warning() {
    let mut so = smart(1, 0, "Screen");
    if let RenderLayer::SmartObject { placement, .. } = &mut so {
        placement.perspective_quad = Quad::from_corners([
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 3.0),
        ]);
    }
    let t = MockupTemplate::new("t", "", canvas(), vec![so]);

    let (plan, warnings) = compile_plan(&t, &[design("")], &RasterSnapshots::new());
    assert!(plan.ops.is_empty());
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::GeometryDegenerate);
}

fn sandwich_template() -> MockupTemplate {
    let mask = Mask {
        bounds: Bounds::new(0, 0, 4, 4),
        default_color: 0,
        image_ref: LayerId(5),
    };
    let masked_group = RenderLayer::Group {
        common: common(5, 1)
            .with_blend_mode(BlendMode::PassThrough)
            .with_mask(mask),
        children: vec![smart(6, 0, "Screen")],
    };
    MockupTemplate::new(
        "t",
        "",
        canvas(),
        vec![raster(1, 0), masked_group, raster(9, 2)],
    )
    .with_render_layers(RenderLayerHints {
        base_layer_id: Some(LayerId(1)),
        overlay_layer_id: Some(LayerId(9)),
    })
}

#[test]
fn sandwich_needs_both_snapshots() {
    let t = sandwich_template();

    let (plan, _) = compile_plan(&t, &[design("")], &snapshots_for(&[1]));
    assert_eq!(plan.strategy, RenderStrategy::Recursive);

    let (plan, _) = compile_plan(&t, &[design("")], &RasterSnapshots::new());
    assert_eq!(plan.strategy, RenderStrategy::Recursive);
}

#[test]
fn sandwich_draws_base_areas_overlay_with_inherited_mask() {
    let t = sandwich_template();

    let (plan, warnings) = compile_plan(&t, &[design("")], &snapshots_for(&[1, 9]));
    assert!(warnings.is_empty());
    assert_eq!(plan.strategy, RenderStrategy::Sandwich);
    assert_eq!(layer_order(&plan), vec![1, 6, 9]);
    let PlanOp::DrawDesign { paint, .. } = &plan.ops[1] else {
        panic!("expected design draw");
    };
    assert_eq!(paint.mask.map(|m| m.image_ref), Some(LayerId(5)));
}

#[test]
fn recursive_applies_group_mask_once_on_the_group() {
    let t = sandwich_template();

    let (plan, _) = compile_plan(&t, &[design("")], &snapshots_for(&[1]));
    let PlanOp::PushGroup { layer, paint } = &plan.ops[1] else {
        panic!("expected masked group, got {:?}", plan.ops);
    };
    assert_eq!(*layer, LayerId(5));
    assert_eq!(paint.blend, BlendMode::Normal);
    assert!(paint.mask.is_some());
    let PlanOp::DrawDesign { paint, .. } = &plan.ops[2] else {
        panic!("expected design draw");
    };
    assert!(paint.mask.is_none());
}

#[test]
fn adjustments_warn_once_per_render() {
    let adj = |id: u32, z: i32| RenderLayer::Adjustment {
        common: common(id, z),
        kind: "curv".to_string(),
    };
    let t = MockupTemplate::new("t", "", canvas(), vec![adj(1, 0), adj(2, 1)]);

    let (plan, warnings) = compile_plan(&t, &[], &RasterSnapshots::new());
    assert!(plan.ops.is_empty());
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::UnsupportedFeature);
}

#[test]
fn solid_color_without_snapshot_fills() {
    let layer = RenderLayer::SolidColor {
        common: common(1, 0),
        color: [10, 20, 30],
    };
    let t = MockupTemplate::new("t", "", canvas(), vec![layer]);

    let (plan, _) = compile_plan(&t, &[], &RasterSnapshots::new());
    assert!(matches!(
        plan.ops[0],
        PlanOp::FillColor {
            color: [10, 20, 30],
            ..
        }
    ));
}
