use super::*;
use crate::compile::design::FitMode;
use crate::foundation::core::{Rect, Size};
use crate::scene::model::{BlendMode, Mask};
use crate::scene::snapshot::{MaskRaster, RasterSnapshots};

fn backend() -> CpuBackend {
    CpuBackend::new(CpuBackendOpts::default())
}

fn solid(rgba: [u8; 4], w: u32, h: u32) -> PreparedImage {
    PreparedImage::from_premul(w, h, rgba.repeat((w * h) as usize)).unwrap()
}

fn close(a: [u8; 4], b: [u8; 4]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 2)
}

fn canvas(w: u32, h: u32) -> Canvas {
    Canvas::new(w, h).unwrap()
}

#[test]
fn begin_clears_to_premultiplied_color() {
    let mut b = CpuBackend::new(CpuBackendOpts {
        clear_rgba: Some([255, 255, 255, 128]),
        ..CpuBackendOpts::default()
    });
    b.begin(canvas(4, 2), 1.0).unwrap();
    let s = b.finish().unwrap();
    assert_eq!((s.width, s.height), (4, 2));
    assert!(s.premultiplied);
    assert_eq!(s.pixel(3, 1), Some([128, 128, 128, 128]));
}

#[test]
fn begin_rejects_bad_scale() {
    let mut b = backend();
    assert!(b.begin(canvas(4, 4), 0.0).is_err());
    assert!(b.finish().is_err());
}

#[test]
fn raster_is_drawn_at_its_bounds() {
    let mut snapshots = RasterSnapshots::new();
    snapshots
        .layers
        .insert(LayerId(1), solid([0, 0, 255, 255], 2, 2));
    let designs = Vec::new();
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };

    let mut b = backend();
    b.begin(canvas(6, 6), 1.0).unwrap();
    b.draw_raster(
        LayerId(1),
        Bounds::new(2, 3, 4, 5),
        &LayerPaint::default(),
        inputs,
    )
    .unwrap();
    let s = b.finish().unwrap();
    assert!(close(s.pixel(2, 3).unwrap(), [0, 0, 255, 255]));
    assert!(close(s.pixel(3, 4).unwrap(), [0, 0, 255, 255]));
    assert_eq!(s.pixel(1, 3), Some([0, 0, 0, 0]));
    assert_eq!(s.pixel(4, 4), Some([0, 0, 0, 0]));
}

#[test]
fn missing_raster_draws_nothing() {
    let snapshots = RasterSnapshots::new();
    let designs = Vec::new();
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let mut b = backend();
    b.begin(canvas(2, 2), 1.0).unwrap();
    b.draw_raster(
        LayerId(9),
        Bounds::new(0, 0, 2, 2),
        &LayerPaint::default(),
        inputs,
    )
    .unwrap();
    let s = b.finish().unwrap();
    assert!(s.data.iter().all(|&v| v == 0));
}

#[test]
fn fill_color_respects_opacity_and_empty_bounds() {
    let snapshots = RasterSnapshots::new();
    let designs = Vec::new();
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let mut b = backend();
    b.begin(canvas(4, 4), 1.0).unwrap();
    let half = LayerPaint {
        opacity: 0.5,
        ..LayerPaint::default()
    };
    b.fill_color(LayerId(1), Bounds::default(), [255, 0, 0], &half, inputs)
        .unwrap();
    let s = b.finish().unwrap();
    for (x, y) in [(0, 0), (3, 3)] {
        assert!(close(s.pixel(x, y).unwrap(), [128, 0, 0, 128]));
    }
}

#[test]
fn groups_composite_with_their_blend_mode() {
    let snapshots = RasterSnapshots::new();
    let designs = Vec::new();
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let mut b = backend();
    b.begin(canvas(2, 2), 1.0).unwrap();
    b.fill_color(
        LayerId(1),
        Bounds::default(),
        [128, 128, 128],
        &LayerPaint::default(),
        inputs,
    )
    .unwrap();
    let multiply = LayerPaint {
        blend: BlendMode::Multiply,
        ..LayerPaint::default()
    };
    b.push_group(LayerId(2), &multiply).unwrap();
    b.fill_color(
        LayerId(3),
        Bounds::default(),
        [255, 0, 255],
        &LayerPaint::default(),
        inputs,
    )
    .unwrap();
    b.pop_group(LayerId(2), inputs).unwrap();
    let s = b.finish().unwrap();
    assert!(close(s.pixel(0, 0).unwrap(), [128, 0, 128, 255]));
}

#[test]
fn unbalanced_groups_are_errors() {
    let snapshots = RasterSnapshots::new();
    let designs = Vec::new();
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };

    let mut b = backend();
    b.begin(canvas(2, 2), 1.0).unwrap();
    assert!(b.pop_group(LayerId(1), inputs).is_err());

    b.begin(canvas(2, 2), 1.0).unwrap();
    b.push_group(LayerId(1), &LayerPaint::default()).unwrap();
    assert!(b.pop_group(LayerId(2), inputs).is_err());
    assert!(b.finish().is_err());
}

#[test]
fn layer_mask_gates_coverage() {
    let mut snapshots = RasterSnapshots::new();
    snapshots.masks.insert(
        LayerId(1),
        MaskRaster {
            bounds: Bounds::new(0, 0, 2, 1),
            default_color: 0,
            gray: std::sync::Arc::new(vec![255, 0]),
        },
    );
    let designs = Vec::new();
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let paint = LayerPaint {
        mask: Some(Mask {
            bounds: Bounds::new(0, 0, 2, 1),
            default_color: 0,
            image_ref: LayerId(1),
        }),
        ..LayerPaint::default()
    };

    let mut b = backend();
    b.begin(canvas(2, 2), 1.0).unwrap();
    b.fill_color(LayerId(1), Bounds::default(), [0, 255, 0], &paint, inputs)
        .unwrap();
    let s = b.finish().unwrap();
    assert!(close(s.pixel(0, 0).unwrap(), [0, 255, 0, 255]));
    assert_eq!(s.pixel(1, 0), Some([0, 0, 0, 0]));
    assert_eq!(s.pixel(0, 1), Some([0, 0, 0, 0]));
}

fn design_draw(quad: Quad) -> DesignDraw {
    DesignDraw {
        area: LayerId(5),
        design: 0,
        fit: FitMode::Fill,
        quad,
        placed_size: Size::default(),
    }
}

#[test]
fn design_fills_its_quad_in_both_modes() {
    let snapshots = RasterSnapshots::new();
    let designs = vec![Some(solid([255, 0, 0, 255], 4, 4))];
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let draw = design_draw(Quad::from_rect(Rect::new(2.0, 2.0, 8.0, 8.0)));

    for perspective in [
        PerspectiveMode::Mesh,
        PerspectiveMode::Subdivide { grid: 8 },
    ] {
        let mut b = CpuBackend::new(CpuBackendOpts {
            perspective,
            ..CpuBackendOpts::default()
        });
        b.begin(canvas(10, 10), 1.0).unwrap();
        b.draw_design(&draw, &LayerPaint::default(), inputs).unwrap();
        let s = b.finish().unwrap();
        assert_eq!(s.pixel(4, 4), Some([255, 0, 0, 255]), "{perspective:?}");
        assert_eq!(s.pixel(1, 4), Some([0, 0, 0, 0]), "{perspective:?}");
        assert_eq!(s.pixel(8, 8), Some([0, 0, 0, 0]), "{perspective:?}");
        assert!(b.take_warnings().is_empty());
    }
}

#[test]
fn design_is_scaled_with_the_output() {
    let snapshots = RasterSnapshots::new();
    let designs = vec![Some(solid([0, 0, 255, 255], 2, 2))];
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let draw = design_draw(Quad::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));

    let mut b = backend();
    b.begin(canvas(20, 20), 0.5).unwrap();
    b.draw_design(&draw, &LayerPaint::default(), inputs).unwrap();
    let s = b.finish().unwrap();
    assert_eq!((s.width, s.height), (10, 10));
    assert_eq!(s.pixel(4, 4), Some([0, 0, 255, 255]));
    assert_eq!(s.pixel(5, 5), Some([0, 0, 0, 0]));
}

#[test]
fn degenerate_design_quad_warns_and_skips() {
    let snapshots = RasterSnapshots::new();
    let designs = vec![Some(solid([255, 0, 0, 255], 2, 2))];
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let flat = Quad::from_corners([
        Point::new(0.0, 0.0),
        Point::new(4.0, 0.0),
        Point::new(8.0, 0.0),
        Point::new(2.0, 0.0),
    ]);

    let mut b = backend();
    b.begin(canvas(8, 8), 1.0).unwrap();
    b.draw_design(&design_draw(flat), &LayerPaint::default(), inputs)
        .unwrap();
    let s = b.finish().unwrap();
    assert!(s.data.iter().all(|&v| v == 0));
    let warnings = b.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::GeometryDegenerate);
    assert_eq!(warnings[0].layer, Some(LayerId(5)));
}

#[test]
fn undecoded_design_is_skipped_silently() {
    let snapshots = RasterSnapshots::new();
    let designs = vec![None];
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let mut b = backend();
    b.begin(canvas(4, 4), 1.0).unwrap();
    b.draw_design(
        &design_draw(Quad::from_rect(Rect::new(0.0, 0.0, 4.0, 4.0))),
        &LayerPaint::default(),
        inputs,
    )
    .unwrap();
    assert!(b.finish().unwrap().data.iter().all(|&v| v == 0));
    assert!(b.take_warnings().is_empty());
}

fn render_design(
    perspective: PerspectiveMode,
    image: PreparedImage,
    quad: Quad,
    size: u32,
) -> Surface {
    let snapshots = RasterSnapshots::new();
    let designs = vec![Some(image)];
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let mut b = CpuBackend::new(CpuBackendOpts {
        perspective,
        ..CpuBackendOpts::default()
    });
    b.begin(canvas(size, size), 1.0).unwrap();
    b.draw_design(&design_draw(quad), &LayerPaint::default(), inputs)
        .unwrap();
    assert!(b.take_warnings().is_empty());
    b.finish().unwrap()
}

#[test]
fn subdivided_triangles_keep_source_orientation() {
    // Left half red, right half blue.
    let mut px = Vec::new();
    for _ in 0..4 {
        px.extend_from_slice(&[255, 0, 0, 255, 255, 0, 0, 255]);
        px.extend_from_slice(&[0, 0, 255, 255, 0, 0, 255, 255]);
    }
    let img = PreparedImage::from_premul(4, 4, px).unwrap();
    let quad = Quad::from_rect(Rect::new(0.0, 0.0, 40.0, 40.0));
    let s = render_design(PerspectiveMode::Subdivide { grid: 8 }, img, quad, 40);
    assert_eq!(s.pixel(2, 20), Some([255, 0, 0, 255]));
    assert_eq!(s.pixel(37, 20), Some([0, 0, 255, 255]));
    assert_eq!(s.pixel(20, 2).map(|p| p[3]), Some(255));
}

#[test]
fn subdivided_design_tracks_the_exact_warp() {
    let quad = Quad::from_corners([
        Point::new(20.0, 5.0),
        Point::new(50.0, 15.0),
        Point::new(58.0, 60.0),
        Point::new(4.0, 50.0),
    ]);
    let green = || solid([0, 255, 0, 255], 8, 8);
    let exact = render_design(PerspectiveMode::Mesh, green(), quad, 64);
    let tri = render_design(PerspectiveMode::Subdivide { grid: 8 }, green(), quad, 64);
    let opaque = |s: &Surface| s.data.chunks_exact(4).filter(|p| p[3] == 255).count();
    let (a, b) = (opaque(&exact), opaque(&tri));
    assert!(a > 1000);
    assert!(a.abs_diff(b) * 50 < a, "mesh {a} vs subdivide {b}");
}

#[test]
fn repeated_renders_reuse_pooled_surfaces() {
    let snapshots = RasterSnapshots::new();
    let designs = vec![Some(solid([255, 0, 0, 255], 2, 2))];
    let inputs = PlanInputs {
        snapshots: &snapshots,
        designs: &designs,
    };
    let draw = design_draw(Quad::from_rect(Rect::new(1.0, 1.0, 5.0, 5.0)));
    let mut b = backend();
    for _ in 0..3 {
        b.begin(canvas(6, 6), 1.0).unwrap();
        b.draw_design(&draw, &LayerPaint::default(), inputs).unwrap();
        b.finish().unwrap();
    }
    let stats = b.pool.stats();
    assert!(stats.alloc_surfaces <= 3, "{stats:?}");
    assert_eq!(stats.dropped_on_release, 0);
}
