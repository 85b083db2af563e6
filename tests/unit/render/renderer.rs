use super::*;
use crate::foundation::core::{Bounds, Canvas, Rect, Size};
use crate::geometry::quad::Quad;
use crate::scene::model::{LayerCommon, LayerId, Placement, RenderLayer};

fn template() -> MockupTemplate {
    let layers = vec![
        RenderLayer::SolidColor {
            common: LayerCommon::new(LayerId(1), "Background", Bounds::new(0, 0, 8, 8), 0),
            color: [255, 255, 255],
        },
        RenderLayer::SmartObject {
            common: LayerCommon::new(LayerId(2), "Screen", Bounds::new(2, 2, 6, 6), 1),
            placement: Placement {
                perspective_quad: Quad::from_rect(Rect::new(2.0, 2.0, 6.0, 6.0)),
                placed_size: Size::new(4.0, 4.0),
            },
        },
    ];
    MockupTemplate::new("phone", "devices", Canvas::new(8, 8).unwrap(), layers)
}

fn red() -> DesignSource {
    DesignSource::Rgba {
        width: 1,
        height: 1,
        data: vec![255, 0, 0, 255],
    }
}

fn surface(result: &RenderResult) -> &Surface {
    result
        .image
        .as_ref()
        .and_then(RenderedImage::as_surface)
        .expect("surface output")
}

#[test]
fn env_lookup_overrides_defaults() {
    let opts = RendererOpts::from_lookup(|key| match key {
        "MOCKUP_PERSPECTIVE" => Some("subdivide".to_string()),
        "MOCKUP_SUBDIVISIONS" => Some("4".to_string()),
        "MOCKUP_IMAGE_CACHE_CAPACITY" => Some("7".to_string()),
        _ => None,
    });
    assert_eq!(opts.perspective, PerspectiveMode::Subdivide { grid: 4 });
    assert_eq!(opts.cache_capacity, 7);
}

#[test]
fn env_lookup_ignores_garbage() {
    let opts = RendererOpts::from_lookup(|key| match key {
        "MOCKUP_PERSPECTIVE" => Some("warp".to_string()),
        "MOCKUP_SUBDIVISIONS" => Some("0".to_string()),
        "MOCKUP_IMAGE_CACHE_CAPACITY" => Some("lots".to_string()),
        _ => None,
    });
    assert_eq!(opts, RendererOpts::default());

    let sub = RendererOpts::from_lookup(|key| {
        (key == "MOCKUP_PERSPECTIVE").then(|| "subdivide".to_string())
    });
    assert_eq!(
        sub.perspective,
        PerspectiveMode::Subdivide {
            grid: DEFAULT_SUBDIVISIONS
        }
    );
}

#[test]
fn renders_design_over_background() {
    let mut r = Renderer::default();
    let designs = vec![DesignInput::new("Screen", red())];
    let result = r.render(
        &template(),
        &designs,
        &RasterSnapshots::new(),
        &RenderOpts::default(),
    );
    assert!(result.success, "{:?}", result.error);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert!(result.render_time_ms >= 0.0);

    let s = surface(&result);
    assert_eq!((s.width, s.height), (8, 8));
    assert_eq!(s.pixel(3, 3), Some([255, 0, 0, 255]));
    assert_eq!(s.pixel(0, 0), Some([255, 255, 255, 255]));
    assert_eq!(s.pixel(7, 7), Some([255, 255, 255, 255]));
}

#[test]
fn repeated_renders_hit_the_cache() {
    let mut r = Renderer::default();
    let designs = vec![DesignInput::new("Screen", red())];
    let snapshots = RasterSnapshots::new();
    let opts = RenderOpts::default();
    assert!(r.render(&template(), &designs, &snapshots, &opts).success);
    assert!(r.render(&template(), &designs, &snapshots, &opts).success);

    let stats = r.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(r.cached_images(), 1);
}

#[test]
fn preload_warms_the_cache_and_reports_failures() {
    let mut r = Renderer::default();
    let warnings = r.preload(&[red(), red(), DesignSource::Encoded(b"nope".to_vec())]);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::DecodeFailure);
    assert_eq!(r.cached_images(), 1);

    let designs = vec![DesignInput::new("Screen", red())];
    let result = r.render(
        &template(),
        &designs,
        &RasterSnapshots::new(),
        &RenderOpts::default(),
    );
    assert!(result.success);
    assert_eq!(r.cache_stats().hits, 1);
    assert_eq!(r.cache_stats().misses, 0);
}

#[test]
fn undecodable_design_leaves_area_blank() {
    let mut r = Renderer::default();
    let designs = vec![DesignInput::new(
        "Screen",
        DesignSource::Encoded(vec![1, 2, 3]),
    )];
    let result = r.render(
        &template(),
        &designs,
        &RasterSnapshots::new(),
        &RenderOpts::default(),
    );
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, WarningKind::DecodeFailure);
    assert_eq!(result.warnings[0].layer, Some(LayerId(2)));
    assert_eq!(surface(&result).pixel(3, 3), Some([255, 255, 255, 255]));
}

#[test]
fn invalid_scale_fails_without_panicking() {
    let mut r = Renderer::default();
    let result = r.render(
        &template(),
        &[],
        &RasterSnapshots::new(),
        &RenderOpts::default().with_scale(-1.0),
    );
    assert!(!result.success);
    assert!(result.image.is_none());
    assert!(result.error.unwrap().contains("scale"));

    let ok = r.render(
        &template(),
        &[],
        &RasterSnapshots::new(),
        &RenderOpts::default().with_scale(0.5),
    );
    assert!(ok.success);
    assert_eq!(surface(&ok).width, 4);
}

#[test]
fn encoded_output_is_png() {
    let mut r = Renderer::new(RendererOpts::default().with_clear_rgba(Some([0, 0, 0, 255])));
    let result = r.render(
        &template(),
        &[],
        &RasterSnapshots::new(),
        &RenderOpts::default().with_output(OutputKind::png()),
    );
    let bytes = result
        .image
        .as_ref()
        .and_then(RenderedImage::encoded_bytes)
        .unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
    let decoded = image::load_from_memory(bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (8, 8));
    assert_eq!(decoded.get_pixel(0, 0).0, [255, 255, 255, 255]);
}
