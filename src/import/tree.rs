use crate::foundation::core::{Bounds, Size};
use crate::foundation::error::{Warning, WarningKind, Warnings};
use crate::geometry::quad::Quad;
use crate::import::channels::{layer_image, layer_mask};
use crate::import::descriptor::{Descriptor, read_versioned_descriptor};
use crate::import::psd::{LayerRecord, PsdHeader};
use crate::import::reader::{ByteReader, fourcc, fourcc_to_string};
use crate::scene::model::{BlendMode, LayerCommon, LayerId, Mask, Placement, RenderLayer};
use crate::scene::snapshot::RasterSnapshots;

const ADJUSTMENT_KEYS: [&[u8; 4]; 17] = [
    b"levl", b"curv", b"brit", b"blnc", b"hue2", b"selc", b"mixr", b"grdm", b"phfl", b"expA",
    b"vibA", b"thrs", b"nvrt", b"post", b"clrL", b"CgEd", b"blwh",
];

const SHAPE_KEYS: [&[u8; 4]; 6] = [b"vmsk", b"vsms", b"vscg", b"vogk", b"GdFl", b"PtFl"];

/// Section-divider role of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Layer,
    GroupOpen { blend: Option<u32> },
    GroupEnd,
}

/// Map a four-byte blend key, naming the key when it is only approximated.
pub(crate) fn blend_from_key(key: u32) -> (BlendMode, Option<String>) {
    let k = key.to_be_bytes();
    let mode = match &k {
        b"pass" => BlendMode::PassThrough,
        b"norm" | b"diss" => BlendMode::Normal,
        b"dark" => BlendMode::Darken,
        b"mul " => BlendMode::Multiply,
        b"idiv" => BlendMode::ColorBurn,
        b"lbrn" => BlendMode::LinearBurn,
        b"lite" => BlendMode::Lighten,
        b"scrn" => BlendMode::Screen,
        b"div " => BlendMode::ColorDodge,
        b"lddg" => BlendMode::LinearDodge,
        b"over" => BlendMode::Overlay,
        b"sLit" => BlendMode::SoftLight,
        b"hLit" => BlendMode::HardLight,
        b"diff" => BlendMode::Difference,
        b"smud" => BlendMode::Exclusion,
        b"fsub" => BlendMode::Subtract,
        b"fdiv" => BlendMode::Divide,
        _ => return (BlendMode::Normal, Some(fourcc_to_string(key))),
    };
    (mode, None)
}

/// Build the layer tree (bottom-to-top) and extract snapshots.
pub(crate) fn build_tree(
    records: &[LayerRecord<'_>],
    header: &PsdHeader,
    extract_pixels: bool,
    snapshots: &mut RasterSnapshots,
    warnings: &mut Warnings,
) -> Vec<RenderLayer> {
    let ids = assign_ids(records);
    let decode_pixels = extract_pixels && header.pixels_supported();
    if extract_pixels && !header.pixels_supported() {
        warnings.push(Warning::new(
            WarningKind::UnsupportedFeature,
            format!(
                "pixel snapshots need 8-bit RGB or grayscale (got {:?}, {} bits)",
                header.color_mode, header.depth
            ),
        ));
    }

    let mut stack: Vec<Vec<RenderLayer>> = vec![Vec::new()];
    for (rec, &id) in records.iter().zip(&ids) {
        match section_of(rec) {
            Section::GroupEnd => stack.push(Vec::new()),
            Section::GroupOpen { blend } => {
                let children = if stack.len() > 1 {
                    stack.pop().unwrap_or_default()
                } else {
                    warnings.push(Warning::for_layer(
                        WarningKind::UnsupportedFeature,
                        id,
                        "group without a closing divider; treated as empty",
                    ));
                    Vec::new()
                };
                let mut common = common_fields(rec, id, header, snapshots, warnings);
                if let Some(key) = blend {
                    common.blend_mode = resolve_blend(key, id, warnings);
                }
                push_layer(&mut stack, RenderLayer::Group { common, children });
            }
            Section::Layer => {
                let layer = leaf(rec, id, header, snapshots, warnings);
                if decode_pixels && !matches!(layer, RenderLayer::Adjustment { .. }) {
                    match layer_image(rec, header) {
                        Ok(Some(img)) => {
                            snapshots.layers.insert(id, img);
                        }
                        Ok(None) => {}
                        Err(e) => warnings.push(Warning::for_layer(
                            WarningKind::LayerImageUnreadable,
                            id,
                            format!("layer '{}' pixels unreadable: {e}", layer.name()),
                        )),
                    }
                }
                push_layer(&mut stack, layer);
            }
        }
    }

    while stack.len() > 1 {
        let orphans = stack.pop().unwrap_or_default();
        warnings.push(Warning::new(
            WarningKind::UnsupportedFeature,
            "group divider without an opening record; children moved to parent",
        ));
        for l in orphans {
            push_layer(&mut stack, l);
        }
    }
    stack.pop().unwrap_or_default()
}

fn push_layer(stack: &mut [Vec<RenderLayer>], mut layer: RenderLayer) {
    if let Some(frame) = stack.last_mut() {
        layer.common_mut().z_index = frame.len() as i32;
        frame.push(layer);
    }
}

/// Ids from `lyid`; records without one get `max_id + 1 + index`, saturating at `u32::MAX`.
fn assign_ids(records: &[LayerRecord<'_>]) -> Vec<LayerId> {
    let explicit: Vec<Option<u32>> = records
        .iter()
        .map(|r| r.info(b"lyid").and_then(|d| ByteReader::new(d).u32().ok()))
        .collect();
    let max_id = explicit.iter().flatten().copied().max().unwrap_or(0);
    explicit
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let fallback = max_id.saturating_add(1).saturating_add(i as u32);
            LayerId(id.unwrap_or(fallback))
        })
        .collect()
}

fn section_of(rec: &LayerRecord<'_>) -> Section {
    let Some(data) = rec.info(b"lsct").or_else(|| rec.info(b"lsdk")) else {
        return Section::Layer;
    };
    let mut r = ByteReader::new(data);
    let Ok(kind) = r.u32() else {
        return Section::Layer;
    };
    match kind {
        1 | 2 => {
            let blend = match (r.fourcc(), r.fourcc()) {
                (Ok(sig), Ok(key)) if sig == fourcc(b"8BIM") => Some(key),
                _ => None,
            };
            Section::GroupOpen { blend }
        }
        3 => Section::GroupEnd,
        _ => Section::Layer,
    }
}

fn resolve_blend(key: u32, id: LayerId, warnings: &mut Warnings) -> BlendMode {
    let (mode, unsupported) = blend_from_key(key);
    if let Some(name) = unsupported {
        warnings.push(Warning::for_layer(
            WarningKind::UnsupportedFeature,
            id,
            format!("blend mode '{name}' rendered as normal"),
        ));
    }
    mode
}

fn common_fields(
    rec: &LayerRecord<'_>,
    id: LayerId,
    header: &PsdHeader,
    snapshots: &mut RasterSnapshots,
    warnings: &mut Warnings,
) -> LayerCommon {
    let name = rec
        .info(b"luni")
        .and_then(|d| ByteReader::new(d).unicode_string().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| rec.name.clone());

    let mut common = LayerCommon::new(id, name, rec.bounds, 0)
        .with_opacity(f32::from(rec.opacity) / 255.0)
        .with_blend_mode(resolve_blend(rec.blend_key, id, warnings))
        .with_visible(!rec.hidden())
        .with_clips_to_parent(rec.clipping != 0);

    if let Some(m) = rec.mask.filter(|m| !m.disabled()) {
        if header.depth != 8 {
            warnings.push(Warning::for_layer(
                WarningKind::UnsupportedFeature,
                id,
                "layer mask ignored: only 8-bit masks are decoded",
            ));
        } else {
            match layer_mask(rec, &m, header) {
                Ok(raster) => {
                    common.mask = Some(Mask {
                        bounds: raster.bounds,
                        default_color: raster.default_color,
                        image_ref: id,
                    });
                    snapshots.masks.insert(id, raster);
                }
                Err(e) => warnings.push(Warning::for_layer(
                    WarningKind::LayerImageUnreadable,
                    id,
                    format!("layer mask unreadable: {e}"),
                )),
            }
        }
    }
    common
}

fn leaf(
    rec: &LayerRecord<'_>,
    id: LayerId,
    header: &PsdHeader,
    snapshots: &mut RasterSnapshots,
    warnings: &mut Warnings,
) -> RenderLayer {
    let common = common_fields(rec, id, header, snapshots, warnings);

    if rec.has_info(b"SoLd")
        || rec.has_info(b"SoLE")
        || rec.has_info(b"PlLd")
        || rec.has_info(b"plLd")
    {
        let placement = placement(rec, id, warnings);
        return RenderLayer::SmartObject { common, placement };
    }
    if let Some(key) = ADJUSTMENT_KEYS.iter().find(|k| rec.has_info(k)) {
        return RenderLayer::Adjustment {
            common,
            kind: String::from_utf8_lossy(&key[..]).into_owned(),
        };
    }
    if SHAPE_KEYS.iter().any(|k| rec.has_info(k)) {
        return RenderLayer::Shape { common };
    }
    if let Some(data) = rec.info(b"SoCo") {
        match solid_color(data) {
            Some(color) => return RenderLayer::SolidColor { common, color },
            None => warnings.push(Warning::for_layer(
                WarningKind::UnsupportedFeature,
                id,
                "solid fill descriptor unreadable; drawing its pixels instead",
            )),
        }
    }
    RenderLayer::RasterImage { common }
}

fn bounds_quad(b: Bounds) -> Quad {
    Quad::from_rect(b.to_rect())
}

/// Placement of a smart object: `nonAffineTransform`, then `Trnf`, then the legacy record,
/// then the layer bounds.
fn placement(rec: &LayerRecord<'_>, id: LayerId, warnings: &mut Warnings) -> Placement {
    let placed = rec
        .info(b"SoLd")
        .or_else(|| rec.info(b"SoLE"))
        .map(placed_descriptor);

    let mut quad = None;
    let mut size = Size::default();
    match placed {
        Some(Ok(desc)) => {
            quad = desc
                .get_transform("nonAffineTransform")
                .or_else(|| desc.get_transform("Trnf"))
                .map(|v| Quad::from_flat(&v));
            if let Some(sz) = desc.get_object("Sz  ") {
                let s = Size::new(
                    sz.get_f64("Wdth").unwrap_or(0.0),
                    sz.get_f64("Hght").unwrap_or(0.0),
                );
                if s.is_usable() {
                    size = s;
                }
            }
        }
        Some(Err(e)) => warnings.push(Warning::for_layer(
            WarningKind::UnsupportedFeature,
            id,
            format!("placed-layer descriptor unreadable ({e}); using fallback transform"),
        )),
        None => {}
    }

    if quad.is_none() {
        quad = rec
            .info(b"PlLd")
            .or_else(|| rec.info(b"plLd"))
            .and_then(|d| legacy_transform(d).ok())
            .map(|v| Quad::from_flat(&v));
    }

    let perspective_quad = quad.unwrap_or_else(|| {
        warnings.push(Warning::for_layer(
            WarningKind::UnsupportedFeature,
            id,
            "smart object has no stored transform; using layer bounds",
        ));
        bounds_quad(rec.bounds)
    });
    Placement {
        perspective_quad,
        placed_size: size,
    }
}

fn placed_descriptor(data: &[u8]) -> crate::MockupResult<Descriptor> {
    let mut r = ByteReader::new(data);
    r.fourcc()?;
    r.u32()?;
    read_versioned_descriptor(&mut r)
}

fn legacy_transform(data: &[u8]) -> crate::MockupResult<[f64; 8]> {
    let mut r = ByteReader::new(data);
    r.fourcc()?;
    r.u32()?;
    r.pascal_string(1)?;
    r.skip(16)?;
    let mut out = [0.0; 8];
    for v in &mut out {
        *v = r.f64()?;
    }
    if out.iter().all(|v| v.is_finite()) {
        Ok(out)
    } else {
        Err(crate::MockupError::import("non-finite placed transform"))
    }
}

fn solid_color(data: &[u8]) -> Option<[u8; 3]> {
    let desc = read_versioned_descriptor(&mut ByteReader::new(data)).ok()?;
    let clr = desc.get_object("Clr ")?;
    let ch = |k: &str| clr.get_f64(k).map(|v| v.round().clamp(0.0, 255.0) as u8);
    Some([ch("Rd  ")?, ch("Grn ")?, ch("Bl  ")?])
}

#[cfg(test)]
#[path = "../../tests/unit/import/tree.rs"]
mod tests;
