use crate::scene::snapshot::MaskRaster;

/// Rasterize `mask` at output resolution: one coverage byte per pixel of a `width x height`
/// surface rendered at `scale`.
///
/// Every output pixel samples the scene pixel under its center (nearest neighbour), so masks
/// outside their bounds report their default color.
pub(crate) fn mask_coverage(
    mask: &MaskRaster,
    width: u32,
    height: u32,
    scale: f64,
    out: &mut Vec<u8>,
) {
    out.clear();
    out.reserve(width as usize * height as usize);
    let to_scene = |v: u32| ((f64::from(v) + 0.5) / scale).floor() as i32;

    let columns: Vec<i32> = (0..width).map(to_scene).collect();
    for y in 0..height {
        let sy = to_scene(y);
        if sy < mask.bounds.top || sy >= mask.bounds.bottom {
            out.extend(std::iter::repeat_n(mask.default_color, width as usize));
            continue;
        }
        out.extend(columns.iter().map(|&sx| mask.sample(sx, sy)));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/mask.rs"]
mod tests;
