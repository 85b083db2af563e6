use crate::foundation::error::{MockupError, MockupResult};
use crate::foundation::math::mul_div255_u8;
use crate::scene::model::BlendMode;

/// Channel of a mask buffer that carries coverage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MaskChannel {
    /// One gray byte per pixel.
    Gray,
    /// Alpha byte of premultiplied RGBA8 pixels.
    Alpha,
}

/// Multiply every premultiplied pixel of `dst` by the mask coverage at the same position.
pub(crate) fn mask_apply_rgba8_premul(
    dst: &mut [u8],
    mask: &[u8],
    channel: MaskChannel,
) -> MockupResult<()> {
    let (stride, offset) = match channel {
        MaskChannel::Gray => (1, 0),
        MaskChannel::Alpha => (4, 3),
    };
    if !dst.len().is_multiple_of(4) || dst.len() / 4 * stride != mask.len() {
        return Err(MockupError::render(
            "mask_apply_rgba8_premul expects one mask sample per pixel",
        ));
    }

    for (d, m) in dst.chunks_exact_mut(4).zip(mask.chunks_exact(stride)) {
        let w = m[offset];
        if w == 255 {
            continue;
        }
        let w16 = u16::from(w);
        for c in d.iter_mut() {
            *c = mul_div255_u8(u16::from(*c), w16);
        }
    }
    Ok(())
}

/// Merge premultiplied `src` into premultiplied `dst` with `blend` and `opacity`.
///
/// With `clipped` the merge uses source-atop: the destination alpha is kept, so `src` only shows
/// where `dst` already has coverage.
pub(crate) fn composite_rgba8_premul(
    dst: &mut [u8],
    src: &[u8],
    opacity: f32,
    blend: BlendMode,
    clipped: bool,
) -> MockupResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(MockupError::render(
            "composite_rgba8_premul expects equal-length rgba8 buffers",
        ));
    }

    // Dispatch once per op; each arm monomorphizes its own kernel.
    match blend {
        BlendMode::Normal | BlendMode::PassThrough if !clipped => {
            premul_over_in_place_opacity(dst, src, opacity);
            Ok(())
        }
        BlendMode::Normal | BlendMode::PassThrough => {
            composite_blend(dst, src, opacity, clipped, |s, _| s)
        }
        BlendMode::Multiply => composite_blend(dst, src, opacity, clipped, |s, d| s * d),
        BlendMode::Screen => composite_blend(dst, src, opacity, clipped, |s, d| s + d - s * d),
        BlendMode::Overlay => composite_blend(dst, src, opacity, clipped, |s, d| hard_light(d, s)),
        BlendMode::Darken => composite_blend(dst, src, opacity, clipped, |s, d| s.min(d)),
        BlendMode::Lighten => composite_blend(dst, src, opacity, clipped, |s, d| s.max(d)),
        BlendMode::ColorDodge => composite_blend(dst, src, opacity, clipped, |s, d| {
            if d <= 0.0 {
                0.0
            } else if s >= 1.0 {
                1.0
            } else {
                (d / (1.0 - s)).min(1.0)
            }
        }),
        BlendMode::ColorBurn => composite_blend(dst, src, opacity, clipped, |s, d| {
            if d >= 1.0 {
                1.0
            } else if s <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - d) / s).min(1.0)
            }
        }),
        BlendMode::LinearDodge => {
            composite_blend(dst, src, opacity, clipped, |s, d| (s + d).min(1.0))
        }
        BlendMode::LinearBurn => {
            composite_blend(dst, src, opacity, clipped, |s, d| (s + d - 1.0).max(0.0))
        }
        BlendMode::SoftLight => composite_blend(dst, src, opacity, clipped, |s, d| {
            if s <= 0.5 {
                d - (1.0 - 2.0 * s) * d * (1.0 - d)
            } else {
                let g = if d <= 0.25 {
                    ((16.0 * d - 12.0) * d + 4.0) * d
                } else {
                    d.sqrt()
                };
                d + (2.0 * s - 1.0) * (g - d)
            }
        }),
        BlendMode::HardLight => composite_blend(dst, src, opacity, clipped, hard_light),
        BlendMode::Difference => composite_blend(dst, src, opacity, clipped, |s, d| (d - s).abs()),
        BlendMode::Exclusion => {
            composite_blend(dst, src, opacity, clipped, |s, d| d + s - 2.0 * d * s)
        }
        BlendMode::Subtract => composite_blend(dst, src, opacity, clipped, |s, d| (d - s).max(0.0)),
        BlendMode::Divide => composite_blend(dst, src, opacity, clipped, |s, d| {
            if s <= 0.0 {
                if d <= 0.0 { 0.0 } else { 1.0 }
            } else {
                (d / s).min(1.0)
            }
        }),
    }
}

fn hard_light(s: f32, d: f32) -> f32 {
    if s <= 0.5 {
        2.0 * s * d
    } else {
        1.0 - 2.0 * (1.0 - s) * (1.0 - d)
    }
}

fn premul_over_in_place_opacity(dst: &mut [u8], src: &[u8], opacity: f32) {
    let op = crate::foundation::math::opacity_to_u8(opacity);
    if op == 0 {
        return;
    }
    let op = u16::from(op);

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = mul_div255_u8(u16::from(s[3]), op);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - u16::from(sa);

        d[3] = sa.saturating_add(mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let sc = mul_div255_u8(u16::from(s[c]), op);
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = sc.saturating_add(dc);
        }
    }
}

fn composite_blend<F>(
    dst: &mut [u8],
    src: &[u8],
    opacity: f32,
    clipped: bool,
    blend_fn: F,
) -> MockupResult<()>
where
    F: Fn(f32, f32) -> f32,
{
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return Ok(());
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        // Separable blend on unpremultiplied channels, then Porter-Duff:
        //   over: out_p = sp * (1 - da) + dp * (1 - sa) + B * sa * da
        //   atop: out_p = sp * da * (1 - da) + dp * (1 - sa) + B * sa * da * da, out_a = da
        let sa = f32::from(s[3]) / 255.0 * opacity;
        let da = f32::from(d[3]) / 255.0;
        if clipped && da <= 0.0 {
            continue;
        }

        let mut out = [0.0f32; 3];
        for c in 0..3 {
            let sp = f32::from(s[c]) / 255.0 * opacity;
            let dp = f32::from(d[c]) / 255.0;
            let sc = (sp / sa).clamp(0.0, 1.0);
            let dc = if da > 0.0 {
                (dp / da).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let b = blend_fn(sc, dc).clamp(0.0, 1.0);
            out[c] = if clipped {
                sp * da * (1.0 - da) + dp * (1.0 - sa) + b * sa * da * da
            } else {
                sp * (1.0 - da) + dp * (1.0 - sa) + b * sa * da
            };
        }
        let out_a = if clipped { da } else { sa + da * (1.0 - sa) };

        for c in 0..3 {
            d[c] = to_u8(out[c]);
        }
        d[3] = to_u8(out_a);
    }
    Ok(())
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
