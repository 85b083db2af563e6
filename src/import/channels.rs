use std::io::Read;
use std::sync::Arc;

use anyhow::Context;

use crate::assets::decode::premultiply_rgba8_in_place;
use crate::assets::store::PreparedImage;
use crate::foundation::core::Bounds;
use crate::foundation::error::{MockupError, MockupResult};
use crate::import::psd::{ChannelData, ColorMode, LayerMaskData, LayerRecord, PsdHeader};
use crate::import::reader::ByteReader;
use crate::scene::snapshot::MaskRaster;

const RAW: u16 = 0;
const RLE: u16 = 1;
const ZIP: u16 = 2;
const ZIP_PREDICTION: u16 = 3;

/// A PackBits repeat run turns two bytes into at most 128.
const PACKBITS_MAX_EXPANSION: usize = 64;

/// Decode one 8-bit channel plane of `width * height` bytes.
pub(crate) fn decode_channel(
    ch: &ChannelData<'_>,
    width: usize,
    height: usize,
    wide: bool,
) -> MockupResult<Vec<u8>> {
    decode_plane(ch.compression, ch.data, width, height, wide)
}

/// Byte size of a `width * height` plane; errors when the RGBA expansion would overflow.
fn plane_len(width: usize, height: usize) -> MockupResult<usize> {
    width
        .checked_mul(height)
        .filter(|n| n.checked_mul(4).is_some())
        .ok_or_else(|| MockupError::decode(format!("plane {width}x{height} is too large")))
}

/// Side lengths of `bounds`, rejected when wider than the format allows.
fn checked_dimensions(bounds: Bounds, header: &PsdHeader) -> MockupResult<(usize, usize)> {
    let limit = header.max_dimension();
    let (w, h) = (bounds.width(), bounds.height());
    if w > limit || h > limit {
        return Err(MockupError::decode(format!(
            "bounds {w}x{h} exceed the {limit} px format limit"
        )));
    }
    Ok((w as usize, h as usize))
}

/// Reject RLE data too short to hold its row table and `expected` decoded bytes.
fn check_rle_size(data_len: usize, rows: usize, wide: bool, expected: usize) -> MockupResult<()> {
    let table = rows.saturating_mul(if wide { 4 } else { 2 });
    if data_len < table || expected / PACKBITS_MAX_EXPANSION > data_len - table {
        return Err(MockupError::decode(format!(
            "RLE data has {data_len} bytes, too few for {rows} rows of {expected} bytes"
        )));
    }
    Ok(())
}

fn decode_plane(
    compression: u16,
    data: &[u8],
    width: usize,
    height: usize,
    wide: bool,
) -> MockupResult<Vec<u8>> {
    let expected = plane_len(width, height)?;
    match compression {
        RAW => {
            if data.len() < expected {
                return Err(MockupError::decode(format!(
                    "raw channel has {} bytes, expected {expected}",
                    data.len()
                )));
            }
            Ok(data[..expected].to_vec())
        }
        RLE => {
            check_rle_size(data.len(), height, wide, expected)?;
            let mut r = ByteReader::new(data);
            let mut counts = Vec::with_capacity(height);
            for _ in 0..height {
                counts.push(if wide {
                    r.u32()? as usize
                } else {
                    usize::from(r.u16()?)
                });
            }
            let mut out = Vec::with_capacity(expected);
            for n in counts {
                let row = r.bytes(n)?;
                let start = out.len();
                unpack_bits(row, &mut out)?;
                if out.len() - start != width {
                    return Err(MockupError::decode(format!(
                        "RLE row decoded to {} bytes, expected {width}",
                        out.len() - start
                    )));
                }
            }
            Ok(out)
        }
        ZIP | ZIP_PREDICTION => {
            let mut out = Vec::new();
            flate2::read::ZlibDecoder::new(data)
                .take(expected as u64)
                .read_to_end(&mut out)
                .context("inflate ZIP channel")?;
            if out.len() < expected {
                return Err(MockupError::decode(format!(
                    "ZIP channel inflated to {} bytes, expected {expected}",
                    out.len()
                )));
            }
            if compression == ZIP_PREDICTION {
                for row in out.chunks_exact_mut(width.max(1)) {
                    for x in 1..row.len() {
                        row[x] = row[x].wrapping_add(row[x - 1]);
                    }
                }
            }
            Ok(out)
        }
        other => Err(MockupError::decode(format!(
            "unknown channel compression {other}"
        ))),
    }
}

/// Expand PackBits-encoded `src`, appending to `out`.
pub(crate) fn unpack_bits(src: &[u8], out: &mut Vec<u8>) -> MockupResult<()> {
    let mut i = 0;
    while i < src.len() {
        let n = src[i] as i8;
        i += 1;
        if n >= 0 {
            let count = n as usize + 1;
            let lit = src
                .get(i..i + count)
                .ok_or_else(|| MockupError::decode("PackBits literal run past end of row"))?;
            out.extend_from_slice(lit);
            i += count;
        } else if n != -128 {
            let count = (1 - i16::from(n)) as usize;
            let v = *src
                .get(i)
                .ok_or_else(|| MockupError::decode("PackBits repeat run past end of row"))?;
            out.resize(out.len() + count, v);
            i += 1;
        }
    }
    Ok(())
}

/// Compose a layer's color and alpha channels into a premultiplied raster over its bounds.
///
/// Returns `Ok(None)` for layers without pixels.
pub(crate) fn layer_image(
    rec: &LayerRecord<'_>,
    header: &PsdHeader,
) -> MockupResult<Option<PreparedImage>> {
    if rec.bounds.is_empty() {
        return Ok(None);
    }
    let (w, h) = checked_dimensions(rec.bounds, header)?;
    let wide = header.is_psb();
    if rec.channel_data.is_none() {
        return Err(MockupError::decode("channel data missing (truncated file)"));
    }

    let plane = |id: i16| -> MockupResult<Option<Vec<u8>>> {
        rec.channel(id)
            .map(|c| decode_channel(c, w, h, wide))
            .transpose()
    };

    let color_ids: &[i16] = match header.color_mode {
        ColorMode::Grayscale => &[0],
        _ => &[0, 1, 2],
    };
    let mut planes = Vec::with_capacity(color_ids.len());
    for &id in color_ids {
        planes.push(plane(id)?);
    }
    let alpha = plane(-1)?;
    if alpha.is_none() && planes.iter().all(Option::is_none) {
        return Ok(None);
    }

    let at = |p: &Option<Vec<u8>>, i: usize| p.as_ref().map_or(0, |p| p[i]);
    let mut rgba = vec![0u8; plane_len(w, h)? * 4];
    for (i, px) in rgba.chunks_exact_mut(4).enumerate() {
        if planes.len() == 1 {
            px[..3].fill(at(&planes[0], i));
        } else {
            px[0] = at(&planes[0], i);
            px[1] = at(&planes[1], i);
            px[2] = at(&planes[2], i);
        }
        px[3] = alpha.as_ref().map_or(255, |a| a[i]);
    }
    premultiply_rgba8_in_place(&mut rgba);
    PreparedImage::from_premul(w as u32, h as u32, rgba).map(Some)
}

/// Decode the user-mask channel (`-2`) of a layer.
pub(crate) fn layer_mask(
    rec: &LayerRecord<'_>,
    mask: &LayerMaskData,
    header: &PsdHeader,
) -> MockupResult<MaskRaster> {
    let (w, h) = checked_dimensions(mask.bounds, header)?;
    let gray = if w == 0 || h == 0 {
        Vec::new()
    } else {
        let ch = rec
            .channel(-2)
            .ok_or_else(|| MockupError::decode("mask channel missing"))?;
        decode_channel(ch, w, h, header.is_psb())?
    };
    let bounds = if gray.is_empty() {
        Bounds::default()
    } else {
        mask.bounds
    };
    Ok(MaskRaster {
        bounds,
        default_color: mask.default_color,
        gray: Arc::new(gray),
    })
}

/// Decode the flattened image stored after the layer section.
pub(crate) fn merged_image(data: &[u8], header: &PsdHeader) -> MockupResult<PreparedImage> {
    let (w, h) = (header.width as usize, header.height as usize);
    let wide = header.is_psb();
    let n_channels = usize::from(header.channels);
    let color = match header.color_mode {
        ColorMode::Grayscale => 1,
        _ => 3,
    };
    if n_channels < color {
        return Err(MockupError::decode("merged image has too few channels"));
    }
    let has_alpha = n_channels > color;
    let used = if has_alpha { color + 1 } else { color };

    let mut r = ByteReader::new(data);
    let compression = r.u16()?;
    let body = r.bytes(r.remaining())?;
    let plane_size = plane_len(w, h)?;

    let planes: Vec<Vec<u8>> = match compression {
        RAW => body
            .chunks(plane_size)
            .take(used)
            .map(<[u8]>::to_vec)
            .collect(),
        RLE => {
            let rows = n_channels * h;
            check_rle_size(body.len(), rows, wide, plane_size.saturating_mul(used))?;
            let mut counts_r = ByteReader::new(body);
            let mut counts = Vec::with_capacity(rows);
            for _ in 0..rows {
                counts.push(if wide {
                    counts_r.u32()? as usize
                } else {
                    usize::from(counts_r.u16()?)
                });
            }
            let mut planes = Vec::with_capacity(used);
            for c in 0..used {
                let mut plane = Vec::with_capacity(plane_size);
                for y in 0..h {
                    let row = counts_r.bytes(counts[c * h + y])?;
                    unpack_bits(row, &mut plane)?;
                }
                planes.push(plane);
            }
            planes
        }
        ZIP | ZIP_PREDICTION => {
            let all = decode_plane(compression, body, w, h * n_channels, wide)?;
            all.chunks(plane_size)
                .take(used)
                .map(<[u8]>::to_vec)
                .collect()
        }
        other => {
            return Err(MockupError::decode(format!(
                "unknown merged image compression {other}"
            )));
        }
    };
    if planes.len() < used || planes.iter().any(|p| p.len() < plane_size) {
        return Err(MockupError::decode("merged image data truncated"));
    }

    let mut rgba = vec![0u8; plane_size * 4];
    for (i, px) in rgba.chunks_exact_mut(4).enumerate() {
        if color == 1 {
            px[..3].fill(planes[0][i]);
        } else {
            px[0] = planes[0][i];
            px[1] = planes[1][i];
            px[2] = planes[2][i];
        }
        px[3] = if has_alpha { planes[color][i] } else { 255 };
    }
    premultiply_rgba8_in_place(&mut rgba);
    PreparedImage::from_premul(header.width, header.height, rgba)
}

#[cfg(test)]
#[path = "../../tests/unit/import/channels.rs"]
mod tests;
