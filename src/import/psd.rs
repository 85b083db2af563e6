//! Structural parse of the Photoshop document container (`8BPS`, versions 1 and 2).
//!
//! This module only splits the file into header, layer records, per-channel compressed data
//! and the merged image; pixel decoding lives in [`crate::import::channels`].

use smallvec::SmallVec;

use crate::foundation::core::Bounds;
use crate::foundation::error::{MockupError, MockupResult, Warning, WarningKind};
use crate::import::reader::{ByteReader, fourcc, fourcc_to_string};

pub(crate) const SIGNATURE: u32 = fourcc(b"8BPS");
const SIG_8BIM: u32 = fourcc(b"8BIM");
const SIG_8B64: u32 = fourcc(b"8B64");

/// Additional-info keys whose length is 8 bytes wide in PSB files.
const WIDE_KEYS: [&[u8; 4]; 13] = [
    b"LMsk", b"Lr16", b"Lr32", b"Layr", b"Mt16", b"Mt32", b"Mtrn", b"Alph", b"FMsk", b"lnk2",
    b"FEid", b"FXid", b"PxSD",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ColorMode {
    Bitmap,
    Grayscale,
    Indexed,
    Rgb,
    Cmyk,
    Multichannel,
    Duotone,
    Lab,
    Other(u16),
}

impl ColorMode {
    fn from_u16(v: u16) -> Self {
        match v {
            0 => Self::Bitmap,
            1 => Self::Grayscale,
            2 => Self::Indexed,
            3 => Self::Rgb,
            4 => Self::Cmyk,
            7 => Self::Multichannel,
            8 => Self::Duotone,
            9 => Self::Lab,
            other => Self::Other(other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PsdHeader {
    pub(crate) version: u16,
    pub(crate) channels: u16,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) depth: u16,
    pub(crate) color_mode: ColorMode,
}

impl PsdHeader {
    pub(crate) fn is_psb(&self) -> bool {
        self.version == 2
    }

    /// Largest canvas or layer side the format allows.
    pub(crate) fn max_dimension(&self) -> u32 {
        if self.is_psb() { 300_000 } else { 30_000 }
    }

    /// Only 8-bit RGB and grayscale pixels are decoded.
    pub(crate) fn pixels_supported(&self) -> bool {
        self.depth == 8 && matches!(self.color_mode, ColorMode::Rgb | ColorMode::Grayscale)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ChannelInfo {
    pub(crate) id: i16,
    pub(crate) length: usize,
}

/// Compressed data of one channel.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChannelData<'a> {
    pub(crate) id: i16,
    pub(crate) compression: u16,
    pub(crate) data: &'a [u8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LayerMaskData {
    pub(crate) bounds: Bounds,
    pub(crate) default_color: u8,
    pub(crate) flags: u8,
}

impl LayerMaskData {
    pub(crate) fn disabled(&self) -> bool {
        self.flags & 0x02 != 0
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct InfoBlock<'a> {
    pub(crate) key: u32,
    pub(crate) data: &'a [u8],
}

#[derive(Clone, Debug)]
pub(crate) struct LayerRecord<'a> {
    pub(crate) bounds: Bounds,
    pub(crate) channels: SmallVec<[ChannelInfo; 6]>,
    pub(crate) blend_key: u32,
    pub(crate) opacity: u8,
    pub(crate) clipping: u8,
    pub(crate) flags: u8,
    pub(crate) mask: Option<LayerMaskData>,
    pub(crate) name: String,
    pub(crate) info: Vec<InfoBlock<'a>>,
    /// `None` when the channel data section was truncated before this layer.
    pub(crate) channel_data: Option<SmallVec<[ChannelData<'a>; 6]>>,
}

impl<'a> LayerRecord<'a> {
    pub(crate) fn info(&self, key: &[u8; 4]) -> Option<&'a [u8]> {
        let k = fourcc(key);
        self.info.iter().find(|b| b.key == k).map(|b| b.data)
    }

    pub(crate) fn has_info(&self, key: &[u8; 4]) -> bool {
        self.info(key).is_some()
    }

    pub(crate) fn hidden(&self) -> bool {
        self.flags & 0x02 != 0
    }

    pub(crate) fn channel(&self, id: i16) -> Option<&ChannelData<'a>> {
        self.channel_data.as_ref()?.iter().find(|c| c.id == id)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PsdDocument<'a> {
    pub(crate) header: PsdHeader,
    pub(crate) layers: Vec<LayerRecord<'a>>,
    /// Compression word plus planar data of the flattened image.
    pub(crate) merged: Option<&'a [u8]>,
}

/// Split `bytes` into document sections.
///
/// Header problems are fatal. A damaged layer section degrades to an empty layer list plus a
/// warning so the merged image can still be used.
pub(crate) fn parse_document(bytes: &[u8]) -> MockupResult<(PsdDocument<'_>, Vec<Warning>)> {
    let mut r = ByteReader::new(bytes);
    let header = read_header(&mut r)?;
    let wide = header.is_psb();
    let mut warnings = Vec::new();

    let color_data = r.u32()? as usize;
    r.skip(color_data)?;
    let resources = r.u32()? as usize;
    r.skip(resources)?;

    let mut layers = Vec::new();
    let mut merged = None;
    match r.length(wide).and_then(|n| r.sub(n)) {
        Ok(mut section) => {
            match read_layer_info(&mut section, wide) {
                Ok(l) => layers = l,
                Err(e) => warnings.push(Warning::new(
                    WarningKind::LayerImageUnreadable,
                    format!("layer section unreadable, using merged image only: {e}"),
                )),
            }
            if !r.is_empty() {
                merged = Some(r.bytes(r.remaining())?);
            }
        }
        Err(e) => warnings.push(Warning::new(
            WarningKind::LayerImageUnreadable,
            format!("layer and mask section truncated: {e}"),
        )),
    }

    Ok((
        PsdDocument {
            header,
            layers,
            merged,
        },
        warnings,
    ))
}

fn read_header(r: &mut ByteReader<'_>) -> MockupResult<PsdHeader> {
    let sig = r.fourcc()?;
    if sig != SIGNATURE {
        return Err(MockupError::import(format!(
            "not a layered scene file (signature '{}')",
            fourcc_to_string(sig)
        )));
    }
    let version = r.u16()?;
    if version != 1 && version != 2 {
        return Err(MockupError::import(format!(
            "unsupported file version {version}"
        )));
    }
    r.skip(6)?;
    let channels = r.u16()?;
    let height = r.u32()?;
    let width = r.u32()?;
    let depth = r.u16()?;
    let color_mode = ColorMode::from_u16(r.u16()?);
    if width == 0 || height == 0 {
        return Err(MockupError::import(format!(
            "invalid canvas dimensions {width}x{height}"
        )));
    }
    let header = PsdHeader {
        version,
        channels,
        width,
        height,
        depth,
        color_mode,
    };
    let limit = header.max_dimension();
    if width > limit || height > limit {
        return Err(MockupError::import(format!(
            "canvas {width}x{height} exceeds the {limit} px format limit"
        )));
    }
    Ok(header)
}

fn read_layer_info<'a>(r: &mut ByteReader<'a>, wide: bool) -> MockupResult<Vec<LayerRecord<'a>>> {
    if r.is_empty() {
        return Ok(Vec::new());
    }
    let len = r.length(wide)?;
    if len == 0 {
        return Ok(Vec::new());
    }
    let mut info = r.sub(len)?;
    let count = info.i16()?.unsigned_abs() as usize;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(read_layer_record(&mut info, wide)?);
    }

    let mut truncated = false;
    for rec in &mut records {
        if truncated {
            break;
        }
        let mut data = SmallVec::new();
        for ch in &rec.channels {
            if ch.length > info.remaining() {
                truncated = true;
                break;
            }
            let mut c = info.sub(ch.length)?;
            let compression = if c.remaining() >= 2 { c.u16()? } else { 0 };
            let rest = c.remaining();
            data.push(ChannelData {
                id: ch.id,
                compression,
                data: c.bytes(rest)?,
            });
        }
        if !truncated {
            rec.channel_data = Some(data);
        }
    }
    Ok(records)
}

fn read_layer_record<'a>(r: &mut ByteReader<'a>, wide: bool) -> MockupResult<LayerRecord<'a>> {
    let top = r.i32()?;
    let left = r.i32()?;
    let bottom = r.i32()?;
    let right = r.i32()?;

    let n_channels = r.u16()? as usize;
    let mut channels = SmallVec::new();
    for _ in 0..n_channels {
        let id = r.i16()?;
        let length = r.length(wide)?;
        channels.push(ChannelInfo { id, length });
    }

    let sig = r.fourcc()?;
    if sig != SIG_8BIM {
        return Err(MockupError::import(format!(
            "bad blend signature '{}' at offset {}",
            fourcc_to_string(sig),
            r.position()
        )));
    }
    let blend_key = r.fourcc()?;
    let opacity = r.u8()?;
    let clipping = r.u8()?;
    let flags = r.u8()?;
    r.skip(1)?;

    let extra_len = r.u32()? as usize;
    let mut extra = r.sub(extra_len)?;

    let mask_len = extra.u32()? as usize;
    let mut mask_r = extra.sub(mask_len)?;
    let mask = if mask_len >= 18 {
        let t = mask_r.i32()?;
        let l = mask_r.i32()?;
        let b = mask_r.i32()?;
        let rr = mask_r.i32()?;
        let default_color = mask_r.u8()?;
        let flags = mask_r.u8()?;
        Some(LayerMaskData {
            bounds: Bounds::new(l, t, rr, b),
            default_color,
            flags,
        })
    } else {
        None
    };

    let ranges_len = extra.u32()? as usize;
    extra.skip(ranges_len)?;

    let name = extra.pascal_string(4)?;

    let mut info = Vec::new();
    while extra.remaining() >= 12 {
        let sig = extra.fourcc()?;
        if sig != SIG_8BIM && sig != SIG_8B64 {
            break;
        }
        let key = extra.fourcc()?;
        let key_wide = wide && WIDE_KEYS.iter().any(|k| fourcc(k) == key);
        let len = extra.length(key_wide)?;
        let data = extra.bytes(len.min(extra.remaining()))?;
        info.push(InfoBlock { key, data });
    }

    Ok(LayerRecord {
        bounds: Bounds::new(left, top, right, bottom),
        channels,
        blend_key,
        opacity,
        clipping,
        flags,
        mask,
        name,
        info,
        channel_data: None,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/import/psd.rs"]
mod tests;
