//! Action-descriptor decoding (the key/value object format used by placed-layer metadata).

use crate::foundation::error::{MockupError, MockupResult};
use crate::import::reader::{ByteReader, fourcc, fourcc_to_string};

const MAX_DEPTH: usize = 32;

/// One decoded descriptor value.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum DescriptorValue {
    Object(Descriptor),
    List(Vec<DescriptorValue>),
    Double(f64),
    UnitDouble { unit: u32, value: f64 },
    UnitFloats { unit: u32, values: Vec<f64> },
    Integer(i32),
    LargeInteger(i64),
    Bool(bool),
    Text(String),
    Enum { type_id: String, value: String },
    Class { name: String, class_id: String },
    Raw(Vec<u8>),
}

impl DescriptorValue {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::UnitDouble { value, .. } => Some(*value),
            Self::Integer(v) => Some(f64::from(*v)),
            Self::LargeInteger(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub(crate) fn as_object(&self) -> Option<&Descriptor> {
        match self {
            Self::Object(d) => Some(d),
            _ => None,
        }
    }

    /// Flatten a list of numbers or a unit-float array.
    pub(crate) fn as_f64_list(&self) -> Option<Vec<f64>> {
        match self {
            Self::List(items) => items.iter().map(Self::as_f64).collect(),
            Self::UnitFloats { values, .. } => Some(values.clone()),
            _ => None,
        }
    }
}

/// Decoded descriptor: class id plus ordered items.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Descriptor {
    pub(crate) name: String,
    pub(crate) class_id: String,
    pub(crate) items: Vec<(String, DescriptorValue)>,
}

impl Descriptor {
    pub(crate) fn get(&self, key: &str) -> Option<&DescriptorValue> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub(crate) fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(DescriptorValue::as_f64)
    }

    pub(crate) fn get_object(&self, key: &str) -> Option<&Descriptor> {
        self.get(key).and_then(DescriptorValue::as_object)
    }

    /// Exactly eight numbers, as stored by placed-layer transforms.
    pub(crate) fn get_transform(&self, key: &str) -> Option<[f64; 8]> {
        let v = self.get(key)?.as_f64_list()?;
        let arr: [f64; 8] = v.try_into().ok()?;
        arr.iter().all(|x| x.is_finite()).then_some(arr)
    }
}

/// Parse a descriptor (without the leading version word).
pub(crate) fn read_descriptor(r: &mut ByteReader<'_>) -> MockupResult<Descriptor> {
    read_descriptor_at(r, 0)
}

/// Parse a `u32` version (expected 16) followed by a descriptor.
pub(crate) fn read_versioned_descriptor(r: &mut ByteReader<'_>) -> MockupResult<Descriptor> {
    let version = r.u32()?;
    if version != 16 {
        return Err(MockupError::import(format!(
            "unsupported descriptor version {version}"
        )));
    }
    read_descriptor(r)
}

fn read_descriptor_at(r: &mut ByteReader<'_>, depth: usize) -> MockupResult<Descriptor> {
    if depth > MAX_DEPTH {
        return Err(MockupError::import("descriptor nesting too deep"));
    }
    let name = r.unicode_string()?;
    let class_id = read_id(r)?;
    let count = r.u32()? as usize;
    let mut items = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let key = read_id(r)?;
        let value = read_value(r, depth)?;
        items.push((key, value));
    }
    Ok(Descriptor {
        name,
        class_id,
        items,
    })
}

/// Key or class id: a length-prefixed string, or a bare four-byte key when the length is 0.
fn read_id(r: &mut ByteReader<'_>) -> MockupResult<String> {
    let len = r.u32()? as usize;
    let n = if len == 0 { 4 } else { len };
    let raw = r.bytes(n)?;
    Ok(raw.iter().map(|&b| b as char).collect())
}

fn read_value(r: &mut ByteReader<'_>, depth: usize) -> MockupResult<DescriptorValue> {
    let ty = r.fourcc()?;
    let v = match ty {
        t if t == fourcc(b"Objc") || t == fourcc(b"GlbO") => {
            DescriptorValue::Object(read_descriptor_at(r, depth + 1)?)
        }
        t if t == fourcc(b"VlLs") => {
            let count = r.u32()? as usize;
            let mut items = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                items.push(read_value(r, depth + 1)?);
            }
            DescriptorValue::List(items)
        }
        t if t == fourcc(b"doub") => DescriptorValue::Double(r.f64()?),
        t if t == fourcc(b"UntF") => {
            let unit = r.fourcc()?;
            DescriptorValue::UnitDouble {
                unit,
                value: r.f64()?,
            }
        }
        t if t == fourcc(b"UnFl") => {
            let unit = r.fourcc()?;
            let count = r.u32()? as usize;
            let mut values = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                values.push(r.f64()?);
            }
            DescriptorValue::UnitFloats { unit, values }
        }
        t if t == fourcc(b"long") => DescriptorValue::Integer(r.i32()?),
        t if t == fourcc(b"comp") => DescriptorValue::LargeInteger(r.i64()?),
        t if t == fourcc(b"bool") => DescriptorValue::Bool(r.u8()? != 0),
        t if t == fourcc(b"TEXT") => DescriptorValue::Text(r.unicode_string()?),
        t if t == fourcc(b"enum") => {
            let type_id = read_id(r)?;
            DescriptorValue::Enum {
                type_id,
                value: read_id(r)?,
            }
        }
        t if t == fourcc(b"type") || t == fourcc(b"GlbC") => {
            let name = r.unicode_string()?;
            DescriptorValue::Class {
                name,
                class_id: read_id(r)?,
            }
        }
        t if t == fourcc(b"tdta") || t == fourcc(b"alis") => {
            let len = r.u32()? as usize;
            DescriptorValue::Raw(r.bytes(len)?.to_vec())
        }
        t if t == fourcc(b"ObAr") => {
            r.u32()?;
            DescriptorValue::Object(read_descriptor_at(r, depth + 1)?)
        }
        other => {
            return Err(MockupError::import(format!(
                "unsupported descriptor value type '{}'",
                fourcc_to_string(other)
            )));
        }
    };
    Ok(v)
}

#[cfg(test)]
#[path = "../../tests/unit/import/descriptor.rs"]
mod tests;
