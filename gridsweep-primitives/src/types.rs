//! Element kinds and typed host-side arrays.
//!
//! Kernels in this workspace operate on 32-bit elements only. The element
//! kind is an explicit tag carried alongside buffers and host arrays so
//! binding and readback can switch on it instead of on names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Element type of a kernel's source and destination buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    U32,
    F32,
}

impl ElementKind {
    pub const ALL: [ElementKind; 2] = [ElementKind::U32, ElementKind::F32];

    /// Size of one element in bytes.
    pub const fn size_bytes(self) -> u64 {
        4
    }

    /// Scalar type name as written in WGSL.
    pub const fn wgsl(self) -> &'static str {
        match self {
            ElementKind::U32 => "u32",
            ElementKind::F32 => "f32",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wgsl())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "u32" => Ok(ElementKind::U32),
            "f32" => Ok(ElementKind::F32),
            other => Err(format!("unknown element kind '{other}' (expected u32 or f32)")),
        }
    }
}

/// A single element value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Element {
    U32(u32),
    F32(f32),
}

impl Element {
    /// Integers in hex, floats as-is.
    pub fn hex(&self) -> String {
        match self {
            Element::U32(v) => format!("{v:#x}"),
            Element::F32(v) => format!("{v}"),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::U32(v) => write!(f, "{v}"),
            Element::F32(v) => write!(f, "{v}"),
        }
    }
}

/// Host-resident array tagged with its element kind.
#[derive(Debug, Clone, PartialEq)]
pub enum HostArray {
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl HostArray {
    /// Reinterpret little-endian device bytes as `kind` elements.
    ///
    /// Returns `None` when `bytes` is not a whole number of elements.
    pub fn from_bytes(kind: ElementKind, bytes: &[u8]) -> Option<Self> {
        if bytes.len() as u64 % kind.size_bytes() != 0 {
            return None;
        }
        // pod_collect_to_vec copies, so the source needs no alignment.
        Some(match kind {
            ElementKind::U32 => HostArray::U32(bytemuck::pod_collect_to_vec(bytes)),
            ElementKind::F32 => HostArray::F32(bytemuck::pod_collect_to_vec(bytes)),
        })
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            HostArray::U32(_) => ElementKind::U32,
            HostArray::F32(_) => ElementKind::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HostArray::U32(v) => v.len(),
            HostArray::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Element> {
        match self {
            HostArray::U32(v) => v.get(index).copied().map(Element::U32),
            HostArray::F32(v) => v.get(index).copied().map(Element::F32),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            HostArray::U32(v) => bytemuck::cast_slice(v),
            HostArray::F32(v) => bytemuck::cast_slice(v),
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            HostArray::U32(v) => Some(v),
            HostArray::F32(_) => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            HostArray::F32(v) => Some(v),
            HostArray::U32(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("f32".parse::<ElementKind>().unwrap(), ElementKind::F32);
        assert_eq!(" U32 ".parse::<ElementKind>().unwrap(), ElementKind::U32);
        assert!("f16".parse::<ElementKind>().is_err());
        assert_eq!(ElementKind::F32.to_string(), "f32");
    }

    #[test]
    fn test_from_bytes_reinterprets_little_endian() {
        let bytes = [1u8, 0, 0, 0, 0, 0, 0x80, 0x3f];
        let arr = HostArray::from_bytes(ElementKind::U32, &bytes).unwrap();
        assert_eq!(arr.as_u32().unwrap(), &[1, 0x3f80_0000]);
        let arr = HostArray::from_bytes(ElementKind::F32, &bytes[4..]).unwrap();
        assert_eq!(arr.get(0), Some(Element::F32(1.0)));
    }

    #[test]
    fn test_from_bytes_rejects_partial_elements() {
        assert!(HostArray::from_bytes(ElementKind::U32, &[0u8; 6]).is_none());
    }

    #[test]
    fn test_as_bytes_reverses_from_bytes() {
        let arr = HostArray::F32(vec![0.5; 10]);
        assert_eq!(arr.as_bytes().len(), 40);
        assert_eq!(HostArray::from_bytes(ElementKind::F32, arr.as_bytes()), Some(arr));
    }

    #[test]
    fn test_element_hex() {
        assert_eq!(Element::U32(255).hex(), "0xff");
        assert_eq!(Element::F32(1.5).hex(), "1.5");
    }
}
