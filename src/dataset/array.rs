//! Typed, flat array storage shared by FITS columns, labelled variables and
//! netCDF artifacts.

use std::fmt;

/// Element type of an [`ArrayData`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Str,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::U8 => "u8",
            DataType::I8 => "i8",
            DataType::I16 => "i16",
            DataType::U16 => "u16",
            DataType::I32 => "i32",
            DataType::U32 => "u32",
            DataType::I64 => "i64",
            DataType::U64 => "u64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::Str => "str",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flat, row-major values in native byte order
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Str(Vec<String>),
}

/// Apply the same expression to whichever vector an [`ArrayData`] holds.
macro_rules! map_array {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            ArrayData::U8($v) => $body,
            ArrayData::I8($v) => $body,
            ArrayData::I16($v) => $body,
            ArrayData::U16($v) => $body,
            ArrayData::I32($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
            ArrayData::Str($v) => $body,
        }
    };
}

/// Same as [`map_array!`] but rewraps the result in the matching variant.
macro_rules! rewrap_array {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            ArrayData::U8($v) => ArrayData::U8($body),
            ArrayData::I8($v) => ArrayData::I8($body),
            ArrayData::I16($v) => ArrayData::I16($body),
            ArrayData::U16($v) => ArrayData::U16($body),
            ArrayData::I32($v) => ArrayData::I32($body),
            ArrayData::U32($v) => ArrayData::U32($body),
            ArrayData::I64($v) => ArrayData::I64($body),
            ArrayData::U64($v) => ArrayData::U64($body),
            ArrayData::F32($v) => ArrayData::F32($body),
            ArrayData::F64($v) => ArrayData::F64($body),
            ArrayData::Str($v) => ArrayData::Str($body),
        }
    };
}

impl ArrayData {
    /// An empty array of the given type with reserved capacity
    pub fn with_capacity(dtype: DataType, capacity: usize) -> Self {
        match dtype {
            DataType::U8 => ArrayData::U8(Vec::with_capacity(capacity)),
            DataType::I8 => ArrayData::I8(Vec::with_capacity(capacity)),
            DataType::I16 => ArrayData::I16(Vec::with_capacity(capacity)),
            DataType::U16 => ArrayData::U16(Vec::with_capacity(capacity)),
            DataType::I32 => ArrayData::I32(Vec::with_capacity(capacity)),
            DataType::U32 => ArrayData::U32(Vec::with_capacity(capacity)),
            DataType::I64 => ArrayData::I64(Vec::with_capacity(capacity)),
            DataType::U64 => ArrayData::U64(Vec::with_capacity(capacity)),
            DataType::F32 => ArrayData::F32(Vec::with_capacity(capacity)),
            DataType::F64 => ArrayData::F64(Vec::with_capacity(capacity)),
            DataType::Str => ArrayData::Str(Vec::with_capacity(capacity)),
        }
    }

    pub fn dtype(&self) -> DataType {
        match self {
            ArrayData::U8(_) => DataType::U8,
            ArrayData::I8(_) => DataType::I8,
            ArrayData::I16(_) => DataType::I16,
            ArrayData::U16(_) => DataType::U16,
            ArrayData::I32(_) => DataType::I32,
            ArrayData::U32(_) => DataType::U32,
            ArrayData::I64(_) => DataType::I64,
            ArrayData::U64(_) => DataType::U64,
            ArrayData::F32(_) => DataType::F32,
            ArrayData::F64(_) => DataType::F64,
            ArrayData::Str(_) => DataType::Str,
        }
    }

    pub fn len(&self) -> usize {
        map_array!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to `f64`; `None` for string arrays
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        let values = match self {
            ArrayData::U8(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::I8(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::I16(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::U16(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::I32(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::U32(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::U64(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::F64(v) => v.clone(),
            ArrayData::Str(_) => return None,
        };
        Some(values)
    }

    /// Copy of the elements in `start..end`
    pub fn slice(&self, start: usize, end: usize) -> ArrayData {
        rewrap_array!(self, v => v[start..end].to_vec())
    }

    /// Concatenate arrays of one type; `None` when the types differ
    pub fn concat(parts: &[ArrayData]) -> Option<ArrayData> {
        let first = parts.first()?;
        let total = parts.iter().map(ArrayData::len).sum();
        let mut out = ArrayData::with_capacity(first.dtype(), total);
        for part in parts {
            out.extend_from(part)?;
        }
        Some(out)
    }

    /// Append `other`, which must share this array's type
    pub fn extend_from(&mut self, other: &ArrayData) -> Option<()> {
        match (self, other) {
            (ArrayData::U8(a), ArrayData::U8(b)) => a.extend_from_slice(b),
            (ArrayData::I8(a), ArrayData::I8(b)) => a.extend_from_slice(b),
            (ArrayData::I16(a), ArrayData::I16(b)) => a.extend_from_slice(b),
            (ArrayData::U16(a), ArrayData::U16(b)) => a.extend_from_slice(b),
            (ArrayData::I32(a), ArrayData::I32(b)) => a.extend_from_slice(b),
            (ArrayData::U32(a), ArrayData::U32(b)) => a.extend_from_slice(b),
            (ArrayData::I64(a), ArrayData::I64(b)) => a.extend_from_slice(b),
            (ArrayData::U64(a), ArrayData::U64(b)) => a.extend_from_slice(b),
            (ArrayData::F32(a), ArrayData::F32(b)) => a.extend_from_slice(b),
            (ArrayData::F64(a), ArrayData::F64(b)) => a.extend_from_slice(b),
            (ArrayData::Str(a), ArrayData::Str(b)) => a.extend_from_slice(b),
            _ => return None,
        }
        Some(())
    }

    /// Human readable rendering of element `index`
    pub fn display_at(&self, index: usize) -> String {
        map_array!(self, v => v.get(index).map(|x| format!("{x}")).unwrap_or_default())
    }
}

impl From<Vec<f64>> for ArrayData {
    fn from(values: Vec<f64>) -> Self {
        ArrayData::F64(values)
    }
}

impl From<Vec<f32>> for ArrayData {
    fn from(values: Vec<f32>) -> Self {
        ArrayData::F32(values)
    }
}

impl From<Vec<i32>> for ArrayData {
    fn from(values: Vec<i32>) -> Self {
        ArrayData::I32(values)
    }
}

impl From<Vec<i64>> for ArrayData {
    fn from(values: Vec<i64>) -> Self {
        ArrayData::I64(values)
    }
}

impl From<Vec<String>> for ArrayData {
    fn from(values: Vec<String>) -> Self {
        ArrayData::Str(values)
    }
}

/// Round half to even at `decimals` places, matching NumPy's `round`.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}
