//! BINTABLE column layout and decoding.
//!
//! Each row of a binary table is `NAXIS1` bytes; a column occupies a fixed
//! byte range of every row described by its `TFORMn`. FITS stores numbers
//! big-endian; decoding always yields native-order values.

use super::header::Header;
use crate::dataset::{ArrayData, DataType};
use bytes::Buf;

/// Byte order of encoded column values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Binary table field type code from `TFORMn`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCode {
    Logical,
    Byte,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Char,
}

impl FormatCode {
    fn from_char(code: char) -> Option<Self> {
        Some(match code {
            'L' => FormatCode::Logical,
            'B' => FormatCode::Byte,
            'I' => FormatCode::Int16,
            'J' => FormatCode::Int32,
            'K' => FormatCode::Int64,
            'E' => FormatCode::Float32,
            'D' => FormatCode::Float64,
            'A' => FormatCode::Char,
            _ => return None,
        })
    }

    /// Width in bytes of one element
    pub fn width(&self) -> usize {
        match self {
            FormatCode::Logical | FormatCode::Byte | FormatCode::Char => 1,
            FormatCode::Int16 => 2,
            FormatCode::Int32 | FormatCode::Float32 => 4,
            FormatCode::Int64 | FormatCode::Float64 => 8,
        }
    }
}

/// Parsed `TFORMn`: repeat count and element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnFormat {
    pub repeat: usize,
    pub code: FormatCode,
}

impl ColumnFormat {
    pub fn parse(tform: &str) -> Result<Self, String> {
        let tform = tform.trim();
        let digits: String = tform.chars().take_while(|c| c.is_ascii_digit()).collect();
        let code_char = tform[digits.len()..]
            .chars()
            .next()
            .ok_or_else(|| format!("empty TFORM '{tform}'"))?;
        let repeat = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| format!("invalid repeat in TFORM '{tform}'"))?
        };
        let code = FormatCode::from_char(code_char)
            .ok_or_else(|| format!("unsupported TFORM '{tform}'"))?;
        Ok(Self { repeat, code })
    }

    /// Bytes occupied in each row
    pub fn byte_width(&self) -> usize {
        self.repeat * self.code.width()
    }
}

/// Value transformation applied after decoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scaling {
    None,
    /// Signed storage of an unsigned type via the standard TZERO offset
    Unsigned,
    /// Signed storage of i8 via TZERO = -128
    SignedByte,
    /// Physical value = stored * scale + zero
    Linear { scale: f64, zero: f64 },
}

impl Scaling {
    fn detect(code: FormatCode, scale: f64, zero: f64) -> Self {
        if scale == 1.0 && zero == 0.0 {
            return Scaling::None;
        }
        if scale == 1.0 {
            match (code, zero) {
                (FormatCode::Byte, z) if z == -128.0 => return Scaling::SignedByte,
                (FormatCode::Int16, z) if z == 32768.0 => return Scaling::Unsigned,
                (FormatCode::Int32, z) if z == 2147483648.0 => return Scaling::Unsigned,
                (FormatCode::Int64, z) if z == 9223372036854775808.0 => {
                    return Scaling::Unsigned;
                }
                _ => {}
            }
        }
        Scaling::Linear { scale, zero }
    }
}

/// Layout of one column within a row
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub name: String,
    pub format: ColumnFormat,
    pub unit: Option<String>,
    /// Per-row cell shape in C order (reversed `TDIMn`)
    pub cell_shape: Vec<usize>,
    pub offset: usize,
    pub scaling: Scaling,
}

impl ColumnLayout {
    /// Build layouts for all `TFIELDS` columns of a BINTABLE header
    pub fn from_header(header: &Header) -> Result<Vec<Self>, String> {
        let fields = header.require_usize("TFIELDS")?;
        let mut layouts = Vec::with_capacity(fields);
        let mut offset = 0;

        for n in 1..=fields {
            let name = header
                .get_str(&format!("TTYPE{n}"))
                .map(str::to_string)
                .unwrap_or_else(|| format!("col{n}"));
            let tform = header
                .get_str(&format!("TFORM{n}"))
                .ok_or_else(|| format!("missing TFORM{n} for column {name}"))?;
            let format = ColumnFormat::parse(tform).map_err(|e| format!("{name}: {e}"))?;
            let unit = header
                .get_str(&format!("TUNIT{n}"))
                .filter(|u| !u.is_empty())
                .map(str::to_string);
            let cell_shape = match header.get_str(&format!("TDIM{n}")) {
                Some(tdim) => cell_shape_from_tdim(tdim, &format)
                    .map_err(|e| format!("{name}: {e}"))?,
                None => default_cell_shape(&format),
            };
            let scale = header.get_float(&format!("TSCAL{n}")).unwrap_or(1.0);
            let zero = header.get_float(&format!("TZERO{n}")).unwrap_or(0.0);
            let scaling = match format.code {
                FormatCode::Char | FormatCode::Logical => Scaling::None,
                code => Scaling::detect(code, scale, zero),
            };

            layouts.push(Self {
                name,
                format,
                unit,
                cell_shape,
                offset,
                scaling,
            });
            offset += format.byte_width();
        }

        Ok(layouts)
    }

    /// Decoded element type
    pub fn dtype(&self) -> DataType {
        match (self.format.code, self.scaling) {
            (FormatCode::Char, _) => DataType::Str,
            (_, Scaling::Linear { .. }) => DataType::F64,
            (FormatCode::Logical, _) => DataType::U8,
            (FormatCode::Byte, Scaling::SignedByte) => DataType::I8,
            (FormatCode::Byte, _) => DataType::U8,
            (FormatCode::Int16, Scaling::Unsigned) => DataType::U16,
            (FormatCode::Int16, _) => DataType::I16,
            (FormatCode::Int32, Scaling::Unsigned) => DataType::U32,
            (FormatCode::Int32, _) => DataType::I32,
            (FormatCode::Int64, Scaling::Unsigned) => DataType::U64,
            (FormatCode::Int64, _) => DataType::I64,
            (FormatCode::Float32, _) => DataType::F32,
            (FormatCode::Float64, _) => DataType::F64,
        }
    }

    /// Decode this column from `nrows` rows of `row_width` bytes each
    pub fn decode(
        &self,
        data: &[u8],
        nrows: usize,
        row_width: usize,
        order: ByteOrder,
    ) -> Result<ArrayData, String> {
        let width = self.format.byte_width();
        let table_len = nrows.checked_mul(row_width);
        if self.offset + width > row_width || table_len.is_none_or(|len| data.len() < len) {
            return Err(format!("column {} extends past the table data", self.name));
        }

        let mut out = ArrayData::with_capacity(self.dtype(), nrows * self.elements_per_row());

        for row in 0..nrows {
            let start = row * row_width + self.offset;
            self.decode_cell(&data[start..start + width], order, &mut out);
        }
        Ok(out)
    }

    /// Values decoded from each cell: strings for text, else `TDIM` elements.
    /// Trailing elements beyond `TDIM` are padding and skipped.
    fn elements_per_row(&self) -> usize {
        match self.format.code {
            FormatCode::Char => self.cell_shape.iter().product::<usize>().max(1),
            _ if self.cell_shape.is_empty() => self.format.repeat.min(1),
            _ => self.cell_shape.iter().product(),
        }
    }

    fn decode_cell(&self, mut cell: &[u8], order: ByteOrder, out: &mut ArrayData) {
        let repeat = self.elements_per_row();
        match (out, self.scaling) {
            (ArrayData::Str(v), _) => {
                let strings = repeat;
                let len = (self.format.repeat / strings).max(1);
                for chunk in cell.chunks(len).take(strings) {
                    v.push(decode_string(chunk));
                }
            }
            (ArrayData::F64(v), Scaling::Linear { scale, zero }) => {
                for _ in 0..repeat {
                    v.push(read_raw_f64(&mut cell, self.format.code, order) * scale + zero);
                }
            }
            (ArrayData::U8(v), _) if self.format.code == FormatCode::Logical => {
                v.extend(cell.iter().take(repeat).map(|&b| u8::from(b == b'T')));
            }
            (ArrayData::U8(v), _) => v.extend_from_slice(&cell[..repeat]),
            (ArrayData::I8(v), _) => v.extend(cell[..repeat].iter().map(|&b| (b ^ 0x80) as i8)),
            (ArrayData::I16(v), _) => {
                for _ in 0..repeat {
                    v.push(match order {
                        ByteOrder::Big => cell.get_i16(),
                        ByteOrder::Little => cell.get_i16_le(),
                    });
                }
            }
            (ArrayData::U16(v), _) => {
                for _ in 0..repeat {
                    let raw = match order {
                        ByteOrder::Big => cell.get_u16(),
                        ByteOrder::Little => cell.get_u16_le(),
                    };
                    v.push(raw ^ 0x8000);
                }
            }
            (ArrayData::I32(v), _) => {
                for _ in 0..repeat {
                    v.push(match order {
                        ByteOrder::Big => cell.get_i32(),
                        ByteOrder::Little => cell.get_i32_le(),
                    });
                }
            }
            (ArrayData::U32(v), _) => {
                for _ in 0..repeat {
                    let raw = match order {
                        ByteOrder::Big => cell.get_u32(),
                        ByteOrder::Little => cell.get_u32_le(),
                    };
                    v.push(raw ^ 0x8000_0000);
                }
            }
            (ArrayData::I64(v), _) => {
                for _ in 0..repeat {
                    v.push(match order {
                        ByteOrder::Big => cell.get_i64(),
                        ByteOrder::Little => cell.get_i64_le(),
                    });
                }
            }
            (ArrayData::U64(v), _) => {
                for _ in 0..repeat {
                    let raw = match order {
                        ByteOrder::Big => cell.get_u64(),
                        ByteOrder::Little => cell.get_u64_le(),
                    };
                    v.push(raw ^ (1 << 63));
                }
            }
            (ArrayData::F32(v), _) => {
                for _ in 0..repeat {
                    v.push(match order {
                        ByteOrder::Big => cell.get_f32(),
                        ByteOrder::Little => cell.get_f32_le(),
                    });
                }
            }
            (ArrayData::F64(v), _) => {
                for _ in 0..repeat {
                    v.push(match order {
                        ByteOrder::Big => cell.get_f64(),
                        ByteOrder::Little => cell.get_f64_le(),
                    });
                }
            }
        }
    }
}

/// Read one stored element as f64 ahead of linear scaling
fn read_raw_f64(cell: &mut &[u8], code: FormatCode, order: ByteOrder) -> f64 {
    let big = order == ByteOrder::Big;
    match code {
        FormatCode::Byte | FormatCode::Logical | FormatCode::Char => cell.get_u8() as f64,
        FormatCode::Int16 if big => cell.get_i16() as f64,
        FormatCode::Int16 => cell.get_i16_le() as f64,
        FormatCode::Int32 if big => cell.get_i32() as f64,
        FormatCode::Int32 => cell.get_i32_le() as f64,
        FormatCode::Int64 if big => cell.get_i64() as f64,
        FormatCode::Int64 => cell.get_i64_le() as f64,
        FormatCode::Float32 if big => cell.get_f32() as f64,
        FormatCode::Float32 => cell.get_f32_le() as f64,
        FormatCode::Float64 if big => cell.get_f64(),
        FormatCode::Float64 => cell.get_f64_le(),
    }
}

/// Fixed-width text: stops at the first NUL, trailing blanks dropped
fn decode_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
}

fn default_cell_shape(format: &ColumnFormat) -> Vec<usize> {
    match format.code {
        FormatCode::Char => Vec::new(),
        _ if format.repeat == 1 => Vec::new(),
        _ => vec![format.repeat],
    }
}

/// `TDIMn = '(a,b,c)'` lists axes fastest-first; the C-order cell shape is
/// the reverse. For character columns the first axis is the string length.
fn cell_shape_from_tdim(tdim: &str, format: &ColumnFormat) -> Result<Vec<usize>, String> {
    let inner = tdim
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("malformed TDIM '{tdim}'"))?;
    let mut axes = inner
        .split(',')
        .map(|s| s.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format!("malformed TDIM '{tdim}'"))?;

    if format.code == FormatCode::Char && !axes.is_empty() {
        axes.remove(0);
    }
    let elements = axes
        .iter()
        .try_fold(tdim_element_width(format, tdim)?, |acc, &n| acc.checked_mul(n));
    if elements.is_none_or(|n| n > format.repeat) {
        return Err(format!("TDIM '{tdim}' exceeds repeat count {}", format.repeat));
    }
    axes.reverse();
    if axes.len() == 1 && axes[0] == 1 && format.code != FormatCode::Char {
        axes.clear();
    }
    Ok(axes)
}

fn tdim_element_width(format: &ColumnFormat, tdim: &str) -> Result<usize, String> {
    if format.code != FormatCode::Char {
        return Ok(1);
    }
    tdim.trim()
        .trim_start_matches('(')
        .split(',')
        .next()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .ok_or_else(|| format!("malformed TDIM '{tdim}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::header::HeaderValue;

    fn layout(tform: &str) -> ColumnLayout {
        let format = ColumnFormat::parse(tform).unwrap();
        ColumnLayout {
            name: "X".into(),
            cell_shape: default_cell_shape(&format),
            format,
            unit: None,
            offset: 0,
            scaling: Scaling::None,
        }
    }

    #[test]
    fn test_parse_tform() {
        assert_eq!(
            ColumnFormat::parse("1J").unwrap(),
            ColumnFormat { repeat: 1, code: FormatCode::Int32 }
        );
        assert_eq!(
            ColumnFormat::parse("E").unwrap(),
            ColumnFormat { repeat: 1, code: FormatCode::Float32 }
        );
        assert_eq!(ColumnFormat::parse("4000E").unwrap().byte_width(), 16000);
        assert_eq!(ColumnFormat::parse("8A").unwrap().code, FormatCode::Char);
        assert!(ColumnFormat::parse("1PE(10)").is_err());
        assert!(ColumnFormat::parse("").is_err());
    }

    #[test]
    fn test_foreign_byte_order_normalised() {
        let values = [1.5f32, -2.25, 1.0e-7];
        let big: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let little: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let col = layout("1E");

        let from_big = col.decode(&big, 3, 4, ByteOrder::Big).unwrap();
        let from_little = col.decode(&little, 3, 4, ByteOrder::Little).unwrap();

        assert_eq!(from_big, ArrayData::F32(values.to_vec()));
        assert_eq!(from_big, from_little);
    }

    #[test]
    fn test_vector_cells_are_row_major() {
        let rows: [[i32; 2]; 2] = [[1, 2], [3, 4]];
        let raw: Vec<u8> = rows.iter().flatten().flat_map(|v| v.to_be_bytes()).collect();
        let col = layout("2J");
        assert_eq!(col.cell_shape, vec![2]);
        let decoded = col.decode(&raw, 2, 8, ByteOrder::Big).unwrap();
        assert_eq!(decoded, ArrayData::I32(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_unsigned_offset_convention() {
        let mut col = layout("1I");
        col.scaling = Scaling::detect(FormatCode::Int16, 1.0, 32768.0);
        let stored: i16 = (60000i32 - 32768) as i16;
        let decoded = col.decode(&stored.to_be_bytes(), 1, 2, ByteOrder::Big).unwrap();
        assert_eq!(decoded, ArrayData::U16(vec![60000]));
    }

    #[test]
    fn test_linear_scaling_yields_f64() {
        let mut col = layout("1I");
        col.scaling = Scaling::detect(FormatCode::Int16, 0.5, 10.0);
        let decoded = col.decode(&4i16.to_be_bytes(), 1, 2, ByteOrder::Big).unwrap();
        assert_eq!(decoded, ArrayData::F64(vec![12.0]));
    }

    #[test]
    fn test_strings_and_logicals() {
        let col = layout("4A");
        let decoded = col.decode(b"SKY SCI\0", 2, 4, ByteOrder::Big).unwrap();
        assert_eq!(decoded, ArrayData::Str(vec!["SKY".into(), "SCI".into()]));

        let col = layout("1L");
        let decoded = col.decode(b"TF", 2, 1, ByteOrder::Big).unwrap();
        assert_eq!(decoded, ArrayData::U8(vec![1, 0]));
    }

    #[test]
    fn test_layout_from_header_with_tdim() {
        let mut header = Header::default();
        let cards: [(&str, HeaderValue); 7] = [
            ("TFIELDS", HeaderValue::Int(2)),
            ("TTYPE1", HeaderValue::Str("APS_ID".into())),
            ("TFORM1", HeaderValue::Str("1J".into())),
            ("TTYPE2", HeaderValue::Str("COVAR".into())),
            ("TFORM2", HeaderValue::Str("25E".into())),
            ("TDIM2", HeaderValue::Str("(5,5)".into())),
            ("TUNIT2", HeaderValue::Str("K".into())),
        ];
        for (k, v) in cards {
            header.insert(k.to_string(), v);
        }

        let layouts = ColumnLayout::from_header(&header).unwrap();
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts[0].cell_shape, Vec::<usize>::new());
        assert_eq!(layouts[1].offset, 4);
        assert_eq!(layouts[1].cell_shape, vec![5, 5]);
        assert_eq!(layouts[1].unit.as_deref(), Some("K"));
        assert_eq!(layouts[0].unit, None);
    }

    #[test]
    fn test_tdim_smaller_than_repeat_skips_padding() {
        let mut col = layout("6J");
        col.cell_shape = cell_shape_from_tdim("(2,2)", &col.format).unwrap();
        let raw: Vec<u8> = (1..=12i32).flat_map(|v| v.to_be_bytes()).collect();
        let decoded = col.decode(&raw, 2, 24, ByteOrder::Big).unwrap();
        assert_eq!(decoded, ArrayData::I32(vec![1, 2, 3, 4, 7, 8, 9, 10]));
        assert_eq!(decoded.len(), 2 * col.cell_shape.iter().product::<usize>());
    }

    #[test]
    fn test_oversized_tdim_is_error() {
        let format = ColumnFormat::parse("4E").unwrap();
        assert!(cell_shape_from_tdim("(3,3)", &format).is_err());
        assert!(cell_shape_from_tdim("(4294967296,4294967296,4294967296)", &format).is_err());
    }

    #[test]
    fn test_row_count_overflow_is_error() {
        let col = layout("1J");
        assert!(col.decode(&[0u8; 4], usize::MAX, 4, ByteOrder::Big).is_err());
    }

    #[test]
    fn test_column_past_row_is_error() {
        let col = layout("2D");
        assert!(col.decode(&[0u8; 8], 1, 8, ByteOrder::Big).is_err());
    }
}
