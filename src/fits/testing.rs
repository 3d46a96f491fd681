//! Synthetic FITS writer.
//!
//! Produces small but structurally valid WEAVE-like files: a primary header
//! with arbitrary keywords followed by binary table extensions. Used by unit
//! and integration tests; not intended for writing science products.

use super::header::{BLOCK_SIZE, CARD_SIZE};
use crate::dataset::ArrayData;
use std::io::{self, Write};
use std::path::Path;

/// A column to be written into a test table
#[derive(Debug, Clone)]
pub struct TestColumn {
    name: String,
    data: ArrayData,
    unit: Option<String>,
    cell: Vec<usize>,
    width: usize,
}

impl TestColumn {
    pub fn new(name: &str, data: ArrayData) -> Self {
        Self {
            name: name.to_string(),
            data,
            unit: None,
            cell: Vec::new(),
            width: 8,
        }
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    /// Per-row cell shape in C order
    pub fn cell(mut self, shape: Vec<usize>) -> Self {
        self.cell = shape;
        self
    }

    /// Fixed string width for text columns
    pub fn width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    fn cell_elements(&self) -> usize {
        self.cell.iter().product::<usize>().max(1)
    }

    fn nrows(&self) -> usize {
        self.data.len() / self.cell_elements()
    }

    /// TFORM code letter and optional TZERO for the storage type
    fn storage(&self) -> (char, Option<&'static str>) {
        match self.data {
            ArrayData::U8(_) => ('B', None),
            ArrayData::I8(_) => ('B', Some("-128")),
            ArrayData::I16(_) => ('I', None),
            ArrayData::U16(_) => ('I', Some("32768")),
            ArrayData::I32(_) => ('J', None),
            ArrayData::U32(_) => ('J', Some("2147483648")),
            ArrayData::I64(_) => ('K', None),
            ArrayData::U64(_) => ('K', Some("9223372036854775808")),
            ArrayData::F32(_) => ('E', None),
            ArrayData::F64(_) => ('D', None),
            ArrayData::Str(_) => ('A', None),
        }
    }

    fn repeat(&self) -> usize {
        match self.data {
            ArrayData::Str(_) => self.width * self.cell_elements(),
            _ => self.cell_elements(),
        }
    }

    fn byte_width(&self) -> usize {
        let element = match self.data {
            ArrayData::U8(_) | ArrayData::I8(_) | ArrayData::Str(_) => 1,
            ArrayData::I16(_) | ArrayData::U16(_) => 2,
            ArrayData::I32(_) | ArrayData::U32(_) | ArrayData::F32(_) => 4,
            ArrayData::I64(_) | ArrayData::U64(_) | ArrayData::F64(_) => 8,
        };
        self.repeat() * element
    }

    fn tdim(&self) -> Option<String> {
        let mut axes: Vec<usize> = self.cell.iter().rev().copied().collect();
        match self.data {
            ArrayData::Str(_) if !self.cell.is_empty() => axes.insert(0, self.width),
            _ if self.cell.len() > 1 => {}
            _ => return None,
        }
        let joined: Vec<String> = axes.iter().map(usize::to_string).collect();
        Some(format!("({})", joined.join(",")))
    }

    /// Big-endian encoding of row `row`
    fn encode_row(&self, row: usize, out: &mut Vec<u8>) {
        let n = self.cell_elements();
        let range = row * n..(row + 1) * n;
        match &self.data {
            ArrayData::U8(v) => out.extend_from_slice(&v[range]),
            ArrayData::I8(v) => out.extend(v[range].iter().map(|&x| (x as u8) ^ 0x80)),
            ArrayData::I16(v) => v[range].iter().for_each(|x| out.extend(x.to_be_bytes())),
            ArrayData::U16(v) => v[range]
                .iter()
                .for_each(|x| out.extend((x ^ 0x8000).to_be_bytes())),
            ArrayData::I32(v) => v[range].iter().for_each(|x| out.extend(x.to_be_bytes())),
            ArrayData::U32(v) => v[range]
                .iter()
                .for_each(|x| out.extend((x ^ 0x8000_0000).to_be_bytes())),
            ArrayData::I64(v) => v[range].iter().for_each(|x| out.extend(x.to_be_bytes())),
            ArrayData::U64(v) => v[range]
                .iter()
                .for_each(|x| out.extend((x ^ (1 << 63)).to_be_bytes())),
            ArrayData::F32(v) => v[range].iter().for_each(|x| out.extend(x.to_be_bytes())),
            ArrayData::F64(v) => v[range].iter().for_each(|x| out.extend(x.to_be_bytes())),
            ArrayData::Str(v) => {
                for s in &v[range] {
                    let mut bytes = s.as_bytes().to_vec();
                    bytes.resize(self.width, b' ');
                    out.extend_from_slice(&bytes[..self.width]);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct TestTable {
    extname: String,
    columns: Vec<TestColumn>,
}

/// Builder for a complete FITS file
#[derive(Debug, Clone, Default)]
pub struct FitsBuilder {
    primary: Vec<(String, String)>,
    tables: Vec<TestTable>,
}

impl FitsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// String keyword on the primary header
    pub fn primary_keyword(mut self, key: &str, value: &str) -> Self {
        self.primary
            .push((key.to_string(), quote(value)));
        self
    }

    /// Integer keyword on the primary header
    pub fn primary_int(mut self, key: &str, value: i64) -> Self {
        self.primary.push((key.to_string(), value.to_string()));
        self
    }

    pub fn table(mut self, extname: &str, columns: Vec<TestColumn>) -> Self {
        self.tables.push(TestTable {
            extname: extname.to_string(),
            columns,
        });
        self
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();

        let mut cards = vec![
            ("SIMPLE".to_string(), "T".to_string()),
            ("BITPIX".to_string(), "8".to_string()),
            ("NAXIS".to_string(), "0".to_string()),
            ("EXTEND".to_string(), "T".to_string()),
        ];
        cards.extend(self.primary.iter().cloned());
        write_header(&mut out, &cards)?;

        for table in &self.tables {
            write_table(&mut out, table)?;
        }
        Ok(out)
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        let bytes = self.to_bytes()?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(&bytes)?;
        file.sync_all()
    }
}

fn write_table(out: &mut Vec<u8>, table: &TestTable) -> io::Result<()> {
    let nrows = table.columns.first().map(TestColumn::nrows).unwrap_or(0);
    if let Some(bad) = table.columns.iter().find(|c| c.nrows() != nrows) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("column {} has {} rows, expected {nrows}", bad.name, bad.nrows()),
        ));
    }
    let row_width: usize = table.columns.iter().map(TestColumn::byte_width).sum();

    let mut cards = vec![
        ("XTENSION".to_string(), quote("BINTABLE")),
        ("BITPIX".to_string(), "8".to_string()),
        ("NAXIS".to_string(), "2".to_string()),
        ("NAXIS1".to_string(), row_width.to_string()),
        ("NAXIS2".to_string(), nrows.to_string()),
        ("PCOUNT".to_string(), "0".to_string()),
        ("GCOUNT".to_string(), "1".to_string()),
        ("TFIELDS".to_string(), table.columns.len().to_string()),
    ];
    for (i, col) in table.columns.iter().enumerate() {
        let n = i + 1;
        let (code, zero) = col.storage();
        cards.push((format!("TTYPE{n}"), quote(&col.name)));
        cards.push((format!("TFORM{n}"), quote(&format!("{}{}", col.repeat(), code))));
        if let Some(unit) = &col.unit {
            cards.push((format!("TUNIT{n}"), quote(unit)));
        }
        if let Some(tdim) = col.tdim() {
            cards.push((format!("TDIM{n}"), quote(&tdim)));
        }
        if let Some(zero) = zero {
            cards.push((format!("TZERO{n}"), zero.to_string()));
        }
    }
    cards.push(("EXTNAME".to_string(), quote(&table.extname)));
    write_header(out, &cards)?;

    let start = out.len();
    for row in 0..nrows {
        for col in &table.columns {
            col.encode_row(row, out);
        }
    }
    pad_to_block(out, start, 0);
    Ok(())
}

fn write_header(out: &mut Vec<u8>, cards: &[(String, String)]) -> io::Result<()> {
    let start = out.len();
    for (key, value) in cards {
        let card = format!("{key:<8}= {value:>20}");
        if key.len() > 8 || card.len() > CARD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("card for {key} does not fit in {CARD_SIZE} columns"),
            ));
        }
        out.extend_from_slice(format!("{card:<80}").as_bytes());
    }
    out.extend_from_slice(format!("{:<80}", "END").as_bytes());
    pad_to_block(out, start, b' ');
    Ok(())
}

fn pad_to_block(out: &mut Vec<u8>, start: usize, fill: u8) {
    let used = out.len() - start;
    let padded = used.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    out.resize(start + padded, fill);
}

fn quote(value: &str) -> String {
    format!("'{:<8}'", value.replace('\'', "''"))
}
