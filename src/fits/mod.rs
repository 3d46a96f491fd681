//! Minimal FITS reader for WEAVE survey files.
//!
//! Walks the header/data units of a file, locates binary table extensions by
//! `EXTNAME` and decodes their columns into native-order arrays. Only the
//! fixed-width BINTABLE column types used by WEAVE products are supported.

pub mod header;
pub mod table;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use header::{Header, HeaderValue};
pub use table::{ByteOrder, ColumnFormat, ColumnLayout, FormatCode};

use crate::dataset::ArrayData;
use header::BLOCK_SIZE;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FitsError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid FITS structure in {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Extension {extname} not found in {path}")]
    MissingExtension { path: PathBuf, extname: String },
}

pub type FitsResult<T> = std::result::Result<T, FitsError>;

/// One decoded table column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub unit: Option<String>,
    /// Shape of each row's cell; empty for scalars
    pub cell_shape: Vec<usize>,
    /// Values for all rows, row-major
    pub data: ArrayData,
}

impl Column {
    /// Full shape including the leading row axis
    pub fn shape(&self, nrows: usize) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.cell_shape.len() + 1);
        shape.push(nrows);
        shape.extend_from_slice(&self.cell_shape);
        shape
    }
}

/// Decoded binary table extension
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub extname: String,
    pub nrows: usize,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Remove and return a column, keeping the order of the rest
    pub fn take_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(pos))
    }
}

/// Header and data location of one HDU
#[derive(Debug, Clone)]
pub struct Hdu {
    pub header: Header,
    pub data_offset: u64,
    pub data_len: u64,
}

impl Hdu {
    pub fn extname(&self) -> Option<&str> {
        self.header.get_str("EXTNAME")
    }
}

/// Index of all HDUs in a FITS file; data is read on demand
#[derive(Debug, Clone)]
pub struct FitsFile {
    path: PathBuf,
    hdus: Vec<Hdu>,
}

impl FitsFile {
    pub fn open(path: &Path) -> FitsResult<Self> {
        let file = File::open(path).map_err(|e| io_error(path, e))?;
        let file_len = file.metadata().map_err(|e| io_error(path, e))?.len();
        let mut reader = BufReader::new(file);
        let mut hdus = Vec::new();
        let mut position = 0u64;

        while position < file_len {
            let header = read_header(&mut reader, path)?;
            let header_len = header_blocks_len(&mut reader, position, path)?;
            let data_offset = position + header_len;
            let data_len = data_size(&header).map_err(|reason| format_error(path, reason))?;
            if data_offset
                .checked_add(data_len)
                .is_none_or(|end| end > file_len)
            {
                return Err(format_error(
                    path,
                    format!(
                        "HDU {} declares {data_len} data bytes but the file is {file_len} bytes",
                        hdus.len()
                    ),
                ));
            }
            let padded = data_len.div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64;

            hdus.push(Hdu {
                header,
                data_offset,
                data_len,
            });

            position = data_offset + padded;
            reader
                .seek(SeekFrom::Start(position))
                .map_err(|e| io_error(path, e))?;
        }

        if hdus.is_empty() {
            return Err(format_error(path, "file contains no HDUs".to_string()));
        }

        debug!("Indexed {} HDUs in {}", hdus.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            hdus,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hdus(&self) -> &[Hdu] {
        &self.hdus
    }

    pub fn primary_header(&self) -> &Header {
        &self.hdus[0].header
    }

    /// Find an extension by name, ignoring case as FITS tools do
    pub fn extension(&self, extname: &str) -> Option<&Hdu> {
        self.hdus.iter().skip(1).find(|hdu| {
            hdu.extname()
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(extname))
        })
    }

    /// Decode the binary table extension `extname`
    pub fn read_table(&self, extname: &str) -> FitsResult<Table> {
        let hdu = self
            .extension(extname)
            .ok_or_else(|| FitsError::MissingExtension {
                path: self.path.clone(),
                extname: extname.to_string(),
            })?;

        let header = &hdu.header;
        if header.get_str("XTENSION").map(str::trim) != Some("BINTABLE") {
            return Err(format_error(
                &self.path,
                format!("extension {extname} is not a binary table"),
            ));
        }

        let row_width = header
            .require_usize("NAXIS1")
            .map_err(|r| format_error(&self.path, r))?;
        let nrows = header
            .require_usize("NAXIS2")
            .map_err(|r| format_error(&self.path, r))?;
        let layouts =
            ColumnLayout::from_header(header).map_err(|r| format_error(&self.path, r))?;

        let table_len = row_width
            .checked_mul(nrows)
            .filter(|&len| len as u64 <= hdu.data_len)
            .ok_or_else(|| {
                format_error(
                    &self.path,
                    format!("{extname}: {nrows} rows of {row_width} bytes exceed the HDU data"),
                )
            })?;

        let mut data = vec![0u8; table_len];
        let mut file = File::open(&self.path).map_err(|e| io_error(&self.path, e))?;
        file.seek(SeekFrom::Start(hdu.data_offset))
            .and_then(|_| file.read_exact(&mut data))
            .map_err(|e| io_error(&self.path, e))?;

        let columns = layouts
            .iter()
            .map(|layout| {
                let values = layout
                    .decode(&data, nrows, row_width, ByteOrder::Big)
                    .map_err(|r| format_error(&self.path, r))?;
                Ok(Column {
                    name: layout.name.clone(),
                    unit: layout.unit.clone(),
                    cell_shape: layout.cell_shape.clone(),
                    data: values,
                })
            })
            .collect::<FitsResult<Vec<_>>>()?;

        debug!(
            "Decoded {} ({} rows, {} columns) from {}",
            extname,
            nrows,
            columns.len(),
            self.path.display()
        );

        Ok(Table {
            extname: extname.to_string(),
            nrows,
            columns,
        })
    }
}

/// Read just the primary header, without indexing the rest of the file
pub fn read_primary_header(path: &Path) -> FitsResult<Header> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut reader = BufReader::new(file);
    read_header(&mut reader, path)
}

/// Value of one primary header keyword, `None` when absent
pub fn read_header_keyword(path: &Path, keyword: &str) -> FitsResult<Option<HeaderValue>> {
    Ok(read_primary_header(path)?.get(keyword).cloned())
}

/// Convenience for a single binary table extension
pub fn read_table(path: &Path, extname: &str) -> FitsResult<Table> {
    FitsFile::open(path)?.read_table(extname)
}

fn read_header<R: Read>(reader: &mut R, path: &Path) -> FitsResult<Header> {
    let mut header = Header::default();
    let mut block = vec![0u8; BLOCK_SIZE];
    loop {
        reader.read_exact(&mut block).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                format_error(path, "header ended before END card".to_string())
            } else {
                io_error(path, e)
            }
        })?;
        if header
            .push_block(&block)
            .map_err(|reason| format_error(path, reason))?
        {
            return Ok(header);
        }
    }
}

/// Bytes consumed by the header just read, from the reader position
fn header_blocks_len<R: Seek>(reader: &mut R, start: u64, path: &Path) -> FitsResult<u64> {
    let now = reader.stream_position().map_err(|e| io_error(path, e))?;
    Ok(now - start)
}

/// Data bytes of an HDU: |BITPIX|/8 * GCOUNT * (PCOUNT + NAXIS1*...*NAXISn)
fn data_size(header: &Header) -> Result<u64, String> {
    let bitpix = header
        .get_int("BITPIX")
        .ok_or_else(|| "missing BITPIX".to_string())?;
    let naxis = header.require_usize("NAXIS")?;
    if naxis == 0 {
        return Ok(0);
    }

    let overflow = || "data size overflows".to_string();
    let mut elements: u64 = 1;
    for n in 1..=naxis {
        let axis = header.require_usize(&format!("NAXIS{n}"))? as u64;
        elements = elements.checked_mul(axis).ok_or_else(overflow)?;
    }
    let pcount = header.get_int("PCOUNT").unwrap_or(0).max(0) as u64;
    let gcount = header.get_int("GCOUNT").unwrap_or(1).max(1) as u64;

    pcount
        .checked_add(elements)
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(bitpix.unsigned_abs() / 8))
        .ok_or_else(overflow)
}

fn io_error(path: &Path, source: std::io::Error) -> FitsError {
    FitsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn format_error(path: &Path, reason: String) -> FitsError {
    FitsError::Format {
        path: path.to_path_buf(),
        reason,
    }
}
