//! Byte-preserving CSV reading and writing
//!
//! Maplayer files are `;`-separated, carry no index column and are read as
//! raw text. Loading and saving a file without changes must reproduce it
//! byte-for-byte, so the layout details of the source file (byte order mark,
//! line terminator, trailing newline) are recorded on read and replayed on
//! write.

use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use errors::{SpocError, SpocResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text encoding of the CSV files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Byte-transparent single-byte mapping
    ///
    /// Each byte becomes the char with the same code point, which is Latin-1
    /// rather than true cp1252: bytes 0x80-0x9F decode to C1 controls instead
    /// of the cp1252 punctuation. Cells are only compared and written back,
    /// so any byte sequence survives a load and save unchanged.
    #[default]
    #[serde(alias = "latin1")]
    Cp1252,
    Utf8,
}

impl Encoding {
    fn decode(self, bytes: &[u8], file: &Path) -> SpocResult<String> {
        match self {
            Encoding::Cp1252 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Encoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| SpocError::parse(file.display().to_string(), e)),
        }
    }

    fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Cp1252 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Encoding::Utf8 => text.as_bytes().to_vec(),
        }
    }
}

/// Options shared by every table read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub delimiter: char,
    pub encoding: Encoding,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ';',
            encoding: Encoding::Cp1252,
        }
    }
}

impl CsvOptions {
    fn delimiter_byte(&self) -> SpocResult<u8> {
        u8::try_from(u32::from(self.delimiter)).map_err(|_| {
            SpocError::Configuration(format!(
                "CSV delimiter must be a single byte: {:?}",
                self.delimiter
            ))
        })
    }
}

/// Layout details of a file as found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub bom: bool,
    /// Nothing after the optional BOM, not even a header line
    pub empty: bool,
    pub crlf: bool,
    pub trailing_newline: bool,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            bom: false,
            empty: false,
            crlf: false,
            trailing_newline: true,
        }
    }
}

/// Raw contents of a CSV file
#[derive(Debug, Clone, Default)]
pub struct CsvContent {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub layout: TableLayout,
}

/// Read a delimited file; every cell is raw text, empty means missing
pub fn read_csv(path: &Path, options: &CsvOptions) -> SpocResult<CsvContent> {
    let bytes = std::fs::read(path)?;
    let (bom, body) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (true, rest),
        None => (false, bytes.as_slice()),
    };

    let layout = TableLayout {
        bom,
        empty: body.is_empty(),
        crlf: body.windows(2).any(|w| w == b"\r\n"),
        trailing_newline: body.ends_with(b"\n"),
    };

    if layout.empty {
        debug!("Read empty file {}", path.display());
        return Ok(CsvContent {
            layout,
            ..CsvContent::default()
        });
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .has_headers(true)
        .from_reader(body);

    let headers = reader
        .byte_headers()?
        .iter()
        .map(|field| options.encoding.decode(field, path))
        .collect::<SpocResult<Vec<_>>>()?;

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| options.encoding.decode(field, path))
            .collect::<SpocResult<Vec<_>>>()?;
        rows.push(row);
    }

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(CsvContent {
        headers,
        rows,
        layout,
    })
}

/// Write a delimited file, replaying the recorded layout
pub fn write_csv(path: &Path, content: &CsvContent, options: &CsvOptions) -> SpocResult<()> {
    let body = if content.layout.empty && content.headers.is_empty() && content.rows.is_empty() {
        Vec::new()
    } else {
        encode_body(content, options)?
    };

    let mut bytes = Vec::with_capacity(body.len() + UTF8_BOM.len());
    if content.layout.bom {
        bytes.extend_from_slice(UTF8_BOM);
    }
    bytes.extend_from_slice(&body);

    std::fs::write(path, bytes)?;
    debug!("Wrote {} rows to {}", content.rows.len(), path.display());
    Ok(())
}

fn encode_body(content: &CsvContent, options: &CsvOptions) -> SpocResult<Vec<u8>> {
    let terminator = if content.layout.crlf {
        Terminator::CRLF
    } else {
        Terminator::Any(b'\n')
    };

    let mut writer = WriterBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .terminator(terminator)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    let encode = |record: &[String]| -> Vec<Vec<u8>> {
        record
            .iter()
            .map(|field| options.encoding.encode(field))
            .collect()
    };

    writer.write_record(encode(&content.headers))?;
    for row in &content.rows {
        writer.write_record(encode(row))?;
    }

    let mut body = writer
        .into_inner()
        .map_err(|e| SpocError::Io(e.into_error()))?;

    if !content.layout.trailing_newline {
        let cut = if content.layout.crlf { 2 } else { 1 };
        body.truncate(body.len().saturating_sub(cut));
    }
    Ok(body)
}
