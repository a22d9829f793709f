use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, ScrapeError};
use crate::record::{Document, PriceRecord};

pub const DEFAULT_OUT: &str = "data/news_bandung.ndjson";

/// One JSON value per non-blank line. Errors carry the 1-based line number.
fn read_ndjson<T: DeserializeOwned, R: BufRead>(reader: R) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|source| ScrapeError::Json {
            line: idx + 1,
            source,
        })?;
        items.push(item);
    }
    Ok(items)
}

pub fn read_documents<R: BufRead>(reader: R) -> Result<Vec<Document>> {
    read_ndjson(reader)
}

pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<PriceRecord>> {
    read_ndjson(reader)
}

pub fn write_records<W: Write>(writer: &mut W, records: &[PriceRecord]) -> Result<()> {
    for record in records {
        write_line(writer, record)?;
    }
    Ok(())
}

pub fn write_line<W: Write, T: Serialize>(writer: &mut W, item: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, item)?;
    writer.write_all(b"\n")?;
    Ok(())
}

pub fn open_input(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

/// Truncating writer; missing parent directories are created.
pub fn create_output(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}
