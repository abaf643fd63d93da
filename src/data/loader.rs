use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info, warn};

use super::model::{Metadata, MetadataValue, Trace};
use crate::error::{ChromError, Result};

/// Line separating the metadata header from the sample table.
pub const BODY_MARKER: &str = "Chromatogram Data:";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a trace from an instrument export.  Dispatch by extension.
///
/// Supported formats:
/// * `.txt` / `.tsv` / no extension – tab-delimited export (instrument default)
/// * `.csv` – the same layout with comma delimiters
pub fn load_file(path: &Path) -> Result<Trace> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let delimiter = match ext.as_str() {
        "" | "txt" | "tsv" => b'\t',
        "csv" => b',',
        other => {
            return Err(ChromError::format(format!(
                "unsupported file extension: .{other}"
            )))
        }
    };

    let file = File::open(path).map_err(|source| ChromError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let trace = load_reader(BufReader::new(file), delimiter)?;
    info!(
        "loaded {} samples from {} (channel {})",
        trace.len(),
        path.display(),
        trace.metadata().channel().unwrap_or_default()
    );
    Ok(trace)
}

/// Parse an export from any buffered reader.
///
/// Expected layout:
///
/// ```text
/// Injection Information:
/// Injection<TAB>IgG Vtag 1
/// ...
/// Chromatogram Data Information:
/// Time Min. (min)<TAB>0.000000
/// Time Max. (min)<TAB>30.000000
/// Data Points<TAB>18001
/// Channel<TAB>ACQUITY FLR ChA
/// ...
/// Chromatogram Data:
/// Time (min)<TAB>Step (s)<TAB>Value (EU)
/// 0.000000<TAB>n.a.<TAB>0.000000
/// ...
/// ```
pub fn load_reader<R: BufRead>(mut reader: R, delimiter: u8) -> Result<Trace> {
    let (metadata, body_line) = parse_header(&mut reader, delimiter)?;
    metadata.require_keys()?;

    let body = parse_body(reader, delimiter, body_line)?;
    if body.time.is_empty() {
        return Err(ChromError::EmptyTrace);
    }

    if let Some(expected) = metadata.data_points() {
        if expected != body.time.len() {
            warn!(
                "header announces {expected} data points but {} samples were read",
                body.time.len()
            );
        }
    }

    let trace = Trace::new(body.time, body.signal, metadata)?
        .with_units(body.time_unit, body.signal_unit);
    Ok(trace)
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Read key/value lines up to [`BODY_MARKER`]. Returns the metadata and the
/// 1-based line number of the marker.
fn parse_header<R: BufRead>(reader: &mut R, delimiter: u8) -> Result<(Metadata, usize)> {
    let delimiter = char::from(delimiter);
    let mut metadata = Metadata::default();
    let mut section = Metadata::OTHER.to_string();
    let mut line_no = 0;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Err(ChromError::format(format!(
                "missing '{BODY_MARKER}' line before end of input"
            )));
        }
        line_no += 1;

        let text = decode_line(&buf);
        let line = text.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        if line.trim() == BODY_MARKER {
            debug!(
                "sample table starts after line {line_no}; header sections: {:?}",
                metadata.section_names().collect::<Vec<_>>()
            );
            return Ok((metadata, line_no));
        }

        match line.split_once(delimiter) {
            Some((key, value)) => {
                metadata.insert(&section, key.trim(), MetadataValue::parse(value));
            }
            None => match line.trim().strip_suffix(':') {
                Some(heading) => section = heading.to_string(),
                None => {
                    return Err(ChromError::format_at(
                        line_no,
                        format!("expected a section heading or key/value pair, got '{line}'"),
                    ))
                }
            },
        }
    }
}

/// Header lines are UTF-8, or Latin-1 in older exports (`µ` in unit names).
fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

// ---------------------------------------------------------------------------
// Sample table
// ---------------------------------------------------------------------------

struct Body {
    time: Vec<f64>,
    signal: Vec<f64>,
    time_unit: String,
    signal_unit: String,
}

fn parse_body<R: BufRead>(reader: R, delimiter: u8, marker_line: usize) -> Result<Body> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| ChromError::format_at(marker_line + 1, e))?
        .clone();

    let time_idx = column_index(&headers, "Time")
        .ok_or_else(|| ChromError::format_at(marker_line + 1, "sample table has no 'Time' column"))?;
    let value_idx = column_index(&headers, "Value")
        .ok_or_else(|| ChromError::format_at(marker_line + 1, "sample table has no 'Value' column"))?;

    let mut body = Body {
        time: Vec::new(),
        signal: Vec::new(),
        time_unit: unit_of(&headers[time_idx]).unwrap_or("min").to_string(),
        signal_unit: unit_of(&headers[value_idx]).unwrap_or("").to_string(),
    };

    for result in csv_reader.records() {
        let record = result.map_err(|e| {
            let line = marker_line + e.position().map(|p| p.line() as usize).unwrap_or(1);
            ChromError::format_at(line, e)
        })?;
        let line = marker_line
            + record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(0);

        let t = parse_cell(record.get(time_idx), line, "time")?;
        let y = parse_cell(record.get(value_idx), line, "value")?;

        if let Some(&prev) = body.time.last() {
            if t < prev {
                return Err(ChromError::format_at(
                    line,
                    format!("time decreases from {prev} to {t}"),
                ));
            }
        }
        body.time.push(t);
        body.signal.push(y);
    }

    Ok(body)
}

fn column_index(headers: &csv::StringRecord, prefix: &str) -> Option<usize> {
    headers.iter().position(|h| h.starts_with(prefix))
}

/// `"Value (EU)"` → `Some("EU")`.
fn unit_of(header: &str) -> Option<&str> {
    let open = header.find('(')?;
    let close = header[open..].find(')')? + open;
    Some(header[open + 1..close].trim())
}

fn parse_cell(cell: Option<&str>, line: usize, column: &str) -> Result<f64> {
    let raw = cell.ok_or_else(|| ChromError::format_at(line, format!("missing {column} cell")))?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ChromError::format_at(
            line,
            format!("{column} '{raw}' is not a number"),
        )),
    }
}
