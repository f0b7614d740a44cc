//! Two column `t,v` CSV files without a header row.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CableError, Result};

/// One row of a trace file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    /// Time (ms)
    pub t: f64,
    /// Membrane potential (mV)
    pub v: f64,
}

/// Writes `t` and `v` row by row. Rows stop at the shorter of the two buffers.
pub fn write_trace<P: AsRef<Path>>(path: P, t: &[f64], v: &[f64]) -> Result<()> {
    let rows = write_trace_to(File::create(path.as_ref())?, t, v)?;
    info!("Wrote {} rows to {}", rows, path.as_ref().display());
    Ok(())
}

pub fn write_trace_to<W: Write>(writer: W, t: &[f64], v: &[f64]) -> Result<usize> {
    if t.len() != v.len() {
        warn!(
            "Trace length mismatch (t: {}, v: {}), truncating to the shorter",
            t.len(),
            v.len()
        );
    }
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    let mut rows = 0;
    for (t, v) in t.iter().zip(v) {
        writer.serialize((t, v))?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

fn reader<R: Read>(rdr: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(rdr)
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

fn parse_row(record: &StringRecord, width: usize) -> Result<Vec<f64>> {
    if record.len() != width {
        return Err(CableError::MalformedRow {
            line: line_of(record),
            reason: format!("expected {} fields, found {}", width, record.len()),
        });
    }
    record
        .iter()
        .map(|field| {
            field
                .trim()
                .parse::<f64>()
                .map_err(|e| CableError::MalformedRow {
                    line: line_of(record),
                    reason: format!("{:?}: {}", field, e),
                })
        })
        .collect()
}

/// Reads a trace back into separate `t` and `v` buffers, skipping blank rows.
pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<(Vec<f64>, Vec<f64>)> {
    read_trace_from(File::open(path)?)
}

pub fn read_trace_from<R: Read>(rdr: R) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut t = Vec::new();
    let mut v = Vec::new();
    for record in reader(rdr).records() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        let row = parse_row(&record, 2)?;
        t.push(row[0]);
        v.push(row[1]);
    }
    Ok((t, v))
}

/// Typed rows through serde.
pub fn read_points<P: AsRef<Path>>(path: P) -> Result<Vec<TracePoint>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(File::open(path)?);
    let points = rdr
        .deserialize::<TracePoint>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(points)
}

/// Column oriented table whose column names are given at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Table {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads a headerless numeric CSV, naming its columns `names` in order.
pub fn read_table<P: AsRef<Path>>(path: P, names: &[&str]) -> Result<Table> {
    read_table_from(File::open(path)?, names)
}

pub fn read_table_from<R: Read>(rdr: R, names: &[&str]) -> Result<Table> {
    let mut columns = vec![Vec::new(); names.len()];
    for record in reader(rdr).records() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        for (column, value) in columns.iter_mut().zip(parse_row(&record, names.len())?) {
            column.push(value);
        }
    }
    Ok(Table {
        names: names.iter().map(|n| n.to_string()).collect(),
        columns,
    })
}
