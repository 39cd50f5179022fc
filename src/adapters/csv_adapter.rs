//! CSV export and import of the tick log.
//!
//! Format: header `Timestamp,Date,Symbol,Price`, one row per tick in store
//! order. `Timestamp` is Unix milliseconds and is authoritative on import;
//! `Date` is the matching ISO-8601 string kept for human readers.

use crate::domain::error::MetalwatchError;
use crate::domain::tick::{Instrument, Tick};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Timestamp")]
    timestamp: i64,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Symbol")]
    symbol: Instrument,
    #[serde(rename = "Price")]
    price: f64,
}

fn csv_error(e: impl std::fmt::Display) -> MetalwatchError {
    MetalwatchError::Csv {
        reason: e.to_string(),
    }
}

/// Writes `ticks` in the given order.
pub fn write_csv<W: Write>(ticks: &[Tick], writer: W) -> Result<(), MetalwatchError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for tick in ticks {
        wtr.serialize(CsvRow {
            timestamp: tick.timestamp_millis(),
            date: tick.iso_date(),
            symbol: tick.instrument,
            price: tick.price,
        })
        .map_err(csv_error)?;
    }
    // An empty export still carries the header row.
    if ticks.is_empty() {
        wtr.write_record(["Timestamp", "Date", "Symbol", "Price"])
            .map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_csv(ticks: &[Tick]) -> Result<String, MetalwatchError> {
    let mut buf = Vec::new();
    write_csv(ticks, &mut buf)?;
    String::from_utf8(buf).map_err(csv_error)
}

/// Reads ticks written by [`write_csv`]. Rows that parse but fail tick
/// validation are rejected with the row number.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Tick>, MetalwatchError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut ticks = Vec::new();

    for (index, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(csv_error)?;
        let tick = Tick::from_millis(row.symbol, row.price, row.timestamp)?;
        tick.validate().map_err(|e| MetalwatchError::Csv {
            reason: format!("row {}: {}", index + 1, e),
        })?;
        ticks.push(tick);
    }

    Ok(ticks)
}

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export(&self, ticks: &[Tick]) -> Result<(), MetalwatchError> {
        let file = File::create(&self.path).map_err(|e| MetalwatchError::Csv {
            reason: format!("failed to create {}: {}", self.path.display(), e),
        })?;
        write_csv(ticks, file)?;
        tracing::info!(rows = ticks.len(), path = %self.path.display(), "exported history");
        Ok(())
    }

    pub fn import(&self) -> Result<Vec<Tick>, MetalwatchError> {
        let file = File::open(&self.path).map_err(|e| MetalwatchError::Csv {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        parse_csv(file)
    }
}
