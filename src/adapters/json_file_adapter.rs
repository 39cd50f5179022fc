//! JSON-document persistence: one file per key inside a directory.
//!
//! - `metalwatch_history.json`: array of flat tick records
//! - `quota_<resource>.json`: quota counters
//! - `cached_<SYMBOL>.json`: last-known-good quote

use crate::domain::error::MetalwatchError;
use crate::domain::rate_limit::QuotaState;
use crate::domain::tick::{Instrument, Tick, TickRecord};
use crate::ports::history_port::HistoryPort;
use crate::ports::session_port::SessionPort;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const HISTORY_FILE: &str = "metalwatch_history.json";

/// Tick record plus the optional range fields a live quote carries.
#[derive(Debug, Serialize, Deserialize)]
struct QuoteRecord {
    #[serde(flatten)]
    tick: TickRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    high_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    low_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ch: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct JsonFileAdapter {
    dir: PathBuf,
}

impl JsonFileAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, MetalwatchError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let payload = std::fs::read_to_string(&path).map_err(|e| MetalwatchError::Storage {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let value = serde_json::from_str(&payload).map_err(|e| MetalwatchError::Storage {
            reason: format!("failed to parse {}: {}", path.display(), e),
        })?;
        Ok(Some(value))
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), MetalwatchError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| MetalwatchError::Storage {
            reason: format!("failed to create {}: {}", self.dir.display(), e),
        })?;
        let path = self.dir.join(name);
        let json = serde_json::to_string(value).map_err(|e| MetalwatchError::Storage {
            reason: format!("failed to serialize {}: {}", name, e),
        })?;
        std::fs::write(&path, json).map_err(|e| MetalwatchError::Storage {
            reason: format!("failed to write {}: {}", path.display(), e),
        })?;
        Ok(())
    }
}

impl HistoryPort for JsonFileAdapter {
    fn load_history(&self) -> Result<Vec<Tick>, MetalwatchError> {
        let records: Vec<TickRecord> = self.read(HISTORY_FILE)?.unwrap_or_default();
        let total = records.len();
        let ticks: Vec<Tick> = records
            .into_iter()
            .filter_map(|r| Tick::try_from(r).ok())
            .collect();
        if ticks.len() < total {
            tracing::warn!(
                dropped = total - ticks.len(),
                file = HISTORY_FILE,
                "skipped unreadable history records"
            );
        }
        Ok(ticks)
    }

    fn save_history(&self, ticks: &[Tick]) -> Result<(), MetalwatchError> {
        let records: Vec<TickRecord> = ticks.iter().map(TickRecord::from).collect();
        self.write(HISTORY_FILE, &records)
    }
}

impl SessionPort for JsonFileAdapter {
    fn load_quota(&self, resource: &str) -> Result<Option<QuotaState>, MetalwatchError> {
        self.read(&format!("quota_{resource}.json"))
    }

    fn save_quota(&self, resource: &str, state: &QuotaState) -> Result<(), MetalwatchError> {
        self.write(&format!("quota_{resource}.json"), state)
    }

    fn load_cached_quote(&self, instrument: Instrument) -> Result<Option<Tick>, MetalwatchError> {
        let Some(record) = self.read::<QuoteRecord>(&format!("cached_{}.json", instrument.symbol()))?
        else {
            return Ok(None);
        };
        let mut quote = Tick::try_from(record.tick)?;
        quote.high_price = record.high_price;
        quote.low_price = record.low_price;
        quote.percent_change = record.ch;
        Ok(Some(quote))
    }

    fn save_cached_quote(&self, quote: &Tick) -> Result<(), MetalwatchError> {
        let record = QuoteRecord {
            tick: TickRecord::from(quote),
            high_price: quote.high_price,
            low_price: quote.low_price,
            ch: quote.percent_change,
        };
        self.write(&format!("cached_{}.json", quote.instrument.symbol()), &record)
    }
}
