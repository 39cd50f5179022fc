//! SQLite persistence for the tick log and session state.

use crate::domain::error::MetalwatchError;
use crate::domain::rate_limit::QuotaState;
use crate::domain::tick::{Instrument, Tick};
use crate::ports::config_port::ConfigPort;
use crate::ports::history_port::HistoryPort;
use crate::ports::session_port::SessionPort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

pub const DEFAULT_DB_PATH: &str = "metalwatch.db";

#[derive(Clone)]
pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn storage(e: impl std::fmt::Display) -> MetalwatchError {
    MetalwatchError::Storage {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MetalwatchError> {
        let db_path = config.get_string_or("storage", "path", DEFAULT_DB_PATH);
        let pool_size = config.get_int("storage", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| MetalwatchError::Storage {
                reason: format!("failed to open {db_path}: {e}"),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, MetalwatchError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| MetalwatchError::Storage {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, MetalwatchError> {
        self.pool.get().map_err(storage)
    }

    pub fn initialize_schema(&self) -> Result<(), MetalwatchError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ticks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                price REAL NOT NULL,
                timestamp INTEGER NOT NULL,
                date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ticks_symbol_timestamp ON ticks(symbol, timestamp);
            CREATE TABLE IF NOT EXISTS quota (
                resource TEXT PRIMARY KEY,
                last_request INTEGER NOT NULL,
                request_count INTEGER NOT NULL,
                window_started INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cached_quotes (
                symbol TEXT PRIMARY KEY,
                price REAL NOT NULL,
                timestamp INTEGER NOT NULL,
                high_price REAL,
                low_price REAL,
                percent_change REAL
            );",
        )
        .map_err(storage)?;
        Ok(())
    }
}

impl HistoryPort for SqliteAdapter {
    fn load_history(&self) -> Result<Vec<Tick>, MetalwatchError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT symbol, price, timestamp FROM ticks ORDER BY seq ASC")
            .map_err(storage)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(storage)?;

        let mut ticks = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            let (symbol, price, timestamp) = row.map_err(storage)?;
            let tick = symbol
                .parse::<Instrument>()
                .and_then(|instrument| Tick::from_millis(instrument, price, timestamp))
                .and_then(|tick| tick.validate().map(|_| tick));
            match tick {
                Ok(tick) => ticks.push(tick),
                Err(e) => {
                    tracing::debug!(%symbol, timestamp, error = %e, "unreadable tick row");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, table = "ticks", "skipped unreadable history records");
        }
        Ok(ticks)
    }

    fn save_history(&self, ticks: &[Tick]) -> Result<(), MetalwatchError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage)?;

        tx.execute("DELETE FROM ticks", []).map_err(storage)?;
        {
            let mut insert = tx
                .prepare("INSERT INTO ticks (symbol, price, timestamp, date) VALUES (?1, ?2, ?3, ?4)")
                .map_err(storage)?;
            for tick in ticks {
                insert
                    .execute(params![
                        tick.instrument.symbol(),
                        tick.price,
                        tick.timestamp_millis(),
                        tick.iso_date()
                    ])
                    .map_err(storage)?;
            }
        }

        tx.commit().map_err(storage)?;
        Ok(())
    }
}

impl SessionPort for SqliteAdapter {
    fn load_quota(&self, resource: &str) -> Result<Option<QuotaState>, MetalwatchError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT last_request, request_count, window_started FROM quota WHERE resource = ?1",
            params![resource],
            |row| {
                Ok(QuotaState {
                    last_request: row.get(0)?,
                    request_count: row.get(1)?,
                    window_started: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(storage)
    }

    fn save_quota(&self, resource: &str, state: &QuotaState) -> Result<(), MetalwatchError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO quota (resource, last_request, request_count, window_started)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                resource,
                state.last_request,
                state.request_count,
                state.window_started
            ],
        )
        .map_err(storage)?;
        Ok(())
    }

    fn load_cached_quote(&self, instrument: Instrument) -> Result<Option<Tick>, MetalwatchError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT price, timestamp, high_price, low_price, percent_change
                 FROM cached_quotes WHERE symbol = ?1",
                params![instrument.symbol()],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(storage)?;

        let Some((price, timestamp, high_price, low_price, percent_change)) = row else {
            return Ok(None);
        };
        let mut quote = Tick::from_millis(instrument, price, timestamp)?;
        quote.high_price = high_price;
        quote.low_price = low_price;
        quote.percent_change = percent_change;
        Ok(Some(quote))
    }

    fn save_cached_quote(&self, quote: &Tick) -> Result<(), MetalwatchError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO cached_quotes
             (symbol, price, timestamp, high_price, low_price, percent_change)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                quote.instrument.symbol(),
                quote.price,
                quote.timestamp_millis(),
                quote.high_price,
                quote.low_price,
                quote.percent_change
            ],
        )
        .map_err(storage)?;
        Ok(())
    }
}
