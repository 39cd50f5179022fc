//! CLI definition and dispatch.

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::command_commentary::CommandCommentary;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_file_adapter::JsonFileAdapter;
use crate::adapters::simulated_feed::SimulatedFeed;
use crate::domain::adjustment::{build_adjustment_prompt, parse_adjustment};
use crate::domain::analysis::{AnalysisConfig, TechnicalSnapshot};
use crate::domain::config_validation::validate_config;
use crate::domain::error::MetalwatchError;
use crate::domain::forecast::{self, ForecastConfig, ForecastResult};
use crate::domain::history::{DEFAULT_CAPACITY, HistoryRow, HistoryStore, TimeWindow};
use crate::domain::rate_limit::RatePolicy;
use crate::domain::session::{PollOutcome, SessionState, append_fresh};
use crate::domain::summary::{MarketStats, PeriodSummary, REPORT_PERIODS, is_near_high};
use crate::domain::tick::{Instrument, Tick};
use crate::ports::config_port::ConfigPort;
use crate::ports::history_port::HistoryPort;
use crate::ports::price_feed_port::PriceFeedPort;
use crate::ports::session_port::SessionPort;

pub const DEFAULT_JSON_DIR: &str = "metalwatch_data";
/// Recent prices summarised in a forecast-adjustment prompt.
const ADJUSTMENT_CONTEXT: usize = 30;

#[derive(Parser, Debug)]
#[command(name = "metalwatch", about = "Gold and silver spot price tracker")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Append one observed price (per gram)
    Record {
        symbol: Instrument,
        price: f64,
        /// Unix milliseconds; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Run one rate-limited poll of the price feed
    Poll {
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Poll repeatedly on a fixed interval
    Watch {
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
        /// Stop after this many polls
        #[arg(long)]
        iterations: Option<u64>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Fill an empty history with back-dated daily samples
    Backfill {
        #[arg(long, default_value_t = 30)]
        days: u32,
        /// Backfill even when history is not empty
        #[arg(long)]
        force: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Latest SMA and RSI readings
    Analyze {
        symbol: Instrument,
        #[arg(long, default_value = "ALL")]
        window: TimeWindow,
        /// Ask the commentary command for a reading
        #[arg(long)]
        commentary: bool,
    },
    /// Linear-trend forecast with confidence bands
    Forecast {
        symbol: Instrument,
        #[arg(long)]
        horizon: Option<usize>,
        #[arg(long, default_value = "ALL")]
        window: TimeWindow,
        /// Apply per-step adjustments suggested by the commentary command
        #[arg(long)]
        commentary: bool,
    },
    /// Period summaries and market statistics
    Summary {
        symbol: Option<Instrument>,
        #[arg(long)]
        commentary: bool,
    },
    /// Most recent ticks, newest first
    History {
        symbol: Option<Instrument>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Write the whole history as CSV
    Export { output: PathBuf },
    /// Append ticks from a CSV export
    Import { input: PathBuf },
    /// Remove every stored tick
    Clear,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = dispatch(cli.config.as_deref(), cli.command);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn dispatch(config_path: Option<&Path>, command: Command) -> Result<(), MetalwatchError> {
    let config = load_config(config_path)?;
    let mut app = App::open(&config)?;
    let now = Utc::now();

    match command {
        Command::Record {
            symbol,
            price,
            timestamp,
        } => run_record(&mut app, symbol, price, timestamp, now),
        Command::Poll { seed } => {
            let mut feed = build_feed(seed, &app.history);
            run_poll(&mut app, &mut feed, now)
        }
        Command::Watch {
            interval_secs,
            iterations,
            seed,
        } => run_watch(&mut app, seed, interval_secs, iterations),
        Command::Backfill { days, force, seed } => run_backfill(&mut app, days, force, seed, now),
        Command::Analyze {
            symbol,
            window,
            commentary,
        } => run_analyze(&mut app, symbol, window, commentary, now),
        Command::Forecast {
            symbol,
            horizon,
            window,
            commentary,
        } => run_forecast(&mut app, symbol, horizon, window, commentary, now),
        Command::Summary { symbol, commentary } => run_summary(&mut app, symbol, commentary, now),
        Command::History { symbol, limit } => {
            for row in app.history.recent(symbol, limit) {
                println!("{}", format_history_row(&row));
            }
            Ok(())
        }
        Command::Export { output } => {
            let ticks: Vec<Tick> = app.history.iter().cloned().collect();
            CsvAdapter::new(output.clone()).export(&ticks)?;
            eprintln!("Exported {} ticks to {}", ticks.len(), output.display());
            Ok(())
        }
        Command::Import { input } => run_import(&mut app, &input),
        Command::Clear => {
            let removed = app.history.len();
            app.history.clear();
            eprintln!("Cleared {removed} ticks");
            Ok(())
        }
    }
}

/// Loads the INI file when given; otherwise every setting takes its default.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, MetalwatchError> {
    match path {
        Some(p) => FileConfigAdapter::from_file(p),
        None => Ok(FileConfigAdapter::empty()),
    }
}

/// Level for the log filter when `RUST_LOG` is unset.
pub fn log_level(config_path: Option<&Path>) -> String {
    load_config(config_path)
        .ok()
        .and_then(|c| c.get_string("logging", "level"))
        .map(|l| l.trim().to_lowercase())
        .unwrap_or_else(|| "info".to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub capacity: usize,
    pub forecast: ForecastConfig,
    pub horizon: usize,
    pub analysis: AnalysisConfig,
    pub price_policy: RatePolicy,
    pub commentary_policy: RatePolicy,
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<Settings, MetalwatchError> {
    validate_config(config)?;

    let defaults = ForecastConfig::default();
    let analysis_defaults = AnalysisConfig::default();
    Ok(Settings {
        capacity: config.get_int("history", "capacity", DEFAULT_CAPACITY as i64) as usize,
        forecast: ForecastConfig {
            training_window: config.get_int(
                "forecast",
                "training_window",
                defaults.training_window as i64,
            ) as usize,
            band_multiplier: config.get_double(
                "forecast",
                "band_multiplier",
                defaults.band_multiplier,
            ),
        },
        horizon: config.get_int("forecast", "horizon", forecast::DEFAULT_HORIZON as i64) as usize,
        analysis: AnalysisConfig {
            min_points: config.get_int(
                "analysis",
                "min_points",
                analysis_defaults.min_points as i64,
            ) as usize,
            sma_short: config.get_int("analysis", "sma_short", analysis_defaults.sma_short as i64)
                as usize,
            sma_long: config.get_int("analysis", "sma_long", analysis_defaults.sma_long as i64)
                as usize,
            rsi_period: config.get_int(
                "analysis",
                "rsi_period",
                analysis_defaults.rsi_period as i64,
            ) as usize,
        },
        price_policy: build_rate_policy(config, "price_feed", 7)?,
        commentary_policy: build_rate_policy(config, "commentary", 1)?,
    })
}

pub fn build_rate_policy(
    config: &dyn ConfigPort,
    section: &str,
    default_requests: i64,
) -> Result<RatePolicy, MetalwatchError> {
    let requests = config.get_int(section, "requests_per_window", default_requests);
    let minutes = config.get_int(section, "window_minutes", 60);
    let out_of_range = |key: &str, value: i64| MetalwatchError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("{value} is out of range"),
    };
    let requests =
        u32::try_from(requests).map_err(|_| out_of_range("requests_per_window", requests))?;
    let window =
        Duration::try_minutes(minutes).ok_or_else(|| out_of_range("window_minutes", minutes))?;
    RatePolicy::per_window(requests, window)
}

pub struct Storage {
    pub history: Box<dyn HistoryPort>,
    pub session: Box<dyn SessionPort>,
}

fn default_backend() -> &'static str {
    if cfg!(feature = "sqlite") { "sqlite" } else { "json" }
}

pub fn open_storage(config: &dyn ConfigPort) -> Result<Storage, MetalwatchError> {
    let backend = config
        .get_string_or("storage", "backend", default_backend())
        .to_lowercase();

    match backend.as_str() {
        "json" => {
            let dir = config.get_string_or("storage", "path", DEFAULT_JSON_DIR);
            let adapter = JsonFileAdapter::new(dir);
            Ok(Storage {
                history: Box::new(adapter.clone()),
                session: Box::new(adapter),
            })
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            let adapter = SqliteAdapter::from_config(config)?;
            Ok(Storage {
                history: Box::new(adapter.clone()),
                session: Box::new(adapter),
            })
        }
        other => Err(MetalwatchError::ConfigInvalid {
            section: "storage".into(),
            key: "backend".into(),
            reason: format!("backend {other:?} is not available in this build"),
        }),
    }
}

pub struct App {
    pub settings: Settings,
    pub history: HistoryStore,
    pub session: SessionState,
    pub session_port: Box<dyn SessionPort>,
    pub commentary: Option<CommandCommentary>,
}

impl App {
    pub fn open(config: &dyn ConfigPort) -> Result<Self, MetalwatchError> {
        let settings = build_settings(config)?;
        let storage = open_storage(config)?;
        let history = HistoryStore::open(settings.capacity, storage.history)?;
        let session = SessionState::restore(
            storage.session.as_ref(),
            settings.price_policy,
            settings.commentary_policy,
        )?;
        tracing::info!(ticks = history.len(), capacity = history.capacity(), "store opened");

        Ok(Self {
            settings,
            history,
            session,
            session_port: storage.session,
            commentary: CommandCommentary::from_config(config),
        })
    }

    /// Commentary for `topic`, or `None` when no command is configured or the
    /// command is unavailable and nothing is cached.
    fn ask_commentary(&mut self, now: DateTime<Utc>, topic: &str, prompt: &str) -> Option<String> {
        let port = self.commentary.as_ref()?;
        let reply = self.session.request_commentary(now, port, topic, prompt);
        if let Err(e) = self.session.save(self.session_port.as_ref()) {
            tracing::warn!(error = %e, "failed to persist session state");
        }
        reply
    }
}

fn build_feed(seed: Option<u64>, history: &HistoryStore) -> SimulatedFeed {
    match seed {
        Some(s) => SimulatedFeed::seeded(s),
        None => SimulatedFeed::new(),
    }
    .resume_from(history)
}

fn run_record(
    app: &mut App,
    symbol: Instrument,
    price: f64,
    timestamp: Option<i64>,
    now: DateTime<Utc>,
) -> Result<(), MetalwatchError> {
    let tick = match timestamp {
        Some(ms) => Tick::from_millis(symbol, price, ms)?,
        None => Tick::new(symbol, price, now),
    };
    let label = format!("{} {:.4} at {}", tick.instrument, tick.price, tick.iso_date());
    let evicted = app.history.append(tick)?;
    println!("recorded {label}");
    if evicted > 0 {
        eprintln!("{evicted} oldest ticks evicted");
    }
    Ok(())
}

pub fn run_poll(
    app: &mut App,
    feed: &mut dyn PriceFeedPort,
    now: DateTime<Utc>,
) -> Result<(), MetalwatchError> {
    app.session.tick(now);
    let outcomes = app.session.poll_prices(now, feed, &Instrument::ALL);
    let appended = append_fresh(&mut app.history, &outcomes);
    app.session.save(app.session_port.as_ref())?;

    for outcome in &outcomes {
        println!("{}", describe_outcome(outcome));
    }
    tracing::info!(appended, "poll complete");
    Ok(())
}

fn run_watch(
    app: &mut App,
    seed: Option<u64>,
    interval_secs: u64,
    iterations: Option<u64>,
) -> Result<(), MetalwatchError> {
    let mut feed = build_feed(seed, &app.history);
    let interval = std::time::Duration::from_secs(interval_secs.max(1));
    let mut completed = 0u64;

    loop {
        run_poll(app, &mut feed, Utc::now())?;
        completed += 1;
        if iterations.is_some_and(|n| completed >= n) {
            return Ok(());
        }
        std::thread::sleep(interval);
    }
}

fn run_backfill(
    app: &mut App,
    days: u32,
    force: bool,
    seed: Option<u64>,
    now: DateTime<Utc>,
) -> Result<(), MetalwatchError> {
    if !app.history.is_empty() && !force {
        eprintln!(
            "History already holds {} ticks; use --force to backfill anyway",
            app.history.len()
        );
        return Ok(());
    }
    let mut feed = build_feed(seed, &app.history);
    let ticks = feed.backfill(days, now);
    let count = ticks.len();
    for tick in ticks {
        app.history.append(tick)?;
    }
    eprintln!("Backfilled {count} ticks over {days} days");
    Ok(())
}

fn run_analyze(
    app: &mut App,
    symbol: Instrument,
    window: TimeWindow,
    commentary: bool,
    now: DateTime<Utc>,
) -> Result<(), MetalwatchError> {
    let prices = app.history.prices(symbol, window, now);
    let snapshot = match TechnicalSnapshot::compute(&prices, &app.settings.analysis) {
        Ok(s) => s,
        Err(e) if e.is_insufficient_data() => {
            println!("{}", collecting_data(symbol, &e));
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let analysis = app.settings.analysis;
    println!("{}", format_snapshot(symbol, &snapshot, &analysis));

    let note = if commentary {
        let prompt = snapshot.prompt(symbol.name(), &analysis);
        app.ask_commentary(now, &format!("analysis:{symbol}"), &prompt)
    } else {
        None
    };
    println!("{}", note.unwrap_or_else(|| snapshot.note()));
    Ok(())
}

fn run_forecast(
    app: &mut App,
    symbol: Instrument,
    horizon: Option<usize>,
    window: TimeWindow,
    commentary: bool,
    now: DateTime<Utc>,
) -> Result<(), MetalwatchError> {
    let horizon = horizon.unwrap_or(app.settings.horizon);
    let prices = app.history.prices(symbol, window, now);

    let adjustment = if commentary {
        let recent = &prices[prices.len().saturating_sub(ADJUSTMENT_CONTEXT)..];
        build_adjustment_prompt(recent, horizon)
            .and_then(|prompt| app.ask_commentary(now, &format!("forecast:{symbol}"), &prompt))
            .and_then(|reply| parse_adjustment(&reply))
    } else {
        None
    };

    let forecast_config = app.settings.forecast;
    match forecast::forecast_with(&prices, horizon, adjustment.as_deref(), &forecast_config) {
        Ok(result) => {
            print!("{}", format_forecast(symbol, &result));
            Ok(())
        }
        Err(e) if e.is_insufficient_data() => {
            println!("{}", collecting_data(symbol, &e));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn run_summary(
    app: &mut App,
    symbol: Option<Instrument>,
    commentary: bool,
    now: DateTime<Utc>,
) -> Result<(), MetalwatchError> {
    let instruments: Vec<Instrument> = match symbol {
        Some(s) => vec![s],
        None => Instrument::ALL.to_vec(),
    };

    let mut prompt_lines = Vec::new();
    for instrument in &instruments {
        println!("{}", instrument.name());
        if let Some(latest) = app.history.latest(*instrument) {
            let marker = if is_near_high(latest) { "  near high" } else { "" };
            println!("  latest {:.4}{}", latest.price, marker);
        }
        for (window, label) in REPORT_PERIODS {
            match PeriodSummary::for_window(&app.history, *instrument, window, now) {
                Some(s) => {
                    println!("{}", format_period(label, &s));
                    prompt_lines.push(s.prompt(instrument.name(), label));
                }
                None => println!("  {label:<14} no data"),
            }
        }
    }

    let stats = MarketStats::compute(&app.history);
    println!("Market");
    if let Some(ratio) = stats.gold_silver_ratio {
        println!("  gold/silver ratio  {ratio:.2}");
    }
    println!("  volatility         {}", stats.volatility.label());
    println!("  trend              {}", stats.market_trend.label());
    if stats.near_high {
        println!("  near high          yes");
    }

    if commentary && !prompt_lines.is_empty() {
        let prompt = prompt_lines.join("\n");
        if let Some(reply) = app.ask_commentary(now, "summary", &prompt) {
            println!("\n{reply}");
        }
    }
    Ok(())
}

fn run_import(app: &mut App, input: &Path) -> Result<(), MetalwatchError> {
    let ticks = CsvAdapter::new(input.to_path_buf()).import()?;
    let count = ticks.len();
    let mut evicted = 0;
    for tick in ticks {
        evicted += app.history.append(tick)?;
    }
    eprintln!("Imported {count} ticks ({evicted} evicted)");
    Ok(())
}

fn collecting_data(symbol: Instrument, e: &MetalwatchError) -> String {
    match e {
        MetalwatchError::InsufficientData { available, needed } => format!(
            "{}: collecting data ({available} of {needed} points)",
            symbol.name()
        ),
        other => format!("{}: {other}", symbol.name()),
    }
}

pub fn describe_outcome(outcome: &PollOutcome) -> String {
    match outcome {
        PollOutcome::Fresh(tick) => format!("{}  live", format_quote(tick)),
        PollOutcome::Cached { tick, remaining } => format!(
            "{}  cached, next refresh in {}m{:02}s",
            format_quote(tick),
            remaining.num_minutes(),
            remaining.num_seconds() % 60
        ),
        PollOutcome::Fallback { tick, error } => {
            format!("{}  last known ({error})", format_quote(tick))
        }
        PollOutcome::Unavailable { instrument, error } => {
            format!("{instrument}  unavailable ({error})")
        }
    }
}

fn format_quote(tick: &Tick) -> String {
    let mut line = format!("{}  {:.4}", tick.instrument, tick.price);
    if let Some(ch) = tick.percent_change {
        line.push_str(&format!("  {ch:+.2}%"));
    }
    if is_near_high(tick) && tick.high_price.is_some() {
        line.push_str("  near high");
    }
    line
}

pub fn format_history_row(row: &HistoryRow) -> String {
    let change = row
        .change_pct
        .map(|c| format!("{c:+.2}%"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {}  {:.4}  {}",
        row.tick.iso_date(),
        row.tick.instrument,
        row.tick.price,
        change
    )
}

pub fn format_snapshot(
    symbol: Instrument,
    snapshot: &TechnicalSnapshot,
    config: &AnalysisConfig,
) -> String {
    format!(
        "{}  price {:.4}  SMA({}) {:.4}  SMA({}) {:.4}  RSI({}) {:.1} {}",
        symbol.name(),
        snapshot.price,
        config.sma_short,
        snapshot.sma_short,
        config.sma_long,
        snapshot.sma_long,
        config.rsi_period,
        snapshot.rsi,
        snapshot.zone.label()
    )
}

pub fn format_forecast(symbol: Instrument, result: &ForecastResult) -> String {
    let mut out = format!("{} forecast, {} steps\n", symbol.name(), result.horizon());
    for step in 0..result.horizon() {
        out.push_str(&format!(
            "  +{:<3} {:.4}  [{:.4}, {:.4}]\n",
            step + 1,
            result.predictions[step],
            result.lower_band[step],
            result.upper_band[step]
        ));
    }
    out
}

fn format_period(label: &str, s: &PeriodSummary) -> String {
    format!(
        "  {label:<14} low {:.4}  high {:.4}  {:+.2}% {}  {}",
        s.low,
        s.high,
        s.change_pct,
        s.trend.label(),
        s.insight()
    )
}
