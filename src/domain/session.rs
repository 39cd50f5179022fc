//! Session state: one rate controller per external resource plus the
//! last-known-good values served while a resource is cooling down or failing.

use crate::domain::error::MetalwatchError;
use crate::domain::history::HistoryStore;
use crate::domain::rate_limit::{Admission, COMMENTARY, PRICE_FEED, RateController, RatePolicy};
use crate::domain::tick::{Instrument, Tick};
use crate::ports::commentary_port::CommentaryPort;
use crate::ports::price_feed_port::PriceFeedPort;
use crate::ports::session_port::SessionPort;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug)]
pub enum PollOutcome {
    /// Fetched from the feed during this poll.
    Fresh(Tick),
    /// Served from cache because the feed is cooling down.
    Cached { tick: Tick, remaining: Duration },
    /// The feed failed; the last-known-good quote is served instead.
    Fallback { tick: Tick, error: MetalwatchError },
    /// The feed failed and nothing is cached.
    Unavailable {
        instrument: Instrument,
        error: MetalwatchError,
    },
}

impl PollOutcome {
    /// The quote to display, whatever its source.
    pub fn tick(&self) -> Option<&Tick> {
        match self {
            PollOutcome::Fresh(tick)
            | PollOutcome::Cached { tick, .. }
            | PollOutcome::Fallback { tick, .. } => Some(tick),
            PollOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, PollOutcome::Fresh(_))
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub price_feed: RateController,
    pub commentary: RateController,
    quotes: HashMap<Instrument, Tick>,
    replies: HashMap<String, String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(RatePolicy::price_feed(), RatePolicy::commentary())
    }
}

impl SessionState {
    pub fn new(price_policy: RatePolicy, commentary_policy: RatePolicy) -> Self {
        Self {
            price_feed: RateController::new(PRICE_FEED, price_policy),
            commentary: RateController::new(COMMENTARY, commentary_policy),
            quotes: HashMap::new(),
            replies: HashMap::new(),
        }
    }

    /// Rebuilds the session from persisted quota counters and cached quotes.
    pub fn restore(
        port: &dyn SessionPort,
        price_policy: RatePolicy,
        commentary_policy: RatePolicy,
    ) -> Result<Self, MetalwatchError> {
        let price_state = port.load_quota(PRICE_FEED)?.unwrap_or_default();
        let commentary_state = port.load_quota(COMMENTARY)?.unwrap_or_default();

        let mut quotes = HashMap::new();
        for instrument in Instrument::ALL {
            if let Some(quote) = port.load_cached_quote(instrument)? {
                quotes.insert(instrument, quote);
            }
        }

        Ok(Self {
            price_feed: RateController::restore(PRICE_FEED, price_policy, price_state),
            commentary: RateController::restore(COMMENTARY, commentary_policy, commentary_state),
            quotes,
            replies: HashMap::new(),
        })
    }

    pub fn save(&self, port: &dyn SessionPort) -> Result<(), MetalwatchError> {
        port.save_quota(PRICE_FEED, self.price_feed.state())?;
        port.save_quota(COMMENTARY, self.commentary.state())?;
        for quote in self.quotes.values() {
            port.save_cached_quote(quote)?;
        }
        Ok(())
    }

    /// Drops quota counters and every cached value.
    pub fn reset(&mut self) {
        self.price_feed = RateController::new(PRICE_FEED, *self.price_feed.policy());
        self.commentary = RateController::new(COMMENTARY, *self.commentary.policy());
        self.quotes.clear();
        self.replies.clear();
    }

    /// Rolls quota windows on both controllers.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.price_feed.tick(now);
        self.commentary.tick(now);
    }

    pub fn cached_quote(&self, instrument: Instrument) -> Option<&Tick> {
        self.quotes.get(&instrument)
    }

    /// One poll cycle over `instruments`, counted as a single request against
    /// the feed quota when at least one fetch succeeds.
    pub fn poll_prices(
        &mut self,
        now: DateTime<Utc>,
        feed: &mut dyn PriceFeedPort,
        instruments: &[Instrument],
    ) -> Vec<PollOutcome> {
        let mut outcomes = Vec::with_capacity(instruments.len());
        let mut fetched = false;

        for &instrument in instruments {
            let cached = self.quotes.get(&instrument).cloned();
            match self.price_feed.admit(now, cached.is_some()) {
                Admission::UseCached { remaining } => {
                    tracing::debug!(
                        %instrument,
                        remaining_secs = remaining.num_seconds(),
                        "feed cooling down; serving cached quote"
                    );
                    if let Some(tick) = cached {
                        outcomes.push(PollOutcome::Cached { tick, remaining });
                    }
                    continue;
                }
                Admission::ForcedFetch => {
                    tracing::info!(%instrument, "no cached quote; fetching despite cooldown");
                }
                Admission::Fetch => {}
            }

            let result = feed
                .fetch_quote(instrument, now)
                .and_then(|tick| tick.validate().map(|_| tick));
            match result {
                Ok(tick) => {
                    fetched = true;
                    self.quotes.insert(instrument, tick.clone());
                    outcomes.push(PollOutcome::Fresh(tick));
                }
                Err(error) => {
                    tracing::warn!(%instrument, feed = feed.name(), error = %error, "quote fetch failed");
                    outcomes.push(match cached {
                        Some(tick) => PollOutcome::Fallback { tick, error },
                        None => PollOutcome::Unavailable { instrument, error },
                    });
                }
            }
        }

        if fetched {
            self.price_feed.record_request(now);
        }
        outcomes
    }

    /// Commentary for `topic`, served from cache while the commentary source
    /// is cooling down or failing.
    pub fn request_commentary(
        &mut self,
        now: DateTime<Utc>,
        port: &dyn CommentaryPort,
        topic: &str,
        prompt: &str,
    ) -> Option<String> {
        let cached = self.replies.get(topic).cloned();
        if let Admission::UseCached { remaining } = self.commentary.admit(now, cached.is_some()) {
            tracing::debug!(topic, remaining_secs = remaining.num_seconds(), "using cached commentary");
            return cached;
        }

        match port.complete(prompt) {
            Ok(reply) => {
                self.commentary.record_request(now);
                self.replies.insert(topic.to_string(), reply.clone());
                Some(reply)
            }
            Err(e) => {
                tracing::warn!(topic, error = %e, "commentary unavailable");
                cached
            }
        }
    }
}

/// Appends every freshly fetched quote to `history`. Returns the number appended.
pub fn append_fresh(history: &mut HistoryStore, outcomes: &[PollOutcome]) -> usize {
    let mut appended = 0;
    for outcome in outcomes {
        if let PollOutcome::Fresh(tick) = outcome {
            match history.append(tick.clone()) {
                Ok(_) => appended += 1,
                Err(e) => tracing::warn!(error = %e, "dropping fetched quote"),
            }
        }
    }
    appended
}
