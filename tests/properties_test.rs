mod common;

use common::*;
use metalwatch::domain::forecast::{ForecastConfig, forecast_with};
use metalwatch::domain::history::{HistoryStore, TimeWindow};
use metalwatch::domain::indicator::rsi::{calculate_rsi, calculate_rsi_series};
use metalwatch::domain::indicator::sma::calculate_sma;
use proptest::prelude::*;

fn prices(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.5f64..5000.0, min_len..max_len)
}

proptest! {
    #[test]
    fn history_never_exceeds_capacity(capacity in 1usize..50, count in 0usize..200) {
        let mut store = HistoryStore::new(capacity);
        for i in 0..count {
            store.append(make_tick(Instrument::Gold, 1.0 + i as f64, i as i64)).unwrap();
        }
        prop_assert_eq!(store.len(), count.min(capacity));
        if count > 0 {
            let newest = store.latest(Instrument::Gold).unwrap();
            prop_assert_eq!(newest.price, count as f64);
        }
    }

    #[test]
    fn query_is_chronological(offsets in prop::collection::vec(0i64..100_000, 1..60)) {
        let mut store = HistoryStore::new(100);
        for (i, offset) in offsets.iter().enumerate() {
            store.append(make_tick(Instrument::Silver, 1.0 + i as f64, *offset)).unwrap();
        }
        let ticks: Vec<_> = store.query(Instrument::Silver, TimeWindow::All, at(200_000)).collect();
        prop_assert_eq!(ticks.len(), offsets.len());
        prop_assert!(ticks.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn sma_aligns_with_input(series in prices(0, 120), period in 1usize..30) {
        let sma = calculate_sma(&series, period).unwrap();
        prop_assert_eq!(sma.len(), series.len());
        prop_assert_eq!(sma.valid_count(), series.len().saturating_sub(period - 1));

        for (i, value) in sma.values.iter().enumerate() {
            if let Some(v) = value {
                let window = &series[i + 1 - period..=i];
                let lo = window.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(*v >= lo - 1e-9 && *v <= hi + 1e-9);
            }
        }
    }

    #[test]
    fn rsi_stays_in_range(series in prices(2, 150), period in 1usize..20) {
        prop_assume!(series.len() > period);
        let rsi = calculate_rsi(&series, period).unwrap();
        prop_assert!((0.0..=100.0).contains(&rsi));

        let full = calculate_rsi_series(&series, period).unwrap();
        prop_assert_eq!(full.last(), Some(rsi));
        prop_assert!(full.values.iter().flatten().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn bands_enclose_predictions(series in prices(2, 120), horizon in 1usize..15) {
        let result = forecast_with(&series, horizon, None, &ForecastConfig::default()).unwrap();
        prop_assert_eq!(result.horizon(), horizon);
        prop_assert_eq!(result.upper_band.len(), horizon);
        prop_assert_eq!(result.lower_band.len(), horizon);
        for i in 0..horizon {
            prop_assert!(result.upper_band[i] >= result.predictions[i]);
            prop_assert!(result.lower_band[i] <= result.predictions[i]);
        }
    }
}
