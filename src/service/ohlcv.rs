//! OHLCV Builder.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{OhlcvCandle, SwapEvent};

/// Base and quote volume of one pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VolumeTotals {
    /// Sum of base-asset amounts moved.
    pub base: u128,
    /// Sum of quote-asset amounts moved.
    pub quote: u128,
    /// Number of swaps.
    pub swaps: u64,
}

/// Folds swaps into one candle per `(pair key, timestamp)`.
///
/// Swaps are expected to carry bucketed timestamps. Within a bucket they are
/// taken in on-chain order, ties keeping input order: open is the first price,
/// close the last, high and low the extrema, volume the base amounts.
#[must_use]
pub fn build_candles(swaps: &[SwapEvent]) -> Vec<OhlcvCandle> {
    let mut groups: BTreeMap<(&str, i64), Vec<&SwapEvent>> = BTreeMap::new();
    for swap in swaps {
        groups
            .entry((swap.pair_key.as_str(), swap.timestamp))
            .or_default()
            .push(swap);
    }

    let mut candles = Vec::with_capacity(groups.len());
    for ((pair, timestamp), mut group) in groups {
        group.sort_by_key(|swap| swap.position());
        let mut prices = group.iter().map(|swap| swap.price());
        let Some(open) = prices.next() else {
            continue;
        };
        let (mut high, mut low, mut close) = (open, open, open);
        for price in prices {
            high = high.max(price);
            low = low.min(price);
            close = price;
        }
        candles.push(OhlcvCandle {
            pair: pair.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume: group.iter().map(|swap| swap.base_amount()).sum(),
            swap_count: group.len() as u64,
            unique_key: format!("{timestamp}-{pair}"),
        });
    }
    candles
}

/// Base and quote volume per pair key.
#[must_use]
pub fn volume_by_pair(swaps: &[SwapEvent]) -> BTreeMap<String, VolumeTotals> {
    let mut totals: BTreeMap<String, VolumeTotals> = BTreeMap::new();
    for swap in swaps {
        let entry = totals.entry(swap.pair_key.clone()).or_default();
        entry.base = entry.base.saturating_add(swap.base_amount());
        entry.quote = entry.quote.saturating_add(swap.quote_amount());
        entry.swaps += 1;
    }
    totals
}
