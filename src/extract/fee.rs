//! Protocol fee on native-token liquidity refunds.

use crate::chain::PoolResponse;
use crate::domain::PairMetadata;

/// Tax rate numerator (`TAX_RATE = 3 / 1000 = 0.003`).
pub const TAX_RATE_NUMERATOR: u128 = 3;
/// Tax rate denominator.
pub const TAX_RATE_DENOMINATOR: u128 = 1_000;
/// Maximum fee charged on a single native refund.
pub const TAX_CAP: u128 = 1_000_000;

/// Fee on a native refund:
/// `min(refund - refund / (1 + TAX_RATE), TAX_CAP)`.
#[must_use]
pub fn native_tax(refund: u128) -> u128 {
    let net = refund.saturating_mul(TAX_RATE_DENOMINATOR)
        / (TAX_RATE_DENOMINATOR + TAX_RATE_NUMERATOR);
    refund.saturating_sub(net).min(TAX_CAP)
}

/// Reserves of a pair at the event height, in canonical orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolState {
    /// Base reserve.
    pub base_reserve: u128,
    /// Quote reserve.
    pub quote_reserve: u128,
    /// Total LP share supply.
    pub total_share: u128,
}

impl PoolState {
    /// Orients a pool query response against `pair`.
    #[must_use]
    pub fn from_response(pair: &PairMetadata, pool: &PoolResponse) -> Self {
        Self {
            base_reserve: pool.amount_of(pair.base.denom()),
            quote_reserve: pool.amount_of(pair.quote.denom()),
            total_share: pool.total_share,
        }
    }

    /// Share of `reserve` that `share` LP tokens redeem.
    fn refund_of(&self, reserve: u128, share: u128) -> u128 {
        if self.total_share == 0 {
            return 0;
        }
        reserve.saturating_mul(share) / self.total_share
    }
}

/// Protocol fee, in base units, charged when `share` LP tokens are
/// redeemed from `pool`. Only native assets are taxed; the quote-side fee
/// is converted to base units at the pool ratio.
#[must_use]
pub fn liquidity_fee(pair: &PairMetadata, pool: &PoolState, share: u128) -> u128 {
    let base_fee = if pair.base.is_native() {
        native_tax(pool.refund_of(pool.base_reserve, share))
    } else {
        0
    };
    let quote_fee = if pair.quote.is_native() && pool.quote_reserve > 0 {
        native_tax(pool.refund_of(pool.quote_reserve, share)).saturating_mul(pool.base_reserve)
            / pool.quote_reserve
    } else {
        0
    };
    base_fee.saturating_add(quote_fee)
}
