//! Typed DEX events extracted from chain transactions.
//!
//! Events are immutable once created. Each carries a deterministic unique
//! key used for de-duplication and idempotent re-insertion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Builds the deterministic unique key
/// `height-firstDenom-firstAmount-secondDenom-secondAmount`.
#[must_use]
pub fn unique_key(
    height: u64,
    first_denom: &str,
    first_amount: u128,
    second_denom: &str,
    second_amount: u128,
) -> String {
    format!("{height}-{first_denom}-{first_amount}-{second_denom}-{second_amount}")
}

/// Anything with a de-duplication key.
pub trait UniqueKeyed {
    /// Returns the deterministic unique key.
    fn unique_key(&self) -> &str;
}

/// Where an event happened on-chain: `(height, tx index in block, message
/// index in tx)`. Orders events the way the chain applied them.
pub type EventPosition = (u64, u32, u32);

/// Anything whose timestamp can be rounded into a time bucket.
pub trait Timestamped {
    /// Returns the unix timestamp in seconds.
    fn timestamp(&self) -> i64;
    /// Replaces the unix timestamp.
    fn set_timestamp(&mut self, timestamp: i64);
}

/// Trade direction relative to the pair's canonical base asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Quote offered, base received.
    Buy,
    /// Base offered, quote received.
    Sell,
}

impl Direction {
    /// Returns the direction as stored in the analytical store.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(Self::Buy),
            "Sell" => Ok(Self::Sell),
            other => Err(format!("unknown direction {other}")),
        }
    }
}

/// Kind of liquidity operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityOp {
    /// Liquidity added to the pool.
    Provide,
    /// Liquidity withdrawn from the pool.
    Withdraw,
}

impl LiquidityOp {
    /// Returns the operation as stored in the analytical store.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Provide => "provide",
            Self::Withdraw => "withdraw",
        }
    }
}

impl FromStr for LiquidityOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provide" => Ok(Self::Provide),
            "withdraw" => Ok(Self::Withdraw),
            other => Err(format!("unknown liquidity op {other}")),
        }
    }
}

/// A single swap hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapEvent {
    /// Transaction hash.
    pub tx_hash: String,
    /// Denom (or cw20 address) offered.
    pub offer_denom: String,
    /// Amount offered.
    pub offer_amount: u128,
    /// Denom (or cw20 address) asked.
    pub ask_denom: String,
    /// Amount returned to the trader.
    pub return_amount: u128,
    /// Tax charged.
    pub tax_amount: u128,
    /// Commission charged.
    pub commission_amount: u128,
    /// Spread amount.
    pub spread_amount: u128,
    /// Direction relative to the canonical pair orientation.
    pub direction: Direction,
    /// Pair contract address.
    pub pair_addr: String,
    /// Direction-independent pair key (`baseDenom-quoteDenom`).
    pub pair_key: String,
    /// Message sender.
    pub sender: String,
    /// Block height.
    pub height: u64,
    /// Position of the transaction in its block.
    pub tx_index: u32,
    /// Position of the message in its transaction.
    pub msg_index: u32,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// `height-offerDenom-offerAmount-askDenom-returnAmount`.
    pub unique_key: String,
}

impl SwapEvent {
    /// On-chain position of the swap.
    #[must_use]
    pub const fn position(&self) -> EventPosition {
        (self.height, self.tx_index, self.msg_index)
    }

    /// Amount of the base asset moved by this swap: offered on a sell,
    /// returned on a buy.
    #[must_use]
    pub const fn base_amount(&self) -> u128 {
        match self.direction {
            Direction::Sell => self.offer_amount,
            Direction::Buy => self.return_amount,
        }
    }

    /// Amount of the quote asset moved by this swap.
    #[must_use]
    pub const fn quote_amount(&self) -> u128 {
        match self.direction {
            Direction::Sell => self.return_amount,
            Direction::Buy => self.offer_amount,
        }
    }

    /// Execution price expressed as base per quote. `0.0` when the quote leg
    /// is empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn price(&self) -> f64 {
        let (base, quote) = (self.base_amount(), self.quote_amount());
        if quote == 0 {
            return 0.0;
        }
        base as f64 / quote as f64
    }
}

impl UniqueKeyed for SwapEvent {
    fn unique_key(&self) -> &str {
        &self.unique_key
    }
}

impl Timestamped for SwapEvent {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }
}

/// A provide or withdraw, oriented to the pair's canonical base/quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityEvent {
    /// Transaction hash.
    pub tx_hash: String,
    /// Base asset denom.
    pub base_denom: String,
    /// Base amount provided or refunded.
    pub base_amount: u128,
    /// Quote asset denom.
    pub quote_denom: String,
    /// Quote amount provided or refunded.
    pub quote_amount: u128,
    /// Base reserve of the pool at event height.
    pub base_reserve: u128,
    /// Quote reserve of the pool at event height.
    pub quote_reserve: u128,
    /// `quoteAmount / baseAmount`.
    pub base_price: f64,
    /// Provide or withdraw.
    pub op_type: LiquidityOp,
    /// Protocol fee on native assets, in base units.
    pub protocol_fee: u128,
    /// LP shares minted or burned.
    pub share: u128,
    /// Transaction creator.
    pub creator: String,
    /// Pair contract address.
    pub pair_addr: String,
    /// Block height.
    pub height: u64,
    /// Position of the transaction in its block.
    pub tx_index: u32,
    /// Position of the message in its transaction.
    pub msg_index: u32,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// `height-baseDenom-baseAmount-quoteDenom-quoteAmount`.
    pub unique_key: String,
}

impl LiquidityEvent {
    /// On-chain position of the provide or withdraw.
    #[must_use]
    pub const fn position(&self) -> EventPosition {
        (self.height, self.tx_index, self.msg_index)
    }
}

impl UniqueKeyed for LiquidityEvent {
    fn unique_key(&self) -> &str {
        &self.unique_key
    }
}

impl Timestamped for LiquidityEvent {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }
}

/// Kind of staking change relevant to APR recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StakingAction {
    /// LP tokens bonded.
    Bond,
    /// LP tokens unbonded.
    Unbond,
    /// Reward rate changed.
    UpdateRewardsPerSec,
}

/// A staking-contract execution referencing an LP token.
#[derive(Debug, Clone, PartialEq)]
pub struct StakingEvent {
    /// What changed.
    pub action: StakingAction,
    /// LP token the staking pool is keyed by.
    pub staking_token: String,
    /// Amount bonded or unbonded (zero for reward updates).
    pub amount: u128,
    /// Transaction hash.
    pub tx_hash: String,
    /// Block height.
    pub height: u64,
}

/// Any event produced by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum DexEvent {
    /// Swap hop.
    Swap(SwapEvent),
    /// Provide or withdraw.
    Liquidity(LiquidityEvent),
    /// Staking change.
    Staking(StakingEvent),
}
