//! Curated trading pairs and their canonical base/quote orientation.
//!
//! [`PairRegistry`] is an immutable table built once at startup and shared
//! (via `Arc`) with every component that needs orientation lookups: the
//! extractor, the reserve accumulator and the price oracle. The order of
//! assets in each [`PairMetadata`] is the canonical orientation; events
//! whose on-chain ordering is reversed are normalized against it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::asset::AssetInfo;
use super::event::Direction;

/// Native staking denom of the chain.
pub const ORAI_DENOM: &str = "orai";
/// USDT cw20 contract, the USD anchor of the price graph.
pub const USDT_CONTRACT: &str = "orai12hzjxfh77wl572gdzct2fxv2arxcwh6gykc7qh";
/// USDC cw20 contract.
pub const USDC_CONTRACT: &str = "orai15un8msx3n5zf9ahlxmfeqd2kwa5wm0nrpxer304m9nd5q6qq0g6sku5pdd";
const AIRI_CONTRACT: &str = "orai10ldgzued6zjp0mkqwsv2mux3ml50l97c74x8sg";
const ORAIX_CONTRACT: &str = "orai1lus0f0rhx8s03gdllx2n6vhkmf0536dv57wfge";
const SCORAI_CONTRACT: &str = "orai1065qe48g7aemju045aeyprflytemx7kecxkf5m7u5h5mphd0qlcs47pclp";
const KWT_CONTRACT: &str = "orai1nd4r053e3kgedgld2ymen8l9yrw8xpjyaal7j5";
const MILKY_CONTRACT: &str = "orai1gzvndtzceqwfymu2kqhta2jn6gmzxvzqwdgvjw";
const SCATOM_CONTRACT: &str = "orai19q4qak2g3cj2xc2y3060t0quzn3gfhzx08rjlrdd3vqxhjtat0cq668phq";
const ATOM_DENOM: &str = "ibc/A2E2EEC9057A4A1C2C0A6A4C78B0239118DF5F278830F50B4A6BDD7A66506B78";
const OSMO_DENOM: &str = "ibc/9C4DCD21B48231D0BC2AC3D1B74A864746B37E4292694C93C617324250D002FC";

/// Whether an on-chain `(first, second)` asset ordering matches the pair's
/// canonical orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// `first` is the base asset.
    Canonical,
    /// `first` is the quote asset; fields must be swapped.
    Reversed,
}

/// Static description of one curated pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairMetadata {
    /// Canonical base asset.
    pub base: AssetInfo,
    /// Canonical quote asset.
    pub quote: AssetInfo,
    /// Display symbol of the base asset.
    pub base_symbol: String,
    /// Display symbol of the quote asset.
    pub quote_symbol: String,
    /// Decimals of the base asset.
    pub base_decimals: u32,
    /// Decimals of the quote asset.
    pub quote_decimals: u32,
    /// Pair contract address (empty until discovered).
    pub pair_addr: String,
    /// LP token (liquidity) contract address (empty until discovered).
    pub liquidity_addr: String,
    /// Oracle contract used by the pair, when any.
    pub oracle_addr: Option<String>,
    /// Swap commission rate as a decimal string (e.g. `"0.003"`).
    pub commission_rate: String,
}

impl PairMetadata {
    /// Creates pair metadata with unknown contract addresses.
    #[must_use]
    pub fn new(base: AssetInfo, quote: AssetInfo, base_symbol: &str, quote_symbol: &str) -> Self {
        Self {
            base,
            quote,
            base_symbol: base_symbol.to_string(),
            quote_symbol: quote_symbol.to_string(),
            base_decimals: 6,
            quote_decimals: 6,
            pair_addr: String::new(),
            liquidity_addr: String::new(),
            oracle_addr: None,
            commission_rate: "0.003".to_string(),
        }
    }

    /// Sets the pair and LP token addresses.
    #[must_use]
    pub fn with_addresses(mut self, pair_addr: &str, liquidity_addr: &str) -> Self {
        self.pair_addr = pair_addr.to_string();
        self.liquidity_addr = liquidity_addr.to_string();
        self
    }

    /// Key grouping events of this pair independent of trade direction:
    /// `baseDenom-quoteDenom`.
    #[must_use]
    pub fn pair_key(&self) -> String {
        format!("{}-{}", self.base.denom(), self.quote.denom())
    }

    /// Human-readable symbol pair, e.g. `ORAI/USDT`.
    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base_symbol, self.quote_symbol)
    }

    /// Compares an on-chain `(first, second)` denom ordering against the
    /// canonical orientation. Returns `None` when the denoms are not this
    /// pair's assets.
    #[must_use]
    pub fn orientation(&self, first: &str, second: &str) -> Option<Orientation> {
        let (base, quote) = (self.base.denom(), self.quote.denom());
        if first == base && second == quote {
            Some(Orientation::Canonical)
        } else if first == quote && second == base {
            Some(Orientation::Reversed)
        } else {
            None
        }
    }

    /// Returns `true` when the pair holds `denom` on either side.
    #[must_use]
    pub fn contains(&self, denom: &str) -> bool {
        self.base.denom() == denom || self.quote.denom() == denom
    }

    /// Returns the asset opposite `denom` within this pair.
    #[must_use]
    pub fn other_side(&self, denom: &str) -> Option<&AssetInfo> {
        if self.base.denom() == denom {
            Some(&self.quote)
        } else if self.quote.denom() == denom {
            Some(&self.base)
        } else {
            None
        }
    }

    /// Decimals of `denom` within this pair.
    #[must_use]
    pub fn decimals_of(&self, denom: &str) -> Option<u32> {
        if self.base.denom() == denom {
            Some(self.base_decimals)
        } else if self.quote.denom() == denom {
            Some(self.quote_decimals)
        } else {
            None
        }
    }

    /// Commission rate parsed as a float; `0.0` when unparseable.
    #[must_use]
    pub fn commission(&self) -> f64 {
        self.commission_rate.parse().unwrap_or(0.0)
    }
}

/// Fixed USD price for an asset the price graph cannot quote reliably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceOverride {
    /// Denom or contract address of the asset.
    pub denom: String,
    /// Price in USD per whole token.
    pub usd: f64,
}

/// Immutable table of curated pairs with lookup indexes.
#[derive(Debug, Clone, Default)]
pub struct PairRegistry {
    pairs: Vec<PairMetadata>,
    by_pair_addr: HashMap<String, usize>,
    by_lp_token: HashMap<String, usize>,
    price_overrides: HashMap<String, f64>,
}

impl PairRegistry {
    /// Builds a registry from an ordered pair list.
    #[must_use]
    pub fn new(pairs: Vec<PairMetadata>) -> Self {
        let mut by_pair_addr = HashMap::new();
        let mut by_lp_token = HashMap::new();
        for (idx, pair) in pairs.iter().enumerate() {
            if !pair.pair_addr.is_empty() {
                by_pair_addr.insert(pair.pair_addr.clone(), idx);
            }
            if !pair.liquidity_addr.is_empty() {
                by_lp_token.insert(pair.liquidity_addr.clone(), idx);
            }
        }
        Self {
            pairs,
            by_pair_addr,
            by_lp_token,
            price_overrides: HashMap::new(),
        }
    }

    /// Adds fixed USD price overrides.
    #[must_use]
    pub fn with_price_overrides(mut self, overrides: Vec<PriceOverride>) -> Self {
        self.price_overrides = overrides.into_iter().map(|o| (o.denom, o.usd)).collect();
        self
    }

    /// The curated Oraichain pair table in canonical orientation, without
    /// contract addresses (those come from factory discovery).
    #[must_use]
    pub fn oraichain_pairs() -> Vec<PairMetadata> {
        let orai = AssetInfo::native(ORAI_DENOM);
        let usdt = AssetInfo::token(USDT_CONTRACT);
        let atom = AssetInfo::native(ATOM_DENOM);
        vec![
            PairMetadata::new(orai.clone(), AssetInfo::token(AIRI_CONTRACT), "ORAI", "AIRI"),
            PairMetadata::new(AssetInfo::token(ORAIX_CONTRACT), orai.clone(), "ORAIX", "ORAI"),
            PairMetadata::new(AssetInfo::token(SCORAI_CONTRACT), orai.clone(), "scORAI", "ORAI"),
            PairMetadata::new(orai.clone(), atom.clone(), "ORAI", "ATOM"),
            PairMetadata::new(orai.clone(), usdt.clone(), "ORAI", "USDT"),
            PairMetadata::new(orai.clone(), AssetInfo::token(KWT_CONTRACT), "ORAI", "KWT"),
            PairMetadata::new(orai.clone(), AssetInfo::native(OSMO_DENOM), "ORAI", "OSMO"),
            PairMetadata::new(AssetInfo::token(MILKY_CONTRACT), usdt, "MILKY", "USDT"),
            PairMetadata::new(orai, AssetInfo::token(USDC_CONTRACT), "ORAI", "USDC"),
            PairMetadata::new(AssetInfo::token(SCATOM_CONTRACT), atom, "scATOM", "ATOM"),
        ]
    }

    /// Price overrides shipped with the curated table. USDC has only a thin
    /// ORAI pool on-chain, so it is pinned to its peg.
    #[must_use]
    pub fn default_price_overrides() -> Vec<PriceOverride> {
        vec![PriceOverride {
            denom: USDC_CONTRACT.to_string(),
            usd: 1.0,
        }]
    }

    /// Iterates over all pairs in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &PairMetadata> {
        self.pairs.iter()
    }

    /// Number of configured pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` when no pairs are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Looks up a pair by its pair contract address.
    #[must_use]
    pub fn by_pair_addr(&self, pair_addr: &str) -> Option<&PairMetadata> {
        self.by_pair_addr
            .get(pair_addr)
            .and_then(|idx| self.pairs.get(*idx))
    }

    /// Looks up a pair by its LP token address.
    #[must_use]
    pub fn by_lp_token(&self, lp_token: &str) -> Option<&PairMetadata> {
        self.by_lp_token
            .get(lp_token)
            .and_then(|idx| self.pairs.get(*idx))
    }

    /// Finds the pair holding both denoms, with the orientation of
    /// `(first, second)` relative to it.
    #[must_use]
    pub fn find(&self, first: &str, second: &str) -> Option<(&PairMetadata, Orientation)> {
        self.pairs
            .iter()
            .find_map(|pair| pair.orientation(first, second).map(|o| (pair, o)))
    }

    /// Derives the trade direction of a swap purely from denom identity:
    /// offering the base asset is a `Sell`, offering the quote is a `Buy`.
    #[must_use]
    pub fn swap_direction(&self, offer: &str, ask: &str) -> Option<(&PairMetadata, Direction)> {
        self.find(offer, ask).map(|(pair, orientation)| {
            let direction = match orientation {
                Orientation::Canonical => Direction::Sell,
                Orientation::Reversed => Direction::Buy,
            };
            (pair, direction)
        })
    }

    /// Fixed USD price for `denom`, if one is configured.
    #[must_use]
    pub fn price_override(&self, denom: &str) -> Option<f64> {
        self.price_overrides.get(denom).copied()
    }
}
