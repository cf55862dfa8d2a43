//! Gas-fee calculator
//!
//! Scales the node's gas price by a per-chain factor and prices a transfer
//! of `amount` native units with a given gas limit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::units::{wei_to_eth, WEI_PER_GWEI};

pub const DEFAULT_GAS_LIMIT: u64 = 21_000;

/// Target chain for a fee estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    Ethereum,
    Polygon,
    Bnb,
}

impl Chain {
    pub const ALL: [Chain; 3] = [Chain::Ethereum, Chain::Polygon, Chain::Bnb];

    /// Multiplier applied to the fetched gas price, as `(numerator, denominator)`
    pub fn price_factor(&self) -> (u128, u128) {
        match self {
            Chain::Ethereum => (1, 1),
            Chain::Polygon => (1, 10),
            Chain::Bnb => (3, 10),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Polygon => "Polygon",
            Chain::Bnb => "BNB Chain",
        }
    }

    pub fn next(&self) -> Chain {
        let index = Chain::ALL.iter().position(|chain| chain == self).unwrap_or(0);
        Chain::ALL[(index + 1) % Chain::ALL.len()]
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Chain::Ethereum),
            "polygon" | "matic" => Ok(Chain::Polygon),
            "bnb" | "bsc" => Ok(Chain::Bnb),
            other => Err(format!("unknown chain: {other}")),
        }
    }
}

/// A computed fee estimate
#[derive(Debug, Clone, PartialEq)]
pub struct FeeQuote {
    pub chain: Chain,
    pub gas_price_wei: u128,
    pub gas_limit: u64,
    pub fee_wei: u128,
    pub amount: f64,
}

impl FeeQuote {
    /// Price a transfer. A missing or zero gas limit falls back to 21000.
    pub fn compute(base_gas_price_wei: u128, chain: Chain, gas_limit: Option<u64>, amount: f64) -> Self {
        let gas_limit = gas_limit.filter(|limit| *limit > 0).unwrap_or(DEFAULT_GAS_LIMIT);
        let (num, den) = chain.price_factor();
        let gas_price_wei = base_gas_price_wei.saturating_mul(num) / den;
        let fee_wei = gas_price_wei.saturating_mul(gas_limit as u128);

        Self {
            chain,
            gas_price_wei,
            gas_limit,
            fee_wei,
            amount: if amount.is_finite() { amount } else { 0.0 },
        }
    }

    pub fn gas_price_gwei(&self) -> f64 {
        self.gas_price_wei as f64 / WEI_PER_GWEI as f64
    }

    /// Fee in native units
    pub fn fee_native(&self) -> f64 {
        wei_to_eth(self.fee_wei)
    }

    pub fn total(&self) -> f64 {
        self.amount + self.fee_native()
    }

    pub fn lines(&self) -> [String; 3] {
        [
            format!("Gas Price: {:.2} Gwei", self.gas_price_gwei()),
            format!("Gas Fee: {:.6} (native)", self.fee_native()),
            format!("Total Cost: {:.6} (amount + gas)", self.total()),
        ]
    }
}
