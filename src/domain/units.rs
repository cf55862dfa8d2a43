//! Wei conversions for display

use alloy_primitives::U256;

pub const WEI_PER_GWEI: u128 = 1_000_000_000;
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Wei to ETH as f64 (for display)
pub fn wei_to_eth(wei: u128) -> f64 {
    let whole = wei / WEI_PER_ETH;
    let frac = wei % WEI_PER_ETH;
    whole as f64 + frac as f64 / 1e18
}

/// Wide balance to ETH; values beyond u128 are shown through their decimal string
pub fn balance_to_eth(wei: U256) -> f64 {
    match u128::try_from(wei) {
        Ok(small) => wei_to_eth(small),
        Err(_) => {
            let eth = wei / U256::from(WEI_PER_ETH);
            eth.to_string().parse().unwrap_or(f64::MAX)
        }
    }
}

pub fn format_eth(wei: U256) -> String {
    format!("{:.6} ETH", balance_to_eth(wei))
}
