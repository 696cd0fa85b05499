//! Static chain catalogue: chain-key -> {chain id, gateway domain, USDC
//! address, finality, capability flags}. One canonical catalogue, resolving
//! the open question in `spec.md` §9 about multiple catalogue variants.

use std::collections::HashMap;
use std::sync::OnceLock;

pub type ChainKey = &'static str;

pub const HUB_CHAIN: ChainKey = "ethereum";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ChainInfo {
    pub key: ChainKey,
    pub chain_id: u64,
    /// Gateway settlement-service domain number. `None` means the chain is
    /// not gateway-capable (cannot hold a deposited balance or receive a mint).
    pub domain: Option<u32>,
    pub usdc_address: &'static str,
    /// The gateway-wallet contract holding deposited balances on this chain.
    pub gateway_wallet_address: &'static str,
    pub supports_smart_account: bool,
    pub finality_secs: u64,
    pub is_hub: bool,
}

impl ChainInfo {
    pub fn is_gateway_capable(&self) -> bool {
        self.domain.is_some()
    }
}

fn build_catalogue() -> HashMap<ChainKey, ChainInfo> {
    let entries = [
        ChainInfo {
            key: "ethereum",
            chain_id: 1,
            domain: Some(0),
            usdc_address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            gateway_wallet_address: "0x0077777d7EBA4688BDeF3E311b846F25870A19B9",
            supports_smart_account: true,
            finality_secs: 780,
            is_hub: true,
        },
        ChainInfo {
            key: "base",
            chain_id: 8453,
            domain: Some(6),
            usdc_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            gateway_wallet_address: "0x0022222ABE238Cc2C7Bb1f21003F0a260052475B",
            supports_smart_account: true,
            finality_secs: 20,
            is_hub: false,
        },
        ChainInfo {
            key: "arbitrum",
            chain_id: 42161,
            domain: Some(3),
            usdc_address: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831",
            gateway_wallet_address: "0x0033333ABE238Cc2C7Bb1f21003F0a260052475B",
            supports_smart_account: true,
            finality_secs: 60,
            is_hub: false,
        },
        ChainInfo {
            key: "optimism",
            chain_id: 10,
            domain: Some(2),
            usdc_address: "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85",
            gateway_wallet_address: "0x0044444ABE238Cc2C7Bb1f21003F0a260052475B",
            supports_smart_account: true,
            finality_secs: 20,
            is_hub: false,
        },
        ChainInfo {
            key: "polygon",
            chain_id: 137,
            domain: Some(7),
            usdc_address: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
            gateway_wallet_address: "0x0055555ABE238Cc2C7Bb1f21003F0a260052475B",
            supports_smart_account: true,
            finality_secs: 300,
            is_hub: false,
        },
        ChainInfo {
            key: "avalanche",
            chain_id: 43114,
            domain: Some(1),
            usdc_address: "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
            gateway_wallet_address: "0x0066666ABE238Cc2C7Bb1f21003F0a260052475B",
            supports_smart_account: true,
            finality_secs: 5,
            is_hub: false,
        },
    ];
    entries.into_iter().map(|c| (c.key, c)).collect()
}

fn catalogue() -> &'static HashMap<ChainKey, ChainInfo> {
    static CATALOGUE: OnceLock<HashMap<ChainKey, ChainInfo>> = OnceLock::new();
    CATALOGUE.get_or_init(build_catalogue)
}

pub fn get(chain: &str) -> Option<&'static ChainInfo> {
    catalogue().get(chain)
}

pub fn hub_chain() -> &'static ChainInfo {
    catalogue()
        .get(HUB_CHAIN)
        .expect("HUB_CHAIN must be present in the catalogue")
}

pub fn is_gateway_capable(chain: &str) -> bool {
    get(chain).map(|c| c.is_gateway_capable()).unwrap_or(false)
}

pub fn all() -> Vec<&'static ChainInfo> {
    let mut chains: Vec<_> = catalogue().values().collect();
    chains.sort_by_key(|c| c.key);
    chains
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_chain_is_gateway_capable_and_flagged() {
        let hub = hub_chain();
        assert!(hub.is_gateway_capable());
        assert!(hub.is_hub);
        assert_eq!(hub.key, HUB_CHAIN);
    }

    #[test]
    fn exactly_one_hub_chain() {
        let hubs: Vec<_> = all().into_iter().filter(|c| c.is_hub).collect();
        assert_eq!(hubs.len(), 1);
    }

    #[test]
    fn unknown_chain_is_not_gateway_capable() {
        assert!(!is_gateway_capable("no-such-chain"));
    }
}
