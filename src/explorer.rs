//! Block Explorer Links
//!
//! URL builders for the explorer links shown alongside session state:
//! Bitcoin addresses and transactions, and Stacks addresses.

use crate::config::Network;

fn mempool_base(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "https://mempool.space",
        Network::Testnet | Network::Devnet => "https://mempool.space/testnet",
    }
}

fn stacks_chain(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "mainnet",
        Network::Testnet | Network::Devnet => "testnet",
    }
}

/// Explorer URL for a Bitcoin address
pub fn btc_address_url(network: Network, address: &str) -> String {
    format!("{}/address/{}", mempool_base(network), address)
}

/// Explorer URL for a Bitcoin transaction
pub fn btc_tx_url(network: Network, txid: &str) -> String {
    format!("{}/tx/{}", mempool_base(network), txid)
}

/// Explorer URL for a Stacks address
pub fn stx_address_url(network: Network, address: &str) -> String {
    format!(
        "https://explorer.hiro.so/address/{}?chain={}",
        address,
        stacks_chain(network)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btc_urls() {
        assert_eq!(
            btc_address_url(Network::Mainnet, "bc1qxyz"),
            "https://mempool.space/address/bc1qxyz"
        );
        assert_eq!(
            btc_tx_url(Network::Testnet, "abcd"),
            "https://mempool.space/testnet/tx/abcd"
        );
    }

    #[test]
    fn test_stx_url() {
        let url = stx_address_url(Network::Devnet, "ST1TEST");
        assert_eq!(url, "https://explorer.hiro.so/address/ST1TEST?chain=testnet");
    }
}
