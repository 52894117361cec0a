//! Reactive sources a session listens to.
//!
//! Each source is an [`Observable`] owned by whoever produces the data (wallet
//! connector, price feed, position calculators). Sessions only hold clones and
//! never write to them.

use std::fmt;
use std::sync::Arc;

use strategy_sync_core::{
    Address, BalanceFetcher, Balances, CoreResult, DsaHandle, Network, NetworkTable, Position,
    PriceTable, StrategyProtocol, TokenCatalog, Web3Handle,
};

use crate::observable::Observable;

/// Wallet connection state
#[derive(Debug, Clone)]
pub struct Web3Sources {
    pub connection: Observable<Option<Web3Handle>>,
    pub network: Observable<Network>,
    pub account: Observable<Option<Address>>,
}

impl Web3Sources {
    pub fn new(network: Network) -> Self {
        Self {
            connection: Observable::new(None),
            network: Observable::new(network),
            account: Observable::new(None),
        }
    }

    /// Publishes a fresh connection; the network follows the handle's chain when known
    pub fn connect(&self, handle: Web3Handle, account: Address) {
        if let Some(network) = handle.network() {
            if network != self.network.get() {
                self.network.set(network);
            }
        }
        self.account.set(Some(account));
        self.connection.set(Some(handle));
    }

    pub fn disconnect(&self) {
        self.connection.set(None);
        self.account.set(None);
    }
}

impl Default for Web3Sources {
    fn default() -> Self {
        Self::new(Network::default())
    }
}

/// Price and balance tables plus the service that reloads them
#[derive(Clone)]
pub struct BalanceSources {
    pub prices: Observable<NetworkTable<PriceTable>>,
    pub balances: Observable<Balances>,
    fetcher: Arc<dyn BalanceFetcher>,
}

impl BalanceSources {
    pub fn new(fetcher: Arc<dyn BalanceFetcher>) -> Self {
        Self {
            prices: Observable::default(),
            balances: Observable::default(),
            fetcher,
        }
    }

    pub fn fetcher(&self) -> Arc<dyn BalanceFetcher> {
        Arc::clone(&self.fetcher)
    }

    pub async fn fetch_balances(&self, refresh: bool) -> CoreResult<()> {
        self.fetcher.fetch_balances(refresh).await
    }
}

impl fmt::Debug for BalanceSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalanceSources")
            .field("prices", &self.prices)
            .field("balances", &self.balances)
            .finish_non_exhaustive()
    }
}

/// One position source per protocol with a position calculator
#[derive(Debug, Clone, Default)]
pub struct PositionSources {
    pub aave_v2: Observable<Option<Position>>,
    pub makerdao: Observable<Option<Position>>,
    pub compound: Observable<Option<Position>>,
    pub liquity: Observable<Option<Position>>,
}

impl PositionSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position source backing `protocol`, `None` for protocols without one
    pub fn source_for(&self, protocol: &StrategyProtocol) -> Option<&Observable<Option<Position>>> {
        match protocol {
            StrategyProtocol::AaveV2 => Some(&self.aave_v2),
            StrategyProtocol::MakerDao => Some(&self.makerdao),
            StrategyProtocol::Compound => Some(&self.compound),
            StrategyProtocol::Liquity => Some(&self.liquity),
            StrategyProtocol::Other(_) => None,
        }
    }

    /// Current position of `protocol`
    pub fn select(&self, protocol: &StrategyProtocol) -> Option<Position> {
        self.source_for(protocol).and_then(Observable::get)
    }

    pub fn all(&self) -> [&Observable<Option<Position>>; 4] {
        [&self.aave_v2, &self.makerdao, &self.compound, &self.liquity]
    }
}

/// Everything a session synchronizes from
#[derive(Debug, Clone)]
pub struct SessionSources {
    pub web3: Web3Sources,
    pub dsa: Observable<Option<DsaHandle>>,
    pub balances: BalanceSources,
    pub positions: PositionSources,
    pub catalog: Arc<TokenCatalog>,
}

impl SessionSources {
    /// Sources starting on `network` with the built-in token catalog
    pub fn new(network: Network, fetcher: Arc<dyn BalanceFetcher>) -> Self {
        Self {
            web3: Web3Sources::new(network),
            dsa: Observable::new(None),
            balances: BalanceSources::new(fetcher),
            positions: PositionSources::new(),
            catalog: Arc::new(TokenCatalog::builtin().clone()),
        }
    }

    pub fn with_catalog(mut self, catalog: TokenCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_mapped_protocol_has_its_own_source() {
        let positions = PositionSources::new();
        positions.aave_v2.set(Some(json!({"protocol": "aave"})));
        positions.makerdao.set(Some(json!({"protocol": "maker"})));
        positions.compound.set(Some(json!({"protocol": "compound"})));
        positions.liquity.set(Some(json!({"protocol": "liquity"})));

        for (protocol, expected) in [
            (StrategyProtocol::AaveV2, "aave"),
            (StrategyProtocol::MakerDao, "maker"),
            (StrategyProtocol::Compound, "compound"),
            (StrategyProtocol::Liquity, "liquity"),
        ] {
            assert_eq!(
                positions.select(&protocol),
                Some(json!({ "protocol": expected }))
            );
        }
    }

    #[test]
    fn test_unmapped_protocol_has_no_position() {
        let positions = PositionSources::new();
        positions.aave_v2.set(Some(json!({"health": 2})));

        let other = StrategyProtocol::Other("uniswapV3".to_string());
        assert!(positions.source_for(&other).is_none());
        assert_eq!(positions.select(&other), None);
    }

    #[test]
    fn test_connect_follows_handle_network() {
        let web3 = Web3Sources::new(Network::Mainnet);
        let account = Address::parse("0x1111111111111111111111111111111111111111").unwrap();

        web3.connect(Web3Handle::new(137, "https://polygon-rpc.com"), account.clone());
        assert_eq!(web3.network.get(), Network::Polygon);
        assert_eq!(web3.account.get(), Some(account));

        web3.disconnect();
        assert!(web3.connection.get().is_none());
        assert!(web3.account.get().is_none());
    }
}
