//! Synchronization Engine
//!
//! Keeps a strategy's live props current. One watcher per source pushes that
//! source's props into the strategy immediately and again on every change; the
//! position effect listens to all four position sources at once. Watchers are
//! independent and carry only the keys they own, so the strategy sees partial
//! updates in no particular order.

use std::fmt;
use std::sync::Arc;

use strategy_sync_core::{
    convert_token_amount_to_wei, AmountConverter, Balances, DsaHandle, InputField, Network,
    NetworkTable, PriceTable, PropKey, PropValue, Props, Strategy, TokenCatalog, TokenLookup,
    Web3Handle,
};
use tracing::{debug, warn};

use crate::observable::{Observable, SubscriptionSet};
use crate::sources::{PositionSources, SessionSources};

/// Helper closures handed to the strategy with every position update.
///
/// Built once per engine so repeated updates carry the same function values.
#[derive(Clone)]
struct TokenHelpers {
    convert: AmountConverter,
    lookup: TokenLookup,
}

impl TokenHelpers {
    fn new(catalog: Arc<TokenCatalog>, network: Observable<Network>) -> Self {
        let convert: AmountConverter = Arc::new(convert_token_amount_to_wei);
        let lookup: TokenLookup =
            Arc::new(move |key: &str| catalog.get_token_by_key(network.get(), key).cloned());
        Self { convert, lookup }
    }
}

/// Pushes source values into one strategy for as long as it lives
pub struct SynchronizationEngine {
    strategy: Arc<dyn Strategy>,
    sources: SessionSources,
    helpers: TokenHelpers,
    inputs: Observable<Vec<InputField>>,
    subscriptions: SubscriptionSet,
}

impl SynchronizationEngine {
    /// Installs every watcher and runs each one once
    pub fn start(strategy: Arc<dyn Strategy>, sources: SessionSources) -> Self {
        let name = strategy.schema().name;
        debug!(strategy = %name, "Starting synchronization");

        let helpers = TokenHelpers::new(
            Arc::clone(&sources.catalog),
            sources.web3.network.clone(),
        );
        let inputs = Observable::new(strategy.inputs());
        // must precede the first pushes
        let weak_strategy = Arc::downgrade(&strategy);
        let weak_inputs = inputs.downgrade();
        strategy.on_updated(Box::new(move || {
            let (Some(strategy), Some(inputs)) = (weak_strategy.upgrade(), weak_inputs.upgrade())
            else {
                return;
            };
            inputs.set(strategy.inputs());
        }));

        let mut subscriptions = SubscriptionSet::new();

        {
            let strategy = Arc::clone(&strategy);
            subscriptions.push(
                sources
                    .web3
                    .connection
                    .watch(move |handle| push_web3(strategy.as_ref(), handle)),
            );
        }

        {
            let strategy = Arc::clone(&strategy);
            subscriptions.push(
                sources
                    .dsa
                    .watch(move |handle| push_dsa(strategy.as_ref(), handle)),
            );
        }

        {
            let strategy = Arc::clone(&strategy);
            let network = sources.web3.network.clone();
            subscriptions.push(
                sources
                    .balances
                    .prices
                    .watch(move |prices| push_prices(strategy.as_ref(), prices, network.get())),
            );
        }

        {
            let strategy = Arc::clone(&strategy);
            let network = sources.web3.network.clone();
            subscriptions.push(sources.balances.balances.watch(move |balances| {
                push_balances(strategy.as_ref(), balances, network.get())
            }));
        }

        {
            let strategy = Arc::clone(&strategy);
            let catalog = Arc::clone(&sources.catalog);
            subscriptions.push(
                sources
                    .web3
                    .network
                    .watch(move |network| push_tokens(strategy.as_ref(), &catalog, *network)),
            );
        }

        {
            let effect = {
                let strategy = Arc::clone(&strategy);
                let positions = sources.positions.clone();
                let helpers = helpers.clone();
                Arc::new(move || push_position(strategy.as_ref(), &positions, &helpers))
            };
            for source in sources.positions.all() {
                let effect = Arc::clone(&effect);
                subscriptions.push(source.subscribe(move |_| effect()));
            }
            effect();
        }

        debug!(
            strategy = %name,
            subscriptions = subscriptions.len(),
            "Synchronization running"
        );

        Self {
            strategy,
            sources,
            helpers,
            inputs,
            subscriptions,
        }
    }

    /// Re-runs every watcher against the current source values
    pub fn resync(&self) {
        let strategy = self.strategy.as_ref();
        let network = self.sources.web3.network.get();

        push_web3(strategy, &self.sources.web3.connection.get());
        push_dsa(strategy, &self.sources.dsa.get());
        push_prices(strategy, &self.sources.balances.prices.get(), network);
        push_balances(strategy, &self.sources.balances.balances.get(), network);
        push_tokens(strategy, &self.sources.catalog, network);
        push_position(strategy, &self.sources.positions, &self.helpers);
        self.inputs.set(strategy.inputs());
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    /// Mirror of the strategy's current input set
    pub fn inputs(&self) -> &Observable<Vec<InputField>> {
        &self.inputs
    }

    pub fn sources(&self) -> &SessionSources {
        &self.sources
    }

    /// Number of live source subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Stops every watcher
    pub fn stop(&mut self) {
        if !self.subscriptions.is_empty() {
            debug!(subscriptions = self.subscriptions.len(), "Stopping synchronization");
            self.subscriptions.clear();
        }
    }
}

impl fmt::Debug for SynchronizationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizationEngine")
            .field("subscriptions", &self.subscriptions.len())
            .field("inputs", &self.inputs.with(Vec::len))
            .finish_non_exhaustive()
    }
}

fn push_web3(strategy: &dyn Strategy, handle: &Option<Web3Handle>) {
    debug!(chain_id = ?handle.as_ref().map(|h| h.chain_id), "Pushing web3");
    strategy.set_web3(handle.clone());
}

fn push_dsa(strategy: &dyn Strategy, handle: &Option<DsaHandle>) {
    debug!(dsa = ?handle.as_ref().map(|h| h.id), "Pushing smart account");
    strategy.set_dsa(handle.clone());
}

fn push_prices(strategy: &dyn Strategy, prices: &NetworkTable<PriceTable>, network: Network) {
    let scoped = prices.get(&network).cloned();
    debug!(%network, tokens = scoped.as_ref().map_or(0, |t| t.len()), "Pushing prices");
    strategy.set_props(Props::new().with(PropKey::Prices, PropValue::Prices(scoped)));
}

fn push_balances(strategy: &dyn Strategy, balances: &Balances, network: Network) {
    debug!(%network, "Pushing balances");
    strategy.set_props(
        Props::new()
            .with(
                PropKey::DsaBalances,
                PropValue::Balances(balances.dsa.get(&network).cloned()),
            )
            .with(
                PropKey::UserBalances,
                PropValue::Balances(balances.user.get(&network).cloned()),
            ),
    );
}

fn push_tokens(strategy: &dyn Strategy, catalog: &TokenCatalog, network: Network) {
    let (tokens, token_keys) = match catalog.get(network) {
        Some(entry) => (entry.all_tokens.clone(), entry.token_keys.clone()),
        None => {
            warn!(%network, "No token catalog for network, sending empty token list");
            (Vec::new(), Vec::new())
        }
    };
    debug!(%network, tokens = tokens.len(), "Pushing tokens");
    strategy.set_props(
        Props::new()
            .with(PropKey::Tokens, PropValue::Tokens(tokens))
            .with(PropKey::TokenKeys, PropValue::TokenKeys(token_keys)),
    );
}

fn push_position(strategy: &dyn Strategy, positions: &PositionSources, helpers: &TokenHelpers) {
    let protocol = strategy.schema().protocol;
    let position = positions.select(&protocol);
    debug!(%protocol, loaded = position.is_some(), "Pushing position");
    strategy.set_props(
        Props::new()
            .with(
                PropKey::ConvertTokenAmountToWei,
                PropValue::AmountConverter(Arc::clone(&helpers.convert)),
            )
            .with(
                PropKey::GetTokenByKey,
                PropValue::TokenLookup(Arc::clone(&helpers.lookup)),
            )
            .with(PropKey::Position, PropValue::Position(position)),
    );
}
