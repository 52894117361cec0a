//! Simulated strategy session
//!
//! A self-contained walk through the whole lifecycle: a wallet connects, market
//! and position data arrive, the strategy submits twice (one success, one
//! failure) and the network changes. The strategy and the balance service are
//! simulations; everything else is the real engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use event_bus::{BusEvent, EventBus, EventBusError};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use strategy_engine::{Observable, SessionSources, StrategySession};
use strategy_sync_core::{
    Address, BalanceFetcher, Balances, CoreResult, DefineStrategy, DsaHandle, InputField,
    InputKind, Network, PropKey, PropValue, Props, Strategy, StrategyError, StrategyProtocol,
    StrategySchema, SubmitRequest, TransactionHash, UpdateCallback, Web3Handle,
};
use tracing::{error, info, warn};

use crate::config::AppConfig;

const DEMO_ACCOUNT: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";
const DEMO_DSA: &str = "0x3b5b7f3e0fe8a1bd2c8f4a3e5f8d9a7c6b5e4d3c";

/// Strategy definition used by the demo
#[derive(Debug, Clone)]
pub struct DemoDefinition {
    /// Delay between sending and confirming a transaction
    pub confirm_delay: Duration,
}

impl DefineStrategy for DemoDefinition {
    fn build_strategy(&self) -> Arc<dyn Strategy> {
        Arc::new(DemoStrategy::new(self.confirm_delay))
    }
}

#[derive(Default)]
struct DemoState {
    props: Props,
    web3: Option<Web3Handle>,
    dsa: Option<DsaHandle>,
    inputs: Vec<InputField>,
    fail_next: Option<String>,
}

/// Deposit-and-borrow strategy that keeps its form in step with its props
pub struct DemoStrategy {
    confirm_delay: Duration,
    state: Mutex<DemoState>,
    callbacks: Mutex<Vec<UpdateCallback>>,
    nonce: AtomicU64,
}

impl DemoStrategy {
    fn new(confirm_delay: Duration) -> Self {
        let state = DemoState {
            inputs: form(None, None),
            ..DemoState::default()
        };
        Self {
            confirm_delay,
            state: Mutex::new(state),
            callbacks: Mutex::new(Vec::new()),
            nonce: AtomicU64::new(0),
        }
    }

    /// Makes the next submission fail with `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().fail_next = Some(message.into());
    }

    fn recompute(&self) {
        {
            let mut state = self.state.lock();
            let symbol = state
                .props
                .get(PropKey::GetTokenByKey)
                .and_then(PropValue::as_token_lookup)
                .and_then(|lookup| lookup("eth"))
                .map(|token| token.symbol);
            let collateral = state
                .props
                .get(PropKey::DsaBalances)
                .and_then(PropValue::as_table)
                .map(|table| table.values().copied().sum::<Decimal>());
            state.inputs = form(symbol, collateral);
        }

        for callback in self.callbacks.lock().iter() {
            callback();
        }
    }
}

fn form(symbol: Option<String>, collateral: Option<Decimal>) -> Vec<InputField> {
    let mut deposit = InputField::new(
        "deposit",
        format!("Deposit {}", symbol.as_deref().unwrap_or("collateral")),
        InputKind::InputWithToken,
    )
    .with_value("1.5");
    deposit.placeholder = collateral.map(|amount| format!("Available: {amount}"));

    vec![
        InputField::new("heading", "Deposit & Borrow", InputKind::Heading),
        deposit,
        InputField::new("borrow", "Borrow DAI", InputKind::InputWithToken).with_value("1000"),
    ]
}

impl std::fmt::Debug for DemoStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoStrategy")
            .field("confirm_delay", &self.confirm_delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Strategy for DemoStrategy {
    fn schema(&self) -> StrategySchema {
        StrategySchema {
            name: "Aave v2 Deposit & Borrow".to_string(),
            description: "Deposit collateral and borrow DAI in one transaction".to_string(),
            protocol: StrategyProtocol::AaveV2,
            author: Some("strategy-sync".to_string()),
        }
    }

    fn inputs(&self) -> Vec<InputField> {
        self.state.lock().inputs.clone()
    }

    fn on_updated(&self, callback: UpdateCallback) {
        self.callbacks.lock().push(callback);
    }

    async fn submit(&self, request: SubmitRequest) -> Result<TransactionHash, StrategyError> {
        let (fail, connected, dsa, amount) = {
            let mut state = self.state.lock();
            let amount = state
                .inputs
                .iter()
                .find(|input| input.key == "deposit")
                .and_then(|input| input.value.parse::<Decimal>().ok())
                .unwrap_or_default();
            let dsa = state.dsa.as_ref().map(|handle| handle.id);
            (state.fail_next.take(), state.web3.is_some(), dsa, amount)
        };

        if let Some(message) = fail {
            return Err(StrategyError::new(message));
        }
        if !connected || request.from.is_none() {
            return Err(StrategyError::new("Connect your wallet first"));
        }

        let convert = self
            .state
            .lock()
            .props
            .get(PropKey::ConvertTokenAmountToWei)
            .and_then(PropValue::as_amount_converter)
            .cloned()
            .ok_or_else(|| StrategyError::new("Strategy is not ready yet"))?;
        let wei = convert(amount, 18)?;

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let tx = TransactionHash::parse(&format!("0x{:064x}", 0xdead_0000_u64 + nonce))?;
        info!(tx = %tx, %wei, ?dsa, "Simulated transaction broadcast");

        let delay = self.confirm_delay;
        let hook = request.on_receipt;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = hook.fire().await {
                error!(error = %err, "Receipt side effects failed");
            }
        });

        Ok(tx)
    }

    fn set_props(&self, props: Props) {
        self.state.lock().props.merge(props);
        self.recompute();
    }

    fn set_web3(&self, web3: Option<Web3Handle>) {
        self.state.lock().web3 = web3;
    }

    fn set_dsa(&self, dsa: Option<DsaHandle>) {
        self.state.lock().dsa = dsa;
    }
}

/// Balance service that grows the smart-account balance on every refresh
#[derive(Debug, Clone)]
pub struct SimulatedBalances {
    balances: Observable<Balances>,
    network: Observable<Network>,
}

impl SimulatedBalances {
    /// Starts from empty tables
    pub fn new(network: Observable<Network>) -> Self {
        Self {
            balances: Observable::default(),
            network,
        }
    }

    /// Table this service publishes into
    pub fn balances(&self) -> Observable<Balances> {
        self.balances.clone()
    }
}

#[async_trait]
impl BalanceFetcher for SimulatedBalances {
    async fn fetch_balances(&self, refresh: bool) -> CoreResult<()> {
        let network = self.network.get();
        info!(%network, refresh, "Fetching balances");
        self.balances.update(|balances| {
            let table = balances.dsa.entry(network).or_default();
            *table.entry("eth".to_string()).or_default() += Decimal::ONE;
        });
        Ok(())
    }
}

/// What happened during a demo run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DemoReport {
    /// Transactions that went out
    pub transactions: Vec<TransactionHash>,
    /// Failure messages surfaced in the session's error cell
    pub errors: Vec<String>,
    /// Refresh events observed on the bus
    pub refresh_events: Vec<String>,
    /// Input form at the end of the run
    pub inputs: Vec<InputField>,
    /// Diagnostics snapshot, when enabled
    pub snapshot: Option<serde_json::Value>,
}

/// Runs the scripted session against simulated collaborators
pub async fn run_demo(config: &AppConfig, confirm_delay: Duration) -> Result<DemoReport> {
    let bus = EventBus::builder()
        .subscriber_capacity(config.event_bus.subscriber_capacity)
        .build();
    let refreshes = bus.subscribe("protocol::aaveV2::refresh");

    let network = Observable::new(config.network);
    let fetcher = Arc::new(SimulatedBalances::new(network.clone()));
    let mut sources = SessionSources::new(config.network, fetcher.clone());
    sources.web3.network = network;
    sources.balances.balances = fetcher.balances();

    let strategy = Arc::new(DemoStrategy::new(confirm_delay));
    let session = StrategySession::builder(strategy.clone(), sources.clone())
        .config(config.session_config())
        .events(Arc::new(bus.clone()))
        .build()?;

    let _watchers = (
        session
            .pending()
            .subscribe(|pending| info!(pending, "Pending changed")),
        session.error().subscribe(|error: &String| {
            if !error.is_empty() {
                warn!(%error, "Submission error");
            }
        }),
        session
            .inputs()
            .subscribe(|inputs: &Vec<InputField>| info!(fields = inputs.len(), "Inputs updated")),
    );

    let account = Address::parse(DEMO_ACCOUNT)?;
    let chain_id = config.network.chain_id();
    sources
        .web3
        .connect(Web3Handle::new(chain_id, "http://localhost:8545"), account);
    sources.dsa.set(Some(DsaHandle {
        id: 1024,
        address: Address::parse(DEMO_DSA)?,
        version: 2,
    }));
    sources.balances.prices.update(|prices| {
        for network in [Network::Mainnet, Network::Polygon] {
            let table = prices.entry(network).or_default();
            table.insert("eth".to_string(), Decimal::new(1850, 0));
            table.insert("dai".to_string(), Decimal::ONE);
        }
    });
    sources
        .positions
        .aave_v2
        .set(Some(json!({ "healthFactor": "2.41", "totalSupplyInEth": "3.2" })));

    let mut report = DemoReport::default();

    let tx = session.submit().await?;
    report.transactions.push(tx);
    report
        .refresh_events
        .push(wait_for_refresh(&refreshes, confirm_delay).await?.name);

    sources.web3.network.set(Network::Polygon);
    sources.balances.prices.update(|_| {});

    strategy.fail_next("User denied transaction signature");
    match session.submit().await {
        Ok(tx) => bail!("expected the second submission to fail, got {tx}"),
        Err(err) => info!(error = %err, "Second submission failed as scripted"),
    }
    report.errors.push(session.error().get());

    report.inputs = session.inputs().get();
    report.snapshot = session
        .debug_snapshot()
        .map(serde_json::to_value)
        .transpose()?;
    Ok(report)
}

async fn wait_for_refresh(
    receiver: &event_bus::EventReceiver<BusEvent>,
    confirm_delay: Duration,
) -> Result<BusEvent> {
    let timeout = confirm_delay + Duration::from_secs(5);
    match receiver.recv_timeout_async(timeout).await {
        Err(EventBusError::RecvTimeout) => bail!("timed out waiting for the confirmation refresh"),
        result => result.context("event bus closed"),
    }
}
