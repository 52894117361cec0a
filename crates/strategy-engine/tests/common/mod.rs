//! Recording fakes shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use strategy_engine::{SessionSources, StrategySession};
use strategy_sync_core::{
    Address, BalanceFetcher, CoreError, CoreResult, DsaHandle, InputField, InputKind, Network,
    NotificationSink, PanelController, PriceTable, PropKey, PropValue, Props, ReceiptHook,
    Strategy, StrategyError, StrategyProtocol, StrategySchema, SubmitRequest, TransactionHash,
    UpdateCallback, Web3Handle,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Ordered record of every collaborator call
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn tx_hash(byte: &str) -> TransactionHash {
    TransactionHash::parse(&format!("0x{}", byte.repeat(32))).unwrap()
}

pub fn account() -> Address {
    Address::parse("0x1111111111111111111111111111111111111111").unwrap()
}

pub fn dsa() -> DsaHandle {
    DsaHandle {
        id: 42,
        address: Address::parse("0x2222222222222222222222222222222222222222").unwrap(),
        version: 2,
    }
}

pub fn mainnet_web3() -> Web3Handle {
    Web3Handle::new(1, "https://rpc.example/mainnet")
}

pub fn prices(dai: rust_decimal::Decimal) -> PriceTable {
    let mut table = PriceTable::new();
    table.insert("0x6b175474e89094c44da98b954eedeac495271d0f".to_string(), dai);
    table.insert("0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee".to_string(), dec!(1800));
    table
}

/// How the next `submit` call behaves
pub struct Scripted {
    result: Result<TransactionHash, String>,
    release: Option<oneshot::Receiver<()>>,
    fire_hook_immediately: bool,
}

impl Scripted {
    pub fn ok(tx: TransactionHash) -> Self {
        Self {
            result: Ok(tx),
            release: None,
            fire_hook_immediately: false,
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            release: None,
            fire_hook_immediately: false,
        }
    }

    /// Waits for `release` before answering
    pub fn gated(mut self, release: oneshot::Receiver<()>) -> Self {
        self.release = Some(release);
        self
    }

    /// Spawns the receipt hook before `submit` returns
    pub fn fire_hook_immediately(mut self) -> Self {
        self.fire_hook_immediately = true;
        self
    }
}

#[derive(Default)]
struct StrategyState {
    props: Props,
    prop_updates: Vec<Vec<PropKey>>,
    web3: Option<Web3Handle>,
    web3_calls: usize,
    dsa: Option<DsaHandle>,
    dsa_calls: usize,
    inputs: Vec<InputField>,
    submitted_from: Vec<Option<Address>>,
}

/// Strategy that records everything pushed into it
pub struct RecordingStrategy {
    schema: StrategySchema,
    state: Mutex<StrategyState>,
    callbacks: Mutex<Vec<UpdateCallback>>,
    scripts: Mutex<VecDeque<Scripted>>,
    hooks: Mutex<Vec<ReceiptHook>>,
    spawned: Mutex<Vec<JoinHandle<CoreResult<()>>>>,
    recompute_on_props: AtomicBool,
}

impl RecordingStrategy {
    pub fn new(protocol: StrategyProtocol) -> Arc<Self> {
        Arc::new(Self {
            schema: StrategySchema {
                name: "Deposit & Borrow".to_string(),
                description: "Deposit collateral and borrow against it".to_string(),
                protocol,
                author: None,
            },
            state: Mutex::new(StrategyState {
                inputs: vec![
                    InputField::new("deposit", "Collateral", InputKind::InputWithToken),
                    InputField::new("borrow", "Debt", InputKind::InputWithToken),
                ],
                ..StrategyState::default()
            }),
            callbacks: Mutex::new(Vec::new()),
            scripts: Mutex::new(VecDeque::new()),
            hooks: Mutex::new(Vec::new()),
            spawned: Mutex::new(Vec::new()),
            recompute_on_props: AtomicBool::new(false),
        })
    }

    pub fn script(&self, scripted: Scripted) {
        self.scripts.lock().push_back(scripted);
    }

    pub fn prop(&self, key: PropKey) -> Option<PropValue> {
        self.state.lock().props.get(key).cloned()
    }

    pub fn props(&self) -> Props {
        self.state.lock().props.clone()
    }

    pub fn prop_updates(&self) -> Vec<Vec<PropKey>> {
        self.state.lock().prop_updates.clone()
    }

    pub fn web3(&self) -> (Option<Web3Handle>, usize) {
        let state = self.state.lock();
        (state.web3.clone(), state.web3_calls)
    }

    pub fn dsa(&self) -> (Option<DsaHandle>, usize) {
        let state = self.state.lock();
        (state.dsa.clone(), state.dsa_calls)
    }

    pub fn submitted_from(&self) -> Vec<Option<Address>> {
        self.state.lock().submitted_from.clone()
    }

    /// Replaces the input set and notifies listeners like a recomputation would
    pub fn replace_inputs(&self, inputs: Vec<InputField>) {
        self.state.lock().inputs = inputs;
        self.notify_updated();
    }

    /// Rebuilds the form from the received props on every `set_props`
    pub fn recompute_inputs_on_props(&self) {
        self.recompute_on_props.store(true, Ordering::SeqCst);
    }

    fn notify_updated(&self) {
        let callbacks = self.callbacks.lock();
        for callback in callbacks.iter() {
            callback();
        }
    }

    pub fn take_hook(&self) -> ReceiptHook {
        self.hooks.lock().remove(0)
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    pub async fn join_spawned_hooks(&self) -> Vec<CoreResult<()>> {
        let handles: Vec<_> = self.spawned.lock().drain(..).collect();
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }
}

#[async_trait]
impl Strategy for RecordingStrategy {
    fn schema(&self) -> StrategySchema {
        self.schema.clone()
    }

    fn inputs(&self) -> Vec<InputField> {
        self.state.lock().inputs.clone()
    }

    fn on_updated(&self, callback: UpdateCallback) {
        self.callbacks.lock().push(callback);
    }

    async fn submit(&self, request: SubmitRequest) -> Result<TransactionHash, StrategyError> {
        self.state.lock().submitted_from.push(request.from.clone());
        let scripted = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Scripted::ok(tx_hash("ab")));

        if scripted.fire_hook_immediately {
            let handle = tokio::spawn(request.on_receipt.fire());
            self.spawned.lock().push(handle);
        } else {
            self.hooks.lock().push(request.on_receipt);
        }

        if let Some(release) = scripted.release {
            let _ = release.await;
        }

        scripted.result.map_err(StrategyError::new)
    }

    fn set_props(&self, props: Props) {
        {
            let mut state = self.state.lock();
            state.prop_updates.push(props.keys().collect());
            state.props.merge(props);
            if !self.recompute_on_props.load(Ordering::SeqCst) {
                return;
            }
            let tokens = match state.props.get(PropKey::TokenKeys) {
                Some(PropValue::TokenKeys(keys)) => keys.len(),
                _ => 0,
            };
            state.inputs = vec![
                InputField::new(
                    "deposit",
                    format!("Collateral ({tokens} tokens)"),
                    InputKind::InputWithToken,
                ),
                InputField::new("borrow", "Debt", InputKind::InputWithToken),
            ];
        }
        self.notify_updated();
    }

    fn set_web3(&self, web3: Option<Web3Handle>) {
        let mut state = self.state.lock();
        state.web3 = web3;
        state.web3_calls += 1;
    }

    fn set_dsa(&self, dsa: Option<DsaHandle>) {
        let mut state = self.state.lock();
        state.dsa = dsa;
        state.dsa_calls += 1;
    }
}

pub struct RecordingNotifier(pub Journal);

impl NotificationSink for RecordingNotifier {
    fn show_pending_transaction(&self, tx: &TransactionHash) {
        self.0.lock().push(format!("pending:{tx}"));
    }

    fn show_confirmed_transaction(&self, tx: &TransactionHash) {
        self.0.lock().push(format!("confirmed:{tx}"));
    }
}

pub struct RecordingPanel(pub Journal);

impl PanelController for RecordingPanel {
    fn close(&self) {
        self.0.lock().push("close".to_string());
    }
}

pub struct RecordingFetcher {
    journal: Journal,
    fail: bool,
}

impl RecordingFetcher {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            journal,
            fail: false,
        })
    }

    pub fn failing(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            journal,
            fail: true,
        })
    }
}

#[async_trait]
impl BalanceFetcher for RecordingFetcher {
    async fn fetch_balances(&self, refresh: bool) -> CoreResult<()> {
        self.journal.lock().push(format!("fetch:{refresh}"));
        if self.fail {
            return Err(CoreError::collaborator("balances", "rpc unavailable"));
        }
        Ok(())
    }
}

/// A session over a recording strategy with every collaborator recorded
pub struct Harness {
    pub strategy: Arc<RecordingStrategy>,
    pub sources: SessionSources,
    pub journal: Journal,
    pub bus: event_bus::EventBus,
}

impl Harness {
    pub fn new(protocol: StrategyProtocol) -> Self {
        let journal = journal();
        let fetcher = RecordingFetcher::new(journal.clone());
        Self::with_fetcher(protocol, journal, fetcher)
    }

    pub fn with_fetcher(
        protocol: StrategyProtocol,
        journal: Journal,
        fetcher: Arc<RecordingFetcher>,
    ) -> Self {
        Self {
            strategy: RecordingStrategy::new(protocol),
            sources: SessionSources::new(Network::Mainnet, fetcher),
            journal,
            bus: event_bus::EventBus::default(),
        }
    }

    pub fn session(&self) -> StrategySession {
        self.session_with(strategy_engine::SessionConfig::default())
    }

    pub fn session_with(&self, config: strategy_engine::SessionConfig) -> StrategySession {
        StrategySession::builder(self.strategy.clone(), self.sources.clone())
            .config(config)
            .notifications(Arc::new(RecordingNotifier(self.journal.clone())))
            .panel(Arc::new(RecordingPanel(self.journal.clone())))
            .events(Arc::new(self.bus.clone()))
            .build()
            .unwrap()
    }

    pub fn entries(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}
