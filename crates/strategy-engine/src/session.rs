//! Strategy sessions
//!
//! A session binds one strategy instance to its sources and collaborators. It
//! owns the synchronization engine and the submission controller, and is the
//! surface a UI talks to: `inputs`, `pending`, `error` and `submit`.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use strategy_sync_core::{
    DefineStrategy, EventEmitter, InputField, NotificationSink, PanelController, Strategy,
    StrategySchema, TransactionHash,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::notify::{HeadlessPanel, TracingNotifier};
use crate::observable::Observable;
use crate::sources::SessionSources;
use crate::submission::{SubmissionController, SubmissionPhase, SubmissionServices};
use crate::sync::SynchronizationEngine;

/// Builder for [`StrategySession`]
pub struct StrategySessionBuilder {
    strategy: Arc<dyn Strategy>,
    sources: SessionSources,
    config: SessionConfig,
    notifications: Option<Arc<dyn NotificationSink>>,
    panel: Option<Arc<dyn PanelController>>,
    events: Option<Arc<dyn EventEmitter>>,
}

impl StrategySessionBuilder {
    fn new(strategy: Arc<dyn Strategy>, sources: SessionSources) -> Self {
        Self {
            strategy,
            sources,
            config: SessionConfig::default(),
            notifications: None,
            panel: None,
            events: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to [`TracingNotifier`]
    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    /// Defaults to [`HeadlessPanel`]
    pub fn panel(mut self, panel: Arc<dyn PanelController>) -> Self {
        self.panel = Some(panel);
        self
    }

    /// Required: receives the protocol refresh events
    pub fn events(mut self, events: Arc<dyn EventEmitter>) -> Self {
        self.events = Some(events);
        self
    }

    /// Starts synchronization and returns the live session
    pub fn build(self) -> SessionResult<StrategySession> {
        let events = self.events.ok_or_else(|| {
            SessionError::Configuration("an event emitter is required".to_string())
        })?;

        let services = SubmissionServices {
            notifications: self
                .notifications
                .unwrap_or_else(|| Arc::new(TracingNotifier) as Arc<dyn NotificationSink>),
            panel: self
                .panel
                .unwrap_or_else(|| Arc::new(HeadlessPanel) as Arc<dyn PanelController>),
            balances: self.sources.balances.fetcher(),
            events,
        };

        let id = Uuid::new_v4();
        let schema = self.strategy.schema();
        let account = self.sources.web3.account.clone();
        let engine = SynchronizationEngine::start(Arc::clone(&self.strategy), self.sources);
        let controller = SubmissionController::new(
            Arc::clone(&self.strategy),
            account,
            services,
            self.config.overlap_policy,
        );
        let diagnostics = self.config.diagnostics.with_env_override();

        info!(
            session = %id,
            strategy = %schema.name,
            protocol = %schema.protocol,
            overlap = ?controller.policy(),
            "Strategy session started"
        );

        Ok(StrategySession {
            id,
            schema,
            engine,
            controller,
            expose_strategy: diagnostics.expose_strategy,
        })
    }
}

impl fmt::Debug for StrategySessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySessionBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a session, for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub schema: StrategySchema,
    pub inputs: Vec<InputField>,
    pub pending: bool,
    pub error: String,
    pub phase: SubmissionPhase,
    pub subscriptions: usize,
}

/// A strategy kept in sync with live state, ready to submit
pub struct StrategySession {
    id: Uuid,
    schema: StrategySchema,
    engine: SynchronizationEngine,
    controller: SubmissionController,
    expose_strategy: bool,
}

impl StrategySession {
    pub fn builder(strategy: Arc<dyn Strategy>, sources: SessionSources) -> StrategySessionBuilder {
        StrategySessionBuilder::new(strategy, sources)
    }

    /// Builds the strategy from its definition, then starts a builder for it
    pub fn from_definition(
        definition: &dyn DefineStrategy,
        sources: SessionSources,
    ) -> StrategySessionBuilder {
        StrategySessionBuilder::new(definition.build_strategy(), sources)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &StrategySchema {
        &self.schema
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        self.engine.strategy()
    }

    pub fn inputs(&self) -> &Observable<Vec<InputField>> {
        self.engine.inputs()
    }

    pub fn pending(&self) -> &Observable<bool> {
        self.controller.pending()
    }

    pub fn error(&self) -> &Observable<String> {
        self.controller.error()
    }

    pub fn phase(&self) -> &Observable<SubmissionPhase> {
        self.controller.phase()
    }

    pub fn sources(&self) -> &SessionSources {
        self.engine.sources()
    }

    pub async fn submit(&self) -> SessionResult<TransactionHash> {
        self.controller.submit().await
    }

    /// Pushes every source value into the strategy again
    pub fn resync(&self) {
        debug!(session = %self.id, "Resynchronizing strategy");
        self.engine.resync();
    }

    /// Forces a balance reload outside of a submission
    pub async fn refresh_balances(&self) -> SessionResult<()> {
        self.engine
            .sources()
            .balances
            .fetch_balances(true)
            .await
            .map_err(SessionError::BalanceRefresh)
    }

    /// The live strategy, when diagnostics exposure is enabled
    pub fn debug_strategy(&self) -> Option<Arc<dyn Strategy>> {
        self.expose_strategy.then(|| Arc::clone(self.engine.strategy()))
    }

    /// Session state, when diagnostics exposure is enabled
    pub fn debug_snapshot(&self) -> Option<SessionSnapshot> {
        self.expose_strategy.then(|| self.snapshot())
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            schema: self.schema.clone(),
            inputs: self.inputs().get(),
            pending: self.pending().get(),
            error: self.error().get(),
            phase: self.phase().get(),
            subscriptions: self.engine.subscription_count(),
        }
    }

    /// Stops synchronization; the session can still submit
    pub fn detach(&mut self) {
        self.engine.stop();
    }

    pub fn is_attached(&self) -> bool {
        self.engine.subscription_count() > 0
    }
}

impl Drop for StrategySession {
    fn drop(&mut self) {
        debug!(session = %self.id, "Strategy session closed");
    }
}

impl fmt::Debug for StrategySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySession")
            .field("id", &self.id)
            .field("strategy", &self.schema.name)
            .field("engine", &self.engine)
            .field("controller", &self.controller)
            .finish()
    }
}
