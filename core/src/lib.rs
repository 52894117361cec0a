//! # Strategy Sync Core
//!
//! Shared vocabulary for binding DeFi strategies to live wallet and market state:
//! network and account identifiers, the props bag a strategy consumes, the token
//! catalog, and the contracts of every external collaborator (the strategy itself,
//! notification sink, balance fetcher, event emitter, UI panel).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations)]

pub mod collaborators;
pub mod error;
pub mod props;
pub mod strategy;
pub mod tokens;
pub mod types;

pub use collaborators::{BalanceFetcher, EventEmitter, NotificationSink, PanelController};
pub use error::{CoreError, CoreResult, StrategyError};
pub use props::{AmountConverter, PropKey, PropValue, Props, TokenLookup};
pub use strategy::{DefineStrategy, ReceiptHook, Strategy, SubmitRequest, UpdateCallback};
pub use tokens::{convert_token_amount_to_wei, NetworkTokens, Token, TokenCatalog};
pub use types::{
    Address, BalanceTable, Balances, DsaHandle, InputField, InputKind, Network, NetworkTable,
    Position, PriceTable, StrategyProtocol, StrategySchema, TransactionHash, Web3Handle,
};
