//! Identifiers, handles and tables exchanged between the synchronization engine,
//! the strategy and the wallet/market collaborators.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Protocol-specific position snapshot, opaque to this crate
pub type Position = serde_json::Value;

/// Token prices keyed by token address
pub type PriceTable = HashMap<String, Decimal>;

/// Token balances keyed by token address
pub type BalanceTable = HashMap<String, Decimal>;

/// A table with one entry per network
pub type NetworkTable<T> = HashMap<Network, T>;

/// Networks the wallet can be connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Polygon,
    Arbitrum,
    Avalanche,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Mainnet,
        Network::Polygon,
        Network::Arbitrum,
        Network::Avalanche,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Polygon => "polygon",
            Network::Arbitrum => "arbitrum",
            Network::Avalanche => "avalanche",
        }
    }

    /// EVM chain id of the network
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Polygon => 137,
            Network::Arbitrum => 42161,
            Network::Avalanche => 43114,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Network> {
        Network::ALL.into_iter().find(|n| n.chain_id() == chain_id)
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Network::ALL
            .into_iter()
            .find(|n| n.as_str() == lowered)
            .ok_or_else(|| CoreError::UnknownNetwork(s.to_string()))
    }
}

fn is_hex_of_len(value: &str, len: usize) -> bool {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .map(|hex| hex.len() == len && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// 20-byte EVM account address, normalized to lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> CoreResult<Self> {
        let trimmed = value.trim();
        if !is_hex_of_len(trimmed, 40) {
            return Err(CoreError::InvalidAddress(value.to_string()));
        }
        Ok(Address(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Handle returned by a strategy once its transaction has been sent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionHash(String);

impl TransactionHash {
    pub fn parse(value: &str) -> CoreResult<Self> {
        let trimmed = value.trim();
        if !is_hex_of_len(trimmed, 64) {
            return Err(CoreError::InvalidTransactionHash(value.to_string()));
        }
        Ok(TransactionHash(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TransactionHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionHash::parse(s)
    }
}

impl TryFrom<String> for TransactionHash {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TransactionHash::parse(&value)
    }
}

impl From<TransactionHash> for String {
    fn from(value: TransactionHash) -> Self {
        value.0
    }
}

/// Live web3 connection as seen by a strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Web3Handle {
    /// Chain the provider is connected to
    pub chain_id: u64,
    /// RPC endpoint backing the provider
    pub rpc_url: String,
    /// Wallet/provider identification, if reported
    pub client: Option<String>,
}

impl Web3Handle {
    pub fn new(chain_id: u64, rpc_url: impl Into<String>) -> Self {
        Self {
            chain_id,
            rpc_url: rpc_url.into(),
            client: None,
        }
    }

    pub fn network(&self) -> Option<Network> {
        Network::from_chain_id(self.chain_id)
    }
}

/// The user's smart account (DSA) instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsaHandle {
    /// Account id assigned by the account registry
    pub id: u64,
    /// On-chain address of the account
    pub address: Address,
    /// Account implementation version
    pub version: u8,
}

/// Lending/borrowing protocol a strategy targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrategyProtocol {
    AaveV2,
    MakerDao,
    Compound,
    Liquity,
    /// Any protocol this crate has no position source for
    Other(String),
}

impl StrategyProtocol {
    pub fn as_str(&self) -> &str {
        match self {
            StrategyProtocol::AaveV2 => "aaveV2",
            StrategyProtocol::MakerDao => "maker",
            StrategyProtocol::Compound => "compound",
            StrategyProtocol::Liquity => "liquity",
            StrategyProtocol::Other(name) => name,
        }
    }

    /// Name of the bus event announcing that this protocol's data changed on chain
    pub fn refresh_event(&self) -> String {
        format!("protocol::{}::refresh", self.as_str())
    }
}

impl fmt::Display for StrategyProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for StrategyProtocol {
    fn from(value: String) -> Self {
        match value.as_str() {
            "aaveV2" => StrategyProtocol::AaveV2,
            "maker" => StrategyProtocol::MakerDao,
            "compound" => StrategyProtocol::Compound,
            "liquity" => StrategyProtocol::Liquity,
            _ => StrategyProtocol::Other(value),
        }
    }
}

impl From<&str> for StrategyProtocol {
    fn from(value: &str) -> Self {
        StrategyProtocol::from(value.to_string())
    }
}

impl From<StrategyProtocol> for String {
    fn from(value: StrategyProtocol) -> Self {
        value.as_str().to_string()
    }
}

/// Static metadata of a strategy definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySchema {
    pub name: String,
    pub description: String,
    pub protocol: StrategyProtocol,
    #[serde(default)]
    pub author: Option<String>,
}

/// Kind of field a strategy asks the user to fill in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    Heading,
    InputWithToken,
    InputNumeric,
    Text,
}

/// One entry of a strategy's input form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub key: String,
    pub label: String,
    pub kind: InputKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl InputField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: InputKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            value: String::new(),
            placeholder: None,
            error: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

/// Smart-account and wallet balances, each table keyed by network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub dsa: NetworkTable<BalanceTable>,
    pub user: NetworkTable<BalanceTable>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parsing() {
        assert_eq!("Polygon".parse::<Network>().unwrap(), Network::Polygon);
        assert_eq!(Network::Mainnet.to_string(), "mainnet");
        assert!("fantom".parse::<Network>().is_err());
        assert_eq!(Network::from_chain_id(137), Some(Network::Polygon));
    }

    #[test]
    fn test_address_validation() {
        let address = Address::parse("0x6B175474E89094C44Da98b954EedeAC495271d0F").unwrap();
        assert_eq!(address.as_str(), "0x6b175474e89094c44da98b954eedeac495271d0f");

        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("6B175474E89094C44Da98b954EedeAC495271d0F").is_err());
        assert!(Address::parse("0xZZ175474E89094C44Da98b954EedeAC495271d0F").is_err());
    }

    #[test]
    fn test_transaction_hash_validation() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert!(TransactionHash::parse(&hash).is_ok());
        assert!(TransactionHash::parse("0xabc").is_err());
    }

    #[test]
    fn test_protocol_names_and_refresh_event() {
        assert_eq!(StrategyProtocol::AaveV2.refresh_event(), "protocol::aaveV2::refresh");
        assert_eq!(StrategyProtocol::from("maker"), StrategyProtocol::MakerDao);
        assert_eq!(
            StrategyProtocol::from("uniswapV3"),
            StrategyProtocol::Other("uniswapV3".to_string())
        );

        let json = serde_json::to_string(&StrategyProtocol::Liquity).unwrap();
        assert_eq!(json, "\"liquity\"");
    }

    #[test]
    fn test_schema_deserialization() {
        let schema: StrategySchema = serde_json::from_str(
            r#"{"name":"Deposit & Borrow","description":"Deposit collateral and borrow","protocol":"compound"}"#,
        )
        .unwrap();
        assert_eq!(schema.protocol, StrategyProtocol::Compound);
        assert!(schema.author.is_none());
    }
}
