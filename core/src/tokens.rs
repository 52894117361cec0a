//! Token metadata per network and the amount conversion helper.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::types::{Address, Network};
use tracing::error;

/// Address used for a network's native asset
pub const NATIVE_TOKEN_ADDRESS: &str = "0xEeeeeEeeeEeEeEeEeEeeEEEeeeeEeeeeeeeeEEeE";

/// Token metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub key: String,
    pub symbol: String,
    pub name: String,
    pub address: Address,
    pub decimals: u32,
    #[serde(default)]
    pub is_stablecoin: bool,
}

/// Tokens available on one network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTokens {
    pub all_tokens: Vec<Token>,
    pub token_keys: Vec<String>,
}

impl NetworkTokens {
    pub fn new(all_tokens: Vec<Token>) -> Self {
        let token_keys = all_tokens.iter().map(|t| t.key.clone()).collect();
        Self {
            all_tokens,
            token_keys,
        }
    }

    pub fn get_by_key(&self, key: &str) -> Option<&Token> {
        self.all_tokens
            .iter()
            .find(|t| t.key.eq_ignore_ascii_case(key))
    }

    pub fn get_by_address(&self, address: &Address) -> Option<&Token> {
        self.all_tokens.iter().find(|t| &t.address == address)
    }
}

/// Static token catalog, one entry per network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCatalog {
    networks: HashMap<Network, NetworkTokens>,
}

impl TokenCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, network: Network, tokens: NetworkTokens) -> Self {
        self.networks.insert(network, tokens);
        self
    }

    pub fn insert(&mut self, network: Network, tokens: NetworkTokens) {
        self.networks.insert(network, tokens);
    }

    pub fn get(&self, network: Network) -> Option<&NetworkTokens> {
        self.networks.get(&network)
    }

    pub fn get_token_by_key(&self, network: Network, key: &str) -> Option<&Token> {
        self.get(network).and_then(|tokens| tokens.get_by_key(key))
    }

    pub fn networks(&self) -> impl Iterator<Item = Network> + '_ {
        self.networks.keys().copied()
    }

    /// Catalog shipped with the crate (mainnet and polygon)
    pub fn builtin() -> &'static TokenCatalog {
        &BUILTIN_CATALOG
    }
}

/// Built-in catalog rows: network, key, symbol, name, address, decimals, stablecoin
const BUILTIN_TOKENS: &[(Network, &str, &str, &str, &str, u32, bool)] = &[
    (Network::Mainnet, "eth", "ETH", "Ethereum", NATIVE_TOKEN_ADDRESS, 18, false),
    (Network::Mainnet, "dai", "DAI", "DAI Stable", "0x6B175474E89094C44Da98b954EedeAC495271d0F", 18, true),
    (Network::Mainnet, "usdc", "USDC", "USD Coin", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6, true),
    (Network::Mainnet, "usdt", "USDT", "Tether USD", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6, true),
    (Network::Mainnet, "wbtc", "WBTC", "Wrapped BTC", "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", 8, false),
    (Network::Mainnet, "lusd", "LUSD", "LUSD Stablecoin", "0x5f98805A4E8be255a32880FDeC7F6728C6568bA0", 18, true),
    (Network::Polygon, "matic", "MATIC", "Matic Token", NATIVE_TOKEN_ADDRESS, 18, false),
    (Network::Polygon, "eth", "ETH", "Ethereum", "0x7ceB23fD6bC0adD59E62ac25578270cFf1b9f619", 18, false),
    (Network::Polygon, "dai", "DAI", "DAI Stable", "0x8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063", 18, true),
    (Network::Polygon, "usdc", "USDC", "USD Coin", "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174", 6, true),
    (Network::Polygon, "wbtc", "WBTC", "Wrapped BTC", "0x1BFD67037B42Cf73acF2047067bd4F2C47D9BfD6", 8, false),
];

fn builtin_catalog() -> TokenCatalog {
    let mut tokens: HashMap<Network, Vec<Token>> = HashMap::new();
    for &(network, key, symbol, name, address, decimals, is_stablecoin) in BUILTIN_TOKENS {
        let address = match Address::parse(address) {
            Ok(address) => address,
            Err(err) => {
                error!(%network, key, error = %err, "Skipping built-in token with a malformed address");
                continue;
            }
        };
        tokens.entry(network).or_default().push(Token {
            key: key.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            address,
            decimals,
            is_stablecoin,
        });
    }

    tokens
        .into_iter()
        .fold(TokenCatalog::new(), |catalog, (network, all_tokens)| {
            catalog.with_network(network, NetworkTokens::new(all_tokens))
        })
}

static BUILTIN_CATALOG: Lazy<TokenCatalog> = Lazy::new(builtin_catalog);

/// Converts `amount` whole tokens into base units for a token with `decimals`.
///
/// Precision beyond `decimals` is truncated, never rounded up.
pub fn convert_token_amount_to_wei(amount: Decimal, decimals: u32) -> CoreResult<String> {
    if amount < Decimal::ZERO {
        return Err(CoreError::InvalidAmount(amount.to_string()));
    }

    let overflow = || CoreError::AmountOverflow {
        amount: amount.to_string(),
        decimals,
    };

    let mantissa = amount.mantissa().unsigned_abs();
    let scale = amount.scale();

    let wei = if decimals >= scale {
        let factor = 10u128.checked_pow(decimals - scale).ok_or_else(overflow)?;
        mantissa.checked_mul(factor).ok_or_else(overflow)?
    } else {
        // scale is at most 28, so the divisor always fits
        mantissa / 10u128.pow(scale - decimals)
    };

    Ok(wei.to_string())
}
