//! The props bag a strategy consumes when it computes its pending transaction.
//!
//! Keys form a closed set; values are tagged by what they carry. Helper
//! functions travel as shared closures so the strategy can call them without
//! knowing where the token catalog or the active network live.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::CoreResult;
use crate::tokens::Token;
use crate::types::{BalanceTable, Position, PriceTable};

/// Converts a human token amount into its integer base-unit string
pub type AmountConverter = Arc<dyn Fn(Decimal, u32) -> CoreResult<String> + Send + Sync>;

/// Resolves a token of the active network by its key
pub type TokenLookup = Arc<dyn Fn(&str) -> Option<Token> + Send + Sync>;

/// Names of the props pushed into a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropKey {
    ConvertTokenAmountToWei,
    GetTokenByKey,
    Position,
    Prices,
    DsaBalances,
    UserBalances,
    Tokens,
    TokenKeys,
}

impl PropKey {
    pub const ALL: [PropKey; 8] = [
        PropKey::ConvertTokenAmountToWei,
        PropKey::GetTokenByKey,
        PropKey::Position,
        PropKey::Prices,
        PropKey::DsaBalances,
        PropKey::UserBalances,
        PropKey::Tokens,
        PropKey::TokenKeys,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropKey::ConvertTokenAmountToWei => "convertTokenAmountToWei",
            PropKey::GetTokenByKey => "getTokenByKey",
            PropKey::Position => "position",
            PropKey::Prices => "prices",
            PropKey::DsaBalances => "dsaBalances",
            PropKey::UserBalances => "userBalances",
            PropKey::Tokens => "tokens",
            PropKey::TokenKeys => "tokenKeys",
        }
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single prop value
#[derive(Clone)]
pub enum PropValue {
    AmountConverter(AmountConverter),
    TokenLookup(TokenLookup),
    /// `None` when the protocol has no position source or none is loaded yet
    Position(Option<Position>),
    /// `None` when the source has nothing for the active network
    Prices(Option<PriceTable>),
    Balances(Option<BalanceTable>),
    Tokens(Vec<Token>),
    TokenKeys(Vec<String>),
}

impl PropValue {
    pub fn as_amount_converter(&self) -> Option<&AmountConverter> {
        match self {
            PropValue::AmountConverter(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_token_lookup(&self) -> Option<&TokenLookup> {
        match self {
            PropValue::TokenLookup(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<&Position> {
        match self {
            PropValue::Position(position) => position.as_ref(),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&std::collections::HashMap<String, Decimal>> {
        match self {
            PropValue::Prices(table) | PropValue::Balances(table) => table.as_ref(),
            _ => None,
        }
    }

    pub fn as_tokens(&self) -> Option<&[Token]> {
        match self {
            PropValue::Tokens(tokens) => Some(tokens),
            _ => None,
        }
    }

    pub fn as_token_keys(&self) -> Option<&[String]> {
        match self {
            PropValue::TokenKeys(keys) => Some(keys),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::AmountConverter(a), PropValue::AmountConverter(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (PropValue::TokenLookup(a), PropValue::TokenLookup(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (PropValue::Position(a), PropValue::Position(b)) => a == b,
            (PropValue::Prices(a), PropValue::Prices(b)) => a == b,
            (PropValue::Balances(a), PropValue::Balances(b)) => a == b,
            (PropValue::Tokens(a), PropValue::Tokens(b)) => a == b,
            (PropValue::TokenKeys(a), PropValue::TokenKeys(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::AmountConverter(_) => f.write_str("AmountConverter(<fn>)"),
            PropValue::TokenLookup(_) => f.write_str("TokenLookup(<fn>)"),
            PropValue::Position(p) => f.debug_tuple("Position").field(p).finish(),
            PropValue::Prices(t) => f.debug_tuple("Prices").field(t).finish(),
            PropValue::Balances(t) => f.debug_tuple("Balances").field(t).finish(),
            PropValue::Tokens(t) => f.debug_tuple("Tokens").field(&t.len()).finish(),
            PropValue::TokenKeys(k) => f.debug_tuple("TokenKeys").field(k).finish(),
        }
    }
}

/// A partial or complete set of props.
///
/// Each update carries only the keys its source owns; strategies merge updates
/// into what they already hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    values: BTreeMap<PropKey, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: PropKey, value: PropValue) -> Self {
        self.values.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: PropKey, value: PropValue) -> Option<PropValue> {
        self.values.insert(key, value)
    }

    pub fn get(&self, key: PropKey) -> Option<&PropValue> {
        self.values.get(&key)
    }

    pub fn contains(&self, key: PropKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = PropKey> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overwrites every key present in `update`, keeping the rest
    pub fn merge(&mut self, update: Props) {
        self.values.extend(update.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropKey, &PropValue)> {
        self.values.iter()
    }
}

impl IntoIterator for Props {
    type Item = (PropKey, PropValue);
    type IntoIter = std::collections::btree_map::IntoIter<PropKey, PropValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_prop_key_names() {
        let names: Vec<&str> = PropKey::ALL.iter().map(PropKey::as_str).collect();
        assert_eq!(
            names,
            vec![
                "convertTokenAmountToWei",
                "getTokenByKey",
                "position",
                "prices",
                "dsaBalances",
                "userBalances",
                "tokens",
                "tokenKeys"
            ]
        );
    }

    #[test]
    fn test_merge_overwrites_only_present_keys() {
        let mut held = Props::new()
            .with(PropKey::Position, PropValue::Position(None))
            .with(PropKey::TokenKeys, PropValue::TokenKeys(vec!["eth".into()]));

        let mut prices = PriceTable::new();
        prices.insert("0xdai".into(), dec!(1.0001));
        held.merge(
            Props::new()
                .with(PropKey::Prices, PropValue::Prices(Some(prices.clone())))
                .with(PropKey::TokenKeys, PropValue::TokenKeys(vec!["matic".into()])),
        );

        assert_eq!(held.len(), 3);
        assert_eq!(held.get(PropKey::Prices).and_then(PropValue::as_table), Some(&prices));
        assert_eq!(
            held.get(PropKey::TokenKeys).and_then(PropValue::as_token_keys),
            Some(&["matic".to_string()][..])
        );
        assert_eq!(held.get(PropKey::Position), Some(&PropValue::Position(None)));
    }

    #[test]
    fn test_function_values_compare_by_identity() {
        let lookup: TokenLookup = Arc::new(|_key: &str| None);
        let same = PropValue::TokenLookup(lookup.clone());
        let other = PropValue::TokenLookup(Arc::new(|_key: &str| None));

        assert_eq!(PropValue::TokenLookup(lookup), same);
        assert_ne!(same, other);
    }
}
