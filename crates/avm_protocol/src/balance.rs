//! Per-token-type ledger authorizing outgoing sends.
//!
//! Credits come from delivered inbox messages, debits from the send
//! opcodes. Fungible tokens keep a running sum; non-fungible tokens
//! keep the set of held identifiers. The tracker is derived state and
//! is not part of the machine hash — onchain verification rebuilds it
//! from the committed inbox.

use std::collections::{BTreeSet, HashMap};

use ethereum_types::U256;

use crate::token::TokenType;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("non-fungible {token} already holds id {id}")]
    DuplicateNonFungible { token: TokenType, id: U256 },
    #[error("insufficient balance of {token} for {amount}")]
    Insufficient { token: TokenType, amount: U256 },
}

#[derive(Debug, Clone, Default)]
pub struct BalanceTracker {
    fungible: HashMap<TokenType, U256>,
    non_fungible: HashMap<TokenType, BTreeSet<U256>>,
}

impl BalanceTracker {
    pub fn new() -> BalanceTracker {
        BalanceTracker::default()
    }

    /// Record an incoming amount. For non-fungible tokens `amount` is
    /// an item identifier and must not already be held.
    pub fn credit(&mut self, token: TokenType, amount: U256) -> Result<(), BalanceError> {
        if token.is_fungible() {
            let entry = self.fungible.entry(token).or_insert_with(U256::zero);
            *entry = entry.overflowing_add(amount).0;
            Ok(())
        } else {
            let held = self.non_fungible.entry(token).or_default();
            if !held.insert(amount) {
                return Err(BalanceError::DuplicateNonFungible { token, id: amount });
            }
            Ok(())
        }
    }

    pub fn can_spend(&self, token: TokenType, amount: U256) -> bool {
        if token.is_fungible() {
            self.fungible.get(&token).copied().unwrap_or_default() >= amount
        } else {
            self.non_fungible
                .get(&token)
                .map(|held| held.contains(&amount))
                .unwrap_or(false)
        }
    }

    pub fn debit(&mut self, token: TokenType, amount: U256) -> Result<(), BalanceError> {
        if !self.can_spend(token, amount) {
            return Err(BalanceError::Insufficient { token, amount });
        }
        if token.is_fungible() {
            let entry = self.fungible.get_mut(&token).expect("can_spend held");
            *entry -= amount;
        } else {
            self.non_fungible
                .get_mut(&token)
                .expect("can_spend held")
                .remove(&amount);
        }
        Ok(())
    }

    pub fn balance(&self, token: TokenType) -> U256 {
        self.fungible.get(&token).copied().unwrap_or_default()
    }
}
