//! Fungible balance ledger

use std::fmt;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::error::{EconomyError, Result};
use crate::core::types::{ParticipantId, StakeKind};

/// Holder of a fungible balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Account {
    Participant(ParticipantId),
    /// Principal locked in a staking ledger
    Escrow(StakeKind),
    /// Issuer of rewards
    Treasury,
}

impl From<ParticipantId> for Account {
    fn from(id: ParticipantId) -> Self {
        Account::Participant(id)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Account::Participant(id) => write!(f, "{}", id),
            Account::Escrow(kind) => write!(f, "{} escrow", kind),
            Account::Treasury => write!(f, "treasury"),
        }
    }
}

/// Mint, burn and transfer of the fungible currency
pub trait BalanceLedger {
    fn balance_of(&self, account: Account) -> u64;

    /// Whether `minter` is approved to create currency
    fn can_mint(&self, minter: Account) -> bool;

    /// Validate a mint of `amount` by `minter` without performing it
    fn check_mint(&self, minter: Account, amount: u64) -> Result<()>;

    fn mint(&mut self, minter: Account, to: Account, amount: u64) -> Result<()>;

    fn burn(&mut self, from: Account, amount: u64) -> Result<()>;

    fn transfer(&mut self, from: Account, to: Account, amount: u64) -> Result<()>;
}

/// In-memory balance ledger with running supply totals
#[derive(Debug, Clone, Default)]
pub struct BalanceBook {
    balances: AHashMap<Account, u64>,
    minters: AHashSet<Account>,
    total_minted: u64,
    total_burned: u64,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approve_minter(&mut self, minter: Account) {
        self.minters.insert(minter);
    }

    pub fn revoke_minter(&mut self, minter: Account) {
        self.minters.remove(&minter);
    }

    pub fn total_minted(&self) -> u64 {
        self.total_minted
    }

    pub fn total_burned(&self) -> u64 {
        self.total_burned
    }

    /// Currency in circulation; always equals the sum of all balances
    pub fn total_supply(&self) -> u64 {
        self.total_minted - self.total_burned
    }

    /// Sum of every balance, for conservation checks
    pub fn sum_balances(&self) -> u64 {
        self.balances.values().sum()
    }

    fn check_funds(&self, from: Account, amount: u64) -> Result<()> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(EconomyError::InsufficientBalance { requested: amount, available });
        }
        Ok(())
    }

    fn credit(&mut self, to: Account, amount: u64) {
        *self.balances.entry(to).or_insert(0) += amount;
    }

    fn debit(&mut self, from: Account, amount: u64) {
        if let Some(balance) = self.balances.get_mut(&from) {
            *balance -= amount;
        }
    }
}

impl BalanceLedger for BalanceBook {
    fn balance_of(&self, account: Account) -> u64 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    fn can_mint(&self, minter: Account) -> bool {
        self.minters.contains(&minter)
    }

    fn check_mint(&self, minter: Account, amount: u64) -> Result<()> {
        if !self.can_mint(minter) {
            return Err(EconomyError::NotAuthorized(format!("{} may not mint", minter)));
        }
        if self.total_minted.checked_add(amount).is_none() {
            return Err(EconomyError::InvalidParameter(format!("minting {} overflows supply", amount)));
        }
        Ok(())
    }

    fn mint(&mut self, minter: Account, to: Account, amount: u64) -> Result<()> {
        self.check_mint(minter, amount)?;
        self.total_minted += amount;
        self.credit(to, amount);
        Ok(())
    }

    fn burn(&mut self, from: Account, amount: u64) -> Result<()> {
        self.check_funds(from, amount)?;
        self.debit(from, amount);
        self.total_burned += amount;
        Ok(())
    }

    fn transfer(&mut self, from: Account, to: Account, amount: u64) -> Result<()> {
        self.check_funds(from, amount)?;
        self.debit(from, amount);
        self.credit(to, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: ParticipantId = ParticipantId(1);
    const BOB: ParticipantId = ParticipantId(2);

    fn book() -> BalanceBook {
        let mut book = BalanceBook::new();
        book.approve_minter(Account::Treasury);
        book
    }

    #[test]
    fn test_mint_requires_approval() {
        let mut book = book();
        let err = book.mint(ALICE.into(), BOB.into(), 10).unwrap_err();
        assert!(matches!(err, EconomyError::NotAuthorized(_)));
        assert_eq!(book.balance_of(BOB.into()), 0);

        book.mint(Account::Treasury, BOB.into(), 10).unwrap();
        assert_eq!(book.balance_of(BOB.into()), 10);

        book.revoke_minter(Account::Treasury);
        assert!(!book.can_mint(Account::Treasury));
    }

    #[test]
    fn test_transfer_and_burn() {
        let mut book = book();
        book.mint(Account::Treasury, ALICE.into(), 100).unwrap();
        book.transfer(ALICE.into(), Account::Escrow(StakeKind::Mining), 60).unwrap();
        book.burn(Account::Escrow(StakeKind::Mining), 15).unwrap();

        assert_eq!(book.balance_of(ALICE.into()), 40);
        assert_eq!(book.balance_of(Account::Escrow(StakeKind::Mining)), 45);
        assert_eq!(book.total_supply(), 85);
        assert_eq!(book.sum_balances(), book.total_supply());
    }

    #[test]
    fn test_overdraw_rejected_without_mutation() {
        let mut book = book();
        book.mint(Account::Treasury, ALICE.into(), 5).unwrap();

        let err = book.transfer(ALICE.into(), BOB.into(), 6).unwrap_err();
        assert_eq!(err, EconomyError::InsufficientBalance { requested: 6, available: 5 });
        assert!(book.burn(BOB.into(), 1).is_err());
        assert_eq!(book.balance_of(ALICE.into()), 5);
        assert_eq!(book.total_burned(), 0);
    }

    #[test]
    fn test_check_mint_catches_supply_overflow() {
        let mut book = book();
        book.mint(Account::Treasury, ALICE.into(), u64::MAX - 50).unwrap();

        assert!(book.check_mint(Account::Treasury, 50).is_ok());
        assert!(matches!(book.check_mint(Account::Treasury, 51), Err(EconomyError::InvalidParameter(_))));
        assert!(matches!(book.check_mint(ALICE.into(), 1), Err(EconomyError::NotAuthorized(_))));
        assert!(book.mint(Account::Treasury, BOB.into(), 51).is_err());
        assert_eq!(book.balance_of(BOB.into()), 0);
        assert_eq!(book.total_minted(), u64::MAX - 50);
    }
}
