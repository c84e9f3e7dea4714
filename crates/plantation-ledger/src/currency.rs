//! Currency ledger capability.
//!
//! The currency ledger belongs to the host economy. The farm system only
//! needs to check, withdraw, deposit, and format amounts, so that is all the
//! [`CurrencyLedger`] trait exposes. [`InMemoryCurrency`] backs tests and the
//! standalone server.

use std::collections::HashMap;
use std::sync::Mutex;

use rust_decimal::Decimal;

use plantation_types::OwnerId;

use crate::error::LedgerError;

/// Access to a player's currency balance.
pub trait CurrencyLedger: Send + Sync {
    /// Current balance of `owner`. Unknown owners have a zero balance.
    fn balance(&self, owner: OwnerId) -> Decimal;

    /// Whether `owner` can cover `amount`.
    fn has(&self, owner: OwnerId, amount: Decimal) -> bool {
        self.balance(owner) >= amount
    }

    /// Remove `amount` from the balance and return the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if the balance is too low,
    /// or [`LedgerError::NegativeAmount`] for a negative amount.
    fn withdraw(&self, owner: OwnerId, amount: Decimal) -> Result<Decimal, LedgerError>;

    /// Add `amount` to the balance and return the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NegativeAmount`] for a negative amount.
    fn deposit(&self, owner: OwnerId, amount: Decimal) -> Result<Decimal, LedgerError>;

    /// Human-readable rendering of an amount.
    fn format(&self, amount: Decimal) -> String {
        format!("{}", amount.round_dp(2))
    }
}

// ---------------------------------------------------------------------------
// InMemoryCurrency
// ---------------------------------------------------------------------------

/// Process-local currency ledger.
#[derive(Debug, Default)]
pub struct InMemoryCurrency {
    balances: Mutex<HashMap<OwnerId, Decimal>>,
    unit: String,
}

impl InMemoryCurrency {
    /// Create an empty ledger that renders amounts with the given unit name.
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            unit: unit.into(),
        }
    }

    /// Overwrite the balance of `owner`.
    pub fn set_balance(&self, owner: OwnerId, amount: Decimal) {
        let Ok(mut balances) = self.balances.lock() else {
            tracing::warn!(owner = %owner, "currency ledger lock poisoned, balance not set");
            return;
        };
        balances.insert(owner, amount);
    }
}

impl CurrencyLedger for InMemoryCurrency {
    fn balance(&self, owner: OwnerId) -> Decimal {
        let Ok(balances) = self.balances.lock() else {
            return Decimal::ZERO;
        };
        balances.get(&owner).copied().unwrap_or(Decimal::ZERO)
    }

    fn withdraw(&self, owner: OwnerId, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount.is_sign_negative() {
            return Err(LedgerError::NegativeAmount(amount));
        }
        let Ok(mut balances) = self.balances.lock() else {
            return Err(LedgerError::Refused("currency ledger lock poisoned".to_owned()));
        };
        let available = balances.get(&owner).copied().unwrap_or(Decimal::ZERO);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                owner,
                requested: amount,
                available,
            });
        }
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        balances.insert(owner, remaining);
        Ok(remaining)
    }

    fn deposit(&self, owner: OwnerId, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount.is_sign_negative() {
            return Err(LedgerError::NegativeAmount(amount));
        }
        let Ok(mut balances) = self.balances.lock() else {
            return Err(LedgerError::Refused("currency ledger lock poisoned".to_owned()));
        };
        let current = balances.get(&owner).copied().unwrap_or(Decimal::ZERO);
        let updated = current
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        balances.insert(owner, updated);
        Ok(updated)
    }

    fn format(&self, amount: Decimal) -> String {
        if self.unit.is_empty() {
            format!("{}", amount.round_dp(2))
        } else {
            format!("{} {}", amount.round_dp(2), self.unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn unknown_owner_has_zero_balance() {
        let ledger = InMemoryCurrency::new("coins");
        assert_eq!(ledger.balance(OwnerId::new()), Decimal::ZERO);
    }

    #[test]
    fn withdraw_and_deposit() {
        let ledger = InMemoryCurrency::new("coins");
        let owner = OwnerId::new();
        ledger.set_balance(owner, dec!(100));

        assert!(ledger.has(owner, dec!(100)));
        assert_eq!(ledger.withdraw(owner, dec!(40)).ok(), Some(dec!(60)));
        assert_eq!(ledger.deposit(owner, dec!(15.5)).ok(), Some(dec!(75.5)));
        assert_eq!(ledger.balance(owner), dec!(75.5));
    }

    #[test]
    fn overdraw_is_refused_without_change() {
        let ledger = InMemoryCurrency::new("coins");
        let owner = OwnerId::new();
        ledger.set_balance(owner, dec!(10));
        assert!(matches!(
            ledger.withdraw(owner, dec!(10.01)),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.balance(owner), dec!(10));
    }

    #[test]
    fn negative_amounts_rejected() {
        let ledger = InMemoryCurrency::new("coins");
        let owner = OwnerId::new();
        assert!(ledger.deposit(owner, dec!(-1)).is_err());
        assert!(ledger.withdraw(owner, dec!(-1)).is_err());
    }

    #[test]
    fn format_includes_unit() {
        let ledger = InMemoryCurrency::new("coins");
        assert_eq!(ledger.format(dec!(12.345)), "12.34 coins");
        assert_eq!(InMemoryCurrency::default().format(dec!(3)), "3");
    }
}
