use super::money::Points;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a customer, resolved by the caller's session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-user points balance.
///
/// `current` is what the user can still spend, `withdrawn` the lifetime total
/// already spent. Neither ever goes negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub owner: UserId,
    pub current: Points,
    pub withdrawn: Points,
}

impl Balance {
    pub fn new(owner: UserId) -> Self {
        Self {
            owner,
            current: Points::ZERO,
            withdrawn: Points::ZERO,
        }
    }

    /// Adds accrued points from a processed order.
    pub fn credit(&mut self, amount: Points) -> Result<(), LedgerError> {
        self.current = self.current.checked_add(amount).ok_or_else(|| {
            LedgerError::ValidationError(format!("credit of {amount} overflows balance of {}", self.owner))
        })?;
        Ok(())
    }

    /// Spends `amount` points, leaving the balance untouched when it does not cover them.
    pub fn debit(&mut self, amount: Points) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::ValidationError(
                "Withdrawal amount must be positive".to_string(),
            ));
        }
        if self.current < amount {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: self.current,
            });
        }
        let withdrawn = self.withdrawn.checked_add(amount).ok_or_else(|| {
            LedgerError::ValidationError(format!("withdrawn total of {} overflows", self.owner))
        })?;
        self.current -= amount;
        self.withdrawn = withdrawn;
        Ok(())
    }
}

/// A spend of points against an order reference.
///
/// The reference is whatever the caller supplied; it need not name a
/// registered order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub order: String,
    pub amount: Points,
    pub processed_at: DateTime<Utc>,
    pub owner: UserId,
}

impl Withdrawal {
    pub fn new(order: impl Into<String>, amount: Points, owner: UserId) -> Self {
        Self {
            order: order.into(),
            amount,
            processed_at: Utc::now(),
            owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(current: i64, withdrawn: i64) -> Balance {
        Balance {
            owner: UserId(1),
            current: Points::whole(current),
            withdrawn: Points::whole(withdrawn),
        }
    }

    #[test]
    fn test_new_balance_is_zero() {
        let b = Balance::new(UserId(7));
        assert_eq!(b.current, Points::ZERO);
        assert_eq!(b.withdrawn, Points::ZERO);
    }

    #[test]
    fn test_balance_credit() {
        let mut b = balance(10, 0);
        b.credit(Points::whole(5)).unwrap();
        assert_eq!(b.current, Points::whole(15));
        assert_eq!(b.withdrawn, Points::ZERO);
    }

    #[test]
    fn test_balance_debit_success() {
        let mut b = balance(900, 15);
        b.debit(Points::whole(100)).unwrap();
        assert_eq!(b, balance(800, 115));
    }

    #[test]
    fn test_balance_debit_exact() {
        let mut b = balance(100, 0);
        b.debit(Points::whole(100)).unwrap();
        assert_eq!(b, balance(0, 100));
    }

    #[test]
    fn test_balance_debit_insufficient() {
        let mut b = balance(900, 15);
        let result = b.debit(Points::whole(1000));
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(b, balance(900, 15));
    }

    #[test]
    fn test_balance_debit_rejects_non_positive() {
        let mut b = balance(10, 0);
        assert!(matches!(
            b.debit(Points::ZERO),
            Err(LedgerError::ValidationError(_))
        ));
        assert!(matches!(
            b.debit(Points::whole(-1)),
            Err(LedgerError::ValidationError(_))
        ));
        assert_eq!(b, balance(10, 0));
    }

    #[test]
    fn test_balance_row_survives_json_exactly() {
        let balance = Balance {
            owner: UserId(7),
            current: Points::from_minor(9_007_199_254_740_993),
            withdrawn: Points::from_minor(1),
        };
        let json = serde_json::to_vec(&balance).unwrap();
        let back: Balance = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, balance);
    }
}
