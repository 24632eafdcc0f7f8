use crate::domain::account::{Balance, UserId, Withdrawal};
use crate::domain::checksum::OrderNumber;
use crate::domain::money::Points;
use crate::domain::order::{Order, Registration};
use crate::domain::ports::LedgerStoreRef;
use crate::error::Result;
use tracing::{debug, info};

/// Entry point for customer-facing ledger operations.
///
/// Validates raw input before it reaches the store. The caller passes the
/// already-authenticated owner into every call; nothing here looks identity up.
#[derive(Clone)]
pub struct LoyaltyService {
    store: LedgerStoreRef,
}

impl LoyaltyService {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    /// Creates the zero balance for a newly signed-up user.
    pub async fn open_account(&self, owner: UserId) -> Result<()> {
        self.store.open_account(owner).await
    }

    /// Registers an order number for accrual.
    ///
    /// Returns [`Registration::AlreadyRegistered`] when `owner` submitted the
    /// same number before, and `ConflictOtherOwner` when someone else did.
    pub async fn register_order(&self, raw_number: &str, owner: UserId) -> Result<Registration> {
        let number = OrderNumber::parse(raw_number)?;
        let registration = self.store.register_order(number.clone(), owner).await?;
        match registration {
            Registration::Created => info!(order = %number, %owner, "Order registered"),
            Registration::AlreadyRegistered => {
                debug!(order = %number, %owner, "Order already registered by this user")
            }
        }
        Ok(registration)
    }

    /// Spends `amount` points against the order reference `raw_order`.
    pub async fn withdraw(&self, raw_order: &str, amount: Points, owner: UserId) -> Result<Withdrawal> {
        let order = OrderNumber::parse(raw_order)?;
        let withdrawal = self.store.withdraw(order.into(), amount, owner).await?;
        info!(order = %withdrawal.order, %amount, %owner, "Points withdrawn");
        Ok(withdrawal)
    }

    pub async fn balance(&self, owner: UserId) -> Result<Balance> {
        self.store.balance(owner).await
    }

    pub async fn orders(&self, owner: UserId) -> Result<Vec<Order>> {
        self.store.orders_of(owner).await
    }

    pub async fn withdrawals(&self, owner: UserId) -> Result<Vec<Withdrawal>> {
        self.store.withdrawals_of(owner).await
    }
}
