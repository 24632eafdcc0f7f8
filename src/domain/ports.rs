use super::account::{Balance, UserId, Withdrawal};
use super::checksum::OrderNumber;
use super::money::Points;
use super::order::{Order, OrderStatus, Registration, StatusUpdate};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Persistence for orders, withdrawals and balances.
///
/// Every method that touches more than one record is atomic: it either
/// applies completely or leaves the store unchanged.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Creates the zero balance row for a new user. Idempotent.
    async fn open_account(&self, owner: UserId) -> Result<()>;

    async fn register_order(&self, number: OrderNumber, owner: UserId) -> Result<Registration>;

    /// Orders in NEW or PROCESSING across all users, in no guaranteed order.
    async fn pending_orders(&self) -> Result<Vec<Order>>;

    /// Applies every update and the resulting balance credits as one unit.
    async fn apply_reconciliation_batch(&self, updates: Vec<StatusUpdate>) -> Result<()>;

    async fn withdraw(&self, order_ref: String, amount: Points, owner: UserId) -> Result<Withdrawal>;

    async fn balance(&self, owner: UserId) -> Result<Balance>;

    /// The user's orders, oldest upload first.
    async fn orders_of(&self, owner: UserId) -> Result<Vec<Order>>;

    /// The user's withdrawals, oldest first.
    async fn withdrawals_of(&self, owner: UserId) -> Result<Vec<Withdrawal>>;
}

/// What the accrual service said about one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualResponse {
    Resolved { status: OrderStatus, amount: Points },
    /// The service has no record of the order yet.
    NotFound,
    /// The service is throttling; stop querying for now.
    RateLimited { retry_after: Option<Duration> },
    /// Network, timeout or decoding failure.
    TransportError(String),
}

#[async_trait]
pub trait AccrualClient: Send + Sync {
    async fn fetch(&self, number: &OrderNumber) -> AccrualResponse;
}

/// The store is shared between the poller and request handlers.
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type AccrualClientBox = Box<dyn AccrualClient>;
