#![allow(dead_code)]

use async_trait::async_trait;
use loyalty_ledger::domain::account::{Balance, UserId, Withdrawal};
use loyalty_ledger::domain::checksum::OrderNumber;
use loyalty_ledger::domain::money::Points;
use loyalty_ledger::domain::order::{Order, OrderStatus, Registration, StatusUpdate};
use loyalty_ledger::domain::ports::{AccrualClient, AccrualResponse, LedgerStore};
use loyalty_ledger::error::{LedgerError, Result};
use loyalty_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Valid order numbers used across the suites.
pub const ORDERS: [&str; 5] = [
    "12345678903",
    "22222222220",
    "33333333335",
    "44444444440",
    "55555555550",
];

pub fn number(raw: &str) -> OrderNumber {
    OrderNumber::parse(raw).expect("test order numbers are valid")
}

pub fn processed(amount: i64) -> AccrualResponse {
    AccrualResponse::Resolved {
        status: OrderStatus::Processed,
        amount: Points::whole(amount),
    }
}

pub async fn store_with_users(users: &[i64]) -> Arc<InMemoryLedgerStore> {
    let store = Arc::new(InMemoryLedgerStore::new());
    for &id in users {
        store.open_account(UserId(id)).await.unwrap();
    }
    store
}

/// Registers `raw` for `owner` and settles it as PROCESSED with `amount` points.
pub async fn credit(store: &dyn LedgerStore, raw: &str, owner: UserId, amount: i64) {
    store.register_order(number(raw), owner).await.unwrap();
    store
        .apply_reconciliation_batch(vec![StatusUpdate {
            number: number(raw),
            status: OrderStatus::Processed,
            amount: Points::whole(amount),
        }])
        .await
        .unwrap();
}

/// Answers from a per-order script and records every call.
///
/// Responses listed in `by_call` override the per-order script for the n-th
/// call (0-based), which lets tests hit a rate limit at a fixed position
/// regardless of the order the store lists pending orders in.
#[derive(Default, Clone)]
pub struct ScriptedAccrualClient {
    by_order: Arc<Mutex<HashMap<String, AccrualResponse>>>,
    by_call: Arc<Mutex<HashMap<usize, AccrualResponse>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAccrualClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, raw: &str, response: AccrualResponse) -> &Self {
        self.by_order.lock().unwrap().insert(raw.to_string(), response);
        self
    }

    pub fn respond_on_call(&self, call: usize, response: AccrualResponse) -> &Self {
        self.by_call.lock().unwrap().insert(call, response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccrualClient for ScriptedAccrualClient {
    async fn fetch(&self, number: &OrderNumber) -> AccrualResponse {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(number.to_string());
            calls.len() - 1
        };
        if let Some(response) = self.by_call.lock().unwrap().get(&call) {
            return response.clone();
        }
        self.by_order
            .lock()
            .unwrap()
            .get(number.as_str())
            .cloned()
            .unwrap_or(AccrualResponse::NotFound)
    }
}

/// Wraps a store and fails selected operations on demand.
#[derive(Clone)]
pub struct FaultyStore {
    inner: Arc<InMemoryLedgerStore>,
    pub fail_pending: Arc<AtomicBool>,
    pub fail_batch: Arc<AtomicBool>,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryLedgerStore>) -> Self {
        Self {
            inner,
            fail_pending: Arc::new(AtomicBool::new(false)),
            fail_batch: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn open_account(&self, owner: UserId) -> Result<()> {
        self.inner.open_account(owner).await
    }

    async fn register_order(&self, number: OrderNumber, owner: UserId) -> Result<Registration> {
        self.inner.register_order(number, owner).await
    }

    async fn pending_orders(&self) -> Result<Vec<Order>> {
        if self.fail_pending.load(Ordering::SeqCst) {
            return Err(LedgerError::storage("connection refused"));
        }
        self.inner.pending_orders().await
    }

    async fn apply_reconciliation_batch(&self, updates: Vec<StatusUpdate>) -> Result<()> {
        if self.fail_batch.load(Ordering::SeqCst) {
            return Err(LedgerError::storage("transaction aborted"));
        }
        self.inner.apply_reconciliation_batch(updates).await
    }

    async fn withdraw(&self, order_ref: String, amount: Points, owner: UserId) -> Result<Withdrawal> {
        self.inner.withdraw(order_ref, amount, owner).await
    }

    async fn balance(&self, owner: UserId) -> Result<Balance> {
        self.inner.balance(owner).await
    }

    async fn orders_of(&self, owner: UserId) -> Result<Vec<Order>> {
        self.inner.orders_of(owner).await
    }

    async fn withdrawals_of(&self, owner: UserId) -> Result<Vec<Withdrawal>> {
        self.inner.withdrawals_of(owner).await
    }
}

/// Checks `current == Σ processed − Σ withdrawn` and that nothing is negative.
pub async fn assert_balance_invariant(store: &dyn LedgerStore, owner: UserId) {
    let balance = store.balance(owner).await.unwrap();
    let processed: Points = store
        .orders_of(owner)
        .await
        .unwrap()
        .iter()
        .filter(|o| o.status == OrderStatus::Processed)
        .map(|o| o.amount)
        .sum();
    let withdrawn: Points = store
        .withdrawals_of(owner)
        .await
        .unwrap()
        .iter()
        .map(|w| w.amount)
        .sum();

    assert_eq!(balance.current, processed - withdrawn, "balance of user {owner}");
    assert_eq!(balance.withdrawn, withdrawn, "withdrawn total of user {owner}");
    assert!(balance.current >= Points::ZERO);
}
