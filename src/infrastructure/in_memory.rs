use crate::domain::account::{Balance, UserId, Withdrawal};
use crate::domain::checksum::OrderNumber;
use crate::domain::money::Points;
use crate::domain::order::{Order, Registration, StatusUpdate};
use crate::domain::ports::LedgerStore;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// A user's balance row together with the withdrawals recorded against it.
#[derive(Debug)]
struct AccountRow {
    balance: Balance,
    withdrawals: Vec<Withdrawal>,
}

type AccountCell = Arc<Mutex<AccountRow>>;

/// A thread-safe in-memory ledger.
///
/// Orders live behind one `RwLock`; every account row has its own `Mutex`, so
/// mutations of the same user serialize while different users proceed
/// independently. A reconciliation batch holds the orders write lock and the
/// row locks of every credited user (taken in `UserId` order) until it has
/// applied everything.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    orders: Arc<RwLock<HashMap<OrderNumber, Order>>>,
    accounts: Arc<RwLock<HashMap<UserId, AccountCell>>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    async fn account(&self, owner: UserId) -> Result<AccountCell> {
        let accounts = self.accounts.read().await;
        accounts
            .get(&owner)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(owner))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn open_account(&self, owner: UserId) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        accounts.entry(owner).or_insert_with(|| {
            Arc::new(Mutex::new(AccountRow {
                balance: Balance::new(owner),
                withdrawals: Vec::new(),
            }))
        });
        Ok(())
    }

    async fn register_order(&self, number: OrderNumber, owner: UserId) -> Result<Registration> {
        if !self.accounts.read().await.contains_key(&owner) {
            return Err(LedgerError::AccountNotFound(owner));
        }

        let mut orders = self.orders.write().await;
        match orders.get(&number) {
            Some(existing) if existing.owner == owner => Ok(Registration::AlreadyRegistered),
            Some(_) => Err(LedgerError::ConflictOtherOwner(number.to_string())),
            None => {
                orders.insert(number.clone(), Order::new(number, owner));
                Ok(Registration::Created)
            }
        }
    }

    async fn pending_orders(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.status.is_temporary())
            .cloned()
            .collect())
    }

    async fn apply_reconciliation_batch(&self, updates: Vec<StatusUpdate>) -> Result<()> {
        let mut orders = self.orders.write().await;

        // Validate every row on copies first so a bad row leaves nothing applied.
        let mut staged: HashMap<OrderNumber, Order> = HashMap::with_capacity(updates.len());
        let mut credits: BTreeMap<UserId, Points> = BTreeMap::new();
        for update in &updates {
            let mut order = match staged.get(&update.number) {
                Some(order) => order.clone(),
                None => orders.get(&update.number).cloned().ok_or_else(|| {
                    LedgerError::BatchRejected(format!("unknown order {}", update.number))
                })?,
            };
            let credit = order.credit_for(update);
            order.apply(update).map_err(LedgerError::BatchRejected)?;
            if credit.is_positive() {
                let total = credits.entry(order.owner).or_insert(Points::ZERO);
                *total = total.checked_add(credit).ok_or_else(|| {
                    LedgerError::BatchRejected(format!("credit overflow for user {}", order.owner))
                })?;
            }
            staged.insert(update.number.clone(), order);
        }

        let mut guards: Vec<(OwnedMutexGuard<AccountRow>, Points)> = Vec::with_capacity(credits.len());
        for (owner, credit) in credits {
            let cell = self.account(owner).await?;
            guards.push((cell.lock_owned().await, credit));
        }

        let mut credited = Vec::with_capacity(guards.len());
        for (row, credit) in &guards {
            let mut balance = row.balance;
            balance.credit(*credit)?;
            credited.push(balance);
        }

        for ((row, _), balance) in guards.iter_mut().zip(credited) {
            row.balance = balance;
        }
        orders.extend(staged);
        Ok(())
    }

    async fn withdraw(&self, order_ref: String, amount: Points, owner: UserId) -> Result<Withdrawal> {
        let cell = self.account(owner).await?;
        let mut row = cell.lock().await;

        row.balance.debit(amount)?;
        let withdrawal = Withdrawal::new(order_ref, amount, owner);
        row.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    async fn balance(&self, owner: UserId) -> Result<Balance> {
        let cell = self.account(owner).await?;
        let row = cell.lock().await;
        Ok(row.balance)
    }

    async fn orders_of(&self, owner: UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut result: Vec<Order> = orders
            .values()
            .filter(|o| o.owner == owner)
            .cloned()
            .collect();
        result.sort_by_key(|o| o.uploaded_at);
        Ok(result)
    }

    async fn withdrawals_of(&self, owner: UserId) -> Result<Vec<Withdrawal>> {
        let cell = self.account(owner).await?;
        let row = cell.lock().await;
        Ok(row.withdrawals.clone())
    }
}
