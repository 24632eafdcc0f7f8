use crate::domain::account::{Balance, UserId, Withdrawal};
use crate::domain::checksum::OrderNumber;
use crate::domain::money::Points;
use crate::domain::order::{Order, Registration, StatusUpdate};
use crate::domain::ports::LedgerStore;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, TransactionDB,
    TransactionDBOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Column Family for orders, keyed by order number.
pub const CF_ORDERS: &str = "orders";
/// Column Family for balance rows, keyed by big-endian user id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for withdrawals, keyed by user id and a per-user sequence number.
pub const CF_WITHDRAWALS: &str = "withdrawals";
/// Index of orders still in NEW or PROCESSING, keyed by order number.
pub const CF_PENDING: &str = "pending_orders";
/// Index of orders per user, keyed by user id followed by order number.
pub const CF_OWNER_ORDERS: &str = "orders_by_owner";

const WITHDRAWAL_SEQ_SUFFIX: &[u8] = b"/withdrawal_seq";

/// A persistent ledger backed by a RocksDB `TransactionDB`.
///
/// Every multi-record mutation runs in one pessimistic transaction. Balance
/// rows are read with `get_for_update`, so concurrent mutators of the same
/// user serialize on that row's lock while other users are unaffected.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
}

fn account_key(owner: UserId) -> [u8; 8] {
    owner.0.to_be_bytes()
}

/// Lives in the accounts column family next to the balance row it belongs to.
fn withdrawal_seq_key(owner: UserId) -> Vec<u8> {
    let mut key = account_key(owner).to_vec();
    key.extend_from_slice(WITHDRAWAL_SEQ_SUFFIX);
    key
}

fn withdrawal_key(owner: UserId, seq: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&account_key(owner));
    key[8..].copy_from_slice(&seq.to_be_bytes());
    key
}

fn owner_order_key(owner: UserId, number: &OrderNumber) -> Vec<u8> {
    let mut key = account_key(owner).to_vec();
    key.extend_from_slice(number.as_str().as_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

impl RocksDBStore {
    /// Opens or creates a ledger database at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [
            CF_ORDERS,
            CF_ACCOUNTS,
            CF_WITHDRAWALS,
            CF_PENDING,
            CF_OWNER_ORDERS,
        ]
        .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = TransactionDB::open_cf_descriptors(
            &opts,
            &TransactionDBOptions::default(),
            path,
            cfs,
        )?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::storage(format!("{name} column family not found")))
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    /// Keys under `prefix` with the prefix stripped.
    fn scan_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let mut keys = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key[prefix.len()..].to_vec());
        }
        Ok(keys)
    }

    fn load_orders(&self, numbers: Vec<Vec<u8>>) -> Result<Vec<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::with_capacity(numbers.len());
        for number in numbers {
            // An index entry can outlive its row only across a concurrent commit.
            if let Some(bytes) = self.db.get_cf(cf, &number)? {
                orders.push(decode(&bytes)?);
            }
        }
        Ok(orders)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn open_account(&self, owner: UserId) -> Result<()> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let txn = self.db.transaction();
        if txn.get_for_update_cf(cf, account_key(owner), true)?.is_none() {
            txn.put_cf(cf, account_key(owner), encode(&Balance::new(owner))?)?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn register_order(&self, number: OrderNumber, owner: UserId) -> Result<Registration> {
        let orders = self.cf(CF_ORDERS)?;
        let accounts = self.cf(CF_ACCOUNTS)?;
        let pending = self.cf(CF_PENDING)?;
        let by_owner = self.cf(CF_OWNER_ORDERS)?;
        let txn = self.db.transaction();

        if txn.get_cf(accounts, account_key(owner))?.is_none() {
            return Err(LedgerError::AccountNotFound(owner));
        }

        let registration = match txn.get_for_update_cf(orders, number.as_str(), true)? {
            Some(bytes) => {
                let existing: Order = decode(&bytes)?;
                if existing.owner != owner {
                    return Err(LedgerError::ConflictOtherOwner(number.to_string()));
                }
                Registration::AlreadyRegistered
            }
            None => {
                let order = Order::new(number, owner);
                txn.put_cf(orders, order.number.as_str(), encode(&order)?)?;
                txn.put_cf(pending, order.number.as_str(), b"")?;
                txn.put_cf(by_owner, owner_order_key(owner, &order.number), b"")?;
                Registration::Created
            }
        };
        txn.commit()?;
        Ok(registration)
    }

    async fn pending_orders(&self) -> Result<Vec<Order>> {
        let numbers = self.scan_keys(CF_PENDING, &[])?;
        Ok(self
            .load_orders(numbers)?
            .into_iter()
            .filter(|o| o.status.is_temporary())
            .collect())
    }

    async fn apply_reconciliation_batch(&self, updates: Vec<StatusUpdate>) -> Result<()> {
        let orders = self.cf(CF_ORDERS)?;
        let accounts = self.cf(CF_ACCOUNTS)?;
        let pending = self.cf(CF_PENDING)?;
        // Dropping the transaction before commit rolls every write back.
        let txn = self.db.transaction();

        let mut credits: BTreeMap<UserId, Points> = BTreeMap::new();
        for update in &updates {
            let bytes = txn
                .get_for_update_cf(orders, update.number.as_str(), true)?
                .ok_or_else(|| {
                    LedgerError::BatchRejected(format!("unknown order {}", update.number))
                })?;
            let mut order: Order = decode(&bytes)?;
            let credit = order.credit_for(update);
            order.apply(update).map_err(LedgerError::BatchRejected)?;
            if credit.is_positive() {
                let total = credits.entry(order.owner).or_insert(Points::ZERO);
                *total = total.checked_add(credit).ok_or_else(|| {
                    LedgerError::BatchRejected(format!("credit overflow for user {}", order.owner))
                })?;
            }
            txn.put_cf(orders, order.number.as_str(), encode(&order)?)?;
            if order.status.is_terminal() {
                txn.delete_cf(pending, order.number.as_str())?;
            }
        }

        for (owner, credit) in credits {
            let bytes = txn
                .get_for_update_cf(accounts, account_key(owner), true)?
                .ok_or(LedgerError::AccountNotFound(owner))?;
            let mut balance: Balance = decode(&bytes)?;
            balance.credit(credit)?;
            txn.put_cf(accounts, account_key(owner), encode(&balance)?)?;
        }

        txn.commit()?;
        Ok(())
    }

    async fn withdraw(&self, order_ref: String, amount: Points, owner: UserId) -> Result<Withdrawal> {
        let accounts = self.cf(CF_ACCOUNTS)?;
        let withdrawals = self.cf(CF_WITHDRAWALS)?;
        let txn = self.db.transaction();

        let bytes = txn
            .get_for_update_cf(accounts, account_key(owner), true)?
            .ok_or(LedgerError::AccountNotFound(owner))?;
        let mut balance: Balance = decode(&bytes)?;
        balance.debit(amount)?;

        let seq = match txn.get_for_update_cf(accounts, withdrawal_seq_key(owner), true)? {
            Some(bytes) => decode::<u64>(&bytes)? + 1,
            None => 0,
        };

        let withdrawal = Withdrawal::new(order_ref, amount, owner);
        txn.put_cf(accounts, account_key(owner), encode(&balance)?)?;
        txn.put_cf(accounts, withdrawal_seq_key(owner), encode(&seq)?)?;
        txn.put_cf(withdrawals, withdrawal_key(owner, seq), encode(&withdrawal)?)?;
        txn.commit()?;
        Ok(withdrawal)
    }

    async fn balance(&self, owner: UserId) -> Result<Balance> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let bytes = self
            .db
            .get_cf(cf, account_key(owner))?
            .ok_or(LedgerError::AccountNotFound(owner))?;
        decode(&bytes)
    }

    async fn orders_of(&self, owner: UserId) -> Result<Vec<Order>> {
        let numbers = self.scan_keys(CF_OWNER_ORDERS, &account_key(owner))?;
        let mut orders = self.load_orders(numbers)?;
        orders.sort_by_key(|o| o.uploaded_at);
        Ok(orders)
    }

    async fn withdrawals_of(&self, owner: UserId) -> Result<Vec<Withdrawal>> {
        self.scan(CF_WITHDRAWALS, &account_key(owner))
    }
}
