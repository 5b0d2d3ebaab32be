//! In-memory Entity Store
//!
//! Committed rows live behind a shared `RwLock`. Each wallet has its own async
//! mutex; a unit acquires it on first read of the wallet and keeps the owned
//! guard until commit, rollback or drop, which gives the same per-wallet
//! serialization as `SELECT ... FOR UPDATE`. Writes are staged on the unit
//! and only copied into the shared tables at commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::db::FIXTURES;
use crate::domain::{
    Amount, BankAccount, Balance, Disbursement, DisbursementStatus, NewDisbursement, User, Wallet,
};

use super::{EntityStore, StoreError, UnitOfWork};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    bank_accounts: BTreeMap<i64, BankAccount>,
    wallets: BTreeMap<i64, Wallet>,
    disbursements: BTreeMap<i64, Disbursement>,
}

#[derive(Debug, Default)]
struct Sequences {
    users: AtomicI64,
    bank_accounts: AtomicI64,
    wallets: AtomicI64,
    disbursements: AtomicI64,
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

/// Thread-safe in-memory entity store.
///
/// Cloning shares the same tables, so one instance can back the HTTP router
/// and be inspected by tests at the same time.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityStore {
    tables: Arc<RwLock<Tables>>,
    wallet_locks: Arc<StdMutex<HashMap<i64, Arc<Mutex<()>>>>>,
    sequences: Arc<Sequences>,
}

impl InMemoryEntityStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store loaded with the standard fixtures (see [`crate::db::FIXTURES`]).
    pub async fn seeded() -> Result<Self, StoreError> {
        let store = Self::new();
        for fixture in FIXTURES {
            let user = store.create_user(fixture.name, fixture.email).await;
            store
                .create_bank_account(
                    user.id,
                    fixture.bank_name,
                    fixture.account_number,
                    fixture.name,
                )
                .await?;
            store
                .create_wallet(user.id, fixture.balance, fixture.currency)
                .await?;
        }
        Ok(store)
    }

    pub async fn create_user(&self, name: &str, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: next_id(&self.sequences.users),
            name: name.to_string(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.users.insert(user.id, user.clone());
        user
    }

    pub async fn create_bank_account(
        &self,
        user_id: i64,
        bank_name: &str,
        account_number: &str,
        account_name: &str,
    ) -> Result<BankAccount, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::RowNotFound {
                table: "users",
                id: user_id,
            });
        }

        let now = Utc::now();
        let account = BankAccount {
            id: next_id(&self.sequences.bank_accounts),
            user_id,
            bank_name: bank_name.to_string(),
            account_number: account_number.to_string(),
            account_name: account_name.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.bank_accounts.insert(account.id, account.clone());
        Ok(account)
    }

    pub async fn create_wallet(
        &self,
        user_id: i64,
        balance: i64,
        currency: &str,
    ) -> Result<Wallet, StoreError> {
        let balance = Balance::new(balance).map_err(|e| StoreError::Conflict(e.to_string()))?;

        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::RowNotFound {
                table: "users",
                id: user_id,
            });
        }
        if tables.wallets.values().any(|w| w.user_id == user_id) {
            return Err(StoreError::Conflict(format!(
                "user {} already has a wallet",
                user_id
            )));
        }

        let now = Utc::now();
        let wallet = Wallet {
            id: next_id(&self.sequences.wallets),
            user_id,
            balance: balance.value(),
            currency: currency.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    fn wallet_lock(&self, wallet_id: i64) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self
            .wallet_locks
            .lock()
            .map_err(|_| StoreError::Unavailable("wallet lock registry poisoned".to_string()))?;
        Ok(locks.entry(wallet_id).or_default().clone())
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(InMemoryUnitOfWork {
            store: self.clone(),
            held_locks: HashMap::new(),
            staged_wallets: HashMap::new(),
            staged_disbursements: BTreeMap::new(),
        }))
    }

    async fn get_disbursement(&self, id: i64) -> Result<Option<Disbursement>, StoreError> {
        Ok(self.tables.read().await.disbursements.get(&id).cloned())
    }

    async fn wallet_by_owner(&self, user_id: i64) -> Result<Option<Wallet>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.wallets.values().find(|w| w.user_id == user_id).cloned())
    }

    async fn disbursements_for_user(&self, user_id: i64) -> Result<Vec<Disbursement>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .disbursements
            .values()
            .rev()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Staged writes plus the wallet locks held by one unit
pub struct InMemoryUnitOfWork {
    store: InMemoryEntityStore,
    held_locks: HashMap<i64, OwnedMutexGuard<()>>,
    staged_wallets: HashMap<i64, Wallet>,
    staged_disbursements: BTreeMap<i64, Disbursement>,
}

impl InMemoryUnitOfWork {
    /// Lock the wallet for the rest of the unit and return its current state.
    async fn lock_wallet(&mut self, wallet_id: i64) -> Result<Wallet, StoreError> {
        if let Some(wallet) = self.staged_wallets.get(&wallet_id) {
            return Ok(wallet.clone());
        }

        let guard = self.store.wallet_lock(wallet_id)?.lock_owned().await;

        // Committed state can only change under this lock, so the read is current.
        let wallet = self
            .store
            .tables
            .read()
            .await
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or(StoreError::RowNotFound {
                table: "wallets",
                id: wallet_id,
            })?;

        self.held_locks.insert(wallet_id, guard);
        self.staged_wallets.insert(wallet_id, wallet.clone());
        Ok(wallet)
    }

    fn staged_wallet_mut(&mut self, wallet_id: i64) -> Result<&mut Wallet, StoreError> {
        self.staged_wallets
            .get_mut(&wallet_id)
            .ok_or(StoreError::RowNotFound {
                table: "wallets",
                id: wallet_id,
            })
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_user(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.store.tables.read().await.users.get(&id).cloned())
    }

    async fn find_bank_account(
        &mut self,
        id: i64,
        expected_owner_id: i64,
    ) -> Result<Option<BankAccount>, StoreError> {
        let tables = self.store.tables.read().await;
        Ok(tables
            .bank_accounts
            .get(&id)
            .filter(|account| account.is_owned_by(expected_owner_id))
            .cloned())
    }

    async fn find_wallet_by_owner(&mut self, user_id: i64) -> Result<Option<Wallet>, StoreError> {
        let wallet_id = {
            let tables = self.store.tables.read().await;
            tables
                .wallets
                .values()
                .find(|w| w.user_id == user_id)
                .map(|w| w.id)
        };

        match wallet_id {
            Some(id) => self.lock_wallet(id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn reserve_disbursement_id(&mut self) -> Result<i64, StoreError> {
        Ok(next_id(&self.store.sequences.disbursements))
    }

    async fn insert_disbursement(&mut self, record: &NewDisbursement) -> Result<i64, StoreError> {
        {
            let tables = self.store.tables.read().await;
            let taken = |d: &Disbursement| d.id == record.id || d.reference == record.reference;
            if tables.disbursements.values().any(taken)
                || self.staged_disbursements.values().any(taken)
            {
                return Err(StoreError::Conflict(format!(
                    "disbursement {} / {} already exists",
                    record.id, record.reference
                )));
            }
        }

        self.staged_disbursements
            .insert(record.id, record.clone().into_pending());
        Ok(record.id)
    }

    async fn debit_wallet(
        &mut self,
        wallet_id: i64,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.lock_wallet(wallet_id).await?;
        let wallet = self.staged_wallet_mut(wallet_id)?;

        let balance = Balance::new(wallet.balance)
            .map_err(|e| StoreError::Corrupt(format!("wallet {}: {}", wallet_id, e)))?;
        let balance = balance
            .debit(&amount)
            .map_err(|_| StoreError::InsufficientFunds {
                wallet_id,
                requested: amount.value(),
            })?;

        wallet.balance = balance.value();
        wallet.updated_at = at;
        Ok(wallet.balance)
    }

    async fn credit_wallet(
        &mut self,
        wallet_id: i64,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.lock_wallet(wallet_id).await?;
        let wallet = self.staged_wallet_mut(wallet_id)?;

        let balance = Balance::new(wallet.balance)
            .and_then(|b| b.credit(&amount))
            .map_err(|e| StoreError::Conflict(format!("wallet {}: {}", wallet_id, e)))?;

        wallet.balance = balance.value();
        wallet.updated_at = at;
        Ok(wallet.balance)
    }

    async fn update_disbursement_status(
        &mut self,
        id: i64,
        status: DisbursementStatus,
        completed_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if !self.staged_disbursements.contains_key(&id) {
            let committed = self
                .store
                .tables
                .read()
                .await
                .disbursements
                .get(&id)
                .cloned()
                .ok_or(StoreError::RowNotFound {
                    table: "disbursements",
                    id,
                })?;
            self.staged_disbursements.insert(id, committed);
        }

        let record = self
            .staged_disbursements
            .get_mut(&id)
            .ok_or(StoreError::RowNotFound {
                table: "disbursements",
                id,
            })?;

        if record.status.is_terminal() {
            return Err(StoreError::AlreadyFinalized(id));
        }

        record.status = status;
        record.completed_at = completed_at;
        record.updated_at = at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnitOfWork {
            store,
            held_locks,
            staged_wallets,
            staged_disbursements,
        } = *self;

        {
            let mut tables = store.tables.write().await;
            tables.wallets.extend(staged_wallets);
            tables.disbursements.extend(staged_disbursements);
        }

        // Locks go only after the writes are visible.
        drop(held_locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
