//! Per-account, per-provider credit ledger.
//!
//! Balances live in a durable [`BalanceStore`]; the ledger layers in-memory
//! holds on top so a request can reserve credit before calling a provider and
//! only debit once the provider has produced billable output.
//!
//! ## Concurrency
//!
//! Every mutating operation for one `(account, provider)` key runs under that
//! key's own lock. Unrelated keys never contend. Within a key, the invariant
//! `sum(holds) <= balance` is maintained, so a commit never finds the balance
//! short unless the store was changed behind the ledger's back.
//!
//! ## Reservation lifecycle
//!
//! [`Reservation`] is a move-only token. [`CreditLedger::commit`] and
//! [`CreditLedger::release`] consume it; a token dropped without either (an
//! aborted task, a cancelled request) releases its hold in `Drop`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::provider::Provider;
use crate::error::{CogError, Result};

// =============================================================================
// Keys and storage
// =============================================================================

/// Identifies one balance row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub account: String,
    pub provider: Provider,
}

impl LedgerKey {
    #[must_use]
    pub fn new(account: impl Into<String>, provider: Provider) -> Self {
        Self {
            account: account.into(),
            provider,
        }
    }
}

impl std::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.account, self.provider)
    }
}

/// Durable balance rows.
///
/// Implementations must make `debit` conditional: a debit larger than the
/// current balance fails with [`CogError::InsufficientBalance`] and changes
/// nothing. Storage failures surface as [`CogError::Ledger`].
pub trait BalanceStore: Send + Sync {
    /// Current balance. Unknown keys have a balance of zero.
    fn balance(&self, key: &LedgerKey) -> Result<u64>;

    /// Subtract `amount`; returns the balance after.
    fn debit(&self, key: &LedgerKey, amount: u64, memo: &str) -> Result<u64>;

    /// Add `amount`; returns the balance after.
    fn credit(&self, key: &LedgerKey, amount: u64, memo: &str) -> Result<u64>;

    /// All non-zero-row balances for one account.
    fn balances(&self, account: &str) -> Result<Vec<(Provider, u64)>>;
}

/// In-process balance store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryBalanceStore {
    balances: Mutex<HashMap<LedgerKey, u64>>,
}

impl MemoryBalanceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance.
    #[must_use]
    pub fn with_balance(self, account: &str, provider: Provider, amount: u64) -> Self {
        lock(&self.balances).insert(LedgerKey::new(account, provider), amount);
        self
    }
}

impl BalanceStore for MemoryBalanceStore {
    fn balance(&self, key: &LedgerKey) -> Result<u64> {
        Ok(lock(&self.balances).get(key).copied().unwrap_or(0))
    }

    fn debit(&self, key: &LedgerKey, amount: u64, _memo: &str) -> Result<u64> {
        let mut balances = lock(&self.balances);
        let current = balances.get(key).copied().unwrap_or(0);
        let after = current
            .checked_sub(amount)
            .ok_or_else(|| CogError::InsufficientBalance {
                account: key.account.clone(),
                provider: key.provider.cli_name().to_string(),
                requested: amount,
                available: current,
            })?;
        balances.insert(key.clone(), after);
        Ok(after)
    }

    fn credit(&self, key: &LedgerKey, amount: u64, _memo: &str) -> Result<u64> {
        let mut balances = lock(&self.balances);
        let current = balances.get(key).copied().unwrap_or(0);
        let after = current
            .checked_add(amount)
            .ok_or_else(|| CogError::Ledger(format!("balance overflow for {key}")))?;
        balances.insert(key.clone(), after);
        Ok(after)
    }

    fn balances(&self, account: &str) -> Result<Vec<(Provider, u64)>> {
        let mut rows: Vec<_> = lock(&self.balances)
            .iter()
            .filter(|(key, _)| key.account == account)
            .map(|(key, amount)| (key.provider, *amount))
            .collect();
        rows.sort();
        Ok(rows)
    }
}

// =============================================================================
// Reservations
// =============================================================================

/// Outcome of [`CreditLedger::reserve`].
#[derive(Debug)]
pub enum ReserveDecision {
    /// The cost is now held against the balance.
    Granted(Reservation),
    /// The balance minus existing holds cannot cover the cost.
    Denied { required: u64, available: u64 },
}

impl ReserveDecision {
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

/// A held, not-yet-committed debit.
#[must_use = "a reservation releases its hold when dropped"]
pub struct Reservation {
    id: u64,
    key: LedgerKey,
    cost: u64,
    memo: String,
    holds: Arc<Mutex<u64>>,
    settled: bool,
}

impl Reservation {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn key(&self) -> &LedgerKey {
        &self.key
    }

    #[must_use]
    pub const fn cost(&self) -> u64 {
        self.cost
    }

    /// Journal memo recorded when the reservation is committed.
    pub fn set_memo(&mut self, memo: impl Into<String>) {
        self.memo = memo.into();
    }

    fn release_hold(&mut self) {
        if self.settled {
            return;
        }
        let mut held = lock(&self.holds);
        *held = held.saturating_sub(self.cost);
        self.settled = true;
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("cost", &self.cost)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(
                reservation = self.id,
                key = %self.key,
                cost = self.cost,
                "Reservation dropped unsettled, releasing hold"
            );
            self.release_hold();
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Credit ledger with reserve/commit/release semantics.
pub struct CreditLedger {
    store: Arc<dyn BalanceStore>,
    holds: Mutex<HashMap<LedgerKey, Arc<Mutex<u64>>>>,
    next_id: AtomicU64,
}

impl CreditLedger {
    #[must_use]
    pub fn new(store: Arc<dyn BalanceStore>) -> Self {
        Self {
            store,
            holds: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Per-key hold counter. The map lock is only held long enough to find or
    /// insert the slot.
    fn slot(&self, key: &LedgerKey) -> Arc<Mutex<u64>> {
        let mut holds = lock(&self.holds);
        Arc::clone(holds.entry(key.clone()).or_default())
    }

    /// Hold `cost` against `(account, provider)` if the balance allows it.
    ///
    /// # Errors
    /// Returns [`CogError::Ledger`] if the balance cannot be read.
    pub fn reserve(&self, account: &str, provider: Provider, cost: u64) -> Result<ReserveDecision> {
        let key = LedgerKey::new(account, provider);
        let slot = self.slot(&key);
        let mut held = lock(&slot);

        let balance = self.store.balance(&key)?;
        let available = balance.saturating_sub(*held);

        if available < cost {
            tracing::info!(key = %key, cost, available, "Reservation denied");
            return Ok(ReserveDecision::Denied {
                required: cost,
                available,
            });
        }

        *held += cost;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, cost, reservation = id, held = *held, "Reservation granted");
        drop(held);

        Ok(ReserveDecision::Granted(Reservation {
            id,
            memo: format!("reservation #{id}"),
            key,
            cost,
            holds: slot,
            settled: false,
        }))
    }

    /// Turn a held reservation into a permanent debit.
    ///
    /// Returns the balance after the debit. On error the reservation is
    /// released and nothing is debited.
    ///
    /// # Errors
    /// Returns [`CogError::Ledger`] if the debit cannot be stored, or
    /// [`CogError::InsufficientBalance`] if the balance was reduced outside
    /// the ledger.
    pub fn commit(&self, mut reservation: Reservation) -> Result<u64> {
        let slot = Arc::clone(&reservation.holds);
        let mut held = lock(&slot);

        let after = match self
            .store
            .debit(&reservation.key, reservation.cost, &reservation.memo)
        {
            Ok(after) => after,
            Err(err) => {
                tracing::error!(
                    key = %reservation.key,
                    reservation = reservation.id,
                    error = %err,
                    "Commit failed, releasing hold"
                );
                *held = held.saturating_sub(reservation.cost);
                reservation.settled = true;
                return Err(err);
            }
        };

        *held = held.saturating_sub(reservation.cost);
        reservation.settled = true;
        tracing::debug!(
            key = %reservation.key,
            reservation = reservation.id,
            cost = reservation.cost,
            balance = after,
            "Reservation committed"
        );
        Ok(after)
    }

    /// Cancel a held reservation without debiting.
    pub fn release(&self, mut reservation: Reservation) {
        tracing::debug!(
            key = %reservation.key,
            reservation = reservation.id,
            cost = reservation.cost,
            "Reservation released"
        );
        reservation.release_hold();
    }

    /// Durable balance (holds not subtracted).
    ///
    /// # Errors
    /// Returns [`CogError::Ledger`] if the store cannot be read.
    pub fn balance(&self, account: &str, provider: Provider) -> Result<u64> {
        self.store.balance(&LedgerKey::new(account, provider))
    }

    /// Balance minus outstanding holds.
    ///
    /// # Errors
    /// Returns [`CogError::Ledger`] if the store cannot be read.
    pub fn available(&self, account: &str, provider: Provider) -> Result<u64> {
        let key = LedgerKey::new(account, provider);
        let slot = self.slot(&key);
        let held = lock(&slot);
        Ok(self.store.balance(&key)?.saturating_sub(*held))
    }

    /// Add credit to a balance (top-up). Returns the balance after.
    ///
    /// # Errors
    /// Returns [`CogError::Ledger`] if the credit cannot be stored.
    pub fn grant(&self, account: &str, provider: Provider, amount: u64, memo: &str) -> Result<u64> {
        let key = LedgerKey::new(account, provider);
        let slot = self.slot(&key);
        let _held = lock(&slot);
        let after = self.store.credit(&key, amount, memo)?;
        tracing::info!(key = %key, amount, balance = after, "Credit granted");
        Ok(after)
    }

    /// All balances for an account.
    ///
    /// # Errors
    /// Returns [`CogError::Ledger`] if the store cannot be read.
    pub fn balances(&self, account: &str) -> Result<Vec<(Provider, u64)>> {
        self.store.balances(account)
    }
}

impl std::fmt::Debug for CreditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditLedger").finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ledger_with(balance: u64) -> CreditLedger {
        let store = MemoryBalanceStore::new().with_balance("acct", Provider::OpenAi, balance);
        CreditLedger::new(Arc::new(store))
    }

    fn granted(decision: ReserveDecision) -> Reservation {
        match decision {
            ReserveDecision::Granted(r) => r,
            ReserveDecision::Denied { .. } => panic!("expected grant"),
        }
    }

    #[test]
    fn commit_debits_exactly_the_cost() {
        let ledger = ledger_with(100);
        let reservation = granted(ledger.reserve("acct", Provider::OpenAi, 30).unwrap());
        assert_eq!(ledger.available("acct", Provider::OpenAi).unwrap(), 70);
        assert_eq!(ledger.balance("acct", Provider::OpenAi).unwrap(), 100);

        let after = ledger.commit(reservation).unwrap();
        assert_eq!(after, 70);
        assert_eq!(ledger.balance("acct", Provider::OpenAi).unwrap(), 70);
        assert_eq!(ledger.available("acct", Provider::OpenAi).unwrap(), 70);
    }

    #[test]
    fn release_leaves_balance_unchanged() {
        let ledger = ledger_with(100);
        let reservation = granted(ledger.reserve("acct", Provider::OpenAi, 30).unwrap());
        ledger.release(reservation);
        assert_eq!(ledger.balance("acct", Provider::OpenAi).unwrap(), 100);
        assert_eq!(ledger.available("acct", Provider::OpenAi).unwrap(), 100);
    }

    #[test]
    fn dropped_reservation_releases_hold() {
        let ledger = ledger_with(50);
        {
            let _reservation = granted(ledger.reserve("acct", Provider::OpenAi, 50).unwrap());
            assert_eq!(ledger.available("acct", Provider::OpenAi).unwrap(), 0);
        }
        assert_eq!(ledger.available("acct", Provider::OpenAi).unwrap(), 50);
    }

    #[test]
    fn holds_count_against_later_reservations() {
        let ledger = ledger_with(100);
        let first = granted(ledger.reserve("acct", Provider::OpenAi, 60).unwrap());
        match ledger.reserve("acct", Provider::OpenAi, 60).unwrap() {
            ReserveDecision::Denied {
                required,
                available,
            } => {
                assert_eq!(required, 60);
                assert_eq!(available, 40);
            }
            ReserveDecision::Granted(_) => panic!("second reservation must be denied"),
        }
        ledger.release(first);
        assert!(ledger.reserve("acct", Provider::OpenAi, 60).unwrap().is_granted());
    }

    #[test]
    fn unknown_key_has_zero_balance() {
        let ledger = ledger_with(100);
        let decision = ledger.reserve("other", Provider::OpenAi, 1).unwrap();
        assert!(!decision.is_granted());
        assert!(ledger.reserve("other", Provider::OpenAi, 0).unwrap().is_granted());
    }

    #[test]
    fn keys_are_independent() {
        let store = MemoryBalanceStore::new()
            .with_balance("acct", Provider::OpenAi, 10)
            .with_balance("acct", Provider::Anthropic, 10);
        let ledger = CreditLedger::new(Arc::new(store));
        let a = granted(ledger.reserve("acct", Provider::OpenAi, 10).unwrap());
        let b = granted(ledger.reserve("acct", Provider::Anthropic, 10).unwrap());
        ledger.commit(a).unwrap();
        ledger.release(b);
        assert_eq!(ledger.balance("acct", Provider::OpenAi).unwrap(), 0);
        assert_eq!(ledger.balance("acct", Provider::Anthropic).unwrap(), 10);
    }

    #[test]
    fn concurrent_reservations_never_oversubscribe() {
        let ledger = Arc::new(ledger_with(100));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    match ledger.reserve("acct", Provider::OpenAi, 30).unwrap() {
                        ReserveDecision::Granted(r) => ledger.commit(r).map(|_| 1).unwrap(),
                        ReserveDecision::Denied { .. } => 0,
                    }
                })
            })
            .collect();

        let granted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 3);
        assert_eq!(ledger.balance("acct", Provider::OpenAi).unwrap(), 10);
    }

    #[test]
    fn grant_adds_to_balance() {
        let ledger = ledger_with(5);
        let after = ledger.grant("acct", Provider::OpenAi, 95, "top-up").unwrap();
        assert_eq!(after, 100);
        assert_eq!(ledger.balances("acct").unwrap(), vec![(Provider::OpenAi, 100)]);
    }

    #[test]
    fn memory_store_rejects_overdraft() {
        let store = MemoryBalanceStore::new().with_balance("acct", Provider::OpenAi, 5);
        let err = store
            .debit(&LedgerKey::new("acct", Provider::OpenAi), 6, "memo")
            .unwrap_err();
        assert!(matches!(err, CogError::InsufficientBalance { available: 5, .. }));
        assert_eq!(store.balance(&LedgerKey::new("acct", Provider::OpenAi)).unwrap(), 5);
    }
}
