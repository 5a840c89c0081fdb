//! Credit ledger properties under concurrent reservation, plus persistence
//! through the SQLite store.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use cogmeter::core::ledger::{CreditLedger, MemoryBalanceStore, ReserveDecision};
use cogmeter::core::provider::Provider;
use cogmeter::storage::ledger_store::SqliteBalanceStore;
use cogmeter::test_utils::TestDir;
use common::logger::TestLogger;
use proptest::prelude::*;

const ACCOUNT: &str = "acct-prop";

/// Race `attempts` threads on one key; return how many were granted.
///
/// Granted reservations are committed or released according to `commit`, so
/// the final balance reflects only the committed ones.
fn race(ledger: &Arc<CreditLedger>, attempts: usize, cost: u64, commit: &[bool]) -> (usize, usize) {
    let barrier = Arc::new(Barrier::new(attempts));
    let handles: Vec<_> = (0..attempts)
        .map(|i| {
            let ledger = Arc::clone(ledger);
            let barrier = Arc::clone(&barrier);
            let commit = commit.get(i).copied().unwrap_or(true);
            thread::spawn(move || {
                barrier.wait();
                match ledger.reserve(ACCOUNT, Provider::OpenAi, cost).unwrap() {
                    ReserveDecision::Granted(reservation) => {
                        if commit {
                            ledger.commit(reservation).unwrap();
                            (1, 1)
                        } else {
                            ledger.release(reservation);
                            (1, 0)
                        }
                    }
                    ReserveDecision::Denied { .. } => (0, 0),
                }
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .fold((0, 0), |(g, c), (dg, dc)| (g + dg, c + dc))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn concurrent_reserves_never_overdraw(
        balance in 0u64..1_000,
        cost in 1u64..200,
        attempts in 2usize..12,
    ) {
        let store = MemoryBalanceStore::new().with_balance(ACCOUNT, Provider::OpenAi, balance);
        let ledger = Arc::new(CreditLedger::new(Arc::new(store)));

        // Hold every granted reservation until all threads have decided.
        let barrier = Arc::new(Barrier::new(attempts));
        let handles: Vec<_> = (0..attempts)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let decision = ledger.reserve(ACCOUNT, Provider::OpenAi, cost).unwrap();
                    let granted = decision.is_granted();
                    barrier.wait();
                    drop(decision);
                    granted
                })
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|g| *g)
            .count();

        let ceiling = usize::try_from(balance / cost).unwrap();
        prop_assert!(granted <= ceiling, "granted {} > floor({}/{})", granted, balance, cost);
        prop_assert_eq!(granted, ceiling.min(attempts));
        // Dropped reservations released their holds.
        prop_assert_eq!(ledger.available(ACCOUNT, Provider::OpenAi).unwrap(), balance);
    }

    #[test]
    fn balance_reflects_only_commits(
        balance in 0u64..600,
        cost in 1u64..100,
        commit in proptest::collection::vec(any::<bool>(), 2..10),
    ) {
        let store = MemoryBalanceStore::new().with_balance(ACCOUNT, Provider::OpenAi, balance);
        let ledger = Arc::new(CreditLedger::new(Arc::new(store)));

        let (granted, committed) = race(&ledger, commit.len(), cost, &commit);

        prop_assert!(committed <= granted);
        let committed = u64::try_from(committed).unwrap();
        prop_assert!(committed * cost <= balance);
        prop_assert_eq!(
            ledger.balance(ACCOUNT, Provider::OpenAi).unwrap(),
            balance - committed * cost
        );
        prop_assert_eq!(
            ledger.available(ACCOUNT, Provider::OpenAi).unwrap(),
            ledger.balance(ACCOUNT, Provider::OpenAi).unwrap()
        );
    }
}

#[test]
fn holds_on_one_key_do_not_affect_another() {
    let store = MemoryBalanceStore::new()
        .with_balance(ACCOUNT, Provider::OpenAi, 100)
        .with_balance(ACCOUNT, Provider::Anthropic, 100)
        .with_balance("other", Provider::OpenAi, 100);
    let ledger = CreditLedger::new(Arc::new(store));

    let ReserveDecision::Granted(held) = ledger.reserve(ACCOUNT, Provider::OpenAi, 100).unwrap()
    else {
        panic!("first reservation should be granted");
    };

    assert!(ledger.reserve(ACCOUNT, Provider::Anthropic, 100).unwrap().is_granted());
    assert!(ledger.reserve("other", Provider::OpenAi, 100).unwrap().is_granted());
    assert!(!ledger.reserve(ACCOUNT, Provider::OpenAi, 1).unwrap().is_granted());
    ledger.release(held);
}

#[test]
fn sqlite_store_persists_commits_across_reopen() {
    let log = TestLogger::new("sqlite_store_persists_commits_across_reopen");
    let dir = TestDir::new();
    let path = dir.path().join("ledger.sqlite");

    log.phase("grant and commit");
    {
        let ledger = CreditLedger::new(Arc::new(SqliteBalanceStore::open(&path).unwrap()));
        ledger.grant(ACCOUNT, Provider::DeepSeek, 300, "initial top-up").unwrap();

        let ReserveDecision::Granted(mut reservation) =
            ledger.reserve(ACCOUNT, Provider::DeepSeek, 120).unwrap()
        else {
            panic!("reservation should be granted");
        };
        reservation.set_memo("cognitive analysis test");
        assert_eq!(ledger.commit(reservation).unwrap(), 180);

        let ReserveDecision::Granted(released) =
            ledger.reserve(ACCOUNT, Provider::DeepSeek, 50).unwrap()
        else {
            panic!("reservation should be granted");
        };
        ledger.release(released);
    }

    log.phase("reopen");
    let store = SqliteBalanceStore::open(&path).unwrap();
    let journal = store.journal(ACCOUNT, 10).unwrap();
    let ledger = CreditLedger::new(Arc::new(store));
    assert_eq!(ledger.balance(ACCOUNT, Provider::DeepSeek).unwrap(), 180);
    assert_eq!(
        ledger.balances(ACCOUNT).unwrap(),
        vec![(Provider::DeepSeek, 180)]
    );

    assert_eq!(journal.len(), 2, "release must not write a journal row");
    assert_eq!(journal[0].delta, -120);
    assert_eq!(journal[0].balance_after, 180);
    assert_eq!(journal[0].memo, "cognitive analysis test");
    assert_eq!(journal[1].delta, 300);
    assert_eq!(journal[1].provider, "deepseek");
    log.finish_ok();
}

#[test]
fn sqlite_store_rejects_overdraft_outside_ledger() {
    let dir = TestDir::new();
    let path = dir.path().join("ledger.sqlite");
    let ledger = CreditLedger::new(Arc::new(SqliteBalanceStore::open(&path).unwrap()));
    ledger.grant(ACCOUNT, Provider::Perplexity, 100, "top-up").unwrap();

    let ReserveDecision::Granted(reservation) =
        ledger.reserve(ACCOUNT, Provider::Perplexity, 100).unwrap()
    else {
        panic!("reservation should be granted");
    };

    // A second process spends the balance behind this ledger's back.
    let other = CreditLedger::new(Arc::new(SqliteBalanceStore::open(&path).unwrap()));
    let ReserveDecision::Granted(theirs) = other.reserve(ACCOUNT, Provider::Perplexity, 60).unwrap()
    else {
        panic!("other reservation should be granted");
    };
    other.commit(theirs).unwrap();

    assert!(ledger.commit(reservation).is_err());
    assert_eq!(ledger.balance(ACCOUNT, Provider::Perplexity).unwrap(), 40);
    assert_eq!(ledger.available(ACCOUNT, Provider::Perplexity).unwrap(), 40);
}
