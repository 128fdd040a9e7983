use common::FaultyStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use wallet_ledger::{Entry, InMemoryStore, LedgerEngine, LedgerError, TransferMemo};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_credits_are_not_lost() {
    let engine = Arc::new(common::in_memory_engine());
    let wallet = common::funded_wallet(&engine, "u", "r", 0).await;

    let mut handles = Vec::new();
    for i in 0..50 {
        let engine = engine.clone();
        let wallet_id = wallet.id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .credit(&wallet_id, 10, Entry::new(format!("Credit {i}")))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let wallet = engine.get_wallet(&wallet.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, 500);
    assert_eq!(common::replay_balance(&engine, &wallet.id).await, 500);

    let balances: HashSet<i64> = engine
        .list_transactions(&wallet.id, 100, 0)
        .await
        .unwrap()
        .iter()
        .map(|tx| tx.balance)
        .collect();
    assert_eq!(balances, (1..=50).map(|n| n * 10).collect::<HashSet<i64>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let engine = Arc::new(common::in_memory_engine());
    let wallet = common::funded_wallet(&engine, "u", "r", 100).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = engine.clone();
        let wallet_id = wallet.id.clone();
        handles.push(tokio::spawn(async move {
            engine.debit(&wallet_id, 30, Entry::new("Spend")).await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(LedgerError::InsufficientBalance { .. }) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    assert_eq!(applied, 3);
    let wallet = engine.get_wallet(&wallet.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_conserve_total() {
    let engine = Arc::new(common::in_memory_engine());
    let a = common::funded_wallet(&engine, "u", "a", 1000).await;
    let b = common::funded_wallet(&engine, "u", "b", 1000).await;

    let mut handles = Vec::new();
    for i in 0..40 {
        let engine = engine.clone();
        let (from, to) = if i % 2 == 0 {
            (a.id.clone(), b.id.clone())
        } else {
            (b.id.clone(), a.id.clone())
        };
        handles.push(tokio::spawn(async move {
            engine
                .transfer(&from, &to, 75, TransferMemo::new("Shuffle"))
                .await
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(LedgerError::InsufficientBalance { .. }) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    let a = engine.get_wallet(&a.id).await.unwrap().unwrap();
    let b = engine.get_wallet(&b.id).await.unwrap().unwrap();
    assert!(a.balance >= 0 && b.balance >= 0);
    assert_eq!(a.balance + b.balance, 2000);
    assert_eq!(common::replay_balance(&engine, &a.id).await, a.balance);
    assert_eq!(common::replay_balance(&engine, &b.id).await, b.balance);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creation_yields_one_wallet() {
    let engine = Arc::new(common::in_memory_engine());

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_wallet("racer", &format!("Attempt {i}"), "", "shared-ref")
                .await
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap().unwrap().id);
    }
    assert_eq!(ids.len(), 1);

    let wallets = engine.get_wallets_by_user("racer").await.unwrap();
    assert_eq!(wallets.len(), 1);
    assert!(wallets[0].primary);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_wallets_single_primary() {
    let engine = Arc::new(common::in_memory_engine());

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_wallet("fresh", "Wallet", "", &format!("ref-{i}"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let wallets = engine.get_wallets_by_user("fresh").await.unwrap();
    assert_eq!(wallets.len(), 8);
    assert_eq!(wallets.iter().filter(|w| w.primary).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_field_update_keeps_concurrent_credit() {
    common::init_tracing();
    let store = FaultyStore::new(InMemoryStore::new())
        .delaying_wallet_writes(Duration::from_millis(100));
    let engine = Arc::new(LedgerEngine::new(store.into()));
    let wallet = engine.create_wallet("u", "Main", "", "r").await.unwrap();

    let renamer = {
        let engine = engine.clone();
        let wallet_id = wallet.id.clone();
        tokio::spawn(async move { engine.update_wallet_name(&wallet_id, "Renamed").await })
    };
    // Let the rename reach its delayed write first.
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine
        .credit(&wallet.id, 100, Entry::new("During rename"))
        .await
        .unwrap();
    renamer.await.unwrap().unwrap();

    let wallet = engine.get_wallet(&wallet.id).await.unwrap().unwrap();
    assert_eq!(wallet.name, "Renamed");
    assert_eq!(wallet.balance, 100);
    assert_eq!(common::replay_balance(&engine, &wallet.id).await, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_freeze_serialises_with_debits() {
    common::init_tracing();
    let store = FaultyStore::new(InMemoryStore::new())
        .delaying_wallet_writes(Duration::from_millis(50));
    let engine = Arc::new(LedgerEngine::new(store.into()));
    let wallet = common::funded_wallet(&engine, "u", "r", 300).await;

    let mut handles = Vec::new();
    for _ in 0..3 {
        let engine = engine.clone();
        let wallet_id = wallet.id.clone();
        handles.push(tokio::spawn(async move {
            engine.debit(&wallet_id, 100, Entry::new("Spend")).await.map(|_| ())
        }));
    }
    let freezer = {
        let engine = engine.clone();
        let wallet_id = wallet.id.clone();
        tokio::spawn(async move { engine.freeze_wallet(&wallet_id, "review").await.map(|_| ()) })
    };
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) | Err(LedgerError::WalletFrozen(_)) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    freezer.await.unwrap().unwrap();

    let wallet = engine.get_wallet(&wallet.id).await.unwrap().unwrap();
    assert!(wallet.frozen);
    assert_eq!(common::replay_balance(&engine, &wallet.id).await, wallet.balance);
}
